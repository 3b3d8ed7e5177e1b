// Markdown Labs - PDF export backend
//
// Takes the PDF rendered from the markdown preview, shows one thumbnail per
// page, lets the user pick pages, and rebuilds a PDF from the picked pages
// using the original page content.

pub mod cancel;
pub mod controller;
pub mod engine;
pub mod pdf;
pub mod session;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use controller::{ControllerState, ControllerView, Notice, PageCard, SelectionController};
pub use engine::{EngineConfig, PdfEngine, ThumbnailStream};
pub use pdf::{DefaultBackend, PdfBackend, PdfError, RendererConfig, Thumbnail};
pub use session::{PdfSession, SessionId, ThumbnailEvent};
pub use workspace::{Document, JsonFileStorage, Settings, Storage, Workspace};

/// Engine over lopdf and PDFium, with the PDFium location taken from the
/// environment.
pub fn default_engine() -> PdfEngine {
    PdfEngine::new(DefaultBackend::new(RendererConfig::from_env()))
}
