//! PDF capabilities consumed by the page engine.
//!
//! This module provides:
//! - Page counting and page extraction using lopdf (pure Rust)
//! - Low-resolution page rasterization using pdfium-render
//! - The [`PdfBackend`] seam so the engine can run against any library
//!   exposing those three capabilities

pub mod document;
pub mod renderer;

pub use document::{decode_page_count, extract_pages};
pub use renderer::{PdfiumRenderer, RendererConfig, Thumbnail};

use crate::cancel::CancellationToken;
use image::DynamicImage;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during PDF operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to initialize PDFium: {0}")]
    Init(String),

    #[error("Failed to decode PDF: {0}")]
    Decode(String),

    #[error("Failed to render page {page}: {reason}")]
    PageRender { page: u32, reason: String },

    #[error("No pages selected")]
    EmptySelection,

    #[error("Failed to extract pages: {0}")]
    Extraction(String),

    #[error("Image encoding failed: {0}")]
    Image(String),

    #[error("Thumbnails were already requested for this session")]
    ThumbnailsStarted,

    #[error("Session is closed")]
    SessionClosed,
}

impl Serialize for PdfError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// The three capabilities the page engine needs from a PDF library.
///
/// Page numbers are 1-based throughout. Implementations are called from
/// tokio's blocking pool, so they may do synchronous work freely.
pub trait PdfBackend: Send + Sync + 'static {
    /// Decode the document and return its page count.
    fn decode(&self, bytes: &[u8]) -> Result<u32, PdfError>;

    /// Load the document once and rasterize every page at `scale`
    /// (1.0 = 72 DPI), in ascending order.
    ///
    /// Each page's outcome goes to `on_page`; a failed page does not stop the
    /// rest. Rendering stops early when `cancel` fires or `on_page` returns
    /// `false`. An `Err` means the document itself could not be loaded.
    fn render_pages(
        &self,
        bytes: &[u8],
        scale: f32,
        cancel: &CancellationToken,
        on_page: &mut dyn FnMut(u32, Result<DynamicImage, PdfError>) -> bool,
    ) -> Result<(), PdfError>;

    /// Copy the given pages, in ascending order, into a new serialized document.
    fn extract_pages(&self, bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfError>;
}

/// lopdf for structure, PDFium for pixels.
#[derive(Debug, Clone, Default)]
pub struct DefaultBackend {
    renderer: PdfiumRenderer,
}

impl DefaultBackend {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            renderer: PdfiumRenderer::new(config),
        }
    }
}

impl PdfBackend for DefaultBackend {
    fn decode(&self, bytes: &[u8]) -> Result<u32, PdfError> {
        decode_page_count(bytes)
    }

    fn render_pages(
        &self,
        bytes: &[u8],
        scale: f32,
        cancel: &CancellationToken,
        on_page: &mut dyn FnMut(u32, Result<DynamicImage, PdfError>) -> bool,
    ) -> Result<(), PdfError> {
        self.renderer.render_pages(bytes, scale, cancel, on_page)
    }

    fn extract_pages(&self, bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfError> {
        extract_pages(bytes, pages)
    }
}
