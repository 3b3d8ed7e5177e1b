//! Page rasterization using pdfium-render.
//!
//! Note: pdfium-render's Pdfium struct is not Send+Sync, so we bind a fresh
//! instance inside each operation rather than storing one in shared state.
//! One operation is one document: bind and load once, then walk its pages on
//! the blocking pool.

use super::PdfError;
use crate::cancel::CancellationToken;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;

/// Environment variable naming an explicit PDFium library to load.
pub const PDFIUM_PATH_ENV: &str = "MARKDOWN_LABS_PDFIUM_PATH";

/// Where to find the PDFium shared library.
#[derive(Debug, Clone, Default)]
pub struct RendererConfig {
    /// Explicit library path, tried before any fallback.
    pub library_path: Option<PathBuf>,
}

impl RendererConfig {
    pub fn from_env() -> Self {
        Self {
            library_path: std::env::var_os(PDFIUM_PATH_ENV).map(PathBuf::from),
        }
    }
}

/// A low-resolution PNG preview of one page.
///
/// The data URI is encoded once at construction; views clone it on every
/// publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
    data_uri: String,
}

impl Thumbnail {
    pub fn from_png(width: u32, height: u32, png: Vec<u8>) -> Self {
        let data_uri = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        Self {
            width,
            height,
            png,
            data_uri,
        }
    }

    pub fn from_image(image: &DynamicImage) -> Result<Self, PdfError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| PdfError::Image(e.to_string()))?;

        Ok(Self::from_png(image.width(), image.height(), png))
    }

    /// `data:image/png;base64,...`, ready for an `<img src>`.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

/// Rasterizes pages through a PDFium binding made on demand.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    config: RendererConfig,
}

impl PdfiumRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Bind PDFium and load `bytes` once, then render every page (1-based)
    /// at `scale`, where 1.0 is 72 DPI.
    ///
    /// A page that fails is reported to `on_page` and the loop moves on.
    pub fn render_pages(
        &self,
        bytes: &[u8],
        scale: f32,
        cancel: &CancellationToken,
        on_page: &mut dyn FnMut(u32, Result<DynamicImage, PdfError>) -> bool,
    ) -> Result<(), PdfError> {
        let pdfium = bind_pdfium(&self.config)?;
        let doc = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| PdfError::Decode(e.to_string()))?;

        let pages = doc.pages();
        for index in 0..pages.len() {
            let page = index as u32 + 1;
            if cancel.is_cancelled() {
                log::debug!("Render cancelled before page {}", page);
                break;
            }

            let rendered = pages
                .get(index)
                .map_err(|e| page_error(page, e))
                .and_then(|pdf_page| render_page(&pdf_page, page, scale));
            if !on_page(page, rendered) {
                break;
            }
        }

        Ok(())
    }
}

fn render_page(pdf_page: &PdfPage, page: u32, scale: f32) -> Result<DynamicImage, PdfError> {
    let (width, height) = target_size(pdf_page.width().value, pdf_page.height().value, scale);

    // Thumbnails skip form fields but keep annotations visible
    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height)
        .render_form_data(false)
        .render_annotations(true);

    let bitmap = pdf_page
        .render_with_config(&config)
        .map_err(|e| page_error(page, e))?;

    Ok(bitmap.as_image())
}

fn page_error(page: u32, reason: impl ToString) -> PdfError {
    PdfError::PageRender {
        page,
        reason: reason.to_string(),
    }
}

/// Pixel size of a page of `width` x `height` points at `scale`, never zero.
fn target_size(width: f32, height: f32, scale: f32) -> (i32, i32) {
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let width = ((width * scale).round() as i32).max(1);
    let height = ((height * scale).round() as i32).max(1);
    (width, height)
}

/// Bind to the PDFium library and return a usable Pdfium instance.
fn bind_pdfium(config: &RendererConfig) -> Result<Pdfium, PdfError> {
    use std::sync::atomic::{AtomicBool, Ordering};
    static LOGGED_SUCCESS: AtomicBool = AtomicBool::new(false);

    // Strategy 1: explicitly configured library
    if let Some(path) = &config.library_path {
        match Pdfium::bind_to_library(path) {
            Ok(bindings) => {
                if !LOGGED_SUCCESS.swap(true, Ordering::Relaxed) {
                    log::info!("Loaded configured PDFium library: {:?}", path);
                }
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => {
                log::warn!("Failed to load configured PDFium library {:?}: {:?}", path, e);
            }
        }
    }

    // Strategy 2: bundled next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            #[cfg(target_os = "macos")]
            let bundled = exe_dir.join("..").join("Frameworks").join("libpdfium.dylib");
            #[cfg(target_os = "windows")]
            let bundled = exe_dir.join("pdfium.dll");
            #[cfg(not(any(target_os = "macos", target_os = "windows")))]
            let bundled = exe_dir.join("libpdfium.so");

            if let Ok(canonical_path) = bundled.canonicalize() {
                match Pdfium::bind_to_library(&canonical_path) {
                    Ok(bindings) => {
                        if !LOGGED_SUCCESS.swap(true, Ordering::Relaxed) {
                            log::info!("Loaded bundled PDFium library: {:?}", canonical_path);
                        }
                        return Ok(Pdfium::new(bindings));
                    }
                    Err(e) => {
                        log::debug!("Failed bundled PDFium library: {:?}", e);
                    }
                }
            }
        }
    }

    // Strategy 3: system library (development machines)
    if let Ok(bindings) = Pdfium::bind_to_system_library() {
        if !LOGGED_SUCCESS.swap(true, Ordering::Relaxed) {
            log::info!("Loaded system PDFium library");
        }
        return Ok(Pdfium::new(bindings));
    }

    // Strategy 4: /usr/local/lib (common development location on macOS)
    #[cfg(target_os = "macos")]
    {
        if let Ok(bindings) = Pdfium::bind_to_library("/usr/local/lib/libpdfium.dylib") {
            if !LOGGED_SUCCESS.swap(true, Ordering::Relaxed) {
                log::info!("Loaded PDFium from /usr/local/lib");
            }
            return Ok(Pdfium::new(bindings));
        }
    }

    Err(PdfError::Init(format!(
        "Could not load PDFium library. Set {} or install libpdfium.",
        PDFIUM_PATH_ENV
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_size_scales_points() {
        // A4 at the thumbnail scale
        assert_eq!(target_size(595.0, 842.0, 0.2), (119, 168));
    }

    #[test]
    fn test_target_size_never_zero() {
        assert_eq!(target_size(2.0, 2.0, 0.1), (1, 1));
        assert_eq!(target_size(100.0, 50.0, 0.0), (100, 50));
    }

    #[test]
    fn test_thumbnail_data_uri() {
        let image = DynamicImage::new_rgba8(4, 3);
        let thumbnail = Thumbnail::from_image(&image).unwrap();
        assert_eq!((thumbnail.width, thumbnail.height), (4, 3));
        assert!(thumbnail.png.starts_with(b"\x89PNG"));
        assert!(thumbnail.data_uri().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_thumbnail_data_uri_encodes_png_bytes() {
        let thumbnail = Thumbnail::from_png(1, 1, vec![1, 2, 3]);
        assert_eq!(thumbnail.data_uri(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var(PDFIUM_PATH_ENV, "/opt/pdfium/libpdfium.so");
        let config = RendererConfig::from_env();
        std::env::remove_var(PDFIUM_PATH_ENV);
        assert_eq!(
            config.library_path,
            Some(PathBuf::from("/opt/pdfium/libpdfium.so"))
        );
    }
}
