//! The PDF page engine: open, thumbnail, confirm, close.
//!
//! Decode, page renders and the rebuild all run on tokio's blocking pool, so
//! the caller's task stays responsive while they are in flight. The engine
//! must therefore be driven from inside a tokio runtime.

use crate::cancel::CancellationToken;
use crate::pdf::{PdfBackend, PdfError, Thumbnail};
use crate::session::{PdfSession, SessionId, ThumbnailEvent};
use image::DynamicImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Thumbnail size relative to the page's native size.
    pub thumbnail_scale: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thumbnail_scale: 0.2,
        }
    }
}

/// Thumbnails of one session as they finish rendering.
///
/// Pages are requested in ascending order but consumers should place each
/// event by its page number. Yields nothing more once the session closes.
#[derive(Debug)]
pub struct ThumbnailStream {
    rx: mpsc::UnboundedReceiver<ThumbnailEvent>,
    cancel: CancellationToken,
}

impl ThumbnailStream {
    pub async fn next(&mut self) -> Option<ThumbnailEvent> {
        if self.cancel.is_cancelled() {
            self.rx.close();
            return None;
        }
        let event = self.rx.recv().await?;
        if self.cancel.is_cancelled() {
            self.rx.close();
            return None;
        }
        Some(event)
    }
}

pub struct PdfEngine {
    backend: Arc<dyn PdfBackend>,
    config: EngineConfig,
    next_id: AtomicU64,
}

impl PdfEngine {
    pub fn new(backend: impl PdfBackend) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: impl PdfBackend, config: EngineConfig) -> Self {
        Self::from_shared(Arc::new(backend), config)
    }

    /// Use a backend the caller keeps a handle to.
    pub fn from_shared(backend: Arc<dyn PdfBackend>, config: EngineConfig) -> Self {
        Self {
            backend,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Decode `source` and start a session with every page selected.
    ///
    /// Thumbnails are not rendered here; the session is usable immediately.
    pub async fn open_session(&self, source: Vec<u8>) -> Result<PdfSession, PdfError> {
        let source: Arc<[u8]> = Arc::from(source);
        let backend = Arc::clone(&self.backend);
        let bytes = Arc::clone(&source);

        let decoded = tokio::task::spawn_blocking(move || backend.decode(&bytes))
            .await
            .map_err(|e| PdfError::Decode(e.to_string()))
            .and_then(|result| result)
            .and_then(|page_count| match page_count {
                0 => Err(PdfError::Decode("document has no pages".to_string())),
                n => Ok(n),
            });

        let page_count = match decoded {
            Ok(page_count) => page_count,
            Err(e) => {
                log::error!("Error loading PDF preview: {}", e);
                return Err(e);
            }
        };

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        log::info!("Opened {} ({} pages)", id, page_count);
        Ok(PdfSession::new(id, source, page_count))
    }

    /// Start rendering one thumbnail per page, in ascending page order.
    ///
    /// A page that fails to render is logged and skipped. Can be called once
    /// per session.
    pub fn generate_thumbnails(
        &self,
        session: &mut PdfSession,
    ) -> Result<ThumbnailStream, PdfError> {
        session.start_thumbnails()?;

        let source = session.source()?;
        let cancel = session.cancel_token();
        let session_id = session.id();
        let scale = self.config.thumbnail_scale;
        let backend = Arc::clone(&self.backend);
        let (tx, rx) = mpsc::unbounded_channel();

        let worker_cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut on_page = |page: u32, rendered: Result<DynamicImage, PdfError>| {
                match rendered.and_then(|image| Thumbnail::from_image(&image)) {
                    Ok(thumbnail) => {
                        let event = ThumbnailEvent {
                            session: session_id,
                            page,
                            thumbnail,
                        };
                        tx.send(event).is_ok()
                    }
                    Err(e) => {
                        log::warn!("Error rendering page {} of {}: {}", page, session_id, e);
                        true
                    }
                }
            };

            if let Err(e) = backend.render_pages(&source, scale, &worker_cancel, &mut on_page) {
                log::warn!("Error rendering thumbnails of {}: {}", session_id, e);
            }
            if worker_cancel.is_cancelled() {
                log::debug!("{} closed, thumbnails stopped", session_id);
            }
            drop(source);
        });

        Ok(ThumbnailStream { rx, cancel })
    }

    /// Rebuild the source with only the selected pages, in ascending order.
    ///
    /// The session is not modified, so a failed rebuild can be retried.
    pub async fn confirm_selection(&self, session: &PdfSession) -> Result<Vec<u8>, PdfError> {
        if session.is_closed() {
            return Err(PdfError::SessionClosed);
        }

        let mut pages = session.selected_pages();
        if pages.is_empty() {
            return Err(PdfError::EmptySelection);
        }
        pages.sort_unstable();

        let source = session.source()?;
        let backend = Arc::clone(&self.backend);
        let page_total = pages.len();

        let result = tokio::task::spawn_blocking(move || backend.extract_pages(&source, &pages))
            .await
            .map_err(|e| PdfError::Extraction(e.to_string()))
            .and_then(|result| result);

        match &result {
            Ok(bytes) => log::info!(
                "Rebuilt {} pages from {} ({} bytes)",
                page_total,
                session.id(),
                bytes.len()
            ),
            Err(e) => log::error!("Error saving PDF from {}: {}", session.id(), e),
        }
        result
    }

    pub fn close_session(&self, session: &mut PdfSession) {
        if !session.is_closed() {
            log::info!("Closed {}", session.id());
        }
        session.close();
    }
}
