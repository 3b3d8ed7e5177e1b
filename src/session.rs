//! State of one export-and-select workflow.

use crate::cancel::CancellationToken;
use crate::pdf::{PdfError, Thumbnail};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Identifies a session so late results can be matched or discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// A rendered thumbnail, tagged with the session and page it belongs to.
#[derive(Debug, Clone)]
pub struct ThumbnailEvent {
    pub session: SessionId,
    pub page: u32,
    pub thumbnail: Thumbnail,
}

/// One page-selection session over a decoded source document.
///
/// Pages are 1-based. Every page starts selected. Once closed the session is
/// spent: the selection and thumbnails are cleared and the source released.
#[derive(Debug)]
pub struct PdfSession {
    id: SessionId,
    /// Source bytes; shared with the render task, dropped on close
    source: Option<Arc<[u8]>>,
    page_count: u32,
    selected: BTreeSet<u32>,
    thumbnails: HashMap<u32, Thumbnail>,
    cancel: CancellationToken,
    thumbnails_started: bool,
}

impl PdfSession {
    pub(crate) fn new(id: SessionId, source: Arc<[u8]>, page_count: u32) -> Self {
        Self {
            id,
            source: Some(source),
            page_count,
            selected: (1..=page_count).collect(),
            thumbnails: HashMap::new(),
            cancel: CancellationToken::new(),
            thumbnails_started: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    pub fn is_selected(&self, page: u32) -> bool {
        self.selected.contains(&page)
    }

    pub fn selection_count(&self) -> usize {
        self.selected.len()
    }

    /// Selected pages in ascending order.
    pub fn selected_pages(&self) -> Vec<u32> {
        self.selected.iter().copied().collect()
    }

    pub fn thumbnail(&self, page: u32) -> Option<&Thumbnail> {
        self.thumbnails.get(&page)
    }

    pub fn thumbnail_count(&self) -> usize {
        self.thumbnails.len()
    }

    /// Flip `page` in the selection and return whether it is now selected.
    ///
    /// # Panics
    ///
    /// If the session is closed or `page` is outside `1..=page_count`.
    pub fn toggle_page(&mut self, page: u32) -> bool {
        assert!(!self.is_closed(), "toggle_page on closed {}", self.id);
        assert!(
            (1..=self.page_count).contains(&page),
            "page {} out of range (page_count={})",
            page,
            self.page_count
        );

        if self.selected.remove(&page) {
            false
        } else {
            self.selected.insert(page);
            true
        }
    }

    /// Store a rendered thumbnail. Returns `false` and changes nothing if the
    /// event belongs to another session, arrives after close, or names a page
    /// this document does not have.
    pub fn insert_thumbnail(&mut self, event: ThumbnailEvent) -> bool {
        if event.session != self.id || self.is_closed() || self.cancel.is_cancelled() {
            return false;
        }
        if !(1..=self.page_count).contains(&event.page) {
            return false;
        }
        self.thumbnails.insert(event.page, event.thumbnail);
        true
    }

    /// Clear all state, stop the render task and release the source. Idempotent.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.selected.clear();
        self.thumbnails.clear();
        self.source = None;
    }

    pub(crate) fn source(&self) -> Result<Arc<[u8]>, PdfError> {
        self.source.clone().ok_or(PdfError::SessionClosed)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Thumbnails render once per session.
    pub(crate) fn start_thumbnails(&mut self) -> Result<(), PdfError> {
        if self.is_closed() {
            return Err(PdfError::SessionClosed);
        }
        if self.thumbnails_started {
            return Err(PdfError::ThumbnailsStarted);
        }
        self.thumbnails_started = true;
        Ok(())
    }
}
