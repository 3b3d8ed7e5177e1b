//! Page-selection dialog state.
//!
//! The controller owns at most one session and turns user actions into
//! engine calls. After every change it publishes a [`ControllerView`] that a
//! frontend can render directly.

use crate::engine::{PdfEngine, ThumbnailStream};
use crate::pdf::PdfError;
use crate::session::{PdfSession, ThumbnailEvent};
use serde::Serialize;
use tokio::sync::watch;

/// Receives the rebuilt document on a successful save.
pub type SaveCallback = Box<dyn FnMut(Vec<u8>) + Send>;

/// Notified whenever an open dialog closes.
pub type CloseCallback = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ControllerState {
    Closed,
    Loading,
    Ready,
    /// Decode failed; stays here until closed.
    Error { message: String },
}

/// Blocking notice shown over an interactive grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    EmptySelection,
    SaveFailed,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::EmptySelection => "Please select at least one page.",
            Notice::SaveFailed => "Failed to save PDF.",
        }
    }
}

/// One card in the thumbnail grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCard {
    pub page: u32,
    pub label: String,
    pub selected: bool,
    /// `None` while the thumbnail is still loading.
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerView {
    #[serde(flatten)]
    pub state: ControllerState,
    pub cards: Vec<PageCard>,
    pub selection_info: String,
    pub notice: Option<Notice>,
}

impl Default for ControllerView {
    fn default() -> Self {
        Self {
            state: ControllerState::Closed,
            cards: Vec::new(),
            selection_info: selection_info(0, 0),
            notice: None,
        }
    }
}

fn selection_info(selected: usize, page_count: u32) -> String {
    format!("{} of {} pages selected", selected, page_count)
}

pub struct SelectionController {
    engine: PdfEngine,
    session: Option<PdfSession>,
    state: ControllerState,
    notice: Option<Notice>,
    on_save: SaveCallback,
    on_close: Option<CloseCallback>,
    view_tx: watch::Sender<ControllerView>,
}

impl SelectionController {
    pub fn new(engine: PdfEngine, on_save: SaveCallback) -> Self {
        let (view_tx, _) = watch::channel(ControllerView::default());
        Self {
            engine,
            session: None,
            state: ControllerState::Closed,
            notice: None,
            on_save,
            on_close: None,
            view_tx,
        }
    }

    pub fn with_close_callback(mut self, on_close: CloseCallback) -> Self {
        self.on_close = Some(on_close);
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn session(&self) -> Option<&PdfSession> {
        self.session.as_ref()
    }

    /// Views published after every change, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<ControllerView> {
        self.view_tx.subscribe()
    }

    /// Open the dialog for `source`.
    ///
    /// Returns the thumbnail stream on success; feed its events back through
    /// [`on_thumbnail`](Self::on_thumbnail). Returns `None` when the document
    /// could not be decoded, leaving the dialog in [`ControllerState::Error`].
    pub async fn open(&mut self, source: Vec<u8>) -> Option<ThumbnailStream> {
        self.close_session();
        self.notice = None;
        self.state = ControllerState::Loading;
        self.publish();

        match self.engine.open_session(source).await {
            Ok(mut session) => {
                let stream = match self.engine.generate_thumbnails(&mut session) {
                    Ok(stream) => Some(stream),
                    Err(e) => {
                        log::warn!("Could not start thumbnails for {}: {}", session.id(), e);
                        None
                    }
                };
                self.session = Some(session);
                self.state = ControllerState::Ready;
                self.publish();
                stream
            }
            Err(e) => {
                self.state = ControllerState::Error {
                    message: format!("Failed to load PDF preview: {}", e),
                };
                self.publish();
                None
            }
        }
    }

    /// Place a rendered thumbnail. Returns `false` for stale events.
    pub fn on_thumbnail(&mut self, event: ThumbnailEvent) -> bool {
        let Some(session) = self.session.as_mut() else {
            log::debug!("Dropping thumbnail for page {} of closed {}", event.page, event.session);
            return false;
        };

        let page = event.page;
        if !session.insert_thumbnail(event) {
            log::warn!("Dropping stale thumbnail for page {}", page);
            return false;
        }
        self.publish();
        true
    }

    /// Flip a card. Returns its new selection, or `None` if no session is open.
    pub fn toggle(&mut self, page: u32) -> Option<bool> {
        let selected = self.session.as_mut()?.toggle_page(page);
        self.publish();
        Some(selected)
    }

    /// Rebuild the selected pages and hand them to the save callback.
    ///
    /// On failure the dialog stays open with a notice so the user can retry.
    pub async fn save(&mut self) -> Result<(), PdfError> {
        let Some(session) = self.session.as_ref() else {
            return Err(PdfError::SessionClosed);
        };

        if session.selection_count() == 0 {
            self.notice = Some(Notice::EmptySelection);
            self.publish();
            return Err(PdfError::EmptySelection);
        }

        let result = self.engine.confirm_selection(session).await;
        match result {
            Ok(bytes) => {
                (self.on_save)(bytes);
                self.close();
                Ok(())
            }
            Err(e) => {
                self.notice = Some(match e {
                    PdfError::EmptySelection => Notice::EmptySelection,
                    _ => Notice::SaveFailed,
                });
                self.publish();
                Err(e)
            }
        }
    }

    pub fn dismiss_notice(&mut self) {
        if self.notice.take().is_some() {
            self.publish();
        }
    }

    /// Close the dialog and drop the session. Idempotent.
    pub fn close(&mut self) {
        if self.state == ControllerState::Closed {
            return;
        }

        self.close_session();
        self.notice = None;
        self.state = ControllerState::Closed;
        self.publish();

        if let Some(on_close) = self.on_close.as_mut() {
            on_close();
        }
    }

    pub fn view(&self) -> ControllerView {
        let (cards, info) = match &self.session {
            Some(session) => {
                let cards = (1..=session.page_count())
                    .map(|page| PageCard {
                        page,
                        label: format!("Page {}", page),
                        selected: session.is_selected(page),
                        thumbnail: session.thumbnail(page).map(|t| t.data_uri().to_string()),
                    })
                    .collect();
                (
                    cards,
                    selection_info(session.selection_count(), session.page_count()),
                )
            }
            None => (Vec::new(), selection_info(0, 0)),
        };

        ControllerView {
            state: self.state.clone(),
            cards,
            selection_info: info,
            notice: self.notice,
        }
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            self.engine.close_session(&mut session);
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}
