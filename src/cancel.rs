//! Cancellation token shared between a session and its render task.
//!
//! Closing a session cancels the token; the render task checks it before
//! each page and the thumbnail stream stops yielding once it is set, so a
//! late result is dropped by a check rather than by a forgotten callback.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation flag. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_observes_cancel() {
        let token = CancellationToken::new();
        let worker = token.clone();
        assert!(!worker.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(worker.is_cancelled());
    }
}
