//! Cooperative cancellation for network transfers.
//!
//! A [`CancelToken`] is created by the caller (the CLI wires it to SIGINT)
//! and passed into sync and clone. Transfer-progress callbacks poll
//! [`CancelToken::requested`] and fail the transfer when set; they also mark
//! the token [`CancelToken::received`] so the sync engine can tell a
//! user cancellation apart from a genuine network error and suppress the
//! latter. The two flags are deliberately separate: `requested` is owned by
//! the signal handler, `received` by the transfer callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation handle.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requested: Arc<AtomicBool>,
    received: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token with neither flag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The flag the signal handler sets. Suitable for
    /// `signal_hook::flag::register`.
    pub fn request_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }

    /// Ask in-flight transfers to stop.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been asked for.
    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Record that a transfer callback observed the request and aborted.
    pub fn mark_received(&self) {
        self.received.store(true, Ordering::SeqCst);
    }

    /// Whether a transfer was actually aborted by this token.
    pub fn received(&self) -> bool {
        self.received.load(Ordering::SeqCst)
    }
}
