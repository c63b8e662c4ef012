//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared cancellation flag scoped to one job.
///
/// Clones share the same flag. The copier checks it after every chunk and
/// the orchestrator before every file, so a cancelled job stops within one
/// chunk's worth of I/O.
///
/// # Example
///
/// ```
/// use offload::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// std::thread::spawn(move || handle.cancel()).join().ok();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl From<Arc<AtomicBool>> for CancelToken {
    /// Wrap an existing flag, e.g. one already shared with a signal handler.
    fn from(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }
}
