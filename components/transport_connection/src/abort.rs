use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A handle that lets a caller cancel an in-flight request.
///
/// `abort()` is idempotent and safe to call before, during, or after the
/// request completes; calling it after completion is a no-op.
#[derive(Clone, Default)]
pub struct AbortHandle(Arc<AbortState>);

#[derive(Default)]
struct AbortState {
    aborted: AtomicBool,
    notify: Notify,
}

impl AbortHandle {
    /// Create a fresh, not-yet-aborted handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark this request as aborted. Idempotent.
    pub fn abort(&self) {
        if !self.0.aborted.swap(true, Ordering::SeqCst) {
            self.0.notify.notify_waiters();
        }
    }

    /// Whether `abort()` has been called.
    pub fn is_aborted(&self) -> bool {
        self.0.aborted.load(Ordering::SeqCst)
    }

    /// Resolve once `abort()` is called. Resolves immediately if it already
    /// has been.
    pub async fn aborted(&self) {
        if self.is_aborted() {
            return;
        }
        self.0.notify.notified().await;
    }
}
