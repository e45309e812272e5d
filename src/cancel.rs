//! Cooperative cancellation for in-flight searches.
//!
//! The pipeline never installs timers; it only polls a caller-provided
//! token at the boundaries between stages (after each segment search and
//! after each refinement round). On cancel the request returns
//! [`SearchError::Canceled`](crate::SearchError::Canceled) without partial
//! results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheaply cloneable cancellation handle.
///
/// All clones observe the same flag. `cancel` is idempotent and
/// `is_canceled` is wait-free, so the token can be polled from the hot
/// path and flipped from any thread.
///
/// # Examples
///
/// ```
/// use svve::CancellationToken;
///
/// let token = CancellationToken::new();
/// let watcher = token.clone();
/// assert!(!watcher.is_canceled());
///
/// token.cancel();
/// assert!(watcher.is_canceled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that has not been canceled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call more than once.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
