//! Run-wide cancellation signal.
//!
//! A single [`CancellationToken`] lives in the execution context of a run and
//! is cloned into every process invocation. The first task failure (or a
//! user interrupt) cancels it once; every invocation still waiting on its
//! subprocess observes the signal and kills its process tree.
//!
//! ```ignore
//! tokio::select! {
//!     _ = token.cancelled() => kill_tree(pid),
//!     output = child.wait_with_output() => output,
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Thread-safe, cloneable cancellation token.
///
/// Cloning creates a new handle to the same state: cancelling any clone
/// cancels all of them. Cancellation is one-way and idempotent.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    /// Creates a new non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token, waking every waiter.
    ///
    /// Returns `true` only for the call that actually flipped the state.
    pub fn cancel(&self) -> bool {
        let first = !self.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    /// Returns true if the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Waits until the token is cancelled.
    ///
    /// Resolves immediately if cancellation already happened.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel() can't slip in between.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
