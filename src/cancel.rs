//! Caller-supplied cancellation and per-call deadlines.
//!
//! A [`CancellationToken`] is cheap to clone and shared between the caller and
//! the pipeline. Every remote call the pipeline issues goes through [`guard`],
//! which races the call against the token and a deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cooperative cancellation token, awaitable from async code.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a new token (not cancelled).
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Sender lives as long as self; never reached in practice
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a guarded call did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancelled,
    TimedOut(Duration),
}

/// Run `call` until it completes, the token fires or `deadline` elapses.
///
/// Cancellation wins over a call that becomes ready at the same time.
pub async fn guard<F>(
    token: &CancellationToken,
    deadline: Duration,
    call: F,
) -> Result<F::Output, Interruption>
where
    F: Future,
{
    if token.is_cancelled() {
        return Err(Interruption::Cancelled);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Interruption::Cancelled),
        result = tokio::time::timeout(deadline, call) => {
            result.map_err(|_| Interruption::TimedOut(deadline))
        }
    }
}
