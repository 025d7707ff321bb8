//! Caller-driven cancellation of in-flight requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Cancels every request holding one of its watchers.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a token and a watcher to hand to request policies.
    pub fn new() -> (Self, CancellationWatcher) {
        let (tx, rx) = watch::channel(false);
        let cancelled = Arc::new(AtomicBool::new(false));

        let token = Self {
            cancelled: cancelled.clone(),
            notify: Arc::new(tx),
        };

        let watcher = CancellationWatcher {
            cancelled,
            notify: rx,
        };

        (token, watcher)
    }

    /// Another watcher on this token.
    pub fn watcher(&self) -> CancellationWatcher {
        CancellationWatcher {
            cancelled: self.cancelled.clone(),
            notify: self.notify.subscribe(),
        }
    }

    /// Cancel; every watcher observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.notify.send(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Observes a [`CancellationToken`].
#[derive(Clone, Debug)]
pub struct CancellationWatcher {
    cancelled: Arc<AtomicBool>,
    notify: watch::Receiver<bool>,
}

impl CancellationWatcher {
    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the token is cancelled.
    ///
    /// Never resolves if every token is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        while !*self.notify.borrow_and_update() {
            if self.notify.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
