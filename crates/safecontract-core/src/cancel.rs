//! Per-request cancellation scope.
//!
//! A [`CancelHandle`] owns a `watch` channel whose value flips to `true` when
//! the scope is cancelled; any number of [`CancelSignal`]s observe it.
//! Dropping the handle counts as cancellation, so a request context that goes
//! away takes its generation down with it.

use std::sync::Arc;

use tokio::sync::watch;

/// Raising side of a cancellation scope.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observing side of a cancellation scope. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    // Keeps the sender of a `never()` signal alive so it is not read as dropped.
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

/// Create a fresh cancellation scope.
pub fn cancel_channel() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        CancelSignal {
            rx,
            _keepalive: None,
        },
    )
}

impl CancelHandle {
    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Another observer of this scope.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
            _keepalive: None,
        }
    }
}

impl CancelSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    /// `true` once the scope was cancelled or its handle dropped.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the scope is cancelled or its handle is dropped.
    ///
    /// Cancel-safe: suitable as a `tokio::select!` branch.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // `wait_for` errors when the sender is gone, which is cancellation too.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
