//! # Status Streams
//!
//! Cancellable channel of [`StatusUpdate`]s. The producer half is meant to
//! live in a task bound to a [`CancellationToken`]; once the token fires the
//! producer can no longer emit and the consumer sees the end of the stream.

use crate::ledger::StatusUpdate;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

/// Default buffer between producer and subscriber.
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Producer half.
#[derive(Clone)]
pub struct StatusSender {
    tx: mpsc::Sender<StatusUpdate>,
    cancel: CancellationToken,
}

impl StatusSender {
    /// Push an update. Returns `false` once the subscriber cancelled or went
    /// away; producers must stop on `false`.
    pub async fn send(&self, update: StatusUpdate) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(update) => sent.is_ok(),
        }
    }

    /// Whether the subscriber cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolve when the subscriber cancels.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Token shared with the subscriber.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Subscriber half.
pub struct StatusStream {
    rx: mpsc::Receiver<StatusUpdate>,
    cancel: CancellationToken,
}

impl StatusStream {
    /// Create a connected producer/subscriber pair.
    pub fn channel(capacity: usize, cancel: CancellationToken) -> (StatusSender, StatusStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            StatusSender {
                tx,
                cancel: cancel.clone(),
            },
            StatusStream { rx, cancel },
        )
    }

    /// Next update, or `None` once cancelled or the producer finished.
    pub async fn next(&mut self) -> Option<StatusUpdate> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            update = self.rx.recv() => update,
        }
    }

    /// Stop the subscription.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the subscription was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for StatusStream {
    type Item = StatusUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for StatusStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
