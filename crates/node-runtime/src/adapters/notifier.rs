//! # Channel Notifier
//!
//! Fire-and-forget delivery of offline notices. `notify` only pushes onto an
//! unbounded channel; a drain task logs each notice and keeps the most recent
//! ones in a bounded outbox for inspection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pl_02_pairing_handshake::{NotificationChannel, OfflineNotice};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Outbox {
    notices: Mutex<VecDeque<OfflineNotice>>,
    delivered: AtomicU64,
}

/// [`NotificationChannel`] backed by an mpsc channel and a drain task.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<OfflineNotice>,
    outbox: Arc<Outbox>,
}

impl ChannelNotifier {
    /// Start the drain task. It stops when `cancel` fires, after draining
    /// what is already queued.
    pub fn spawn(outbox_capacity: usize, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<OfflineNotice>();
        let outbox = Arc::new(Outbox::default());
        let capacity = outbox_capacity.max(1);

        let sink = outbox.clone();
        let handle = tokio::spawn(async move {
            loop {
                let notice = tokio::select! {
                    _ = cancel.cancelled() => break,
                    notice = rx.recv() => match notice {
                        Some(notice) => notice,
                        None => break,
                    },
                };
                deliver(&sink, capacity, notice);
            }
            while let Ok(notice) = rx.try_recv() {
                deliver(&sink, capacity, notice);
            }
            debug!("[runtime] Notice drain stopped");
        });

        (Self { tx, outbox }, handle)
    }

    /// Most recent notices, oldest first.
    pub fn outbox(&self) -> Vec<OfflineNotice> {
        self.outbox.notices.lock().iter().cloned().collect()
    }

    /// Notices delivered since start.
    pub fn delivered(&self) -> u64 {
        self.outbox.delivered.load(Ordering::Relaxed)
    }
}

fn deliver(outbox: &Outbox, capacity: usize, notice: OfflineNotice) {
    info!(
        recipient = %notice.recipient,
        lct_id = %notice.lct_id,
        kind = ?notice.kind,
        "[runtime] Offline notice delivered: {}",
        notice.reason
    );
    let mut notices = outbox.notices.lock();
    if notices.len() == capacity {
        notices.pop_front();
    }
    notices.push_back(notice);
    outbox.delivered.fetch_add(1, Ordering::Relaxed);
}

impl NotificationChannel for ChannelNotifier {
    fn notify(&self, notice: OfflineNotice) {
        if let Err(e) = self.tx.send(notice) {
            warn!(
                "[runtime] Notice for {} dropped: drain task stopped",
                e.0.recipient
            );
        }
    }
}
