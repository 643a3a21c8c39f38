//! # Queue State
//!
//! Entries of one queue, kept sorted by sequence, and the status snapshot
//! derived from them. Only live entries count against the queue's capacity;
//! the oldest finished ones are pruned past a retention limit, and their
//! outcomes stay in the counters.

use crate::domain::QueueConfig;
use serde::{Deserialize, Serialize};
use shared_types::{
    ComponentRef, LifecycleStatus, PairingRequest, QueueId, RequestId, RequestStatus,
};

/// Queue of a request: the proxy when present, else the target component.
pub fn queue_id_for(component_b: &ComponentRef, proxy_id: Option<&str>) -> QueueId {
    match proxy_id {
        Some(proxy) => QueueId::new(proxy),
        None => QueueId::new(component_b.id()),
    }
}

/// Input of an enqueue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnqueueRequest {
    /// Initiating component.
    pub component_a: ComponentRef,
    /// Target component.
    pub component_b: ComponentRef,
    /// Operational context.
    pub context: String,
    /// Optional intermediary.
    pub proxy_id: Option<String>,
}

impl EnqueueRequest {
    /// Build a request.
    pub fn new(
        component_a: ComponentRef,
        component_b: ComponentRef,
        context: impl Into<String>,
        proxy_id: Option<String>,
    ) -> Self {
        Self {
            component_a,
            component_b,
            context: context.into(),
            proxy_id,
        }
    }

    /// Queue this request belongs to.
    pub fn queue_id(&self) -> QueueId {
        queue_id_for(&self.component_b, self.proxy_id.as_deref())
    }
}

/// What a queue is doing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueActivity {
    /// Nothing queued or in flight.
    Idle,
    /// Entries waiting.
    Pending,
    /// An entry is being processed.
    Processing,
}

/// Health derived from the failed share of processed entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueHealth {
    /// Below the warning ratio.
    Healthy,
    /// At or above the warning ratio.
    Warning,
    /// At or above the critical ratio.
    Critical,
}

/// Snapshot of one queue, recomputed on every call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Queue id.
    pub queue_id: QueueId,
    /// Entries still `Queued`.
    pub pending_count: usize,
    /// Entries in `Processing`.
    pub processing_count: usize,
    /// `Completed` plus `Failed`.
    pub processed_count: usize,
    /// `Completed` only.
    pub completed_count: usize,
    /// `Failed` only.
    pub failed_count: usize,
    /// `Cancelled`.
    pub cancelled_count: usize,
    /// Activity.
    pub status: QueueActivity,
    /// Health.
    pub health: QueueHealth,
}

#[derive(Debug, Default, Clone, Copy)]
struct Pruned {
    completed: usize,
    failed: usize,
    cancelled: usize,
}

#[derive(Debug, Default)]
pub(crate) struct QueueState {
    entries: Vec<PairingRequest>,
    next_sequence: u64,
    reserved: usize,
    pruned: Pruned,
}

impl QueueState {
    /// Take a sequence number for an enqueue whose journal write is pending.
    /// The reservation counts as live until [`Self::release`].
    pub(crate) fn reserve_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.reserved += 1;
        sequence
    }

    pub(crate) fn release(&mut self) {
        self.reserved = self.reserved.saturating_sub(1);
    }

    /// Entries still queued or processing, plus pending enqueues.
    pub(crate) fn live_len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.status.is_terminal())
            .count()
            + self.reserved
    }

    /// Drop the oldest finished entries beyond `keep`; returns their ids.
    pub(crate) fn prune_finished(&mut self, keep: usize) -> Vec<RequestId> {
        let finished = self
            .entries
            .iter()
            .filter(|e| e.status.is_terminal())
            .count();
        let mut excess = finished.saturating_sub(keep);
        if excess == 0 {
            return Vec::new();
        }
        let mut removed = Vec::with_capacity(excess);
        let pruned = &mut self.pruned;
        self.entries.retain(|e| {
            if excess == 0 || !e.status.is_terminal() {
                return true;
            }
            match e.status {
                RequestStatus::Completed => pruned.completed += 1,
                RequestStatus::Failed => pruned.failed += 1,
                _ => pruned.cancelled += 1,
            }
            excess -= 1;
            removed.push(e.request_id.clone());
            false
        });
        removed
    }

    /// Insert keeping sequence order; journal writes may finish out of order.
    pub(crate) fn insert(&mut self, request: PairingRequest) {
        let at = self
            .entries
            .partition_point(|e| e.sequence < request.sequence);
        self.entries.insert(at, request);
    }

    pub(crate) fn get(&self, id: &RequestId) -> Option<&PairingRequest> {
        self.entries.iter().find(|e| &e.request_id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &RequestId) -> Option<&mut PairingRequest> {
        self.entries.iter_mut().find(|e| &e.request_id == id)
    }

    pub(crate) fn entries(&self) -> &[PairingRequest] {
        &self.entries
    }

    pub(crate) fn queued_ids(&self) -> Vec<RequestId> {
        self.entries
            .iter()
            .filter(|e| e.status == RequestStatus::Queued)
            .map(|e| e.request_id.clone())
            .collect()
    }

    pub(crate) fn status(&self, queue_id: &QueueId, config: &QueueConfig) -> QueueStatus {
        let count = |s: RequestStatus| self.entries.iter().filter(|e| e.status == s).count();
        let pending_count = count(RequestStatus::Queued);
        let processing_count = count(RequestStatus::Processing);
        let completed_count = count(RequestStatus::Completed) + self.pruned.completed;
        let failed_count = count(RequestStatus::Failed) + self.pruned.failed;
        let cancelled_count = count(RequestStatus::Cancelled) + self.pruned.cancelled;
        let processed_count = completed_count + failed_count;

        let status = if processing_count > 0 {
            QueueActivity::Processing
        } else if pending_count > 0 {
            QueueActivity::Pending
        } else {
            QueueActivity::Idle
        };

        let health = if processed_count == 0 {
            QueueHealth::Healthy
        } else {
            let ratio = failed_count as f64 / processed_count as f64;
            if ratio >= config.critical_failure_ratio {
                QueueHealth::Critical
            } else if ratio >= config.warning_failure_ratio {
                QueueHealth::Warning
            } else {
                QueueHealth::Healthy
            }
        };

        QueueStatus {
            queue_id: queue_id.clone(),
            pending_count,
            processing_count,
            processed_count,
            completed_count,
            failed_count,
            cancelled_count,
            status,
            health,
        }
    }
}
