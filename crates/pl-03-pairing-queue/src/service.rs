//! # Pairing Queue Service
//!
//! One [`QueueSlot`] per queue id. The slot's state mutex is never held
//! across a network call; its drain mutex serialises `process_offline`
//! passes over the same queue.
//!
//! The ledger arbitrates between a cancel and a processing pass: whichever
//! terminal status it accepts first stands, and the loser adopts it. A
//! processed entry is journalled `Processing` before its handshake starts,
//! so a cancel landing mid-flight succeeds and the processor's final write
//! is the one refused.

use crate::domain::queue::QueueState;
use crate::domain::{EnqueueRequest, EntryResult, ProcessReport, QueueConfig, QueueStatus};
use crate::ports::{HandshakeGateway, PairingQueueApi};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use shared_types::{
    ChallengeId, Committed, ComponentRef, EntityKind, LedgerCall, LedgerTransport,
    LifecycleStatus, PairingError, PairingRequest, QueueId, RequestId, RequestStatus,
    StatusChange, SystemTimeSource, TimeSource, TransportError, TxReceipt,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn read_error(err: TransportError, id: &RequestId) -> PairingError {
    if err.is_not_found() {
        PairingError::not_found(EntityKind::Request, id)
    } else {
        PairingError::TransportFailure(err)
    }
}

#[derive(Default)]
struct QueueSlot {
    state: Mutex<QueueState>,
    drain: tokio::sync::Mutex<()>,
}

/// Offline pairing queue backed by a [`LedgerTransport`].
pub struct PairingQueueService {
    ledger: Arc<dyn LedgerTransport>,
    clock: Arc<dyn TimeSource>,
    config: QueueConfig,
    queues: DashMap<QueueId, Arc<QueueSlot>>,
    index: DashMap<RequestId, QueueId>,
}

impl PairingQueueService {
    /// Create a queue service on the system clock.
    pub fn new(ledger: Arc<dyn LedgerTransport>, config: QueueConfig) -> Result<Self, PairingError> {
        Self::with_clock(ledger, config, Arc::new(SystemTimeSource))
    }

    /// Create a queue service with an explicit clock.
    pub fn with_clock(
        ledger: Arc<dyn LedgerTransport>,
        config: QueueConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, PairingError> {
        config.validate()?;
        Ok(Self {
            ledger,
            clock,
            config,
            queues: DashMap::new(),
            index: DashMap::new(),
        })
    }

    /// Ids of every known queue.
    pub fn queue_ids(&self) -> Vec<QueueId> {
        self.queues.iter().map(|e| e.key().clone()).collect()
    }

    /// Ids of queues with at least one `Queued` entry.
    pub fn pending_queue_ids(&self) -> Vec<QueueId> {
        self.queues
            .iter()
            .filter(|e| !e.value().state.lock().queued_ids().is_empty())
            .map(|e| e.key().clone())
            .collect()
    }

    fn slot(&self, queue_id: &QueueId) -> Result<Arc<QueueSlot>, PairingError> {
        self.queues
            .get(queue_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| PairingError::not_found(EntityKind::Queue, queue_id))
    }

    fn slot_for_request(&self, id: &RequestId) -> Result<Arc<QueueSlot>, PairingError> {
        let queue_id = self
            .index
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| PairingError::not_found(EntityKind::Request, id))?;
        self.slot(&queue_id)
    }

    fn validate(creator: &str, request: &EnqueueRequest) -> Result<(), PairingError> {
        if creator.trim().is_empty() {
            return Err(PairingError::invalid_input("creator", "creator is empty"));
        }
        ComponentRef::validate_pair(&request.component_a, &request.component_b)?;
        if request.context.trim().is_empty() {
            return Err(PairingError::invalid_input("context", "context is empty"));
        }
        if let Some(proxy) = &request.proxy_id {
            if proxy.trim().is_empty() {
                return Err(PairingError::invalid_input("proxy_id", "proxy id is empty"));
            }
        }
        Ok(())
    }

    /// Drop finished entries past the retention limit from the slot and index.
    fn prune(&self, slot: &QueueSlot) {
        let removed = slot
            .state
            .lock()
            .prune_finished(self.config.retained_finished_per_queue);
        for id in &removed {
            self.index.remove(id);
        }
        if !removed.is_empty() {
            debug!("[pl-03] Pruned {} finished entries", removed.len());
        }
    }

    /// Cancel an entry this node does not hold, straight on the ledger.
    async fn cancel_remote(
        &self,
        creator: &str,
        request_id: &RequestId,
        reason: Option<String>,
    ) -> Result<Committed<PairingRequest>, PairingError> {
        let mut entry = self
            .ledger
            .get_pairing_request(request_id)
            .await
            .map_err(|e| read_error(e, request_id))?;
        if !entry.status.can_transition_to(RequestStatus::Cancelled) {
            return Err(PairingError::invalid_state(
                EntityKind::Request,
                request_id,
                entry.status,
                "cancel",
            ));
        }
        let receipt = self
            .journal(
                creator,
                &entry.context,
                request_id,
                RequestStatus::Cancelled,
                reason.clone(),
            )
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    PairingError::invalid_state(
                        EntityKind::Request,
                        request_id,
                        "finished",
                        "cancel",
                    )
                } else {
                    e.into()
                }
            })?;
        entry.transition_to(RequestStatus::Cancelled, self.clock.now())?;
        entry.cancel_reason = reason;
        info!("[pl-03] Cancelled {} on the ledger", request_id);
        Ok(Committed {
            entity: entry,
            receipt,
        })
    }

    /// Write a status to the ledger, which decides between racing writers.
    async fn journal(
        &self,
        creator: &str,
        context: &str,
        id: &RequestId,
        status: RequestStatus,
        reason: Option<String>,
    ) -> Result<TxReceipt, TransportError> {
        let change = StatusChange::new(id, status, reason);
        self.ledger
            .update_request_status(LedgerCall::new(creator, context, change))
            .await
            .map(|committed| committed.receipt)
    }

    /// Take the ledger's version of an entry after it refused a write.
    async fn resync(&self, slot: &QueueSlot, id: &RequestId) -> Option<RequestStatus> {
        let remote = match self.ledger.get_pairing_request(id).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("[pl-03] Could not reload {}: {}", id, e);
                return None;
            }
        };
        let status = remote.status;
        let mut state = slot.state.lock();
        if let Some(entry) = state.get_mut(id) {
            entry.status = remote.status;
            entry.updated_at = remote.updated_at;
            entry.challenge_id = remote.challenge_id.or(entry.challenge_id.take());
            entry.failure_reason = remote.failure_reason.or(entry.failure_reason.take());
            entry.cancel_reason = remote.cancel_reason.or(entry.cancel_reason.take());
        }
        Some(status)
    }

    /// Apply the final status once the ledger has accepted it.
    fn commit_result(
        &self,
        slot: &QueueSlot,
        id: &RequestId,
        result: &Result<ChallengeId, String>,
    ) -> Result<EntryResult, PairingError> {
        let now = self.clock.now();
        let mut state = slot.state.lock();
        let entry = state
            .get_mut(id)
            .ok_or_else(|| PairingError::not_found(EntityKind::Request, id))?;
        let target = match result {
            Ok(_) => RequestStatus::Completed,
            Err(_) => RequestStatus::Failed,
        };
        if entry.status != target {
            entry.transition_to(target, now)?;
        }
        match result {
            Ok(challenge_id) => {
                entry.challenge_id = Some(challenge_id.clone());
                Ok(EntryResult::Completed {
                    challenge_id: challenge_id.clone(),
                })
            }
            Err(reason) => {
                entry.failure_reason = Some(reason.clone());
                Ok(EntryResult::Failed {
                    reason: reason.clone(),
                })
            }
        }
    }

    /// Fail an entry locally when the ledger could not be reached.
    fn fail_locally(&self, slot: &QueueSlot, id: &RequestId, reason: String) -> EntryResult {
        let mut state = slot.state.lock();
        if let Some(entry) = state.get_mut(id) {
            if entry.status.can_transition_to(RequestStatus::Failed) {
                entry.status = RequestStatus::Failed;
                entry.updated_at = self.clock.now();
                entry.failure_reason = Some(reason.clone());
            }
        }
        EntryResult::Failed { reason }
    }

    /// Withdraw a challenge the entry will not keep.
    async fn abandon(
        &self,
        processor: &str,
        handshake: &dyn HandshakeGateway,
        id: &RequestId,
        started: &Result<ChallengeId, String>,
    ) {
        let Ok(challenge_id) = started else {
            return;
        };
        let reason = format!("queue entry {id} did not keep its challenge");
        if let Err(e) = handshake.abandon(processor, challenge_id, &reason).await {
            warn!(
                "[pl-03] Challenge {} of {} left open: {}",
                challenge_id, id, e
            );
        }
    }

    async fn process_entry(
        &self,
        processor: &str,
        context: &str,
        slot: &QueueSlot,
        id: &RequestId,
        handshake: &dyn HandshakeGateway,
    ) -> Result<Option<EntryResult>, PairingError> {
        // 1. Claim the entry locally, then on the ledger.
        let request = {
            let mut state = slot.state.lock();
            let Some(entry) = state.get_mut(id) else {
                return Ok(None);
            };
            if entry.status != RequestStatus::Queued {
                // Cancelled before its turn.
                return Ok(None);
            }
            entry.transition_to(RequestStatus::Processing, self.clock.now())?;
            entry.clone()
        };
        match self
            .journal(processor, context, id, RequestStatus::Processing, None)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {
                // Cancelled elsewhere before the claim reached the ledger.
                return Ok(Some(match self.resync(slot, id).await {
                    Some(status) => {
                        debug!("[pl-03] Claim of {} refused, entry is {}", id, status);
                        EntryResult::Aborted
                    }
                    None => self.fail_locally(slot, id, format!("claim refused: {e}")),
                }));
            }
            Err(e) => {
                warn!("[pl-03] Claim of {} not journalled: {}", id, e);
                return Ok(Some(self.fail_locally(
                    slot,
                    id,
                    format!("journal write failed: {e}"),
                )));
            }
        }

        // 2. Start the handshake without holding the lock.
        let started = handshake
            .initiate_immediate(processor, &request)
            .await
            .map_err(|e| e.to_string());

        // 3. A cancel that already won on the ledger wins here too.
        let cancelled = slot
            .state
            .lock()
            .get(id)
            .is_some_and(|e| e.status == RequestStatus::Cancelled);
        if cancelled {
            self.abandon(processor, handshake, id, &started).await;
            return Ok(Some(EntryResult::Aborted));
        }

        // 4. Journal the final status; the ledger refuses it after a cancel.
        let (status, reason) = match &started {
            Ok(challenge_id) => (RequestStatus::Completed, Some(challenge_id.to_string())),
            Err(reason) => (RequestStatus::Failed, Some(reason.clone())),
        };
        match self.journal(processor, context, id, status, reason).await {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {
                let remote = self.resync(slot, id).await;
                self.abandon(processor, handshake, id, &started).await;
                if remote != Some(RequestStatus::Cancelled) {
                    warn!("[pl-03] Final status of {} refused, entry is {:?}", id, remote);
                }
                return Ok(Some(EntryResult::Aborted));
            }
            Err(e) => {
                warn!("[pl-03] Final status of {} not journalled: {}", id, e);
                self.abandon(processor, handshake, id, &started).await;
                return Ok(Some(self.fail_locally(
                    slot,
                    id,
                    format!("journal write failed: {e}"),
                )));
            }
        }

        // 5. Commit what the ledger accepted.
        self.commit_result(slot, id, &started).map(Some)
    }
}

#[async_trait]
impl PairingQueueApi for PairingQueueService {
    async fn enqueue(
        &self,
        creator: &str,
        request: EnqueueRequest,
    ) -> Result<Committed<PairingRequest>, PairingError> {
        Self::validate(creator, &request)?;
        let queue_id = request.queue_id();

        let slot = self
            .queues
            .entry(queue_id.clone())
            .or_default()
            .value()
            .clone();
        let sequence = {
            let mut state = slot.state.lock();
            if state.live_len() >= self.config.max_entries_per_queue {
                return Err(PairingError::invalid_state(
                    EntityKind::Queue,
                    &queue_id,
                    "full",
                    "enqueue",
                ));
            }
            state.reserve_sequence()
        };

        let now = self.clock.now();
        let entry = PairingRequest {
            request_id: RequestId::generate(),
            queue_id: queue_id.clone(),
            component_a: request.component_a,
            component_b: request.component_b,
            context: request.context.clone(),
            proxy_id: request.proxy_id,
            status: RequestStatus::Queued,
            creator: creator.to_string(),
            sequence,
            challenge_id: None,
            failure_reason: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        let call = LedgerCall::new(creator, request.context, entry.clone());
        let written = self.ledger.queue_pairing_request(call).await;
        let committed = {
            let mut state = slot.state.lock();
            state.release();
            let committed = written?;
            state.insert(entry.clone());
            committed
        };
        self.index.insert(entry.request_id.clone(), queue_id.clone());
        info!(
            "[pl-03] Queued {} ({} -> {}) in {} at #{}",
            entry.request_id, entry.component_a, entry.component_b, queue_id, sequence
        );
        Ok(Committed {
            entity: entry,
            receipt: committed.receipt,
        })
    }

    async fn status(&self, queue_id: &QueueId) -> Result<QueueStatus, PairingError> {
        let slot = self.slot(queue_id)?;
        let state = slot.state.lock();
        Ok(state.status(queue_id, &self.config))
    }

    async fn list_requests(&self, queue_id: &QueueId) -> Result<Vec<PairingRequest>, PairingError> {
        let slot = self.slot(queue_id)?;
        let state = slot.state.lock();
        Ok(state.entries().to_vec())
    }

    async fn list_by_proxy(&self, proxy_id: &str) -> Result<Vec<PairingRequest>, PairingError> {
        let Ok(slot) = self.slot(&QueueId::new(proxy_id)) else {
            return Ok(Vec::new());
        };
        let state = slot.state.lock();
        Ok(state
            .entries()
            .iter()
            .filter(|e| e.proxy_id.as_deref() == Some(proxy_id))
            .cloned()
            .collect())
    }

    async fn get_request(&self, request_id: &RequestId) -> Result<PairingRequest, PairingError> {
        let local = self
            .slot_for_request(request_id)
            .ok()
            .and_then(|slot| slot.state.lock().get(request_id).cloned());
        match local {
            Some(entry) => Ok(entry),
            // Pruned here, or queued by another node.
            None => self
                .ledger
                .get_pairing_request(request_id)
                .await
                .map_err(|e| read_error(e, request_id)),
        }
    }

    async fn process_offline(
        &self,
        processor: &str,
        queue_id: &QueueId,
        context: &str,
        handshake: &dyn HandshakeGateway,
    ) -> Result<ProcessReport, PairingError> {
        if processor.trim().is_empty() {
            return Err(PairingError::invalid_input("processor", "processor is empty"));
        }
        let slot = self.slot(queue_id)?;
        let _drain = slot.drain.lock().await;

        let ids = slot.state.lock().queued_ids();
        debug!("[pl-03] Processing {} entries of {}", ids.len(), queue_id);

        let mut report = ProcessReport::new(queue_id.clone());
        for id in ids {
            if let Some(result) = self
                .process_entry(processor, context, &slot, &id, handshake)
                .await?
            {
                report.push(id, result);
            }
        }
        self.prune(&slot);

        info!(
            "[pl-03] Queue {} processed: {} completed, {} failed, {} aborted",
            queue_id,
            report.completed(),
            report.failed(),
            report.aborted()
        );
        Ok(report)
    }

    async fn cancel(
        &self,
        creator: &str,
        request_id: &RequestId,
        reason: &str,
    ) -> Result<Committed<PairingRequest>, PairingError> {
        if creator.trim().is_empty() {
            return Err(PairingError::invalid_input("creator", "creator is empty"));
        }
        let reason = (!reason.trim().is_empty()).then(|| reason.to_string());
        let Ok(slot) = self.slot_for_request(request_id) else {
            return self.cancel_remote(creator, request_id, reason).await;
        };

        let context = {
            let state = slot.state.lock();
            let entry = state
                .get(request_id)
                .ok_or_else(|| PairingError::not_found(EntityKind::Request, request_id))?;
            if !entry.status.can_transition_to(RequestStatus::Cancelled) {
                return Err(PairingError::invalid_state(
                    EntityKind::Request,
                    request_id,
                    entry.status,
                    "cancel",
                ));
            }
            entry.context.clone()
        };

        // Cancel does not wait on a processing pass; the ledger orders the two.
        let receipt = match self
            .journal(creator, &context, request_id, RequestStatus::Cancelled, reason.clone())
            .await
        {
            Ok(receipt) => receipt,
            Err(e) if e.is_conflict() => {
                let status = match self.resync(&slot, request_id).await {
                    Some(status) => status.to_string(),
                    None => "unknown".to_string(),
                };
                return Err(PairingError::invalid_state(
                    EntityKind::Request,
                    request_id,
                    status,
                    "cancel",
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let cancelled = {
            let mut state = slot.state.lock();
            let entry = state
                .get_mut(request_id)
                .ok_or_else(|| PairingError::not_found(EntityKind::Request, request_id))?;
            if entry.status != RequestStatus::Cancelled {
                entry.transition_to(RequestStatus::Cancelled, self.clock.now())?;
            }
            entry.cancel_reason = reason;
            entry.clone()
        };
        self.prune(&slot);
        info!("[pl-03] Cancelled {}", request_id);
        Ok(Committed {
            entity: cancelled,
            receipt,
        })
    }
}
