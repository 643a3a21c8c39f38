//! # Outbound Ports
//!
//! The handshake depends on these traits only. The node runtime binds them
//! to the queue, trust ledger, heartbeat tracker and notifier.

use crate::domain::OfflineNotice;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    Committed, ComponentRef, ComponentRole, PairingChallenge, PairingError, PairingOutcome,
    PairingRequest, QueueId, RequestId, RequestStatus, TensorId, TensorStatus, TransportError,
    TrustTensor, TxHash, TxReceipt,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reachability of components - outbound port.
#[async_trait]
pub trait LivenessOracle: Send + Sync {
    /// Whether `component` can answer a handshake now.
    async fn is_reachable(&self, component: &ComponentRef) -> bool;
}

/// Deferred pairings - outbound port.
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    /// Queue a pairing until its peer comes back.
    async fn enqueue(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        proxy_id: Option<&str>,
    ) -> Result<Committed<PairingRequest>, PairingError>;
}

/// Trust updates - outbound port.
#[async_trait]
pub trait TrustGateway: Send + Sync {
    /// Apply `outcome` to the pair's tensor, creating it if needed.
    async fn record_outcome(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        outcome: PairingOutcome,
    ) -> Result<TrustTensor, PairingError>;
}

/// Fire-and-forget notices - outbound port.
pub trait NotificationChannel: Send + Sync {
    /// Hand a notice to the channel. Must not block.
    fn notify(&self, notice: OfflineNotice);
}

/// Authorization token check - outbound port.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Whether `token` proves `component` answered `challenge` as `role`.
    async fn verify(
        &self,
        component: &ComponentRef,
        challenge: &PairingChallenge,
        role: ComponentRole,
        token: &str,
    ) -> bool;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Liveness from a fixed set of unreachable ids. Everything else is reachable.
#[derive(Default)]
pub struct StaticLiveness {
    unreachable: Mutex<HashSet<String>>,
}

impl StaticLiveness {
    /// Everything reachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `component_id` unreachable.
    pub fn mark_unreachable(&self, component_id: &str) {
        self.unreachable.lock().insert(component_id.to_string());
    }

    /// Mark `component_id` reachable again.
    pub fn mark_reachable(&self, component_id: &str) {
        self.unreachable.lock().remove(component_id);
    }
}

#[async_trait]
impl LivenessOracle for StaticLiveness {
    async fn is_reachable(&self, component: &ComponentRef) -> bool {
        !self.unreachable.lock().contains(component.id())
    }
}

/// Notifier that keeps every notice.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OfflineNotice>>,
}

impl RecordingNotifier {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices in send order.
    pub fn sent(&self) -> Vec<OfflineNotice> {
        self.sent.lock().clone()
    }
}

impl NotificationChannel for RecordingNotifier {
    fn notify(&self, notice: OfflineNotice) {
        self.sent.lock().push(notice);
    }
}

fn mock_receipt(status: impl ToString, context: &str) -> TxReceipt {
    TxReceipt {
        tx_hash: TxHash::new(format!("0x{}", "0".repeat(64))),
        height: 0,
        status: status.to_string(),
        context: context.to_string(),
        timestamp: 0,
    }
}

/// Queue that records what it was given.
#[derive(Default)]
pub struct MockOfflineQueue {
    queued: Mutex<Vec<PairingRequest>>,
}

impl MockOfflineQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests queued so far.
    pub fn queued(&self) -> Vec<PairingRequest> {
        self.queued.lock().clone()
    }
}

#[async_trait]
impl OfflineQueue for MockOfflineQueue {
    async fn enqueue(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        proxy_id: Option<&str>,
    ) -> Result<Committed<PairingRequest>, PairingError> {
        let queue_id = QueueId::new(proxy_id.unwrap_or(component_b.id()));
        let mut queued = self.queued.lock();
        let request = PairingRequest {
            request_id: RequestId::generate(),
            queue_id,
            component_a: component_a.clone(),
            component_b: component_b.clone(),
            context: context.to_string(),
            proxy_id: proxy_id.map(str::to_string),
            status: RequestStatus::Queued,
            creator: creator.to_string(),
            sequence: queued.len() as u64,
            challenge_id: None,
            failure_reason: None,
            cancel_reason: None,
            created_at: 0,
            updated_at: 0,
        };
        queued.push(request.clone());
        Ok(Committed {
            entity: request,
            receipt: mock_receipt(RequestStatus::Queued, context),
        })
    }
}

/// Trust gateway that records outcomes and answers with a fixed score.
#[derive(Default)]
pub struct MockTrustGateway {
    outcomes: Mutex<Vec<PairingOutcome>>,
    failing: AtomicBool,
}

impl MockTrustGateway {
    /// Gateway that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every update fail with `Unreachable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Outcomes recorded, in call order.
    pub fn outcomes(&self) -> Vec<PairingOutcome> {
        self.outcomes.lock().clone()
    }
}

#[async_trait]
impl TrustGateway for MockTrustGateway {
    async fn record_outcome(
        &self,
        _creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        outcome: PairingOutcome,
    ) -> Result<TrustTensor, PairingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PairingError::TransportFailure(TransportError::Unreachable(
                "trust ledger offline".into(),
            )));
        }
        let mut outcomes = self.outcomes.lock();
        outcomes.push(outcome);
        Ok(TrustTensor {
            tensor_id: TensorId::new("tensor-mock"),
            component_a: component_a.clone(),
            component_b: component_b.clone(),
            context: context.to_string(),
            score: outcome.target_score(),
            status: TensorStatus::Active,
            evidence_count: outcomes.len() as u64,
            version: outcomes.len() as u64 + 1,
            created_at: 0,
            updated_at: 0,
        })
    }
}
