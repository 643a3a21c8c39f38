//! # Mock Ledger
//!
//! Journals every call and answers with synthetic receipts. Reads are served
//! from the last committed entity of each id. Status writes to a known entity
//! follow the same lifecycle rules as a real backend. Used by subsystem unit
//! tests, which can also pause one write to stage a race.

use crate::entities::{
    AnonymousComponentRecord, ChallengeStatus, ComponentRules, IdentityDigest, LctRecord,
    LctStatus,
    PairingAuthorization, PairingChallenge, PairingRequest, RequestStatus, RevocationEvent,
    TensorStatus, TrustTensor,
};
use crate::errors::{EntityKind, RejectCode, TransportError};
use crate::ids::{ChallengeId, LctId, RequestId, TensorId, TxHash};
use crate::ledger::{
    check_status_update, Capabilities, Committed, LedgerCall, LedgerTransport, RevokePairing,
    ScoreUpdate, StatusChange, TransportKind, TxReceipt, TxResult,
};
use crate::stream::StatusStream;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Where a paused write stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PausePoint {
    /// Before the write touches the mock's state.
    BeforeApply,
    /// After the write is applied, before the caller gets its receipt.
    AfterApply,
}

/// Control over one paused write.
#[derive(Clone, Default)]
pub struct PauseHandle {
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl PauseHandle {
    /// Wait until the paused write arrives.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the paused write continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

struct Pause {
    op: &'static str,
    status: String,
    point: PausePoint,
    handle: PauseHandle,
}

/// In-memory stand-in for a ledger backend.
#[derive(Default)]
pub struct MockLedger {
    height: AtomicU64,
    offline: AtomicBool,
    calls: RwLock<Vec<&'static str>>,
    refused_components: RwLock<HashSet<String>>,
    challenges: RwLock<HashMap<ChallengeId, PairingChallenge>>,
    lcts: RwLock<HashMap<LctId, LctRecord>>,
    requests: RwLock<HashMap<RequestId, PairingRequest>>,
    tensors: RwLock<HashMap<TensorId, TrustTensor>>,
    components: RwLock<HashMap<IdentityDigest, AnonymousComponentRecord>>,
    rules: RwLock<HashMap<IdentityDigest, ComponentRules>>,
    pause: Mutex<Option<Pause>>,
}

impl MockLedger {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Unreachable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Refuse pairing challenges involving `component_id`.
    pub fn refuse_component(&self, component_id: &str) {
        self.refused_components
            .write()
            .insert(component_id.to_string());
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.read().clone()
    }

    /// Number of calls to `op`.
    pub fn call_count(&self, op: &str) -> usize {
        self.calls.read().iter().filter(|c| **c == op).count()
    }

    /// Hold the next `op` write that sets `status` at `point` until the
    /// returned handle releases it. Fires once.
    pub fn pause_next(
        &self,
        op: &'static str,
        status: impl fmt::Display,
        point: PausePoint,
    ) -> PauseHandle {
        let handle = PauseHandle::default();
        *self.pause.lock() = Some(Pause {
            op,
            status: status.to_string(),
            point,
            handle: handle.clone(),
        });
        handle
    }

    async fn pause_at(&self, op: &str, status: impl fmt::Display, point: PausePoint) {
        let status = status.to_string();
        let handle = {
            let mut pause = self.pause.lock();
            match pause.as_ref() {
                Some(p) if p.op == op && p.status == status && p.point == point => {
                    pause.take().map(|p| p.handle)
                }
                _ => None,
            }
        };
        if let Some(handle) = handle {
            handle.reached.notify_one();
            handle.release.notified().await;
        }
    }

    fn begin(&self, op: &'static str) -> Result<(), TransportError> {
        self.calls.write().push(op);
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("mock ledger offline".into()));
        }
        Ok(())
    }

    fn commit<T>(&self, entity: T, status: impl ToString, context: String) -> Committed<T> {
        let height = self.height.fetch_add(1, Ordering::SeqCst) + 1;
        Committed {
            entity,
            receipt: TxReceipt {
                tx_hash: TxHash::new(format!("0x{height:064x}")),
                height,
                status: status.to_string(),
                context,
                timestamp: 0,
            },
        }
    }

    fn read<K, V>(
        map: &RwLock<HashMap<K, V>>,
        kind: EntityKind,
        id: &K,
    ) -> Result<V, TransportError>
    where
        K: std::hash::Hash + Eq + std::fmt::Display,
        V: Clone,
    {
        map.read()
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::not_found(kind, id))
    }
}

#[async_trait]
impl LedgerTransport for MockLedger {
    fn kind(&self) -> TransportKind {
        TransportKind::InProcess
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            kind: TransportKind::InProcess,
            push_updates: false,
            backend_version: "mock".into(),
        }
    }

    async fn register_anonymous_component(
        &self,
        call: LedgerCall<AnonymousComponentRecord>,
    ) -> TxResult<AnonymousComponentRecord> {
        self.begin("register_anonymous_component")?;
        self.components
            .write()
            .insert(call.payload.component_hash.clone(), call.payload.clone());
        Ok(self.commit(call.payload, "registered", call.context))
    }

    async fn revoke_anonymous_component(
        &self,
        call: LedgerCall<RevocationEvent>,
    ) -> TxResult<RevocationEvent> {
        self.begin("revoke_anonymous_component")?;
        self.components.write().remove(&call.payload.target_hash);
        self.rules.write().remove(&call.payload.target_hash);
        Ok(self.commit(call.payload, "revoked", call.context))
    }

    async fn authorize_anonymous_pairing(
        &self,
        call: LedgerCall<PairingAuthorization>,
    ) -> TxResult<PairingAuthorization> {
        self.begin("authorize_anonymous_pairing")?;
        let status = "active";
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn get_anonymous_component(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<AnonymousComponentRecord, TransportError> {
        self.begin("get_anonymous_component")?;
        Self::read(&self.components, EntityKind::Component, component_hash)
    }

    async fn set_component_rules(
        &self,
        call: LedgerCall<ComponentRules>,
    ) -> TxResult<ComponentRules> {
        self.begin("set_component_rules")?;
        let hash = &call.payload.component_hash;
        if !self.components.read().contains_key(hash) {
            return Err(TransportError::not_found(EntityKind::Component, hash));
        }
        self.rules.write().insert(hash.clone(), call.payload.clone());
        Ok(self.commit(call.payload, "active", call.context))
    }

    async fn get_component_rules(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<ComponentRules, TransportError> {
        self.begin("get_component_rules")?;
        Self::read(&self.rules, EntityKind::Authorization, component_hash)
    }

    async fn initiate_pairing(
        &self,
        call: LedgerCall<PairingChallenge>,
    ) -> TxResult<PairingChallenge> {
        self.begin("initiate_pairing")?;
        {
            let refused = self.refused_components.read();
            if refused.contains(call.payload.component_a.id())
                || refused.contains(call.payload.component_b.id())
            {
                return Err(TransportError::Rejected {
                    code: RejectCode::Forbidden,
                    message: "component refused by ledger".into(),
                });
            }
        }
        self.challenges
            .write()
            .insert(call.payload.challenge_id.clone(), call.payload.clone());
        let status = call.payload.status;
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn update_challenge_status(
        &self,
        call: LedgerCall<StatusChange<ChallengeStatus>>,
    ) -> TxResult<StatusChange<ChallengeStatus>> {
        self.begin("update_challenge_status")?;
        let status = call.payload.status;
        if status == ChallengeStatus::Completed {
            return Err(TransportError::Rejected {
                code: RejectCode::InvalidRequest,
                message: "challenges complete through complete_pairing".into(),
            });
        }
        if let Some(c) = self
            .challenges
            .write()
            .get_mut(&ChallengeId::new(call.payload.id.clone()))
        {
            check_status_update(EntityKind::Challenge, &call.payload.id, c.status, status)?;
            c.status = status;
        }
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn get_challenge(&self, id: &ChallengeId) -> Result<PairingChallenge, TransportError> {
        self.begin("get_challenge")?;
        Self::read(&self.challenges, EntityKind::Challenge, id)
    }

    async fn complete_pairing(&self, call: LedgerCall<LctRecord>) -> TxResult<LctRecord> {
        self.begin("complete_pairing")?;
        if let Some(c) = self.challenges.write().get_mut(&call.payload.challenge_id) {
            if c.status != ChallengeStatus::AwaitingAuth {
                return Err(TransportError::conflict(format!(
                    "challenge {} is {}, cannot complete",
                    c.challenge_id, c.status
                )));
            }
            c.status = ChallengeStatus::Completed;
        }
        self.lcts
            .write()
            .insert(call.payload.lct_id.clone(), call.payload.clone());
        let status = call.payload.status;
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn update_lct_status(
        &self,
        call: LedgerCall<StatusChange<LctStatus>>,
    ) -> TxResult<StatusChange<LctStatus>> {
        self.begin("update_lct_status")?;
        let status = call.payload.status;
        if let Some(l) = self
            .lcts
            .write()
            .get_mut(&LctId::new(call.payload.id.clone()))
        {
            check_status_update(EntityKind::Lct, &call.payload.id, l.status, status)?;
            l.status = status;
        }
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn revoke_pairing(&self, call: LedgerCall<RevokePairing>) -> TxResult<RevokePairing> {
        self.begin("revoke_pairing")?;
        if let Some(l) = self.lcts.write().get_mut(&call.payload.lct_id) {
            check_status_update(
                EntityKind::Lct,
                call.payload.lct_id.as_str(),
                l.status,
                LctStatus::Terminated,
            )?;
            l.status = LctStatus::Terminated;
        }
        Ok(self.commit(call.payload, LctStatus::Terminated, call.context))
    }

    async fn get_lct(&self, id: &LctId) -> Result<LctRecord, TransportError> {
        self.begin("get_lct")?;
        Self::read(&self.lcts, EntityKind::Lct, id)
    }

    async fn list_component_lcts(
        &self,
        component_id: &str,
    ) -> Result<Vec<LctRecord>, TransportError> {
        self.begin("list_component_lcts")?;
        let mut lcts: Vec<LctRecord> = self
            .lcts
            .read()
            .values()
            .filter(|l| l.component_a.id() == component_id || l.component_b.id() == component_id)
            .cloned()
            .collect();
        lcts.sort_by(|x, y| (x.created_at, &x.lct_id).cmp(&(y.created_at, &y.lct_id)));
        Ok(lcts)
    }

    async fn queue_pairing_request(
        &self,
        call: LedgerCall<PairingRequest>,
    ) -> TxResult<PairingRequest> {
        self.begin("queue_pairing_request")?;
        self.requests
            .write()
            .insert(call.payload.request_id.clone(), call.payload.clone());
        let status = call.payload.status;
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn update_request_status(
        &self,
        call: LedgerCall<StatusChange<RequestStatus>>,
    ) -> TxResult<StatusChange<RequestStatus>> {
        self.begin("update_request_status")?;
        let status = call.payload.status;
        self.pause_at("update_request_status", status, PausePoint::BeforeApply)
            .await;
        if let Some(r) = self
            .requests
            .write()
            .get_mut(&RequestId::new(call.payload.id.clone()))
        {
            check_status_update(EntityKind::Request, &call.payload.id, r.status, status)?;
            r.status = status;
        }
        self.pause_at("update_request_status", status, PausePoint::AfterApply)
            .await;
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn get_pairing_request(&self, id: &RequestId) -> Result<PairingRequest, TransportError> {
        self.begin("get_pairing_request")?;
        Self::read(&self.requests, EntityKind::Request, id)
    }

    async fn create_trust_tensor(&self, call: LedgerCall<TrustTensor>) -> TxResult<TrustTensor> {
        self.begin("create_trust_tensor")?;
        self.tensors
            .write()
            .insert(call.payload.tensor_id.clone(), call.payload.clone());
        let status = call.payload.status;
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn update_trust_score(&self, call: LedgerCall<ScoreUpdate>) -> TxResult<ScoreUpdate> {
        self.begin("update_trust_score")?;
        if let Some(t) = self.tensors.write().get_mut(&call.payload.tensor_id) {
            t.score = call.payload.score;
            t.evidence_count = call.payload.evidence_count;
            t.version = call.payload.version;
        }
        Ok(self.commit(call.payload, TensorStatus::Active, call.context))
    }

    async fn update_tensor_status(
        &self,
        call: LedgerCall<StatusChange<TensorStatus>>,
    ) -> TxResult<StatusChange<TensorStatus>> {
        self.begin("update_tensor_status")?;
        let status = call.payload.status;
        if let Some(t) = self
            .tensors
            .write()
            .get_mut(&TensorId::new(call.payload.id.clone()))
        {
            check_status_update(EntityKind::Tensor, &call.payload.id, t.status, status)?;
            t.status = status;
        }
        Ok(self.commit(call.payload, status, call.context))
    }

    async fn get_trust_tensor(&self, id: &TensorId) -> Result<TrustTensor, TransportError> {
        self.begin("get_trust_tensor")?;
        Self::read(&self.tensors, EntityKind::Tensor, id)
    }

    async fn watch_status(
        &self,
        _entity_id: &str,
        _cancel: CancellationToken,
    ) -> Result<StatusStream, TransportError> {
        self.begin("watch_status")?;
        Err(TransportError::Unsupported(
            "mock ledger does not stream".into(),
        ))
    }
}
