//! # In-Memory Ledger
//!
//! The backend both wire protocols are served from. It journals what the
//! pairing core tells it and assigns transaction references. It is also the
//! arbiter between replicas that share it, so it refuses what would corrupt
//! shared state:
//!
//! - ids are unique on create and updates must name an existing record
//! - status updates follow the entity lifecycle; illegal moves are `Conflict`
//! - a challenge completes only through `complete_pairing`, only once, and
//!   only from `awaiting_auth`
//! - trust scores lie in `[0, 1]` and only active tensors are rescored
//!
//! Every commit bumps the height and publishes a [`StatusUpdate`] to the
//! broadcast channel that status subscriptions read from.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use shared_types::stream::DEFAULT_STREAM_CAPACITY;
use shared_types::{
    AnonymousComponentRecord, AuthorizationId, Capabilities, ChallengeId, ChallengeStatus,
    Committed, ComponentRules, EntityKind, IdentityDigest, LctId, LctRecord, LctStatus, LedgerCall,
    LedgerTransport, PairingAuthorization, PairingChallenge, PairingRequest, RejectCode, RequestId,
    check_status_update, RequestStatus, RevocationEvent, RevokePairing, ScoreUpdate,
    StatusChange, StatusStream,
    StatusUpdate, SystemTimeSource, TensorId, TensorStatus, TimeSource, TransportError,
    TransportKind, TrustTensor, TxHash, TxReceipt, TxResult,
};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Ledger state held in memory.
pub struct InMemoryLedger {
    backend_version: String,
    height: AtomicU64,
    available: AtomicBool,
    clock: Arc<dyn TimeSource>,
    updates: broadcast::Sender<StatusUpdate>,
    statuses: DashMap<String, StatusUpdate>,
    components: DashMap<IdentityDigest, AnonymousComponentRecord>,
    revocations: DashMap<IdentityDigest, RevocationEvent>,
    authorizations: DashMap<AuthorizationId, PairingAuthorization>,
    rules: DashMap<IdentityDigest, ComponentRules>,
    challenges: DashMap<ChallengeId, PairingChallenge>,
    lcts: DashMap<LctId, LctRecord>,
    requests: DashMap<RequestId, PairingRequest>,
    tensors: DashMap<TensorId, TrustTensor>,
}

impl InMemoryLedger {
    /// Empty ledger on the wall clock.
    pub fn new(backend_version: impl Into<String>, broadcast_capacity: usize) -> Self {
        Self::with_clock(
            backend_version,
            broadcast_capacity,
            Arc::new(SystemTimeSource),
        )
    }

    /// Empty ledger on an injected clock.
    pub fn with_clock(
        backend_version: impl Into<String>,
        broadcast_capacity: usize,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let (updates, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            backend_version: backend_version.into(),
            height: AtomicU64::new(0),
            available: AtomicBool::new(true),
            clock,
            updates,
            statuses: DashMap::new(),
            components: DashMap::new(),
            revocations: DashMap::new(),
            authorizations: DashMap::new(),
            rules: DashMap::new(),
            challenges: DashMap::new(),
            lcts: DashMap::new(),
            requests: DashMap::new(),
            tensors: DashMap::new(),
        }
    }

    /// Version reported to clients.
    pub fn backend_version(&self) -> &str {
        &self.backend_version
    }

    /// Height of the last committed transaction.
    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    /// Simulate an outage: while unavailable every call fails with
    /// `Unreachable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Every future status update.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.updates.subscribe()
    }

    /// Last committed status of an entity.
    pub fn current_status(&self, entity_id: &str) -> Result<StatusUpdate, TransportError> {
        self.ensure_available()?;
        self.statuses
            .get(entity_id)
            .map(|s| s.clone())
            .ok_or_else(|| TransportError::Rejected {
                code: RejectCode::NotFound,
                message: format!("entity {entity_id} not found"),
            })
    }

    fn ensure_available(&self) -> Result<(), TransportError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Unreachable("ledger unavailable".into()))
        }
    }

    fn check_score(score: f64) -> Result<(), TransportError> {
        if (0.0..=1.0).contains(&score) {
            Ok(())
        } else {
            Err(TransportError::Rejected {
                code: RejectCode::InvalidRequest,
                message: format!("trust score {score} outside [0, 1]"),
            })
        }
    }

    fn insert_new<K, V>(
        map: &DashMap<K, V>,
        kind: EntityKind,
        key: K,
        value: V,
    ) -> Result<(), TransportError>
    where
        K: Hash + Eq + fmt::Display,
    {
        match map.entry(key) {
            Entry::Occupied(e) => Err(TransportError::conflict(format!(
                "{kind} {} already exists",
                e.key()
            ))),
            Entry::Vacant(e) => {
                e.insert(value);
                Ok(())
            }
        }
    }

    fn modify<K, V, R>(
        map: &DashMap<K, V>,
        kind: EntityKind,
        key: &K,
        f: impl FnOnce(&mut V) -> Result<R, TransportError>,
    ) -> Result<R, TransportError>
    where
        K: Hash + Eq + fmt::Display,
    {
        match map.get_mut(key) {
            Some(mut entry) => f(entry.value_mut()),
            None => Err(TransportError::not_found(kind, key)),
        }
    }

    fn read<K, V>(map: &DashMap<K, V>, kind: EntityKind, key: &K) -> Result<V, TransportError>
    where
        K: Hash + Eq + fmt::Display,
        V: Clone,
    {
        map.get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::not_found(kind, key))
    }

    /// Assign the next height and publish the entity's new status.
    fn commit<T>(
        &self,
        operation: &str,
        kind: EntityKind,
        entity_id: &str,
        status: impl fmt::Display,
        context: String,
        entity: T,
    ) -> Committed<T> {
        let height = self.height.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = self.clock.now();
        let status = status.to_string();

        let mut hasher = Sha256::new();
        hasher.update(height.to_be_bytes());
        hasher.update(operation.as_bytes());
        hasher.update([0u8]);
        hasher.update(entity_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(status.as_bytes());
        hasher.update([0u8]);
        hasher.update(context.as_bytes());
        let tx_hash = TxHash::new(format!("0x{}", hex::encode(hasher.finalize())));

        let update = StatusUpdate {
            entity_kind: kind,
            entity_id: entity_id.to_string(),
            status: status.clone(),
            tx_hash: Some(tx_hash.clone()),
            timestamp,
        };
        self.statuses.insert(entity_id.to_string(), update.clone());
        // No subscribers is not an error.
        let _ = self.updates.send(update);
        debug!(
            "[pl-06] {} {} -> {} at height {}",
            operation, entity_id, status, height
        );

        Committed {
            entity,
            receipt: TxReceipt {
                tx_hash,
                height,
                status,
                context,
                timestamp,
            },
        }
    }
}

impl fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("backend_version", &self.backend_version)
            .field("height", &self.height())
            .field("challenges", &self.challenges.len())
            .field("lcts", &self.lcts.len())
            .field("requests", &self.requests.len())
            .field("tensors", &self.tensors.len())
            .finish()
    }
}

#[async_trait]
impl LedgerTransport for InMemoryLedger {
    fn kind(&self) -> TransportKind {
        TransportKind::InProcess
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            kind: TransportKind::InProcess,
            push_updates: true,
            backend_version: self.backend_version.clone(),
        }
    }

    async fn register_anonymous_component(
        &self,
        call: LedgerCall<AnonymousComponentRecord>,
    ) -> TxResult<AnonymousComponentRecord> {
        self.ensure_available()?;
        let hash = call.payload.component_hash.clone();
        if self.revocations.contains_key(&hash) {
            return Err(TransportError::conflict(format!(
                "component {hash} is revoked"
            )));
        }
        Self::insert_new(
            &self.components,
            EntityKind::Component,
            hash.clone(),
            call.payload.clone(),
        )?;
        Ok(self.commit(
            "register_anonymous_component",
            EntityKind::Component,
            hash.as_str(),
            "registered",
            call.context,
            call.payload,
        ))
    }

    async fn revoke_anonymous_component(
        &self,
        call: LedgerCall<RevocationEvent>,
    ) -> TxResult<RevocationEvent> {
        self.ensure_available()?;
        let hash = call.payload.target_hash.clone();
        if self.components.remove(&hash).is_none() {
            return Err(TransportError::not_found(EntityKind::Component, &hash));
        }
        self.rules.remove(&hash);
        self.revocations.insert(hash.clone(), call.payload.clone());
        Ok(self.commit(
            "revoke_anonymous_component",
            EntityKind::Component,
            hash.as_str(),
            "revoked",
            call.context,
            call.payload,
        ))
    }

    async fn authorize_anonymous_pairing(
        &self,
        call: LedgerCall<PairingAuthorization>,
    ) -> TxResult<PairingAuthorization> {
        self.ensure_available()?;
        for hash in [&call.payload.component_hash_a, &call.payload.component_hash_b] {
            if !self.components.contains_key(hash) {
                return Err(TransportError::not_found(EntityKind::Component, hash));
            }
        }
        let id = call.payload.auth_id.clone();
        Self::insert_new(
            &self.authorizations,
            EntityKind::Authorization,
            id.clone(),
            call.payload.clone(),
        )?;
        Ok(self.commit(
            "authorize_anonymous_pairing",
            EntityKind::Authorization,
            id.as_str(),
            "active",
            call.context,
            call.payload,
        ))
    }

    async fn get_anonymous_component(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<AnonymousComponentRecord, TransportError> {
        self.ensure_available()?;
        Self::read(&self.components, EntityKind::Component, component_hash)
    }

    async fn set_component_rules(
        &self,
        call: LedgerCall<ComponentRules>,
    ) -> TxResult<ComponentRules> {
        self.ensure_available()?;
        let hash = call.payload.component_hash.clone();
        if !self.components.contains_key(&hash) {
            return Err(TransportError::not_found(EntityKind::Component, &hash));
        }
        self.rules.insert(hash.clone(), call.payload.clone());
        Ok(self.commit(
            "set_component_rules",
            EntityKind::Authorization,
            &format!("rules-{hash}"),
            "active",
            call.context,
            call.payload,
        ))
    }

    async fn get_component_rules(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<ComponentRules, TransportError> {
        self.ensure_available()?;
        Self::read(&self.rules, EntityKind::Authorization, component_hash)
    }

    async fn initiate_pairing(
        &self,
        call: LedgerCall<PairingChallenge>,
    ) -> TxResult<PairingChallenge> {
        self.ensure_available()?;
        let id = call.payload.challenge_id.clone();
        let status = call.payload.status;
        Self::insert_new(
            &self.challenges,
            EntityKind::Challenge,
            id.clone(),
            call.payload.clone(),
        )?;
        Ok(self.commit(
            "initiate_pairing",
            EntityKind::Challenge,
            id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn update_challenge_status(
        &self,
        call: LedgerCall<StatusChange<ChallengeStatus>>,
    ) -> TxResult<StatusChange<ChallengeStatus>> {
        self.ensure_available()?;
        let id = ChallengeId::new(call.payload.id.clone());
        let status = call.payload.status;
        if status == ChallengeStatus::Completed {
            return Err(TransportError::Rejected {
                code: RejectCode::InvalidRequest,
                message: "challenges complete through complete_pairing".into(),
            });
        }
        Self::modify(&self.challenges, EntityKind::Challenge, &id, |c| {
            check_status_update(EntityKind::Challenge, id.as_str(), c.status, status)?;
            c.status = status;
            Ok(())
        })?;
        Ok(self.commit(
            "update_challenge_status",
            EntityKind::Challenge,
            id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn get_challenge(&self, id: &ChallengeId) -> Result<PairingChallenge, TransportError> {
        self.ensure_available()?;
        Self::read(&self.challenges, EntityKind::Challenge, id)
    }

    async fn complete_pairing(&self, call: LedgerCall<LctRecord>) -> TxResult<LctRecord> {
        self.ensure_available()?;
        let challenge_id = call.payload.challenge_id.clone();
        let id = call.payload.lct_id.clone();
        let status = call.payload.status;
        if status != LctStatus::Active {
            return Err(TransportError::Rejected {
                code: RejectCode::InvalidRequest,
                message: format!("lct {id} must be minted active"),
            });
        }
        // The challenge guard is held until the LCT is stored, so concurrent
        // completions of one challenge serialize here and only one wins.
        Self::modify(&self.challenges, EntityKind::Challenge, &challenge_id, |c| {
            if c.status != ChallengeStatus::AwaitingAuth {
                return Err(TransportError::conflict(format!(
                    "challenge {challenge_id} is {}, cannot complete",
                    c.status
                )));
            }
            if c.component_a != call.payload.component_a
                || c.component_b != call.payload.component_b
            {
                return Err(TransportError::Rejected {
                    code: RejectCode::InvalidRequest,
                    message: format!("lct {id} does not pair the components of {challenge_id}"),
                });
            }
            Self::insert_new(&self.lcts, EntityKind::Lct, id.clone(), call.payload.clone())?;
            c.status = ChallengeStatus::Completed;
            Ok(())
        })?;
        self.commit(
            "complete_pairing",
            EntityKind::Challenge,
            challenge_id.as_str(),
            ChallengeStatus::Completed,
            call.context.clone(),
            (),
        );
        Ok(self.commit(
            "complete_pairing",
            EntityKind::Lct,
            id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn update_lct_status(
        &self,
        call: LedgerCall<StatusChange<LctStatus>>,
    ) -> TxResult<StatusChange<LctStatus>> {
        self.ensure_available()?;
        let id = LctId::new(call.payload.id.clone());
        let status = call.payload.status;
        let now = self.clock.now();
        Self::modify(&self.lcts, EntityKind::Lct, &id, |lct| {
            check_status_update(EntityKind::Lct, id.as_str(), lct.status, status)?;
            lct.status = status;
            lct.updated_at = now;
            Ok(())
        })?;
        Ok(self.commit(
            "update_lct_status",
            EntityKind::Lct,
            id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn revoke_pairing(&self, call: LedgerCall<RevokePairing>) -> TxResult<RevokePairing> {
        self.ensure_available()?;
        let id = call.payload.lct_id.clone();
        let now = self.clock.now();
        Self::modify(&self.lcts, EntityKind::Lct, &id, |lct| {
            check_status_update(
                EntityKind::Lct,
                id.as_str(),
                lct.status,
                LctStatus::Terminated,
            )?;
            lct.status = LctStatus::Terminated;
            lct.updated_at = now;
            Ok(())
        })?;
        Ok(self.commit(
            "revoke_pairing",
            EntityKind::Lct,
            id.as_str(),
            LctStatus::Terminated,
            call.context,
            call.payload,
        ))
    }

    async fn get_lct(&self, id: &LctId) -> Result<LctRecord, TransportError> {
        self.ensure_available()?;
        Self::read(&self.lcts, EntityKind::Lct, id)
    }

    async fn list_component_lcts(
        &self,
        component_id: &str,
    ) -> Result<Vec<LctRecord>, TransportError> {
        self.ensure_available()?;
        let mut lcts: Vec<LctRecord> = self
            .lcts
            .iter()
            .filter(|e| {
                e.component_a.id() == component_id || e.component_b.id() == component_id
            })
            .map(|e| e.value().clone())
            .collect();
        lcts.sort_by(|x, y| (x.created_at, &x.lct_id).cmp(&(y.created_at, &y.lct_id)));
        Ok(lcts)
    }

    async fn queue_pairing_request(
        &self,
        call: LedgerCall<PairingRequest>,
    ) -> TxResult<PairingRequest> {
        self.ensure_available()?;
        let id = call.payload.request_id.clone();
        let status = call.payload.status;
        Self::insert_new(
            &self.requests,
            EntityKind::Request,
            id.clone(),
            call.payload.clone(),
        )?;
        Ok(self.commit(
            "queue_pairing_request",
            EntityKind::Request,
            id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn update_request_status(
        &self,
        call: LedgerCall<StatusChange<RequestStatus>>,
    ) -> TxResult<StatusChange<RequestStatus>> {
        self.ensure_available()?;
        let id = RequestId::new(call.payload.id.clone());
        let status = call.payload.status;
        let reason = call.payload.reason.clone();
        let now = self.clock.now();
        Self::modify(&self.requests, EntityKind::Request, &id, |request| {
            check_status_update(EntityKind::Request, id.as_str(), request.status, status)?;
            request.status = status;
            request.updated_at = now;
            match status {
                RequestStatus::Failed => request.failure_reason = reason,
                RequestStatus::Cancelled => request.cancel_reason = reason,
                _ => {}
            }
            Ok(())
        })?;
        Ok(self.commit(
            "update_request_status",
            EntityKind::Request,
            id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn get_pairing_request(&self, id: &RequestId) -> Result<PairingRequest, TransportError> {
        self.ensure_available()?;
        Self::read(&self.requests, EntityKind::Request, id)
    }

    async fn create_trust_tensor(&self, call: LedgerCall<TrustTensor>) -> TxResult<TrustTensor> {
        self.ensure_available()?;
        Self::check_score(call.payload.score)?;
        let id = call.payload.tensor_id.clone();
        let status = call.payload.status;
        Self::insert_new(&self.tensors, EntityKind::Tensor, id.clone(), call.payload.clone())?;
        Ok(self.commit(
            "create_trust_tensor",
            EntityKind::Tensor,
            id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn update_trust_score(&self, call: LedgerCall<ScoreUpdate>) -> TxResult<ScoreUpdate> {
        self.ensure_available()?;
        Self::check_score(call.payload.score)?;
        let update = call.payload.clone();
        let now = self.clock.now();
        let status = Self::modify(&self.tensors, EntityKind::Tensor, &update.tensor_id, |t| {
            if t.status != TensorStatus::Active {
                return Err(TransportError::conflict(format!(
                    "tensor {} is {}, cannot be rescored",
                    update.tensor_id, t.status
                )));
            }
            t.score = update.score;
            t.evidence_count = update.evidence_count;
            t.version = update.version;
            t.updated_at = now;
            Ok(t.status)
        })?;
        Ok(self.commit(
            "update_trust_score",
            EntityKind::Tensor,
            update.tensor_id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn update_tensor_status(
        &self,
        call: LedgerCall<StatusChange<TensorStatus>>,
    ) -> TxResult<StatusChange<TensorStatus>> {
        self.ensure_available()?;
        let id = TensorId::new(call.payload.id.clone());
        let status = call.payload.status;
        let now = self.clock.now();
        Self::modify(&self.tensors, EntityKind::Tensor, &id, |t| {
            check_status_update(EntityKind::Tensor, id.as_str(), t.status, status)?;
            t.status = status;
            t.updated_at = now;
            Ok(())
        })?;
        Ok(self.commit(
            "update_tensor_status",
            EntityKind::Tensor,
            id.as_str(),
            status,
            call.context,
            call.payload,
        ))
    }

    async fn get_trust_tensor(&self, id: &TensorId) -> Result<TrustTensor, TransportError> {
        self.ensure_available()?;
        Self::read(&self.tensors, EntityKind::Tensor, id)
    }

    async fn watch_status(
        &self,
        entity_id: &str,
        cancel: CancellationToken,
    ) -> Result<StatusStream, TransportError> {
        self.ensure_available()?;
        // Subscribe before reading the current status so nothing is missed.
        let mut updates = self.subscribe();
        let current = self.statuses.get(entity_id).map(|s| s.clone());
        let (tx, stream) = StatusStream::channel(DEFAULT_STREAM_CAPACITY, cancel);
        let entity_id = entity_id.to_string();

        tokio::spawn(async move {
            if let Some(current) = current {
                if !tx.send(current).await {
                    return;
                }
            }
            loop {
                let received = tokio::select! {
                    biased;
                    _ = tx.cancelled() => break,
                    received = updates.recv() => received,
                };
                match received {
                    Ok(update) if update.entity_id == entity_id => {
                        if !tx.send(update).await {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("[pl-06] Watch on {} lagged by {} updates", entity_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(stream)
    }
}
