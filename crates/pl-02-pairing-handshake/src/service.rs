//! # Pairing Handshake Service
//!
//! Each challenge and LCT lives in its own [`Slot`]. A slot pairs the value
//! with an in-flight marker: a mutation claims the marker, works on a copy,
//! journals it and commits the copy before releasing the marker. A second
//! mutation arriving meanwhile fails with `InvalidState` instead of waiting.
//! The value lock is only taken for snapshots and commits, never across a
//! ledger call.
//!
//! Slots are a cache: replicas sharing one ledger may hold stale copies. The
//! ledger refuses a write that no longer fits the entity's lifecycle with
//! `Conflict`; the slot is then reloaded and the caller gets `InvalidState`
//! against the status the ledger holds.

use crate::algorithms::{generate_nonce, SplitKey};
use crate::domain::{
    AccessDecision, CompleteRequest, HandshakeConfig, InitiateOutcome, InitiateRequest, Lct, NoticeKind,
    OfflineNotice, PairingCompletion, RevokeOutcome,
};
use crate::ports::{
    AuthVerifier, LivenessOracle, NotificationChannel, OfflineQueue, PairingHandshakeApi,
    TrustGateway,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use shared_types::{
    ChallengeId, ChallengeParams, ChallengeStatus, Committed, ComponentRef, ComponentRole,
    EntityKind, LctId, LctRecord, LctStatus, LedgerCall, LedgerTransport, LifecycleStatus,
    PairingChallenge, PairingError, PairingOutcome, RevokePairing, StatusChange, SystemTimeSource,
    TimeSource, TransportError, TxReceipt,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outbound ports the handshake is wired to.
#[derive(Clone)]
pub struct HandshakeDeps {
    /// Ledger journal.
    pub ledger: Arc<dyn LedgerTransport>,
    /// Reachability of components.
    pub liveness: Arc<dyn LivenessOracle>,
    /// Where unreachable pairings go.
    pub queue: Arc<dyn OfflineQueue>,
    /// Trust updates.
    pub trust: Arc<dyn TrustGateway>,
    /// Offline notices.
    pub notifier: Arc<dyn NotificationChannel>,
    /// Token verification.
    pub verifier: Arc<dyn AuthVerifier>,
}

struct Slot<T> {
    value: Mutex<T>,
    in_flight: AtomicBool,
}

impl<T: Clone> Slot<T> {
    fn new(value: T) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            in_flight: AtomicBool::new(false),
        })
    }

    fn snapshot(&self) -> T {
        self.value.lock().clone()
    }

    fn commit(&self, value: T) {
        *self.value.lock() = value;
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                flag: &self.in_flight,
            })
    }
}

/// Clears the in-flight marker when dropped, including on early return.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

type ChallengeSlot = Arc<Slot<PairingChallenge>>;
type LctSlot = Arc<Slot<LctRecord>>;

fn read_error(err: TransportError, kind: EntityKind, id: impl std::fmt::Display) -> PairingError {
    if err.is_not_found() {
        PairingError::not_found(kind, id)
    } else {
        PairingError::TransportFailure(err)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), PairingError> {
    if value.trim().is_empty() {
        return Err(PairingError::invalid_input(field, format!("{field} is empty")));
    }
    Ok(())
}

/// Challenge/response handshake backed by a [`LedgerTransport`].
pub struct PairingHandshakeService {
    config: HandshakeConfig,
    deps: HandshakeDeps,
    clock: Arc<dyn TimeSource>,
    challenges: DashMap<ChallengeId, ChallengeSlot>,
    lcts: DashMap<LctId, LctSlot>,
}

impl PairingHandshakeService {
    /// Create a service on the system clock.
    pub fn new(config: HandshakeConfig, deps: HandshakeDeps) -> Result<Self, PairingError> {
        Self::with_clock(config, deps, Arc::new(SystemTimeSource))
    }

    /// Create a service with an explicit clock.
    pub fn with_clock(
        config: HandshakeConfig,
        deps: HandshakeDeps,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, PairingError> {
        config.validate()?;
        Ok(Self {
            config,
            deps,
            clock,
            challenges: DashMap::new(),
            lcts: DashMap::new(),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Challenges held locally.
    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }

    /// Challenges not yet in a terminal state.
    pub fn open_challenge_count(&self) -> usize {
        self.challenges
            .iter()
            .filter(|entry| !entry.value().value.lock().status.is_terminal())
            .count()
    }

    /// LCTs held locally.
    pub fn lct_count(&self) -> usize {
        self.lcts.len()
    }

    async fn challenge_slot(&self, id: &ChallengeId) -> Result<ChallengeSlot, PairingError> {
        let cached = self.challenges.get(id).map(|entry| entry.value().clone());
        if let Some(slot) = cached {
            return Ok(slot);
        }
        let remote = self
            .deps
            .ledger
            .get_challenge(id)
            .await
            .map_err(|e| read_error(e, EntityKind::Challenge, id))?;
        Ok(self
            .challenges
            .entry(id.clone())
            .or_insert_with(|| Slot::new(remote))
            .value()
            .clone())
    }

    async fn lct_slot(&self, id: &LctId) -> Result<LctSlot, PairingError> {
        let cached = self.lcts.get(id).map(|entry| entry.value().clone());
        if let Some(slot) = cached {
            return Ok(slot);
        }
        let remote = self
            .deps
            .ledger
            .get_lct(id)
            .await
            .map_err(|e| read_error(e, EntityKind::Lct, id))?;
        Ok(self
            .lcts
            .entry(id.clone())
            .or_insert_with(|| Slot::new(remote))
            .value()
            .clone())
    }

    fn busy(entity: EntityKind, id: impl std::fmt::Display, status: impl std::fmt::Display, op: &str) -> PairingError {
        PairingError::invalid_state(entity, id, status, format!("{op} while another update is in flight"))
    }

    /// Reload a challenge after the ledger refused a write to it.
    async fn resync_challenge(
        &self,
        slot: &Slot<PairingChallenge>,
        id: &ChallengeId,
    ) -> ChallengeStatus {
        match self.deps.ledger.get_challenge(id).await {
            Ok(remote) => {
                let status = remote.status;
                slot.commit(remote);
                status
            }
            Err(e) => {
                warn!("[pl-02] Could not reload challenge {}: {}", id, e);
                slot.snapshot().status
            }
        }
    }

    /// Reload an LCT after the ledger refused a write to it.
    async fn resync_lct(&self, slot: &Slot<LctRecord>, id: &LctId) -> LctStatus {
        match self.deps.ledger.get_lct(id).await {
            Ok(remote) => {
                let status = remote.status;
                slot.commit(remote);
                status
            }
            Err(e) => {
                warn!("[pl-02] Could not reload LCT {}: {}", id, e);
                slot.snapshot().status
            }
        }
    }

    async fn challenge_write_error(
        &self,
        slot: &Slot<PairingChallenge>,
        id: &ChallengeId,
        op: &str,
        err: TransportError,
    ) -> PairingError {
        if !err.is_conflict() {
            return err.into();
        }
        let status = self.resync_challenge(slot, id).await;
        warn!("[pl-02] Challenge {} is {} on the ledger, {} refused", id, status, op);
        PairingError::invalid_state(EntityKind::Challenge, id, status, op)
    }

    async fn lct_write_error(
        &self,
        slot: &Slot<LctRecord>,
        id: &LctId,
        op: &str,
        err: TransportError,
    ) -> PairingError {
        if !err.is_conflict() {
            return err.into();
        }
        let status = self.resync_lct(slot, id).await;
        warn!("[pl-02] LCT {} is {} on the ledger, {} refused", id, status, op);
        PairingError::invalid_state(EntityKind::Lct, id, status, op)
    }

    async fn journal_challenge(
        &self,
        creator: &str,
        slot: &Slot<PairingChallenge>,
        challenge: &PairingChallenge,
        reason: Option<String>,
        op: &str,
    ) -> Result<TxReceipt, PairingError> {
        let id = &challenge.challenge_id;
        let change = StatusChange::new(id, challenge.status, reason);
        let call = LedgerCall::new(creator, challenge.operational_context.clone(), change);
        match self.deps.ledger.update_challenge_status(call).await {
            Ok(committed) => Ok(committed.receipt),
            Err(e) => Err(self.challenge_write_error(slot, id, op, e).await),
        }
    }

    /// Journal and commit `Expired` for a challenge whose marker is held.
    async fn expire(
        &self,
        creator: &str,
        slot: &Slot<PairingChallenge>,
        challenge: &PairingChallenge,
    ) -> Result<(), PairingError> {
        let mut next = challenge.clone();
        next.transition_to(ChallengeStatus::Expired)?;
        self.journal_challenge(creator, slot, &next, Some("deadline passed".into()), "expire")
            .await?;
        slot.commit(next);
        Ok(())
    }

    async fn record_trust(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        outcome: PairingOutcome,
    ) -> Option<f64> {
        match self
            .deps
            .trust
            .record_outcome(creator, component_a, component_b, context, outcome)
            .await
        {
            Ok(tensor) => Some(tensor.score),
            Err(e) => {
                warn!(
                    "[pl-02] Trust update ({}) for {} <-> {} failed: {}",
                    outcome, component_a, component_b, e
                );
                None
            }
        }
    }

    async fn verify_side(
        &self,
        challenge: &PairingChallenge,
        role: ComponentRole,
        token: &str,
    ) -> Result<(), PairingError> {
        let component = challenge.component(role);
        if self
            .deps
            .verifier
            .verify(component, challenge, role, token)
            .await
        {
            Ok(())
        } else {
            Err(PairingError::AuthenticationFailed {
                challenge_id: challenge.challenge_id.to_string(),
                role: role.to_string(),
            })
        }
    }
}

#[async_trait]
impl PairingHandshakeApi for PairingHandshakeService {
    async fn initiate(
        &self,
        creator: &str,
        request: InitiateRequest,
    ) -> Result<InitiateOutcome, PairingError> {
        require_non_empty("creator", creator)?;
        ComponentRef::validate_pair(&request.component_a, &request.component_b)?;
        require_non_empty("context", &request.context)?;
        if let Some(proxy) = request.proxy_id.as_deref() {
            require_non_empty("proxy_id", proxy)?;
        }

        if !request.force_immediate {
            let a_up = self.deps.liveness.is_reachable(&request.component_a).await;
            let b_up = self.deps.liveness.is_reachable(&request.component_b).await;
            if !(a_up && b_up) {
                let queued = self
                    .deps
                    .queue
                    .enqueue(
                        creator,
                        &request.component_a,
                        &request.component_b,
                        &request.context,
                        request.proxy_id.as_deref(),
                    )
                    .await?;
                info!(
                    "[pl-02] Queued pairing {} <-> {} as {} (peer unreachable)",
                    request.component_a, request.component_b, queued.entity.request_id
                );
                return Ok(InitiateOutcome::Queued(queued));
            }
        }

        let now = self.clock.now();
        let mut challenge = PairingChallenge::new(ChallengeParams {
            challenge_id: ChallengeId::generate(),
            component_a: request.component_a,
            component_b: request.component_b,
            operational_context: request.context.clone(),
            proxy_id: request.proxy_id,
            force_immediate: request.force_immediate,
            nonce: generate_nonce(),
            created_at: now,
            expires_at: now.saturating_add(self.config.challenge_ttl_secs),
        });
        if self.config.auto_acknowledge {
            challenge.acknowledge(ComponentRole::A)?;
            challenge.acknowledge(ComponentRole::B)?;
        }

        let call = LedgerCall::new(creator, request.context, challenge);
        let committed = self.deps.ledger.initiate_pairing(call).await?;
        let id = committed.entity.challenge_id.clone();
        self.challenges
            .insert(id.clone(), Slot::new(committed.entity.clone()));

        info!(
            "[pl-02] Challenge {} created for {} <-> {} ({})",
            id, committed.entity.component_a, committed.entity.component_b, committed.entity.status
        );
        Ok(InitiateOutcome::Challenge(committed))
    }

    async fn acknowledge(
        &self,
        creator: &str,
        challenge_id: &ChallengeId,
        role: ComponentRole,
    ) -> Result<ChallengeStatus, PairingError> {
        require_non_empty("creator", creator)?;
        let slot = self.challenge_slot(challenge_id).await?;
        let _flight = slot.begin().ok_or_else(|| {
            Self::busy(EntityKind::Challenge, challenge_id, slot.snapshot().status, "acknowledge")
        })?;

        let challenge = slot.snapshot();
        if challenge.status == ChallengeStatus::Pending && challenge.is_expired(self.clock.now()) {
            self.expire(creator, &slot, &challenge).await?;
            return Err(PairingError::invalid_state(
                EntityKind::Challenge,
                challenge_id,
                ChallengeStatus::Expired,
                "acknowledge",
            ));
        }

        let mut next = challenge;
        let status = next.acknowledge(role)?;
        self.journal_challenge(
            creator,
            &slot,
            &next,
            Some(format!("acknowledged by {role}")),
            "acknowledge",
        )
        .await?;
        slot.commit(next);
        debug!("[pl-02] Challenge {} acknowledged by {} ({})", challenge_id, role, status);
        Ok(status)
    }

    async fn complete(
        &self,
        creator: &str,
        request: CompleteRequest,
    ) -> Result<PairingCompletion, PairingError> {
        require_non_empty("creator", creator)?;
        require_non_empty("challenge_id", request.challenge_id.as_str())?;
        require_non_empty("auth_a", &request.auth_a)?;
        require_non_empty("auth_b", &request.auth_b)?;

        let id = request.challenge_id.clone();
        let slot = self.challenge_slot(&id).await?;
        let flight = slot
            .begin()
            .ok_or_else(|| Self::busy(EntityKind::Challenge, &id, slot.snapshot().status, "complete"))?;

        let challenge = slot.snapshot();
        if challenge.status != ChallengeStatus::AwaitingAuth {
            return Err(PairingError::invalid_state(
                EntityKind::Challenge,
                &id,
                challenge.status,
                "complete",
            ));
        }

        let now = self.clock.now();
        if challenge.is_expired(now) {
            if let Err(e) = self.expire(creator, &slot, &challenge).await {
                warn!("[pl-02] Could not journal expiry of {}: {}", id, e);
            }
            return Err(PairingError::invalid_state(
                EntityKind::Challenge,
                &id,
                ChallengeStatus::Expired,
                "complete",
            ));
        }

        self.verify_side(&challenge, ComponentRole::A, &request.auth_a)
            .await?;
        self.verify_side(&challenge, ComponentRole::B, &request.auth_b)
            .await?;

        let key = SplitKey::generate();
        let record = LctRecord {
            lct_id: LctId::generate(),
            challenge_id: id.clone(),
            component_a: challenge.component_a.clone(),
            component_b: challenge.component_b.clone(),
            context: challenge.operational_context.clone(),
            session_context: request.session_context,
            proxy_id: challenge.proxy_id.clone(),
            status: LctStatus::Active,
            lct_key_commitment: key.lct_half().commitment(),
            device_key_commitment: key.device_half().commitment(),
            created_at: now,
            updated_at: now,
            access_rules: request.access_rules,
        };
        // The ledger completes the challenge in the same write; a replica
        // that completed it first makes this a conflict.
        let call = LedgerCall::new(creator, challenge.operational_context.clone(), record);
        let committed = match self.deps.ledger.complete_pairing(call).await {
            Ok(committed) => committed,
            Err(e) => return Err(self.challenge_write_error(&slot, &id, "complete", e).await),
        };
        let record = committed.entity;
        self.lcts
            .insert(record.lct_id.clone(), Slot::new(record.clone()));

        let mut done = challenge;
        done.transition_to(ChallengeStatus::Completed)?;
        slot.commit(done);
        drop(flight);

        let trust_score = self
            .record_trust(
                creator,
                &record.component_a,
                &record.component_b,
                &record.context,
                PairingOutcome::Completed,
            )
            .await;

        info!(
            "[pl-02] Challenge {} completed, LCT {} active for {} <-> {}",
            id, record.lct_id, record.component_a, record.component_b
        );
        Ok(PairingCompletion {
            lct: Lct::new(record, key),
            receipt: committed.receipt,
            trust_score,
        })
    }

    async fn revoke(
        &self,
        creator: &str,
        lct_id: &LctId,
        reason: &str,
        notify_offline: bool,
    ) -> Result<RevokeOutcome, PairingError> {
        require_non_empty("creator", creator)?;
        require_non_empty("reason", reason)?;

        let slot = self.lct_slot(lct_id).await?;
        let flight = slot
            .begin()
            .ok_or_else(|| Self::busy(EntityKind::Lct, lct_id, slot.snapshot().status, "revoke"))?;

        let record = slot.snapshot();
        if record.status == LctStatus::Terminated {
            debug!("[pl-02] LCT {} already terminated", lct_id);
            return Ok(RevokeOutcome {
                lct_id: lct_id.clone(),
                already_terminated: true,
                receipt: None,
                notified: Vec::new(),
                trust_score: None,
            });
        }

        let mut next = record;
        next.transition_to(LctStatus::Terminated, self.clock.now())?;
        let payload = RevokePairing {
            lct_id: lct_id.clone(),
            reason: reason.to_string(),
        };
        let call = LedgerCall::new(creator, next.context.clone(), payload);
        let committed = match self.deps.ledger.revoke_pairing(call).await {
            Ok(committed) => committed,
            Err(e) if e.is_conflict() => {
                let status = self.resync_lct(&slot, lct_id).await;
                if status == LctStatus::Terminated {
                    debug!("[pl-02] LCT {} was terminated elsewhere", lct_id);
                    return Ok(RevokeOutcome {
                        lct_id: lct_id.clone(),
                        already_terminated: true,
                        receipt: None,
                        notified: Vec::new(),
                        trust_score: None,
                    });
                }
                return Err(PairingError::invalid_state(
                    EntityKind::Lct,
                    lct_id,
                    status,
                    "revoke",
                ));
            }
            Err(e) => return Err(e.into()),
        };
        slot.commit(next.clone());
        drop(flight);

        let trust_score = self
            .record_trust(
                creator,
                &next.component_a,
                &next.component_b,
                &next.context,
                PairingOutcome::Revoked,
            )
            .await;

        let mut notified = Vec::new();
        if notify_offline {
            for peer in [&next.component_a, &next.component_b] {
                if self.deps.liveness.is_reachable(peer).await {
                    continue;
                }
                self.deps.notifier.notify(OfflineNotice {
                    recipient: peer.clone(),
                    lct_id: lct_id.clone(),
                    kind: NoticeKind::Termination,
                    reason: reason.to_string(),
                    issued_at: self.clock.now(),
                });
                notified.push(peer.clone());
            }
        }

        info!(
            "[pl-02] LCT {} terminated: {} ({} offline notices)",
            lct_id,
            reason,
            notified.len()
        );
        Ok(RevokeOutcome {
            lct_id: lct_id.clone(),
            already_terminated: false,
            receipt: Some(committed.receipt),
            notified,
            trust_score,
        })
    }

    async fn revoke_challenge(
        &self,
        creator: &str,
        challenge_id: &ChallengeId,
        reason: &str,
    ) -> Result<Committed<PairingChallenge>, PairingError> {
        require_non_empty("creator", creator)?;
        require_non_empty("reason", reason)?;

        let slot = self.challenge_slot(challenge_id).await?;
        let _flight = slot.begin().ok_or_else(|| {
            Self::busy(EntityKind::Challenge, challenge_id, slot.snapshot().status, "revoke")
        })?;

        let mut next = slot.snapshot();
        next.transition_to(ChallengeStatus::Revoked)?;
        let receipt = self
            .journal_challenge(creator, &slot, &next, Some(reason.to_string()), "revoke")
            .await?;
        slot.commit(next.clone());

        info!("[pl-02] Challenge {} revoked: {}", challenge_id, reason);
        Ok(Committed {
            entity: next,
            receipt,
        })
    }

    async fn update_lct_status(
        &self,
        creator: &str,
        lct_id: &LctId,
        status: LctStatus,
        reason: Option<String>,
    ) -> Result<LctRecord, PairingError> {
        require_non_empty("creator", creator)?;
        if status == LctStatus::Terminated {
            return Err(PairingError::invalid_input(
                "status",
                "termination goes through revoke",
            ));
        }

        let slot = self.lct_slot(lct_id).await?;
        let _flight = slot.begin().ok_or_else(|| {
            Self::busy(EntityKind::Lct, lct_id, slot.snapshot().status, "update status")
        })?;

        let mut next = slot.snapshot();
        next.transition_to(status, self.clock.now())?;
        let change = StatusChange::new(lct_id, status, reason);
        let call = LedgerCall::new(creator, next.context.clone(), change);
        if let Err(e) = self.deps.ledger.update_lct_status(call).await {
            return Err(self.lct_write_error(&slot, lct_id, "update status", e).await);
        }
        slot.commit(next.clone());

        info!("[pl-02] LCT {} is now {}", lct_id, status);
        Ok(next)
    }

    async fn get_status(&self, challenge_id: &ChallengeId) -> Result<ChallengeStatus, PairingError> {
        Ok(self.get_challenge(challenge_id).await?.status)
    }

    async fn get_challenge(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<PairingChallenge, PairingError> {
        let local = self
            .challenges
            .get(challenge_id)
            .map(|entry| entry.value().snapshot());
        match local {
            Some(challenge) => Ok(challenge),
            None => self
                .deps
                .ledger
                .get_challenge(challenge_id)
                .await
                .map_err(|e| read_error(e, EntityKind::Challenge, challenge_id)),
        }
    }

    async fn get_lct(&self, lct_id: &LctId) -> Result<LctRecord, PairingError> {
        let local = self.lcts.get(lct_id).map(|entry| entry.value().snapshot());
        match local {
            Some(record) => Ok(record),
            None => self
                .deps
                .ledger
                .get_lct(lct_id)
                .await
                .map_err(|e| read_error(e, EntityKind::Lct, lct_id)),
        }
    }

    async fn component_lcts(&self, component_id: &str) -> Result<Vec<LctRecord>, PairingError> {
        require_non_empty("component_id", component_id)?;
        let lcts = self.deps.ledger.list_component_lcts(component_id).await?;
        debug!("[pl-02] {} is paired through {} lct(s)", component_id, lcts.len());
        Ok(lcts)
    }

    async fn validate_lct_access(
        &self,
        lct_id: &LctId,
        requestor_id: &str,
    ) -> Result<AccessDecision, PairingError> {
        require_non_empty("requestor_id", requestor_id)?;
        let record = self
            .deps
            .ledger
            .get_lct(lct_id)
            .await
            .map_err(|e| read_error(e, EntityKind::Lct, lct_id))?;
        let decision = AccessDecision::evaluate(&record, requestor_id);
        debug!(
            "[pl-02] Access of {} to {}: {:?}",
            requestor_id, lct_id, decision.access_level
        );
        Ok(decision)
    }

    async fn expire_stale(&self, creator: &str) -> Result<Vec<ChallengeId>, PairingError> {
        require_non_empty("creator", creator)?;
        let now = self.clock.now();
        let stale: Vec<(ChallengeId, ChallengeSlot)> = self
            .challenges
            .iter()
            .filter(|entry| {
                let c = entry.value().value.lock();
                !c.status.is_terminal() && c.is_expired(now)
            })
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for (id, slot) in stale {
            // Busy challenges are picked up by the next sweep.
            let Some(_flight) = slot.begin() else {
                continue;
            };
            let challenge = slot.snapshot();
            if challenge.status.is_terminal() || !challenge.is_expired(now) {
                continue;
            }
            match self.expire(creator, &slot, &challenge).await {
                Ok(()) => expired.push(id),
                Err(e) => warn!("[pl-02] Could not expire challenge {}: {}", id, e),
            }
        }

        if !expired.is_empty() {
            info!("[pl-02] Expired {} stale challenge(s)", expired.len());
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::HmacAuthVerifier;
    use crate::ports::{MockOfflineQueue, MockTrustGateway, RecordingNotifier, StaticLiveness};
    use shared_types::{AccessRule, ErrorKind, LctAccessRules, ManualTimeSource, MockLedger};

    const START: u64 = 1_700_000_000;

    struct Harness {
        service: Arc<PairingHandshakeService>,
        ledger: Arc<MockLedger>,
        liveness: Arc<StaticLiveness>,
        queue: Arc<MockOfflineQueue>,
        trust: Arc<MockTrustGateway>,
        notifier: Arc<RecordingNotifier>,
        verifier: Arc<HmacAuthVerifier>,
        clock: Arc<ManualTimeSource>,
    }

    fn harness_with(config: HandshakeConfig) -> Harness {
        let ledger = Arc::new(MockLedger::new());
        let liveness = Arc::new(StaticLiveness::new());
        let queue = Arc::new(MockOfflineQueue::new());
        let trust = Arc::new(MockTrustGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let verifier = Arc::new(HmacAuthVerifier::new(b"authority-key".to_vec()).unwrap());
        let clock = Arc::new(ManualTimeSource::new(START));
        let deps = HandshakeDeps {
            ledger: ledger.clone(),
            liveness: liveness.clone(),
            queue: queue.clone(),
            trust: trust.clone(),
            notifier: notifier.clone(),
            verifier: verifier.clone(),
        };
        let service =
            Arc::new(PairingHandshakeService::with_clock(config, deps, clock.clone()).unwrap());
        Harness {
            service,
            ledger,
            liveness,
            queue,
            trust,
            notifier,
            verifier,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(HandshakeConfig::for_testing())
    }

    fn request() -> InitiateRequest {
        InitiateRequest::new(
            ComponentRef::plain("battery-001"),
            ComponentRef::plain("motor-001"),
            "ctx",
        )
    }

    async fn open_challenge(h: &Harness) -> PairingChallenge {
        let outcome = h.service.initiate("u1", request()).await.unwrap();
        outcome.challenge().cloned().unwrap()
    }

    fn complete_request(h: &Harness, challenge: &PairingChallenge) -> CompleteRequest {
        let (auth_a, auth_b) = h.verifier.issue_pair(challenge).unwrap();
        CompleteRequest {
            challenge_id: challenge.challenge_id.clone(),
            auth_a,
            auth_b,
            session_context: "session-1".into(),
            access_rules: Default::default(),
        }
    }

    /// Second service on the same ledger, as another node would run it.
    fn replica(h: &Harness) -> Arc<PairingHandshakeService> {
        let deps = HandshakeDeps {
            ledger: h.ledger.clone(),
            liveness: h.liveness.clone(),
            queue: h.queue.clone(),
            trust: h.trust.clone(),
            notifier: h.notifier.clone(),
            verifier: h.verifier.clone(),
        };
        Arc::new(
            PairingHandshakeService::with_clock(
                HandshakeConfig::for_testing(),
                deps,
                h.clock.clone(),
            )
            .unwrap(),
        )
    }

    async fn paired(h: &Harness) -> PairingCompletion {
        let challenge = open_challenge(h).await;
        h.service
            .complete("u1", complete_request(h, &challenge))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initiate_then_complete_yields_one_active_lct() {
        let h = harness();
        let challenge = open_challenge(&h).await;
        assert_eq!(challenge.status, ChallengeStatus::AwaitingAuth);
        assert_eq!(challenge.expires_at, START + 60);
        assert_eq!(challenge.nonce.len(), 64);

        let done = h
            .service
            .complete("u1", complete_request(&h, &challenge))
            .await
            .unwrap();
        let record = done.lct.record();
        assert_eq!(record.status, LctStatus::Active);
        assert_eq!(record.challenge_id, challenge.challenge_id);
        assert_eq!(record.session_context, "session-1");
        assert_ne!(done.lct.lct_key_half(), done.lct.device_key_half());
        assert!(done
            .lct
            .lct_key_half()
            .matches_commitment(&record.lct_key_commitment));
        assert!(done.lct.session_key().is_ok());

        assert_eq!(h.ledger.call_count("complete_pairing"), 1);
        assert_eq!(h.service.lct_count(), 1);
        assert_eq!(h.trust.outcomes(), vec![PairingOutcome::Completed]);
        assert_eq!(done.trust_score, Some(1.0));
        assert_eq!(
            h.service.get_status(&challenge.challenge_id).await.unwrap(),
            ChallengeStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_second_complete_is_invalid_state() {
        let h = harness();
        let challenge = open_challenge(&h).await;
        let req = complete_request(&h, &challenge);
        h.service.complete("u1", req.clone()).await.unwrap();

        let err = h.service.complete("u1", req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(h.ledger.call_count("complete_pairing"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_completes_create_one_lct() {
        let h = harness();
        let challenge = open_challenge(&h).await;
        let req = complete_request(&h, &challenge);

        let (s1, s2) = (h.service.clone(), h.service.clone());
        let (r1, r2) = (req.clone(), req);
        let t1 = tokio::spawn(async move { s1.complete("u1", r1).await.map(|_| ()) });
        let t2 = tokio::spawn(async move { s2.complete("u1", r2).await.map(|_| ()) });
        let results = [t1.await.unwrap(), t2.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.kind(), ErrorKind::InvalidState);
        assert_eq!(h.ledger.call_count("complete_pairing"), 1);
    }

    #[tokio::test]
    async fn test_stale_replica_cannot_complete_again() {
        let h = harness();
        let other = replica(&h);
        let challenge = open_challenge(&h).await;
        let good = complete_request(&h, &challenge);

        // The replica caches the challenge while it is still awaiting auth.
        let mut bad = good.clone();
        bad.auth_a = bad.auth_b.clone();
        let err = other.complete("u2", bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);

        h.service.complete("u1", good.clone()).await.unwrap();

        let err = other.complete("u2", good).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(other.lct_count(), 0);
        assert_eq!(
            other.get_status(&challenge.challenge_id).await.unwrap(),
            ChallengeStatus::Completed
        );
        assert_eq!(h.trust.outcomes(), vec![PairingOutcome::Completed]);
    }

    #[tokio::test]
    async fn test_stale_replica_sees_termination() {
        let h = harness();
        let other = replica(&h);
        let done = paired(&h).await;
        let id = done.lct.record().lct_id.clone();

        let first = other.revoke("u2", &id, "stolen", false).await.unwrap();
        assert!(!first.already_terminated);

        let late = h.service.revoke("u1", &id, "stolen", false).await.unwrap();
        assert!(late.already_terminated);
        assert!(late.receipt.is_none());
        assert_eq!(
            h.service.get_lct(&id).await.unwrap().status,
            LctStatus::Terminated
        );

        let err = h
            .service
            .update_lct_status("u1", &id, LctStatus::Suspended, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_queued() {
        let h = harness();
        h.liveness.mark_unreachable("motor-001");

        let outcome = h
            .service
            .initiate("u1", request().with_proxy("proxy-1"))
            .await
            .unwrap();
        assert!(outcome.is_queued());
        let queued = outcome.queued().unwrap();
        assert_eq!(queued.queue_id.as_str(), "proxy-1");
        assert_eq!(queued.creator, "u1");
        assert_eq!(h.queue.queued().len(), 1);
        assert_eq!(h.ledger.call_count("initiate_pairing"), 0);
    }

    #[tokio::test]
    async fn test_force_immediate_skips_liveness() {
        let h = harness();
        h.liveness.mark_unreachable("motor-001");

        let outcome = h
            .service
            .initiate("u1", request().immediate())
            .await
            .unwrap();
        let challenge = outcome.challenge().unwrap();
        assert!(challenge.force_immediate);
        assert!(h.queue.queued().is_empty());
    }

    #[tokio::test]
    async fn test_bad_token_leaves_challenge_awaiting_auth() {
        let h = harness();
        let challenge = open_challenge(&h).await;
        let mut req = complete_request(&h, &challenge);
        let good_b = req.auth_b.clone();
        req.auth_b = req.auth_a.clone();

        let err = h.service.complete("u1", req.clone()).await.unwrap_err();
        match &err {
            PairingError::AuthenticationFailed { role, .. } => assert_eq!(role, "component_b"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            h.service.get_status(&challenge.challenge_id).await.unwrap(),
            ChallengeStatus::AwaitingAuth
        );

        req.auth_b = good_b;
        assert!(h.service.complete("u1", req).await.is_ok());
    }

    #[tokio::test]
    async fn test_complete_after_deadline_expires_challenge() {
        let h = harness();
        let challenge = open_challenge(&h).await;
        h.clock.advance(61);

        let err = h
            .service
            .complete("u1", complete_request(&h, &challenge))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            h.service.get_status(&challenge.challenge_id).await.unwrap(),
            ChallengeStatus::Expired
        );
        assert_eq!(h.ledger.call_count("complete_pairing"), 0);
    }

    #[tokio::test]
    async fn test_ledger_failure_on_complete_keeps_state() {
        let h = harness();
        let challenge = open_challenge(&h).await;
        h.ledger.set_offline(true);

        let err = h
            .service
            .complete("u1", complete_request(&h, &challenge))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(h.service.lct_count(), 0);

        h.ledger.set_offline(false);
        assert_eq!(
            h.service.get_status(&challenge.challenge_id).await.unwrap(),
            ChallengeStatus::AwaitingAuth
        );
        assert!(h
            .service
            .complete("u1", complete_request(&h, &challenge))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_trust_failure_does_not_undo_pairing() {
        let h = harness();
        h.trust.set_failing(true);
        let done = paired(&h).await;
        assert_eq!(done.trust_score, None);
        assert_eq!(done.lct.record().status, LctStatus::Active);
    }

    #[tokio::test]
    async fn test_expire_stale_only_touches_old_challenges() {
        let h = harness();
        let old = open_challenge(&h).await;
        h.clock.advance(30);
        let fresh = open_challenge(&h).await;
        h.clock.advance(31);

        let expired = h.service.expire_stale("sweeper").await.unwrap();
        assert_eq!(expired, vec![old.challenge_id.clone()]);
        assert_eq!(
            h.service.get_status(&fresh.challenge_id).await.unwrap(),
            ChallengeStatus::AwaitingAuth
        );
        assert_eq!(h.service.open_challenge_count(), 1);
        assert!(h.service.expire_stale("sweeper").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let h = harness();
        let done = paired(&h).await;
        let id = done.lct.record().lct_id.clone();

        let first = h.service.revoke("u1", &id, "stolen", false).await.unwrap();
        assert!(!first.already_terminated);
        assert!(first.receipt.is_some());
        assert_eq!(
            h.service.get_lct(&id).await.unwrap().status,
            LctStatus::Terminated
        );

        let second = h.service.revoke("u1", &id, "stolen", false).await.unwrap();
        assert!(second.already_terminated);
        assert!(second.receipt.is_none());
        assert_eq!(h.ledger.call_count("revoke_pairing"), 1);
        assert_eq!(
            h.trust.outcomes(),
            vec![PairingOutcome::Completed, PairingOutcome::Revoked]
        );
    }

    #[tokio::test]
    async fn test_revoke_notifies_offline_peers() {
        let h = harness();
        let done = paired(&h).await;
        let id = done.lct.record().lct_id.clone();
        h.liveness.mark_unreachable("motor-001");

        let outcome = h.service.revoke("u1", &id, "recall", true).await.unwrap();
        assert_eq!(outcome.notified, vec![ComponentRef::plain("motor-001")]);
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].lct_id, id);
        assert_eq!(sent[0].kind, NoticeKind::Termination);
        assert_eq!(sent[0].reason, "recall");
    }

    #[tokio::test]
    async fn test_manual_acknowledgement() {
        let h = harness_with(HandshakeConfig {
            auto_acknowledge: false,
            ..HandshakeConfig::for_testing()
        });
        let challenge = open_challenge(&h).await;
        assert_eq!(challenge.status, ChallengeStatus::Pending);

        let id = &challenge.challenge_id;
        assert_eq!(
            h.service.acknowledge("u1", id, ComponentRole::A).await.unwrap(),
            ChallengeStatus::Pending
        );
        assert_eq!(
            h.service.acknowledge("u1", id, ComponentRole::B).await.unwrap(),
            ChallengeStatus::AwaitingAuth
        );
        let err = h
            .service
            .acknowledge("u1", id, ComponentRole::A)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_revoked_challenge_cannot_complete() {
        let h = harness();
        let challenge = open_challenge(&h).await;
        let committed = h
            .service
            .revoke_challenge("u1", &challenge.challenge_id, "operator abort")
            .await
            .unwrap();
        assert_eq!(committed.entity.status, ChallengeStatus::Revoked);
        assert_eq!(committed.receipt.status, "revoked");

        let err = h
            .service
            .complete("u1", complete_request(&h, &challenge))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_lct_suspend_and_resume() {
        let h = harness();
        let done = paired(&h).await;
        let id = done.lct.record().lct_id.clone();

        let suspended = h
            .service
            .update_lct_status("u1", &id, LctStatus::Suspended, Some("maintenance".into()))
            .await
            .unwrap();
        assert_eq!(suspended.status, LctStatus::Suspended);
        let active = h
            .service
            .update_lct_status("u1", &id, LctStatus::Active, None)
            .await
            .unwrap();
        assert_eq!(active.status, LctStatus::Active);

        let err = h
            .service
            .update_lct_status("u1", &id, LctStatus::Terminated, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_component_lcts_list_pairings_from_either_side() {
        let h = harness();
        let first = paired(&h).await.lct.record().lct_id.clone();
        h.clock.advance(1);
        let second = paired(&h).await.lct.record().lct_id.clone();

        let ids = |lcts: Vec<LctRecord>| lcts.into_iter().map(|l| l.lct_id).collect::<Vec<_>>();
        let by_a = h.service.component_lcts("battery-001").await.unwrap();
        let by_b = h.service.component_lcts("motor-001").await.unwrap();
        assert_eq!(ids(by_a), vec![first.clone(), second.clone()]);
        assert_eq!(ids(by_b), vec![first, second]);
        assert!(h.service.component_lcts("charger-001").await.unwrap().is_empty());

        let err = h.service.component_lcts(" ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_lct_access_follows_rules_and_status() {
        let h = harness();
        let challenge = open_challenge(&h).await;
        let mut request = complete_request(&h, &challenge);
        request.access_rules = LctAccessRules {
            component_b: Some(AccessRule::denied()),
            ..LctAccessRules::default()
        };
        let done = h.service.complete("u1", request).await.unwrap();
        let id = done.lct.record().lct_id.clone();

        let a = h.service.validate_lct_access(&id, "battery-001").await.unwrap();
        assert!(a.granted);
        assert_eq!(a.access_level.as_deref(), Some("standard"));
        let b = h.service.validate_lct_access(&id, "motor-001").await.unwrap();
        assert!(!b.granted);
        let outsider = h.service.validate_lct_access(&id, "charger-001").await.unwrap();
        assert!(!outsider.granted);

        h.service
            .update_lct_status("u1", &id, LctStatus::Suspended, None)
            .await
            .unwrap();
        let a = h.service.validate_lct_access(&id, "battery-001").await.unwrap();
        assert!(!a.granted);

        let err = h
            .service
            .validate_lct_access(&LctId::new("lct-missing"), "battery-001")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unknown_challenge_is_not_found() {
        let h = harness();
        let id = ChallengeId::new("challenge-missing");
        let err = h.service.get_status(&id).await.unwrap_err();
        assert_eq!(err, PairingError::challenge_not_found("challenge-missing"));

        let err = h
            .service
            .complete(
                "u1",
                CompleteRequest {
                    challenge_id: id,
                    auth_a: "00".into(),
                    auth_b: "00".into(),
                    session_context: String::new(),
                    access_rules: Default::default(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_refs_rejected_before_ledger() {
        let h = harness();
        let same = InitiateRequest::new(
            ComponentRef::plain("battery-001"),
            ComponentRef::plain("battery-001"),
            "ctx",
        );
        let err = h.service.initiate("u1", same).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = h.service.initiate("", request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(h.ledger.calls().is_empty());
    }
}
