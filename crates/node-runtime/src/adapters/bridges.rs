//! # Subsystem Bridges
//!
//! The handshake, queue and trust crates do not depend on each other. Each
//! declares the port it needs; these adapters implement those ports on top
//! of the other subsystem's inbound API.
//!
//! ```text
//! Handshake ──OfflineQueue──→ QueueBridge ──→ PairingQueueApi
//! Handshake ──TrustGateway──→ TrustBridge ──→ TrustLedgerApi
//! Queue ──HandshakeGateway──→ HandshakeBridge ──→ PairingHandshakeApi
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use pairing_telemetry::{metric_inc, PAIRINGS_INITIATED, TRUST_UPDATES};
use pl_02_pairing_handshake::{InitiateRequest, OfflineQueue, PairingHandshakeApi, TrustGateway};
use pl_03_pairing_queue::{EnqueueRequest, HandshakeGateway, PairingQueueApi};
use pl_04_trust_ledger::TrustLedgerApi;
use shared_types::{
    ChallengeId, Committed, ComponentRef, EntityKind, PairingError, PairingOutcome,
    PairingRequest, TrustTensor,
};
use tracing::debug;

/// [`OfflineQueue`] on top of the pairing queue.
pub struct QueueBridge {
    queue: Arc<dyn PairingQueueApi>,
}

impl QueueBridge {
    /// Bridge to `queue`.
    pub fn new(queue: Arc<dyn PairingQueueApi>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl OfflineQueue for QueueBridge {
    async fn enqueue(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        proxy_id: Option<&str>,
    ) -> Result<Committed<PairingRequest>, PairingError> {
        let request = EnqueueRequest::new(
            component_a.clone(),
            component_b.clone(),
            context,
            proxy_id.map(str::to_string),
        );
        self.queue.enqueue(creator, request).await
    }
}

/// [`TrustGateway`] on top of the trust ledger.
pub struct TrustBridge {
    trust: Arc<dyn TrustLedgerApi>,
}

impl TrustBridge {
    /// Bridge to `trust`.
    pub fn new(trust: Arc<dyn TrustLedgerApi>) -> Self {
        Self { trust }
    }
}

#[async_trait]
impl TrustGateway for TrustBridge {
    async fn record_outcome(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        outcome: PairingOutcome,
    ) -> Result<TrustTensor, PairingError> {
        let committed = self
            .trust
            .record_outcome(creator, component_a, component_b, context, outcome)
            .await?;
        metric_inc!(TRUST_UPDATES, &[outcome.to_string().as_str()]);
        debug!(
            "[runtime] Trust for {} <-> {} now {:.3}",
            component_a, component_b, committed.entity.score
        );
        Ok(committed.entity)
    }
}

/// [`HandshakeGateway`] on top of the handshake. Queued pairings are
/// started with liveness checks skipped; abandoned ones are revoked.
pub struct HandshakeBridge {
    handshake: Arc<dyn PairingHandshakeApi>,
}

impl HandshakeBridge {
    /// Bridge to `handshake`.
    pub fn new(handshake: Arc<dyn PairingHandshakeApi>) -> Self {
        Self { handshake }
    }
}

#[async_trait]
impl HandshakeGateway for HandshakeBridge {
    async fn initiate_immediate(
        &self,
        creator: &str,
        request: &PairingRequest,
    ) -> Result<ChallengeId, PairingError> {
        let mut initiate = InitiateRequest::new(
            request.component_a.clone(),
            request.component_b.clone(),
            request.context.clone(),
        )
        .immediate();
        if let Some(proxy) = &request.proxy_id {
            initiate = initiate.with_proxy(proxy.clone());
        }

        let outcome = self.handshake.initiate(creator, initiate).await?;
        match outcome.challenge() {
            Some(challenge) => {
                metric_inc!(PAIRINGS_INITIATED);
                Ok(challenge.challenge_id.clone())
            }
            None => Err(PairingError::invalid_state(
                EntityKind::Request,
                &request.request_id,
                &request.status,
                "initiate_immediate",
            )),
        }
    }

    async fn abandon(
        &self,
        creator: &str,
        challenge_id: &ChallengeId,
        reason: &str,
    ) -> Result<(), PairingError> {
        self.handshake
            .revoke_challenge(creator, challenge_id, reason)
            .await?;
        debug!("[runtime] Abandoned challenge {}: {}", challenge_id, reason);
        Ok(())
    }
}
