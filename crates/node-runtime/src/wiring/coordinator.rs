//! # Pairing Coordinator
//!
//! Entry point for callers holding real component ids. In anonymous mode the
//! ids are hashed here, before anything reaches the handshake or the ledger,
//! and the pair must pass the registry's hash-only check. Every operation
//! records its metrics.

use std::sync::Arc;

use pairing_telemetry::{
    metric_inc, CHALLENGES_EXPIRED, OPEN_CHALLENGES, PAIRINGS_COMPLETED, PAIRINGS_INITIATED,
    PAIRINGS_QUEUED, QUEUE_ENTRIES_PROCESSED, REVOCATIONS,
};
use pl_01_identity_hashing::{
    AnonymousRegistry, AnonymousRegistryApi, IdentityHasher, Namespace, PairingAuthCheck,
    Registration, RevocationRequest,
};
use pl_02_pairing_handshake::{
    AccessDecision, CompleteRequest, InitiateOutcome, InitiateRequest, PairingCompletion, PairingHandshakeApi,
    PairingHandshakeService, RevokeOutcome,
};
use pl_03_pairing_queue::{PairingQueueApi, PairingQueueService, ProcessReport};
use shared_types::{
    ChallengeId, Committed, ComponentRef, ComponentRules, IdentityDigest, LctId, LctRecord,
    PairingError, PairingRules, QueueId, RevocationEvent,
};
use tracing::{debug, info};

use crate::adapters::{HandshakeBridge, HeartbeatLiveness};
use crate::container::PairingContainer;

/// A pairing request as callers phrase it: real ids plus options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairRequest {
    /// Real id of side A.
    pub component_a: String,
    /// Real id of side B.
    pub component_b: String,
    /// Pairing context.
    pub context: String,
    /// Proxy that relays for an offline peer.
    pub proxy_id: Option<String>,
    /// Skip liveness checks.
    pub force_immediate: bool,
    /// Hash both ids before use.
    pub anonymous: bool,
}

impl PairRequest {
    /// Plain, liveness-checked request.
    pub fn new(
        component_a: impl Into<String>,
        component_b: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            component_a: component_a.into(),
            component_b: component_b.into(),
            context: context.into(),
            proxy_id: None,
            force_immediate: false,
            anonymous: false,
        }
    }

    /// Route through `proxy_id` when queued.
    pub fn with_proxy(mut self, proxy_id: impl Into<String>) -> Self {
        self.proxy_id = Some(proxy_id.into());
        self
    }

    /// Skip liveness checks.
    pub fn immediate(mut self) -> Self {
        self.force_immediate = true;
        self
    }

    /// Pair by digest instead of real id.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// Facade over the wired subsystems.
pub struct PairingCoordinator {
    handshake: Arc<PairingHandshakeService>,
    queue: Arc<PairingQueueService>,
    registry: Option<Arc<AnonymousRegistry>>,
    liveness: Arc<HeartbeatLiveness>,
    gateway: HandshakeBridge,
}

impl PairingCoordinator {
    /// Coordinator over the container's subsystems.
    pub fn new(container: &PairingContainer) -> Self {
        Self {
            handshake: container.handshake.clone(),
            queue: container.queue.clone(),
            registry: container.registry.clone(),
            liveness: container.liveness.clone(),
            gateway: HandshakeBridge::new(container.handshake.clone()),
        }
    }

    fn registry(&self) -> Result<&AnonymousRegistry, PairingError> {
        self.registry.as_deref().ok_or_else(|| {
            PairingError::Configuration(
                "anonymous mode needs PL_HASH_SALT and PL_HASH_CONTEXT".into(),
            )
        })
    }

    fn hasher(&self) -> Result<&IdentityHasher, PairingError> {
        Ok(self.registry()?.hasher())
    }

    fn digest(&self, real_id: &str) -> Result<IdentityDigest, PairingError> {
        self.hasher()?.derive(Namespace::Component, real_id)
    }

    fn refresh_open_challenges(&self) {
        OPEN_CHALLENGES.set(self.handshake.open_challenge_count() as f64);
    }

    /// Reference for `real_id`: its digest in anonymous mode, the id itself
    /// otherwise.
    pub fn component_ref(&self, real_id: &str, anonymous: bool) -> Result<ComponentRef, PairingError> {
        if anonymous {
            Ok(ComponentRef::anonymous(&self.digest(real_id)?))
        } else {
            Ok(ComponentRef::plain(real_id))
        }
    }

    /// Record a heartbeat under the reference pairing will use.
    pub fn heartbeat(&self, real_id: &str, anonymous: bool) -> Result<ComponentRef, PairingError> {
        let component = self.component_ref(real_id, anonymous)?;
        self.liveness.heartbeat(component.id());
        Ok(component)
    }

    /// Register a component anonymously.
    pub async fn register_anonymous(
        &self,
        creator: &str,
        real_component_id: &str,
        manufacturer_id: &str,
        category: &str,
    ) -> Result<Registration, PairingError> {
        self.registry()?
            .register(creator, real_component_id, manufacturer_id, category)
            .await
    }

    /// Revoke an anonymous registration.
    pub async fn revoke_component(
        &self,
        creator: &str,
        request: RevocationRequest,
    ) -> Result<Committed<RevocationEvent>, PairingError> {
        let event = self.registry()?.revoke(creator, request).await?;
        metric_inc!(REVOCATIONS, &["component"]);
        Ok(event)
    }

    /// Replace the pairing rules of an anonymously registered component.
    pub async fn update_authorization(
        &self,
        creator: &str,
        real_component_id: &str,
        rules: PairingRules,
    ) -> Result<Committed<ComponentRules>, PairingError> {
        let hash = self.digest(real_component_id)?;
        self.registry()?
            .update_authorization(creator, &hash, rules)
            .await
    }

    /// Check both directions of an anonymous pairing against the rules.
    pub async fn check_pairing_auth(
        &self,
        component_a: &str,
        component_b: &str,
    ) -> Result<PairingAuthCheck, PairingError> {
        let hash_a = self.digest(component_a)?;
        let hash_b = self.digest(component_b)?;
        self.registry()?.check_pairing_auth(&hash_a, &hash_b).await
    }

    /// Partner categories an anonymous component accepts.
    pub async fn list_authorized_partners(
        &self,
        real_component_id: &str,
    ) -> Result<Vec<IdentityDigest>, PairingError> {
        let hash = self.digest(real_component_id)?;
        self.registry()?.list_authorized_partners(&hash).await
    }

    /// Every LCT of a component.
    pub async fn component_lcts(
        &self,
        real_id: &str,
        anonymous: bool,
    ) -> Result<Vec<LctRecord>, PairingError> {
        let component = self.component_ref(real_id, anonymous)?;
        self.handshake.component_lcts(component.id()).await
    }

    /// Whether a component may use an LCT.
    pub async fn validate_lct_access(
        &self,
        lct_id: &LctId,
        real_id: &str,
        anonymous: bool,
    ) -> Result<AccessDecision, PairingError> {
        let component = self.component_ref(real_id, anonymous)?;
        self.handshake
            .validate_lct_access(lct_id, component.id())
            .await
    }

    /// Start a pairing, or queue it when a peer is unreachable.
    pub async fn pair(
        &self,
        creator: &str,
        request: PairRequest,
    ) -> Result<InitiateOutcome, PairingError> {
        let (component_a, component_b) = if request.anonymous {
            let registry = self.registry()?;
            let hash_a = self.digest(&request.component_a)?;
            let hash_b = self.digest(&request.component_b)?;
            let verdict = registry.verify_pairing(&hash_a, &hash_b).await?;
            if !verdict.can_pair {
                return Err(PairingError::invalid_input("components", verdict.reason));
            }
            (
                ComponentRef::anonymous(&hash_a),
                ComponentRef::anonymous(&hash_b),
            )
        } else {
            (
                ComponentRef::plain(request.component_a),
                ComponentRef::plain(request.component_b),
            )
        };

        let mut initiate = InitiateRequest::new(component_a, component_b, request.context);
        if let Some(proxy) = request.proxy_id {
            initiate = initiate.with_proxy(proxy);
        }
        if request.force_immediate {
            initiate = initiate.immediate();
        }

        let outcome = self.handshake.initiate(creator, initiate).await?;
        match &outcome {
            InitiateOutcome::Challenge(c) => {
                metric_inc!(PAIRINGS_INITIATED);
                info!(
                    "[runtime] Pairing {} <-> {} challenged as {}",
                    c.entity.component_a, c.entity.component_b, c.entity.challenge_id
                );
            }
            InitiateOutcome::Queued(r) => {
                metric_inc!(PAIRINGS_QUEUED);
                info!(
                    "[runtime] Pairing {} <-> {} queued on {}",
                    r.entity.component_a, r.entity.component_b, r.entity.queue_id
                );
            }
        }
        self.refresh_open_challenges();
        Ok(outcome)
    }

    /// Finish a handshake.
    pub async fn complete(
        &self,
        creator: &str,
        request: CompleteRequest,
    ) -> Result<PairingCompletion, PairingError> {
        let result = self.handshake.complete(creator, request).await;
        self.refresh_open_challenges();
        let completion = result?;
        metric_inc!(PAIRINGS_COMPLETED);
        Ok(completion)
    }

    /// Terminate an LCT.
    pub async fn revoke(
        &self,
        creator: &str,
        lct_id: &LctId,
        reason: &str,
        notify_offline: bool,
    ) -> Result<RevokeOutcome, PairingError> {
        let outcome = self
            .handshake
            .revoke(creator, lct_id, reason, notify_offline)
            .await?;
        if !outcome.already_terminated {
            metric_inc!(REVOCATIONS, &["lct"]);
        }
        Ok(outcome)
    }

    /// Drain one queue through the handshake.
    pub async fn process_queue(
        &self,
        processor: &str,
        queue_id: &QueueId,
        context: &str,
    ) -> Result<ProcessReport, PairingError> {
        let report = self
            .queue
            .process_offline(processor, queue_id, context, &self.gateway)
            .await?;
        record_report(&report);
        self.refresh_open_challenges();
        Ok(report)
    }

    /// Drain every queue holding `Queued` entries.
    pub async fn process_pending(
        &self,
        processor: &str,
        context: &str,
    ) -> Result<Vec<ProcessReport>, PairingError> {
        let mut reports = Vec::new();
        for queue_id in self.queue.pending_queue_ids() {
            reports.push(self.process_queue(processor, &queue_id, context).await?);
        }
        Ok(reports)
    }

    /// Expire stale challenges now.
    pub async fn expire_stale(&self, creator: &str) -> Result<Vec<ChallengeId>, PairingError> {
        let expired = self.handshake.expire_stale(creator).await?;
        CHALLENGES_EXPIRED.inc_by(expired.len() as f64);
        self.refresh_open_challenges();
        Ok(expired)
    }
}

fn record_report(report: &ProcessReport) {
    for (outcome, count) in [
        ("completed", report.completed()),
        ("failed", report.failed()),
        ("aborted", report.aborted()),
    ] {
        if count > 0 {
            QUEUE_ENTRIES_PROCESSED
                .with_label_values(&[outcome])
                .inc_by(count as f64);
        }
    }
    debug!(
        "[runtime] Queue {} processed: {} completed, {} failed, {} aborted",
        report.queue_id,
        report.completed(),
        report.failed(),
        report.aborted()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::NodeConfig;
    use shared_types::{
        Capabilities, ChallengeStatus, ErrorKind, LctStatus, MockLedger, RequestStatus,
        TransportKind,
    };

    fn container_with(config: NodeConfig) -> PairingContainer {
        let capabilities = Capabilities {
            kind: TransportKind::InProcess,
            push_updates: false,
            backend_version: "mock".into(),
        };
        PairingContainer::new(config, Arc::new(MockLedger::new()), capabilities).unwrap()
    }

    fn container() -> PairingContainer {
        container_with(NodeConfig::for_testing())
    }

    async fn register_pair(coordinator: &PairingCoordinator) {
        coordinator
            .register_anonymous("u1", "battery-001", "acme", "battery")
            .await
            .unwrap();
        coordinator
            .register_anonymous("u1", "motor-001", "acme", "motor")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_plain_pair_complete_revoke() {
        let container = container();
        let coordinator = PairingCoordinator::new(&container);
        coordinator.heartbeat("battery-001", false).unwrap();
        coordinator.heartbeat("motor-001", false).unwrap();

        let outcome = coordinator
            .pair("u1", PairRequest::new("battery-001", "motor-001", "ctx"))
            .await
            .unwrap();
        let challenge = outcome.challenge().cloned().unwrap();
        assert_eq!(challenge.status, ChallengeStatus::AwaitingAuth);

        let (auth_a, auth_b) = container.verifier.issue_pair(&challenge).unwrap();
        let completion = coordinator
            .complete(
                "u1",
                CompleteRequest {
                    challenge_id: challenge.challenge_id.clone(),
                    auth_a,
                    auth_b,
                    session_context: "session".into(),
                    access_rules: Default::default(),
                },
            )
            .await
            .unwrap();
        let lct_id = completion.lct.record().lct_id.clone();
        assert_eq!(completion.lct.record().status, LctStatus::Active);

        let revoked = coordinator.revoke("u1", &lct_id, "done", false).await.unwrap();
        assert!(!revoked.already_terminated);
        let again = coordinator.revoke("u1", &lct_id, "done", false).await.unwrap();
        assert!(again.already_terminated);
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_queued_then_processed() {
        let container = container();
        let coordinator = PairingCoordinator::new(&container);
        coordinator.heartbeat("battery-001", false).unwrap();

        let outcome = coordinator
            .pair(
                "u1",
                PairRequest::new("battery-001", "motor-001", "ctx").with_proxy("proxy-1"),
            )
            .await
            .unwrap();
        let queued = outcome.queued().cloned().unwrap();
        assert_eq!(queued.status, RequestStatus::Queued);

        let reports = coordinator.process_pending("proxy-1", "ctx").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].completed(), 1);

        let request = container.queue.get_request(&queued.request_id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Completed);
        assert!(request.challenge_id.is_some());
    }

    #[tokio::test]
    async fn test_anonymous_pair_uses_digests_only() {
        let container = container();
        let coordinator = PairingCoordinator::new(&container);
        register_pair(&coordinator).await;

        let outcome = coordinator
            .pair(
                "u1",
                PairRequest::new("battery-001", "motor-001", "ctx")
                    .anonymous()
                    .immediate(),
            )
            .await
            .unwrap();
        let challenge = outcome.challenge().unwrap();
        assert!(challenge.component_a.is_anonymous());
        assert!(challenge.component_b.is_anonymous());
        assert_ne!(challenge.component_a.id(), "battery-001");
        assert_eq!(
            challenge.component_a,
            coordinator.component_ref("battery-001", true).unwrap()
        );
    }

    #[tokio::test]
    async fn test_anonymous_rules_follow_the_lct() {
        let container = container();
        let coordinator = PairingCoordinator::new(&container);
        register_pair(&coordinator).await;
        let request = PairRequest::new("battery-001", "motor-001", "ctx")
            .anonymous()
            .immediate();

        let outcome = coordinator.pair("u1", request.clone()).await.unwrap();
        let challenge = outcome.challenge().cloned().unwrap();
        let (auth_a, auth_b) = container.verifier.issue_pair(&challenge).unwrap();
        let completion = coordinator
            .complete(
                "u1",
                CompleteRequest {
                    challenge_id: challenge.challenge_id.clone(),
                    auth_a,
                    auth_b,
                    session_context: "session".into(),
                    access_rules: Default::default(),
                },
            )
            .await
            .unwrap();
        let lct_id = completion.lct.record().lct_id.clone();

        let lcts = coordinator.component_lcts("motor-001", true).await.unwrap();
        assert_eq!(lcts.len(), 1);
        assert_eq!(lcts[0].lct_id, lct_id);
        let access = coordinator
            .validate_lct_access(&lct_id, "battery-001", true)
            .await
            .unwrap();
        assert_eq!(access.access_level.as_deref(), Some("standard"));
        let plain = coordinator
            .validate_lct_access(&lct_id, "battery-001", false)
            .await
            .unwrap();
        assert!(!plain.granted);

        let mut rules = PairingRules::new(lct_id);
        rules.outbound = Some(Vec::new());
        coordinator
            .update_authorization("u1", "battery-001", rules)
            .await
            .unwrap();
        let check = coordinator
            .check_pairing_auth("battery-001", "motor-001")
            .await
            .unwrap();
        assert_eq!(check.reason, "component_a cannot pair with component_b");

        let err = coordinator.pair("u1", request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(coordinator
            .list_authorized_partners("battery-001")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_pair_requires_registration() {
        let container = container();
        let coordinator = PairingCoordinator::new(&container);

        let err = coordinator
            .pair(
                "u1",
                PairRequest::new("battery-001", "motor-001", "ctx")
                    .anonymous()
                    .immediate(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(container.handshake.challenge_count(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_heartbeat_feeds_liveness() {
        let container = container();
        let coordinator = PairingCoordinator::new(&container);
        register_pair(&coordinator).await;
        coordinator.heartbeat("battery-001", true).unwrap();
        coordinator.heartbeat("motor-001", true).unwrap();

        let outcome = coordinator
            .pair(
                "u1",
                PairRequest::new("battery-001", "motor-001", "ctx").anonymous(),
            )
            .await
            .unwrap();
        assert!(!outcome.is_queued());
    }

    #[tokio::test]
    async fn test_anonymous_mode_disabled_without_salt() {
        let mut config = NodeConfig::for_testing();
        config.hasher.salt = None;
        let container = container_with(config);
        let coordinator = PairingCoordinator::new(&container);

        let err = coordinator.component_ref("battery-001", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(coordinator.component_ref("battery-001", false).is_ok());
    }
}
