//! # Anonymous Registry Service
//!
//! Registers hashed component identities and answers pairing questions about
//! them. Only digests are ever journalled on the ledger.
//!
//! Pairing rules are read from the ledger on every check, so a rule change
//! made through another node applies at once.

use crate::algorithms::{IdentityHasher, Namespace};
use crate::domain::{
    AnonymousIdentity, PairingAuthCheck, PairingVerdict, RegistryConfig, RevocationRequest,
};
use crate::ports::AnonymousRegistryApi;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::{
    AnonymousComponentRecord, AuthorizationId, AuthorizationStatus, Committed, ComponentRules,
    EntityKind, IdentityDigest, LctStatus, LedgerCall, LedgerTransport, PairingAuthorization,
    PairingDirection, PairingError, PairingRules, RevocationEvent, RevocationId,
    SystemTimeSource, TimeSource, TransportError,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Committed registration: the identity (real id included) plus its receipt.
pub type Registration = Committed<AnonymousIdentity>;

/// Anonymous component registry.
pub struct AnonymousRegistry {
    hasher: IdentityHasher,
    ledger: Arc<dyn LedgerTransport>,
    clock: Arc<dyn TimeSource>,
    config: RegistryConfig,
    components: DashMap<IdentityDigest, AnonymousComponentRecord>,
    revoked: DashMap<IdentityDigest, RevocationId>,
}

impl AnonymousRegistry {
    /// Create a registry on the system clock.
    pub fn new(
        hasher: IdentityHasher,
        ledger: Arc<dyn LedgerTransport>,
        config: RegistryConfig,
    ) -> Self {
        Self::with_clock(hasher, ledger, config, Arc::new(SystemTimeSource))
    }

    /// Create a registry with an explicit clock.
    pub fn with_clock(
        hasher: IdentityHasher,
        ledger: Arc<dyn LedgerTransport>,
        config: RegistryConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            hasher,
            ledger,
            clock,
            config,
            components: DashMap::new(),
            revoked: DashMap::new(),
        }
    }

    /// Hasher used for registrations.
    pub fn hasher(&self) -> &IdentityHasher {
        &self.hasher
    }

    /// Number of live registrations.
    pub fn registered_count(&self) -> usize {
        self.components.len()
    }

    /// Whether `hash` has been revoked.
    pub fn is_revoked(&self, hash: &IdentityDigest) -> bool {
        self.revoked.contains_key(hash)
    }

    fn creator(creator: &str) -> Result<(), PairingError> {
        if creator.trim().is_empty() {
            return Err(PairingError::invalid_input("creator", "creator is empty"));
        }
        Ok(())
    }

    /// Journalled rules of `hash`, `None` when it has none.
    async fn rules_of(&self, hash: &IdentityDigest) -> Result<Option<PairingRules>, PairingError> {
        match self.ledger.get_component_rules(hash).await {
            Ok(stored) => Ok(Some(stored.rules)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Lookup that reports an absent component as `None`.
    async fn registered(
        &self,
        hash: &IdentityDigest,
    ) -> Result<Option<AnonymousComponentRecord>, PairingError> {
        match self.lookup(hash).await {
            Ok(record) => Ok(Some(record)),
            Err(PairingError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Trust floor demanded by the stricter of two rule sets.
    async fn level_floor(
        &self,
        hash_a: &IdentityDigest,
        hash_b: &IdentityDigest,
    ) -> Result<f64, PairingError> {
        let mut floor: f64 = 0.0;
        for hash in [hash_a, hash_b] {
            if let Some(rules) = self.rules_of(hash).await? {
                floor = floor.max(rules.authorization_level.min_trust());
            }
        }
        Ok(floor)
    }
}

fn read_error(kind: EntityKind, id: &IdentityDigest, err: TransportError) -> PairingError {
    if err.is_not_found() {
        PairingError::not_found(kind, id)
    } else {
        PairingError::TransportFailure(err)
    }
}

#[async_trait]
impl AnonymousRegistryApi for AnonymousRegistry {
    async fn register(
        &self,
        creator: &str,
        real_component_id: &str,
        manufacturer_id: &str,
        category: &str,
    ) -> Result<Registration, PairingError> {
        Self::creator(creator)?;
        let identity = self
            .hasher
            .identity(real_component_id, manufacturer_id, category)?;
        let hash = identity.component_hash().clone();

        if let Some(revocation) = self.revoked.get(&hash) {
            return Err(PairingError::invalid_state(
                EntityKind::Component,
                &hash,
                format!("revoked by {}", revocation.value()),
                "register",
            ));
        }

        let record = identity.record(self.clock.now());
        // Reserve the slot so a concurrent register of the same id loses.
        match self.components.entry(hash.clone()) {
            Entry::Occupied(_) => {
                return Err(PairingError::invalid_state(
                    EntityKind::Component,
                    &hash,
                    "registered",
                    "register",
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        let call = LedgerCall::new(creator, self.hasher.context(), record);
        match self.ledger.register_anonymous_component(call).await {
            Ok(committed) => {
                info!(
                    "[pl-01] Registered anonymous component {} (tx {})",
                    hash, committed.receipt.tx_hash
                );
                Ok(Committed {
                    entity: identity,
                    receipt: committed.receipt,
                })
            }
            Err(e) => {
                self.components.remove(&hash);
                warn!("[pl-01] Registration of {} not journalled: {}", hash, e);
                Err(e.into())
            }
        }
    }

    async fn lookup(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<AnonymousComponentRecord, PairingError> {
        if self.revoked.contains_key(component_hash) {
            return Err(PairingError::not_found(EntityKind::Component, component_hash));
        }
        if let Some(record) = self.components.get(component_hash) {
            return Ok(record.clone());
        }
        debug!("[pl-01] {} not cached, asking ledger", component_hash);
        self.ledger
            .get_anonymous_component(component_hash)
            .await
            .map_err(|e| read_error(EntityKind::Component, component_hash, e))
    }

    async fn verify_pairing(
        &self,
        hash_a: &IdentityDigest,
        hash_b: &IdentityDigest,
    ) -> Result<PairingVerdict, PairingError> {
        if hash_a == hash_b {
            return Ok(PairingVerdict::deny("a component cannot pair with itself"));
        }
        for hash in [hash_a, hash_b] {
            if self.revoked.contains_key(hash) {
                return Ok(PairingVerdict::deny(format!("component {hash} is revoked")));
            }
            if self.registered(hash).await?.is_none() {
                return Ok(PairingVerdict::deny(format!(
                    "component {hash} is not registered"
                )));
            }
        }
        let check = self.check_pairing_auth(hash_a, hash_b).await?;
        if !check.mutual() {
            return Ok(PairingVerdict::deny(check.reason));
        }
        Ok(PairingVerdict::allow())
    }

    async fn authorize_pairing(
        &self,
        creator: &str,
        hash_a: &IdentityDigest,
        hash_b: &IdentityDigest,
        rule_hash: &str,
        trust_requirement: Option<f64>,
    ) -> Result<Committed<PairingAuthorization>, PairingError> {
        Self::creator(creator)?;
        let requirement = match trust_requirement {
            Some(requirement) => requirement,
            None => self
                .config
                .default_trust_requirement
                .max(self.level_floor(hash_a, hash_b).await?),
        };
        if !requirement.is_finite() || !(0.0..=1.0).contains(&requirement) {
            return Err(PairingError::InvalidScore(requirement));
        }
        if rule_hash.trim().is_empty() {
            return Err(PairingError::invalid_input("rule_hash", "rule hash is empty"));
        }

        let verdict = self.verify_pairing(hash_a, hash_b).await?;
        if !verdict.can_pair {
            return Err(PairingError::invalid_input("component_hashes", verdict.reason));
        }

        let now = self.clock.now();
        let authorization = PairingAuthorization {
            auth_id: AuthorizationId::generate(),
            component_hash_a: hash_a.clone(),
            component_hash_b: hash_b.clone(),
            rule_hash: rule_hash.to_string(),
            trust_requirement: requirement,
            status: AuthorizationStatus::Active,
            created_at: now,
            expires_at: now.saturating_add(self.config.authorization_ttl_secs),
        };
        let call = LedgerCall::new(creator, self.hasher.context(), authorization);
        let committed = self.ledger.authorize_anonymous_pairing(call).await?;
        info!(
            "[pl-01] Authorized pairing {} (requirement {:.2})",
            committed.entity.auth_id, requirement
        );
        Ok(committed)
    }

    async fn update_authorization(
        &self,
        creator: &str,
        component_hash: &IdentityDigest,
        rules: PairingRules,
    ) -> Result<Committed<ComponentRules>, PairingError> {
        Self::creator(creator)?;
        if rules.lct_id.as_str().trim().is_empty() {
            return Err(PairingError::invalid_input("lct_id", "lct id is empty"));
        }
        if rules.context.trim().is_empty() {
            return Err(PairingError::invalid_input("context", "context is empty"));
        }
        self.lookup(component_hash).await?;

        let lct = self
            .ledger
            .get_lct(&rules.lct_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    PairingError::not_found(EntityKind::Lct, &rules.lct_id)
                } else {
                    PairingError::TransportFailure(e)
                }
            })?;
        let hash = component_hash.as_str();
        if lct.component_a.id() != hash && lct.component_b.id() != hash {
            return Err(PairingError::invalid_input(
                "lct_id",
                format!("lct {} does not pair component {}", lct.lct_id, component_hash),
            ));
        }
        if lct.status != LctStatus::Active {
            return Err(PairingError::invalid_state(
                EntityKind::Lct,
                &lct.lct_id,
                lct.status,
                "update_authorization",
            ));
        }

        let context = rules.context.clone();
        let stored = ComponentRules {
            component_hash: component_hash.clone(),
            rules,
            updated_at: self.clock.now(),
        };
        let call = LedgerCall::new(creator, context, stored);
        let committed = self.ledger.set_component_rules(call).await?;
        info!(
            "[pl-01] Updated pairing rules of {} ({:?} under {})",
            component_hash,
            committed.entity.rules.authorization_level,
            committed.entity.rules.lct_id
        );
        Ok(committed)
    }

    async fn check_pairing_auth(
        &self,
        hash_a: &IdentityDigest,
        hash_b: &IdentityDigest,
    ) -> Result<PairingAuthCheck, PairingError> {
        if self.revoked.contains_key(hash_a) || self.revoked.contains_key(hash_b) {
            return Ok(PairingAuthCheck::refused(
                "one or both components are not active",
            ));
        }
        let Some(a) = self.registered(hash_a).await? else {
            return Ok(PairingAuthCheck::refused("component_a not found"));
        };
        let Some(b) = self.registered(hash_b).await? else {
            return Ok(PairingAuthCheck::refused("component_b not found"));
        };

        let a_can_pair_b = self
            .rules_of(hash_a)
            .await?
            .map_or(true, |rules| rules.accepts(&b.category_hash, PairingDirection::Outbound));
        let b_can_pair_a = self
            .rules_of(hash_b)
            .await?
            .map_or(true, |rules| rules.accepts(&a.category_hash, PairingDirection::Inbound));
        Ok(PairingAuthCheck::decided(a_can_pair_b, b_can_pair_a))
    }

    async fn list_authorized_partners(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<Vec<IdentityDigest>, PairingError> {
        self.lookup(component_hash).await?;
        Ok(self
            .rules_of(component_hash)
            .await?
            .map(|rules| rules.partner_categories())
            .unwrap_or_default())
    }

    async fn revoke(
        &self,
        creator: &str,
        request: RevocationRequest,
    ) -> Result<Committed<RevocationEvent>, PairingError> {
        Self::creator(creator)?;
        if request.reason_category.trim().is_empty() {
            return Err(PairingError::invalid_input(
                "reason_category",
                "reason category is empty",
            ));
        }
        let initiator_hash = self
            .hasher
            .derive(Namespace::Initiator, &request.initiator_id)
            .map_err(|e| match e {
                PairingError::InvalidInput { reason, .. } => {
                    PairingError::invalid_input("initiator_id", reason)
                }
                other => other,
            })?;

        let Some((target, record)) = self.components.remove(&request.target_hash) else {
            return Err(PairingError::not_found(
                EntityKind::Component,
                &request.target_hash,
            ));
        };

        let event = RevocationEvent {
            revocation_id: RevocationId::generate(),
            target_hash: target.clone(),
            revocation_type: request.revocation_type,
            urgency: request.urgency,
            reason_category: request.reason_category,
            initiator_hash,
            effective_at: self.clock.now(),
        };
        let call = LedgerCall::new(creator, self.hasher.context(), event);
        match self.ledger.revoke_anonymous_component(call).await {
            Ok(committed) => {
                self.revoked
                    .insert(target.clone(), committed.entity.revocation_id.clone());
                info!(
                    "[pl-01] Revoked component {} ({:?}, {:?})",
                    target, committed.entity.revocation_type, committed.entity.urgency
                );
                Ok(committed)
            }
            Err(e) => {
                self.components.insert(target, record);
                Err(e.into())
            }
        }
    }
}
