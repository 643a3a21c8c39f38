//! # Inbound Ports
//!
//! What the anonymous registry can do.

use crate::domain::{AnonymousIdentity, PairingAuthCheck, PairingVerdict, RevocationRequest};
use async_trait::async_trait;
use shared_types::{
    AnonymousComponentRecord, Committed, ComponentRules, IdentityDigest, PairingAuthorization,
    PairingError, PairingRules, RevocationEvent,
};

/// Anonymous registry API - inbound port.
#[async_trait]
pub trait AnonymousRegistryApi: Send + Sync {
    /// Hash and register a component. The returned identity keeps the real
    /// id; only the hashes reach the ledger.
    async fn register(
        &self,
        creator: &str,
        real_component_id: &str,
        manufacturer_id: &str,
        category: &str,
    ) -> Result<Committed<AnonymousIdentity>, PairingError>;

    /// Registered record by component hash.
    async fn lookup(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<AnonymousComponentRecord, PairingError>;

    /// Whether two hashes may pair: both registered, neither revoked, and
    /// each accepted by the other's pairing rules.
    async fn verify_pairing(
        &self,
        hash_a: &IdentityDigest,
        hash_b: &IdentityDigest,
    ) -> Result<PairingVerdict, PairingError>;

    /// Pre-authorize a pair of registered hashes.
    async fn authorize_pairing(
        &self,
        creator: &str,
        hash_a: &IdentityDigest,
        hash_b: &IdentityDigest,
        rule_hash: &str,
        trust_requirement: Option<f64>,
    ) -> Result<Committed<PairingAuthorization>, PairingError>;

    /// Replace a component's pairing rules. The rules must name an active
    /// LCT the component is part of.
    async fn update_authorization(
        &self,
        creator: &str,
        component_hash: &IdentityDigest,
        rules: PairingRules,
    ) -> Result<Committed<ComponentRules>, PairingError>;

    /// Check both directions of a pairing against each side's rules.
    async fn check_pairing_auth(
        &self,
        hash_a: &IdentityDigest,
        hash_b: &IdentityDigest,
    ) -> Result<PairingAuthCheck, PairingError>;

    /// Partner categories a component accepts for pairings it starts.
    /// Empty when its rules do not restrict them.
    async fn list_authorized_partners(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<Vec<IdentityDigest>, PairingError>;

    /// Revoke a registered component.
    async fn revoke(
        &self,
        creator: &str,
        request: RevocationRequest,
    ) -> Result<Committed<RevocationEvent>, PairingError>;
}
