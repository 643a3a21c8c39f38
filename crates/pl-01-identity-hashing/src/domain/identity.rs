//! # Anonymous Identity
//!
//! Binds a real component id to its three digests. The real id stays with
//! the issuing party: the type is not serializable and zeroizes on drop.

use shared_types::{
    AnonymousComponentRecord, ComponentRef, IdentityDigest, RevocationType, UrgencyLevel,
};
use zeroize::Zeroizing;

/// Digests of a registered component plus the issuer-held real id.
#[derive(Clone)]
pub struct AnonymousIdentity {
    component_hash: IdentityDigest,
    manufacturer_hash: IdentityDigest,
    category_hash: IdentityDigest,
    real_component_id: Zeroizing<String>,
}

impl AnonymousIdentity {
    /// Assemble from already computed digests.
    pub fn new(
        component_hash: IdentityDigest,
        manufacturer_hash: IdentityDigest,
        category_hash: IdentityDigest,
        real_component_id: impl Into<String>,
    ) -> Self {
        Self {
            component_hash,
            manufacturer_hash,
            category_hash,
            real_component_id: Zeroizing::new(real_component_id.into()),
        }
    }

    /// Component digest.
    pub fn component_hash(&self) -> &IdentityDigest {
        &self.component_hash
    }

    /// Manufacturer digest.
    pub fn manufacturer_hash(&self) -> &IdentityDigest {
        &self.manufacturer_hash
    }

    /// Category digest.
    pub fn category_hash(&self) -> &IdentityDigest {
        &self.category_hash
    }

    /// Real component id. Never send this across a transport.
    pub fn real_component_id(&self) -> &str {
        &self.real_component_id
    }

    /// Hash-only reference usable in a handshake.
    pub fn component_ref(&self) -> ComponentRef {
        ComponentRef::anonymous(&self.component_hash)
    }

    /// Ledger record (hashes only).
    pub fn record(&self, registered_at: u64) -> AnonymousComponentRecord {
        AnonymousComponentRecord {
            component_hash: self.component_hash.clone(),
            manufacturer_hash: self.manufacturer_hash.clone(),
            category_hash: self.category_hash.clone(),
            registered_at,
        }
    }
}

impl std::fmt::Debug for AnonymousIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnonymousIdentity")
            .field("component_hash", &self.component_hash)
            .field("manufacturer_hash", &self.manufacturer_hash)
            .field("category_hash", &self.category_hash)
            .field("real_component_id", &"***")
            .finish()
    }
}

/// Result of checking whether two anonymous components may pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingVerdict {
    /// Whether pairing is allowed.
    pub can_pair: bool,
    /// Human-readable explanation.
    pub reason: String,
}

impl PairingVerdict {
    pub(crate) fn allow() -> Self {
        Self {
            can_pair: true,
            reason: "both components registered".into(),
        }
    }

    pub(crate) fn deny(reason: impl Into<String>) -> Self {
        Self {
            can_pair: false,
            reason: reason.into(),
        }
    }
}

/// Whether each side of a pair accepts the other under its pairing rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingAuthCheck {
    /// A accepts B as a partner for pairings A starts.
    pub a_can_pair_b: bool,
    /// B accepts A as a partner for pairings B answers.
    pub b_can_pair_a: bool,
    /// Human-readable explanation.
    pub reason: String,
}

impl PairingAuthCheck {
    pub(crate) fn refused(reason: impl Into<String>) -> Self {
        Self {
            a_can_pair_b: false,
            b_can_pair_a: false,
            reason: reason.into(),
        }
    }

    pub(crate) fn decided(a_can_pair_b: bool, b_can_pair_a: bool) -> Self {
        let reason = match (a_can_pair_b, b_can_pair_a) {
            (true, true) => "authorization check completed",
            (false, false) => "neither component has pairing authorization",
            (false, true) => "component_a cannot pair with component_b",
            (true, false) => "component_b cannot pair with component_a",
        };
        Self {
            a_can_pair_b,
            b_can_pair_a,
            reason: reason.into(),
        }
    }

    /// Both directions are allowed.
    pub fn mutual(&self) -> bool {
        self.a_can_pair_b && self.b_can_pair_a
    }
}

/// Parameters of an anonymous revocation.
#[derive(Clone, Debug)]
pub struct RevocationRequest {
    /// Component to revoke.
    pub target_hash: IdentityDigest,
    /// Scope.
    pub revocation_type: RevocationType,
    /// Urgency.
    pub urgency: UrgencyLevel,
    /// Reason category, e.g. "safety_recall".
    pub reason_category: String,
    /// Real id of the revoking party; only its digest is recorded.
    pub initiator_id: String,
}
