//! # Identity Hasher
//!
//! `digest = HMAC-SHA256(salt, tag || len(context) || context || len(id) || id)`
//!
//! Length prefixes keep `("ab", "c")` and `("a", "bc")` apart. Each digest of
//! a registration is computed over its own [`Namespace`], so knowing the
//! component digest reveals nothing about the manufacturer digest.

use crate::domain::{AnonymousIdentity, HasherConfig};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared_types::{ComponentRef, IdentityDigest, PairingError};
use std::fmt;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Domain separation tag, bumped if the construction ever changes.
const DIGEST_TAG: &[u8] = b"pl-identity-v1";

/// Which identifier a digest stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Physical component serial.
    Component,
    /// Manufacturer identifier.
    Manufacturer,
    /// Component category.
    Category,
    /// Party issuing a revocation.
    Initiator,
}

impl Namespace {
    /// Tag mixed into the context.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Component => "component",
            Namespace::Manufacturer => "manufacturer",
            Namespace::Category => "category",
            Namespace::Initiator => "initiator",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic, non-invertible digest of `real_id`.
///
/// # Errors
///
/// - `InvalidInput` if `real_id` is empty
/// - `Configuration` if `salt` or `context` is empty
pub fn hash(real_id: &str, salt: &str, context: &str) -> Result<IdentityDigest, PairingError> {
    if real_id.trim().is_empty() {
        return Err(PairingError::invalid_input("real_id", "identifier is empty"));
    }
    if salt.is_empty() {
        return Err(PairingError::Configuration("hash salt is empty".into()));
    }
    if context.is_empty() {
        return Err(PairingError::Configuration("hash context is empty".into()));
    }

    let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
        .map_err(|e| PairingError::Configuration(format!("invalid hash salt: {e}")))?;
    mac.update(DIGEST_TAG);
    mac.update(&(context.len() as u64).to_be_bytes());
    mac.update(context.as_bytes());
    mac.update(&(real_id.len() as u64).to_be_bytes());
    mac.update(real_id.as_bytes());

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&mac.finalize().into_bytes());
    Ok(IdentityDigest::from_bytes(&bytes))
}

/// Digest of `real_id` inside `namespace`.
pub fn hash_namespaced(
    namespace: Namespace,
    real_id: &str,
    salt: &str,
    context: &str,
) -> Result<IdentityDigest, PairingError> {
    if context.is_empty() {
        return Err(PairingError::Configuration("hash context is empty".into()));
    }
    hash(real_id, salt, &format!("{namespace}/{context}"))
}

/// Hasher bound to the process-wide salt and context.
#[derive(Clone)]
pub struct IdentityHasher {
    salt: Zeroizing<String>,
    context: String,
}

impl IdentityHasher {
    /// Build from configuration.
    ///
    /// Fails with `Configuration` when the salt or context is missing.
    pub fn new(config: &HasherConfig) -> Result<Self, PairingError> {
        let salt = config
            .salt
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PairingError::Configuration("PL_HASH_SALT is not set".into()))?;
        let context = config
            .context
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PairingError::Configuration("PL_HASH_CONTEXT is not set".into()))?;
        Ok(Self {
            salt: Zeroizing::new(salt.to_string()),
            context: context.to_string(),
        })
    }

    /// Deployment context.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Digest inside `namespace`.
    pub fn derive(&self, namespace: Namespace, real_id: &str) -> Result<IdentityDigest, PairingError> {
        hash_namespaced(namespace, real_id, &self.salt, &self.context)
    }

    /// Hash-only reference to a component.
    pub fn component_ref(&self, real_component_id: &str) -> Result<ComponentRef, PairingError> {
        let digest = self.derive(Namespace::Component, real_component_id)?;
        Ok(ComponentRef::anonymous(&digest))
    }

    /// All three digests of a registration.
    pub fn identity(
        &self,
        real_component_id: &str,
        manufacturer_id: &str,
        category: &str,
    ) -> Result<AnonymousIdentity, PairingError> {
        let component_hash = self
            .derive(Namespace::Component, real_component_id)
            .map_err(|e| rename_field(e, "real_component_id"))?;
        let manufacturer_hash = self
            .derive(Namespace::Manufacturer, manufacturer_id)
            .map_err(|e| rename_field(e, "manufacturer_id"))?;
        let category_hash = self
            .derive(Namespace::Category, category)
            .map_err(|e| rename_field(e, "category"))?;
        Ok(AnonymousIdentity::new(
            component_hash,
            manufacturer_hash,
            category_hash,
            real_component_id,
        ))
    }
}

impl fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityHasher")
            .field("salt", &"***")
            .field("context", &self.context)
            .finish()
    }
}

fn rename_field(err: PairingError, field: &str) -> PairingError {
    match err {
        PairingError::InvalidInput { reason, .. } => PairingError::invalid_input(field, reason),
        other => other,
    }
}
