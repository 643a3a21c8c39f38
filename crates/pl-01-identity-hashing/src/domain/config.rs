//! # Hasher Configuration
//!
//! Process-wide salt and context for anonymous digests.

use serde::{Deserialize, Serialize};
use std::env;

/// Salt and context shared by every digest in the process.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HasherConfig {
    /// Secret salt (HMAC key).
    pub salt: Option<String>,
    /// Deployment context mixed into every digest.
    pub context: Option<String>,
}

impl HasherConfig {
    /// Build from explicit values.
    pub fn new(salt: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            salt: Some(salt.into()),
            context: Some(context.into()),
        }
    }

    /// Load from `PL_HASH_SALT` and `PL_HASH_CONTEXT`.
    pub fn from_env() -> Self {
        Self {
            salt: env::var("PL_HASH_SALT").ok(),
            context: env::var("PL_HASH_CONTEXT").ok(),
        }
    }

    /// Fill unset fields from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        let from_env = Self::from_env();
        if from_env.salt.is_some() {
            self.salt = from_env.salt;
        }
        if from_env.context.is_some() {
            self.context = from_env.context;
        }
        self
    }

    /// Fixed values for tests.
    pub fn for_testing() -> Self {
        Self::new("test-salt-0123456789", "test-fleet")
    }
}

impl std::fmt::Debug for HasherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HasherConfig")
            .field("salt", &self.salt.as_ref().map(|_| "***"))
            .field("context", &self.context)
            .finish()
    }
}

/// Registry policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Trust requirement used when an authorization does not name one.
    pub default_trust_requirement: f64,
    /// Lifetime of a pairing authorization in seconds.
    pub authorization_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_trust_requirement: 0.7,
            authorization_ttl_secs: 365 * 24 * 60 * 60,
        }
    }
}
