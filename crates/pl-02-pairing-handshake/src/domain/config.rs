//! Handshake configuration.

use serde::{Deserialize, Serialize};
use shared_types::PairingError;
use std::time::Duration;

/// Handshake policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Seconds a challenge stays answerable.
    pub challenge_ttl_secs: u64,
    /// Count both sides as acknowledged once the challenge is recorded.
    pub auto_acknowledge: bool,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_secs: 300,
            auto_acknowledge: true,
        }
    }
}

impl HandshakeConfig {
    /// Challenge lifetime.
    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    /// Short deadline for tests.
    pub fn for_testing() -> Self {
        Self {
            challenge_ttl_secs: 60,
            auto_acknowledge: true,
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), PairingError> {
        if self.challenge_ttl_secs == 0 {
            return Err(PairingError::Configuration(
                "challenge_ttl_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
