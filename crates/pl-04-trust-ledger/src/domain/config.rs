//! # Trust Configuration

use serde::{Deserialize, Serialize};
use shared_types::PairingError;

/// Which update policy the ledger applies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Constant reward on success, constant penalty otherwise.
    FixedStep {
        /// Added on a completed pairing.
        reward: f64,
        /// Subtracted on a revocation or failure.
        penalty: f64,
    },
    /// Move toward the outcome target, slower as evidence accumulates.
    #[default]
    LearningRate,
}

/// Trust ledger configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Score of a tensor created implicitly by a first outcome.
    pub initial_score: f64,
    /// Update policy.
    pub policy: PolicyConfig,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            initial_score: 0.5,
            policy: PolicyConfig::default(),
        }
    }
}

impl TrustConfig {
    /// Deterministic fixed steps for tests.
    pub fn for_testing() -> Self {
        Self {
            initial_score: 0.5,
            policy: PolicyConfig::FixedStep {
                reward: 0.1,
                penalty: 0.2,
            },
        }
    }

    /// Check bounds.
    pub fn validate(&self) -> Result<(), PairingError> {
        if !in_unit_range(self.initial_score) {
            return Err(PairingError::InvalidScore(self.initial_score));
        }
        if let PolicyConfig::FixedStep { reward, penalty } = self.policy {
            if !in_unit_range(reward) || !in_unit_range(penalty) {
                return Err(PairingError::Configuration(format!(
                    "fixed step reward {reward} and penalty {penalty} must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Finite and within [0, 1].
pub(crate) fn in_unit_range(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
