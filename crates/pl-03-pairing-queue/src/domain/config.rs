//! # Queue Configuration

use serde::{Deserialize, Serialize};
use shared_types::PairingError;

/// Pairing queue configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of live (queued or processing) entries per queue.
    pub max_entries_per_queue: usize,
    /// Finished entries kept per queue for listing; older ones are pruned
    /// and remain readable from the ledger.
    pub retained_finished_per_queue: usize,
    /// Failed share of processed entries at which health becomes `Warning`.
    pub warning_failure_ratio: f64,
    /// Failed share of processed entries at which health becomes `Critical`.
    pub critical_failure_ratio: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_entries_per_queue: 10_000,
            retained_finished_per_queue: 1_000,
            warning_failure_ratio: 0.2,
            critical_failure_ratio: 0.5,
        }
    }
}

impl QueueConfig {
    /// Small queues for tests.
    pub fn for_testing() -> Self {
        Self {
            max_entries_per_queue: 16,
            retained_finished_per_queue: 8,
            ..Self::default()
        }
    }

    /// Check thresholds.
    pub fn validate(&self) -> Result<(), PairingError> {
        if self.max_entries_per_queue == 0 {
            return Err(PairingError::Configuration(
                "max_entries_per_queue must be positive".into(),
            ));
        }
        let ordered = 0.0 <= self.warning_failure_ratio
            && self.warning_failure_ratio <= self.critical_failure_ratio
            && self.critical_failure_ratio <= 1.0;
        if !ordered {
            return Err(PairingError::Configuration(format!(
                "failure ratios must satisfy 0 <= warning ({}) <= critical ({}) <= 1",
                self.warning_failure_ratio, self.critical_failure_ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(QueueConfig::default().validate().is_ok());
        assert!(QueueConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_inverted_ratios_rejected() {
        let config = QueueConfig {
            warning_failure_ratio: 0.8,
            critical_failure_ratio: 0.4,
            ..QueueConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
