//! # Trust Update Policies
//!
//! A policy maps `(score, evidence, outcome)` to the next score. The service
//! clamps the result, so policies may overshoot.

use crate::domain::PolicyConfig;
use shared_types::PairingOutcome;
use std::sync::Arc;

/// Score update rule.
pub trait TrustPolicy: Send + Sync {
    /// Policy name for logs.
    fn name(&self) -> &'static str;

    /// Next (unclamped) score.
    fn next_score(&self, score: f64, evidence_count: u64, outcome: PairingOutcome) -> f64;
}

/// Additive reward and penalty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedStepPolicy {
    /// Added on success.
    pub reward: f64,
    /// Subtracted otherwise.
    pub penalty: f64,
}

impl TrustPolicy for FixedStepPolicy {
    fn name(&self) -> &'static str {
        "fixed_step"
    }

    fn next_score(&self, score: f64, _evidence_count: u64, outcome: PairingOutcome) -> f64 {
        match outcome {
            PairingOutcome::Completed => score + self.reward,
            PairingOutcome::Revoked | PairingOutcome::Failed => score - self.penalty,
        }
    }
}

/// Evidence-weighted move toward the outcome target.
///
/// `rate = clamp(1 / (1 + evidence / 10), 0.01, 0.5)` and
/// `score' = score + (target - score) * rate`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LearningRatePolicy;

impl LearningRatePolicy {
    /// Minimum rate.
    pub const MIN_RATE: f64 = 0.01;
    /// Maximum rate.
    pub const MAX_RATE: f64 = 0.5;

    /// Rate for a given amount of evidence.
    pub fn rate(evidence_count: u64) -> f64 {
        let rate = 1.0 / (1.0 + evidence_count as f64 / 10.0);
        rate.clamp(Self::MIN_RATE, Self::MAX_RATE)
    }
}

impl TrustPolicy for LearningRatePolicy {
    fn name(&self) -> &'static str {
        "learning_rate"
    }

    fn next_score(&self, score: f64, evidence_count: u64, outcome: PairingOutcome) -> f64 {
        let target = outcome.target_score();
        score + (target - score) * Self::rate(evidence_count)
    }
}

/// Build the configured policy.
pub fn policy_from_config(config: &PolicyConfig) -> Arc<dyn TrustPolicy> {
    match *config {
        PolicyConfig::FixedStep { reward, penalty } => Arc::new(FixedStepPolicy { reward, penalty }),
        PolicyConfig::LearningRate => Arc::new(LearningRatePolicy),
    }
}
