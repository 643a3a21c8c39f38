//! # Algorithms
//!
//! Score update policies.

pub mod policy;

pub use policy::{policy_from_config, FixedStepPolicy, LearningRatePolicy, TrustPolicy};
