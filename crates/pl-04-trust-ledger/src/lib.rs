//! # PL-04 Trust Ledger
//!
//! Per-pair trust tensors fed by pairing outcomes.
//!
//! **Subsystem ID:** 04
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every pair of components that has paired in a given context owns one
//! [`TrustTensor`](shared_types::TrustTensor). Completed pairings pull its
//! score toward 1.0, revocations and failures toward 0.0. How far each
//! outcome moves the score is decided by a pluggable [`TrustPolicy`].
//!
//! ## Concurrency
//!
//! Updates to one tensor are linearised by a per-tensor async mutex that is
//! held across the journal write, so N concurrent updates always produce an
//! evidence count of N.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use algorithms::{FixedStepPolicy, LearningRatePolicy, TrustPolicy};
pub use domain::{PairKey, PolicyConfig, TrustConfig};
pub use ports::TrustLedgerApi;
pub use service::TrustLedgerService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
