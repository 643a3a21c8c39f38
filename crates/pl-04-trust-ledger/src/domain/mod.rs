//! # Domain Module
//!
//! Trust configuration and the pair index key.

pub mod config;
pub mod pair;

pub use config::{PolicyConfig, TrustConfig};
pub use pair::PairKey;
