//! # Subsystem Container
//!
//! Central container holding all pairing subsystem instances with proper
//! lifetime management and dependency injection.
//!
//! ## Architecture Compliance
//!
//! - Subsystems initialized in dependency order (Level 0 → Level 3)
//! - Subsystems never reference each other; bridges implement their ports
//! - The ledger transport is the only shared infrastructure

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NodeConfig, RuntimeConfig};
pub use subsystems::{ContainerError, PairingContainer};
