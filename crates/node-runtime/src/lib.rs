//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Architectural Patterns
//!
//! - **DDD (Domain-Driven Design)**: Each subsystem owns its domain logic
//! - **Hexagonal Architecture**: Ports define contracts, Adapters implement them
//! - **Single journal**: Every subsystem writes through one `LedgerTransport`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod container;
pub mod wiring;

// Re-exports
pub use adapters::{ChannelNotifier, HandshakeBridge, HeartbeatLiveness, QueueBridge, TrustBridge};
pub use container::{ConfigError, ContainerError, NodeConfig, PairingContainer, RuntimeConfig};
pub use wiring::{spawn_expiry_sweeper, sweep_once, PairRequest, PairingCoordinator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
