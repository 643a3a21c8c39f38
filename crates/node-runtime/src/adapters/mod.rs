//! # Adapter Implementations
//!
//! Concrete implementations of the outbound ports each pairing subsystem
//! declares:
//! 1. Bridges that connect one subsystem's port to another's inbound API
//! 2. Heartbeat-driven liveness for the handshake
//! 3. A channel notifier for offline notices
//!
//! ## Hexagonal Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     OUTER LAYER (Adapters)                          │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │  QueueBridge, TrustBridge, HandshakeBridge, HeartbeatLiveness │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! │                              ↑ implements ↑                         │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │                    MIDDLE LAYER (Ports)                        │  │
//! │  │  trait OfflineQueue, trait TrustGateway, trait LivenessOracle │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! │                              ↑ uses ↑                               │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │                    INNER LAYER (Domain)                        │  │
//! │  │  Handshake state machine, queue bookkeeping, trust policies   │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod bridges;
pub mod liveness;
pub mod notifier;

pub use bridges::{HandshakeBridge, QueueBridge, TrustBridge};
pub use liveness::HeartbeatLiveness;
pub use notifier::ChannelNotifier;
