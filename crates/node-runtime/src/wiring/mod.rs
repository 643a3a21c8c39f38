//! # Subsystem Wiring Module
//!
//! Connects the pairing subsystems for callers and runs their background
//! tasks.
//!
//! ## Architecture Principle
//!
//! Each subsystem defines its **ports** (traits). The node-runtime provides
//! **adapters** that implement these ports (see [`crate::adapters`]) and a
//! coordinator that drives the subsystems' inbound APIs.
//!
//! ```text
//!            caller (real ids)
//!                   │
//!                   ▼
//!        ┌─────────────────────┐   hash ids   ┌──────────────────┐
//!        │ PairingCoordinator  │─────────────→│ AnonymousRegistry│
//!        └──────────┬──────────┘              └──────────────────┘
//!                   │ refs only
//!                   ▼
//!        ┌─────────────────────┐  OfflineQueue  ┌──────────────┐
//!        │  PairingHandshake   │───────────────→│ PairingQueue │
//!        └──────────┬──────────┘←───────────────└──────────────┘
//!                   │ TrustGateway   HandshakeGateway
//!                   ▼
//!        ┌─────────────────────┐
//!        │    TrustLedger      │
//!        └─────────────────────┘
//! ```
//!
//! ## Wiring Responsibilities
//!
//! 1. **Anonymity**: hash real ids before any subsystem sees them
//! 2. **Metrics**: count initiations, completions, queueing, revocations
//! 3. **Expiry**: sweep stale challenges periodically

pub mod coordinator;
pub mod sweeper;

pub use coordinator::{PairRequest, PairingCoordinator};
pub use sweeper::{spawn_expiry_sweeper, sweep_once};
