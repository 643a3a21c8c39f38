//! # PL-02 Pairing Handshake
//!
//! Challenge/response handshake that turns two components into a paired
//! Logical Connection Token (LCT).
//!
//! **Subsystem ID:** 02
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## State Machine
//!
//! ```text
//! Pending ──ack A+B──→ AwaitingAuth ──tokens ok──→ Completed
//!    │                      │
//!    ├──revoke──────────────┼──→ Revoked
//!    └──deadline────────────┴──→ Expired
//! ```
//!
//! ## Split Key
//!
//! Completing a handshake generates two independent 32-byte halves. The LCT
//! holder keeps one and the device keeps the other; the session key is
//! derived from both with HKDF-SHA256. The ledger only ever sees SHA-256
//! commitments of the halves.
//!
//! ## Ports
//!
//! | Port | Direction | Purpose |
//! |------|-----------|---------|
//! | `LivenessOracle` | out | Decide between immediate handshake and queueing |
//! | `OfflineQueue` | out | Defer a pairing whose peer is unreachable |
//! | `TrustGateway` | out | Feed outcomes into the trust ledger |
//! | `NotificationChannel` | out | Tell offline peers about revocations |
//! | `AuthVerifier` | out | Check per-side authorization tokens |
//!
//! Anonymous references are never resolved here; this crate has no access
//! to real identifiers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::HmacAuthVerifier;
pub use algorithms::{KeyHalf, SplitKey};
pub use domain::{
    AccessDecision, CompleteRequest, HandshakeConfig, InitiateOutcome, InitiateRequest, Lct, NoticeKind,
    OfflineNotice, PairingCompletion, RevokeOutcome,
};
pub use ports::{
    AuthVerifier, LivenessOracle, NotificationChannel, OfflineQueue, PairingHandshakeApi,
    TrustGateway,
};
pub use service::{HandshakeDeps, PairingHandshakeService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
