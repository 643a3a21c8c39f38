//! # Integration Tests
//!
//! Cross-subsystem flows against a live ledger gateway. Every flow runs
//! over both wire protocols; results must not depend on which one a node
//! was configured with.
//!
//! ## Test Categories:
//!
//! 1. **Transport parity**: same script, same transcript on REST and RPC
//! 2. **Status streams**: push vs poll, cancellation
//! 3. **Pairing flows**: handshake, offline queue, expiry, revocation, trust
//! 4. **Anonymous flows**: hashed identities end to end

pub mod harness;

pub mod anonymous_flows;
pub mod pairing_flows;
pub mod status_streams;
pub mod transport_parity;
