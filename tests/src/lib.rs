//! # Pairing Ledger Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── pairing_benchmarks.rs   # Hashing, tokens, trust policies
//! │
//! └── src/integration/            # Cross-subsystem flows over real sockets
//!     ├── harness.rs              # Gateway + client + node fixtures
//!     ├── transport_parity.rs     # REST vs streaming RPC
//!     ├── status_streams.rs       # Watch subscriptions and cancellation
//!     ├── pairing_flows.rs        # Handshake, queue, expiry, trust
//!     └── anonymous_flows.rs      # Hashed identities end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p pl-tests
//!
//! # By category
//! cargo test -p pl-tests integration::transport_parity::
//! cargo test -p pl-tests integration::pairing_flows::
//!
//! # Benchmarks
//! cargo bench -p pl-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
