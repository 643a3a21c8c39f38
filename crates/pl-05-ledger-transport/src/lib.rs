//! # PL-05 Ledger Transport
//!
//! Interchangeable wire clients for the ledger backend.
//!
//! **Subsystem ID:** 05
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Adapters
//!
//! | Client | Protocol | Status updates |
//! |--------|----------|----------------|
//! | [`RestLedgerClient`] | JSON over HTTP, routes under `/v1` | polled |
//! | [`RpcLedgerClient`] | JSON-RPC over WebSocket, `ledger_*` methods | pushed via `ledger_subscribeStatus` |
//!
//! Both own only marshaling, connection lifecycle and timeout/retry. Reads
//! retry with backoff on `Unreachable`/`Timeout`; mutations never retry.
//! Backend rejections map onto the same [`shared_types::TransportError`]
//! variants whichever protocol carried them (see [`wire`]).
//!
//! ## Capability Negotiation
//!
//! `connect` checks the backend (`GET /health` or `ledger_capabilities`)
//! and returns the client together with its [`shared_types::Capabilities`].
//! [`connect_transport`] picks a client from [`TransportPreference`], falling
//! back from RPC to REST under `Auto`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod connect;
pub mod retry;
pub mod wire;

// Re-exports
pub use adapters::{RestLedgerClient, RpcLedgerClient};
pub use api::{LedgerRpcClient, LedgerRpcServer};
pub use config::{TransportConfig, TransportPreference};
pub use connect::connect_transport;
pub use retry::RetryPolicy;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
