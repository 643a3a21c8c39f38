//! # PL-06 Ledger Gateway
//!
//! In-memory ledger backend served over both wire protocols.
//!
//! **Subsystem ID:** 06
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Architecture
//!
//! ```text
//!  RestLedgerClient ──HTTP──► axum router ─┐
//!                                          ├──► InMemoryLedger ──► broadcast<StatusUpdate>
//!  RpcLedgerClient ───WS────► jsonrpsee ───┘
//! ```
//!
//! The gateway is a journal: it assigns heights and transaction hashes,
//! enforces unique ids and existing targets, and publishes status changes.
//! Lifecycle rules belong to the pairing services.
//!
//! ## Usage
//!
//! ```ignore
//! let gateway = GatewayServer::start(GatewayConfig::for_testing()).await?;
//! let (client, caps) = RestLedgerClient::connect(
//!     gateway.transport_config(TransportPreference::Rest),
//! ).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ledger;
pub mod router;
pub mod rpc;
pub mod service;

// Re-exports
pub use domain::{GatewayConfig, GatewayError};
pub use ledger::InMemoryLedger;
pub use router::{build_router, ApiError};
pub use rpc::LedgerRpcHandler;
pub use service::GatewayServer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
