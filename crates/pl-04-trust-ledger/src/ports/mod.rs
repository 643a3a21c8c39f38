//! # Ports
//!
//! Inbound API of the trust ledger.

pub mod inbound;

pub use inbound::TrustLedgerApi;
