//! # Ports
//!
//! Inbound API of the anonymous registry. The only outbound dependency is
//! `shared_types::LedgerTransport`.

pub mod inbound;

pub use inbound::AnonymousRegistryApi;
