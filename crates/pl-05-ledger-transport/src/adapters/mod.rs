//! Wire clients implementing [`shared_types::LedgerTransport`].

pub mod rest;
pub mod rpc;

pub use rest::RestLedgerClient;
pub use rpc::RpcLedgerClient;
