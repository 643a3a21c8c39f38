//! # Domain Module
//!
//! Anonymous identity types and hasher configuration.

pub mod config;
pub mod identity;

pub use config::{HasherConfig, RegistryConfig};
pub use identity::{AnonymousIdentity, PairingAuthCheck, PairingVerdict, RevocationRequest};
