//! # PL-01 Identity Hashing
//!
//! Anonymous identities for physical components.
//!
//! **Subsystem ID:** 01
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Lets two components pair without revealing real identifiers:
//! - Keyed SHA-256 digests of component, manufacturer and category ids
//! - Each digest computed over its own namespace so none derives another
//! - A registry that journals hashes only, never the real id
//!
//! ## Module Structure
//!
//! ```text
//! pl-01-identity-hashing/
//! ├── domain/          # AnonymousIdentity, HasherConfig, RegistryConfig
//! ├── algorithms/      # hash(), namespaced digests
//! ├── ports/           # AnonymousRegistryApi
//! └── service.rs       # AnonymousRegistry
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use algorithms::{hash, hash_namespaced, IdentityHasher, Namespace};
pub use domain::{
    AnonymousIdentity, HasherConfig, PairingAuthCheck, PairingVerdict, RegistryConfig,
    RevocationRequest,
};
pub use ports::AnonymousRegistryApi;
pub use service::{AnonymousRegistry, Registration};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
