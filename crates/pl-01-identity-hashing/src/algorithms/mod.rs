//! # Algorithms
//!
//! Keyed digests for anonymous identities.

pub mod hasher;

pub use hasher::{hash, hash_namespaced, IdentityHasher, Namespace};
