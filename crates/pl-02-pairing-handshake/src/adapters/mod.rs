//! # Adapters
//!
//! Built-in implementations of the outbound ports.

pub mod hmac_verifier;

pub use hmac_verifier::HmacAuthVerifier;
