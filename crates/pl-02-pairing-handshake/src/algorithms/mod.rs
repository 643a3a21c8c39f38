//! # Algorithms
//!
//! - `split_key`: key halves, commitments and session key derivation
//! - `auth_token`: per-side authorization tokens
//! - `nonce`: public challenge material

pub mod auth_token;
pub mod nonce;
pub mod split_key;

pub use auth_token::{component_key, compute_token, verify_token};
pub use nonce::generate_nonce;
pub use split_key::{KeyHalf, SplitKey};
