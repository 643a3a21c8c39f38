//! Challenge nonces.

use rand::rngs::OsRng;
use rand::RngCore;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 32;

/// Fresh hex-encoded nonce from the OS RNG.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
