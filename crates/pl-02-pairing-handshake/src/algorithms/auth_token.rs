//! # Authorization Tokens
//!
//! ```text
//! component_key = HMAC-SHA256(authority_key, "pl-component-key" || component_id)
//! token         = HMAC-SHA256(component_key,
//!                             len(challenge_id) || challenge_id ||
//!                             len(nonce) || nonce || role_tag)
//! ```
//!
//! Tokens travel hex-encoded. Verification decodes and compares in constant
//! time through `Mac::verify_slice`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared_types::{ChallengeId, ComponentRole, PairingError};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const COMPONENT_KEY_TAG: &[u8] = b"pl-component-key";

fn keyed(key: &[u8]) -> Result<HmacSha256, PairingError> {
    HmacSha256::new_from_slice(key)
        .map_err(|e| PairingError::Configuration(format!("invalid HMAC key: {e}")))
}

fn token_mac(
    component_key: &[u8],
    challenge_id: &ChallengeId,
    nonce: &str,
    role: ComponentRole,
) -> Result<HmacSha256, PairingError> {
    let mut mac = keyed(component_key)?;
    mac.update(&(challenge_id.as_str().len() as u64).to_be_bytes());
    mac.update(challenge_id.as_str().as_bytes());
    mac.update(&(nonce.len() as u64).to_be_bytes());
    mac.update(nonce.as_bytes());
    mac.update(role.tag().as_bytes());
    Ok(mac)
}

/// Per-component key derived from the authority key.
pub fn component_key(
    authority_key: &[u8],
    component_id: &str,
) -> Result<Zeroizing<[u8; 32]>, PairingError> {
    if authority_key.is_empty() {
        return Err(PairingError::Configuration("authority key is empty".into()));
    }
    let mut mac = keyed(authority_key)?;
    mac.update(COMPONENT_KEY_TAG);
    mac.update(component_id.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&mac.finalize().into_bytes());
    Ok(key)
}

/// Hex token for one side of a challenge.
pub fn compute_token(
    component_key: &[u8],
    challenge_id: &ChallengeId,
    nonce: &str,
    role: ComponentRole,
) -> Result<String, PairingError> {
    let mac = token_mac(component_key, challenge_id, nonce, role)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex token. Malformed hex never verifies.
pub fn verify_token(
    component_key: &[u8],
    challenge_id: &ChallengeId,
    nonce: &str,
    role: ComponentRole,
    token: &str,
) -> bool {
    let Ok(presented) = hex::decode(token) else {
        return false;
    };
    match token_mac(component_key, challenge_id, nonce, role) {
        Ok(mac) => mac.verify_slice(&presented).is_ok(),
        Err(_) => false,
    }
}
