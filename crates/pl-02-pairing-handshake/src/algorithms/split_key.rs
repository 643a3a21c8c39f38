//! # Split Key
//!
//! Two independent 32-byte halves created together with an LCT.
//!
//! ```text
//! lct_half, device_half  <- OsRng
//! commitment(half)       =  SHA-256(half)
//! session_key            =  HKDF-SHA256(salt = lct_id,
//!                                       ikm  = lct_half || device_half,
//!                                       info = "lct-session-key")
//! ```
//!
//! Halves are write-once: there are no setters and the only constructor is
//! [`SplitKey::generate`]. They zeroize on drop and never print.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use shared_types::{LctId, PairingError};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of a key half and of the derived session key.
pub const KEY_LEN: usize = 32;

const SESSION_KEY_INFO: &[u8] = b"lct-session-key";

/// One half of an LCT split key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyHalf {
    inner: [u8; KEY_LEN],
}

impl KeyHalf {
    fn random() -> Self {
        let mut inner = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut inner);
        Self { inner }
    }

    /// Raw bytes. Do not keep copies.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.inner
    }

    /// Hex SHA-256 commitment, safe to persist.
    pub fn commitment(&self) -> String {
        hex::encode(Sha256::digest(self.inner))
    }

    /// Whether `commitment` was produced from this half.
    pub fn matches_commitment(&self, commitment: &str) -> bool {
        self.commitment() == commitment
    }
}

impl PartialEq for KeyHalf {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for KeyHalf {}

impl std::fmt::Debug for KeyHalf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyHalf(***)")
    }
}

/// Both halves of an LCT key.
#[derive(Debug)]
pub struct SplitKey {
    lct_half: KeyHalf,
    device_half: KeyHalf,
}

impl SplitKey {
    /// Generate two independent halves.
    pub fn generate() -> Self {
        let lct_half = KeyHalf::random();
        let mut device_half = KeyHalf::random();
        while device_half == lct_half {
            device_half = KeyHalf::random();
        }
        Self {
            lct_half,
            device_half,
        }
    }

    /// Half held by the LCT owner.
    pub fn lct_half(&self) -> &KeyHalf {
        &self.lct_half
    }

    /// Half held by the device.
    pub fn device_half(&self) -> &KeyHalf {
        &self.device_half
    }

    /// Split into `(lct_half, device_half)`.
    pub fn into_halves(self) -> (KeyHalf, KeyHalf) {
        let SplitKey {
            lct_half,
            device_half,
        } = self;
        (lct_half, device_half)
    }
}

/// Session key of an LCT.
pub fn derive_session_key(
    lct_id: &LctId,
    lct_half: &KeyHalf,
    device_half: &KeyHalf,
) -> Result<Zeroizing<[u8; KEY_LEN]>, PairingError> {
    let mut ikm = Zeroizing::new([0u8; KEY_LEN * 2]);
    ikm[..KEY_LEN].copy_from_slice(lct_half.as_bytes());
    ikm[KEY_LEN..].copy_from_slice(device_half.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(lct_id.as_str().as_bytes()), &ikm[..]);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(SESSION_KEY_INFO, &mut okm[..])
        .map_err(|e| PairingError::Configuration(format!("session key derivation: {e}")))?;
    Ok(okm)
}
