//! # Logical Connection Token
//!
//! The ledger stores an [`LctRecord`]; the process that completed the
//! handshake additionally holds both key halves until it hands them out.

use crate::algorithms::split_key::{derive_session_key, KEY_LEN};
use crate::algorithms::{KeyHalf, SplitKey};
use shared_types::{ComponentRole, LctRecord, LctStatus, PairingError};
use zeroize::Zeroizing;

/// A completed pairing with its key halves.
pub struct Lct {
    record: LctRecord,
    lct_key_half: KeyHalf,
    device_key_half: KeyHalf,
}

impl Lct {
    pub(crate) fn new(record: LctRecord, key: SplitKey) -> Self {
        let (lct_key_half, device_key_half) = key.into_halves();
        Self {
            record,
            lct_key_half,
            device_key_half,
        }
    }

    /// Ledger view.
    pub fn record(&self) -> &LctRecord {
        &self.record
    }

    /// Half kept by the LCT holder.
    pub fn lct_key_half(&self) -> &KeyHalf {
        &self.lct_key_half
    }

    /// Half handed to the device.
    pub fn device_key_half(&self) -> &KeyHalf {
        &self.device_key_half
    }

    /// Session key derived from both halves.
    pub fn session_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>, PairingError> {
        derive_session_key(&self.record.lct_id, &self.lct_key_half, &self.device_key_half)
    }
}

impl std::fmt::Debug for Lct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lct")
            .field("record", &self.record)
            .field("lct_key_half", &self.lct_key_half)
            .field("device_key_half", &self.device_key_half)
            .finish()
    }
}

/// Level given when an LCT carries no rule for the requestor but names an
/// operational context.
pub const CONTEXT_ACCESS_LEVEL: &str = "standard";
/// Level given when nothing else applies.
pub const FALLBACK_ACCESS_LEVEL: &str = "restricted";

/// Outcome of asking whether a component may use an LCT.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether access is granted.
    pub granted: bool,
    /// Level granted, `None` when refused.
    pub access_level: Option<String>,
}

impl AccessDecision {
    fn grant(level: impl Into<String>) -> Self {
        Self {
            granted: true,
            access_level: Some(level.into()),
        }
    }

    fn refuse() -> Self {
        Self {
            granted: false,
            access_level: None,
        }
    }

    /// Decide access of `requestor` to `record`.
    ///
    /// Only the two paired components of an active LCT are considered. The
    /// side's own rule wins, then the default rule, then the context.
    pub fn evaluate(record: &LctRecord, requestor: &str) -> Self {
        let role = if record.component_a.id() == requestor {
            ComponentRole::A
        } else if record.component_b.id() == requestor {
            ComponentRole::B
        } else {
            return Self::refuse();
        };
        if record.status != LctStatus::Active {
            return Self::refuse();
        }

        let rules = &record.access_rules;
        if let Some(rule) = rules.for_role(role) {
            if rule.denied {
                return Self::refuse();
            }
            if let Some(level) = &rule.access_level {
                return Self::grant(level.clone());
            }
        }
        if let Some(level) = rules.default.as_ref().and_then(|r| r.access_level.as_ref()) {
            return Self::grant(level.clone());
        }
        if record.context.trim().is_empty() {
            Self::grant(FALLBACK_ACCESS_LEVEL)
        } else {
            Self::grant(CONTEXT_ACCESS_LEVEL)
        }
    }
}
