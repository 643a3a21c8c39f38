//! # Identifiers
//!
//! String newtypes for every entity id so that a `LctId` can never be passed
//! where a `ChallengeId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh, globally unique identifier.
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4()))
            }

            /// Borrow the identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a [`crate::PairingChallenge`].
    ChallengeId,
    "challenge"
);
string_id!(
    /// Identifier of an LCT.
    LctId,
    "lct"
);
string_id!(
    /// Identifier of a queued [`crate::PairingRequest`].
    RequestId,
    "req"
);
string_id!(
    /// Identifier of a [`crate::TrustTensor`].
    TensorId,
    "tensor"
);
string_id!(
    /// Identifier of a pairing queue (a proxy id or a target component id).
    QueueId,
    "queue"
);
string_id!(
    /// Ledger transaction reference.
    TxHash,
    "tx"
);
string_id!(
    /// Identifier of an anonymous pairing authorization.
    AuthorizationId,
    "auth"
);
string_id!(
    /// Identifier of an anonymous revocation event.
    RevocationId,
    "revocation"
);
