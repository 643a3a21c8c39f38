//! # Error Types
//!
//! The pairing error taxonomy shared by every subsystem, and the transport
//! error that wraps backend and network faults.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of entity an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Anonymous component registration.
    Component,
    /// Pairing challenge.
    Challenge,
    /// Logical Connection Token.
    Lct,
    /// Queued pairing request.
    Request,
    /// Pairing queue.
    Queue,
    /// Trust tensor.
    Tensor,
    /// Anonymous pairing authorization.
    Authorization,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Component => "component",
            EntityKind::Challenge => "challenge",
            EntityKind::Lct => "lct",
            EntityKind::Request => "request",
            EntityKind::Queue => "queue",
            EntityKind::Tensor => "tensor",
            EntityKind::Authorization => "authorization",
        };
        f.write_str(name)
    }
}

/// Tag of a [`PairingError`], for callers that branch on the failure class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing fields.
    InvalidInput,
    /// Entity is in an incompatible lifecycle state.
    InvalidState,
    /// Handshake authorization token rejected.
    AuthenticationFailed,
    /// Referenced entity does not exist.
    NotFound,
    /// Backend or network failure.
    TransportFailure,
    /// Trust score outside [0, 1].
    InvalidScore,
    /// Missing or invalid configuration.
    Configuration,
}

/// Backend rejection classes, identical for every wire protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectCode {
    /// The backend has no record with this id.
    NotFound,
    /// The record already exists or the transition conflicts with ledger state.
    Conflict,
    /// The backend could not accept the request payload.
    InvalidRequest,
    /// The backend refused the operation.
    Forbidden,
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectCode::NotFound => "not_found",
            RejectCode::Conflict => "conflict",
            RejectCode::InvalidRequest => "invalid_request",
            RejectCode::Forbidden => "forbidden",
        };
        f.write_str(name)
    }
}

/// Errors raised by a ledger transport.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Backend could not be reached.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// Request did not complete in time.
    #[error("Request timed out after {after_ms}ms")]
    Timeout {
        /// Elapsed budget in milliseconds.
        after_ms: u64,
    },

    /// Backend answered with a non-success status that has no rejection class.
    #[error("Backend returned status {code}: {message}")]
    Status {
        /// Protocol status code (HTTP status or RPC error code).
        code: i64,
        /// Backend message.
        message: String,
    },

    /// Backend rejected the operation.
    #[error("Backend rejected request ({code}): {message}")]
    Rejected {
        /// Rejection class.
        code: RejectCode,
        /// Backend message.
        message: String,
    },

    /// Response could not be decoded.
    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    /// A status stream closed before the subscriber cancelled it.
    #[error("Status stream closed")]
    StreamClosed,

    /// The transport does not support the operation.
    #[error("Unsupported by transport: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// Build a not-found rejection.
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        TransportError::Rejected {
            code: RejectCode::NotFound,
            message: format!("{kind} {id} not found"),
        }
    }

    /// Build a conflict rejection.
    pub fn conflict(message: impl Into<String>) -> Self {
        TransportError::Rejected {
            code: RejectCode::Conflict,
            message: message.into(),
        }
    }

    /// Whether an idempotent call may be retried after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Unreachable(_) | TransportError::Timeout { .. }
        )
    }

    /// Whether the backend refused a write that conflicts with its state.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            TransportError::Rejected {
                code: RejectCode::Conflict,
                ..
            }
        )
    }

    /// Whether the backend reported a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransportError::Rejected {
                code: RejectCode::NotFound,
                ..
            }
        )
    }
}

/// Errors returned by every pairing operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PairingError {
    /// Malformed or missing fields.
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Operation attempted on an entity in an incompatible lifecycle state.
    #[error("Invalid state: {entity} {id} is {status}, cannot {operation}")]
    InvalidState {
        /// Entity kind.
        entity: EntityKind,
        /// Entity id.
        id: String,
        /// Current status.
        status: String,
        /// Attempted operation.
        operation: String,
    },

    /// Handshake authorization token rejected.
    #[error("Authentication failed for {role} of challenge {challenge_id}")]
    AuthenticationFailed {
        /// Challenge being completed.
        challenge_id: String,
        /// Side whose token was rejected.
        role: String,
    },

    /// Referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind.
        kind: EntityKind,
        /// Requested id.
        id: String,
    },

    /// Backend or network failure, surfaced unmodified.
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    /// Trust score outside [0, 1].
    #[error("Invalid trust score: {0} (must be within [0.0, 1.0])")]
    InvalidScore(f64),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PairingError {
    /// Build an [`PairingError::InvalidInput`].
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PairingError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`PairingError::NotFound`].
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        PairingError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Challenge lookup failure.
    pub fn challenge_not_found(id: impl fmt::Display) -> Self {
        Self::not_found(EntityKind::Challenge, id)
    }

    /// Build a [`PairingError::InvalidState`].
    pub fn invalid_state(
        entity: EntityKind,
        id: impl fmt::Display,
        status: impl fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        PairingError::InvalidState {
            entity,
            id: id.to_string(),
            status: status.to_string(),
            operation: operation.into(),
        }
    }

    /// Tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PairingError::InvalidInput { .. } => ErrorKind::InvalidInput,
            PairingError::InvalidState { .. } => ErrorKind::InvalidState,
            PairingError::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            PairingError::NotFound { .. } => ErrorKind::NotFound,
            PairingError::TransportFailure(_) => ErrorKind::TransportFailure,
            PairingError::InvalidScore(_) => ErrorKind::InvalidScore,
            PairingError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let err = PairingError::invalid_state(
            EntityKind::Challenge,
            "challenge-1",
            "completed",
            "complete",
        );
        assert!(err.to_string().contains("challenge-1"));
        assert!(err.to_string().contains("completed"));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_challenge_not_found() {
        let err = PairingError::challenge_not_found("challenge-9");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "challenge not found: challenge-9");
    }

    #[test]
    fn test_transport_error_wraps_unmodified() {
        let inner = TransportError::Unreachable("connection refused".into());
        let err: PairingError = inner.clone().into();
        assert_eq!(err, PairingError::TransportFailure(inner));
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn test_retryable_classes() {
        assert!(TransportError::Timeout { after_ms: 10 }.is_retryable());
        assert!(TransportError::Unreachable("x".into()).is_retryable());
        assert!(!TransportError::conflict("dup").is_retryable());
        assert!(TransportError::conflict("dup").is_conflict());
        assert!(!TransportError::not_found(EntityKind::Lct, "lct-1").is_conflict());
        assert!(TransportError::not_found(EntityKind::Lct, "lct-1").is_not_found());
    }

    #[test]
    fn test_invalid_score_message() {
        let err = PairingError::InvalidScore(1.5);
        assert!(err.to_string().contains("1.5"));
    }
}
