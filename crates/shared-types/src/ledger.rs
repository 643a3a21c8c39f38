//! # Ledger Transport Contract
//!
//! The single interface between the pairing core and the ledger backend.
//! Every wire adapter (REST, streaming RPC, in-process) implements
//! [`LedgerTransport`] with identical signatures and error semantics.
//!
//! ## Wire Contract
//!
//! - Mutations take a [`LedgerCall`] carrying `creator`, the payload and a
//!   free-form `context` that the backend echoes back.
//! - Mutations return [`Committed`]: the stored entity plus a [`TxReceipt`].
//! - Reads are idempotent and side-effect free.

use crate::entities::{
    AnonymousComponentRecord, ChallengeStatus, ComponentRules, IdentityDigest, LctRecord,
    LctStatus, LifecycleStatus, PairingAuthorization, PairingChallenge, PairingOutcome,
    PairingRequest, RequestStatus, RevocationEvent, TensorStatus, TrustTensor,
};
use crate::errors::{EntityKind, TransportError};
use crate::ids::{ChallengeId, LctId, RequestId, TensorId, TxHash};
use crate::stream::StatusStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Request envelope for every mutating ledger call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerCall<T> {
    /// Caller identity.
    pub creator: String,
    /// Free-form context echoed back in the receipt.
    pub context: String,
    /// Operation-specific payload.
    pub payload: T,
}

impl<T> LedgerCall<T> {
    /// Build a call envelope.
    pub fn new(creator: impl Into<String>, context: impl Into<String>, payload: T) -> Self {
        Self {
            creator: creator.into(),
            context: context.into(),
            payload,
        }
    }
}

/// Transaction reference returned by every mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Ledger height the transaction landed at.
    pub height: u64,
    /// Status of the stored entity after the mutation.
    pub status: String,
    /// Context echoed from the request.
    pub context: String,
    /// Commit timestamp (unix seconds).
    pub timestamp: u64,
}

/// A committed mutation: the stored entity and its receipt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Committed<T> {
    /// Entity as stored by the ledger.
    pub entity: T,
    /// Transaction reference.
    pub receipt: TxReceipt,
}

/// Result of a mutating ledger call.
pub type TxResult<T> = Result<Committed<T>, TransportError>;

/// Status change for an existing entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    /// Entity id.
    pub id: String,
    /// New status.
    pub status: S,
    /// Optional reason recorded with the change.
    pub reason: Option<String>,
}

impl<S> StatusChange<S> {
    /// Build a status change.
    pub fn new(id: impl fmt::Display, status: S, reason: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            status,
            reason,
        }
    }
}

/// Backend-side lifecycle check for a journalled status update.
/// Illegal moves are refused as `Conflict`.
pub fn check_status_update<S: LifecycleStatus>(
    kind: EntityKind,
    id: &str,
    from: S,
    to: S,
) -> Result<(), TransportError> {
    if from.accepts_update(to) {
        Ok(())
    } else {
        Err(TransportError::conflict(format!(
            "{kind} {id} is {from}, cannot become {to}"
        )))
    }
}

/// Trust score update journalled after a pairing outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    /// Tensor being updated.
    pub tensor_id: TensorId,
    /// New (clamped) score.
    pub score: f64,
    /// Evidence count after the update.
    pub evidence_count: u64,
    /// Tensor version after the update.
    pub version: u64,
    /// Outcome that triggered the update.
    pub outcome: PairingOutcome,
}

/// Revocation of an LCT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokePairing {
    /// LCT being revoked.
    pub lct_id: LctId,
    /// Reason recorded on the ledger.
    pub reason: String,
}

/// Wire protocol of a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Request/response over HTTP.
    Rest,
    /// JSON-RPC over WebSocket with subscriptions.
    StreamingRpc,
    /// Direct calls into an in-process ledger.
    InProcess,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Rest => f.write_str("rest"),
            TransportKind::StreamingRpc => f.write_str("streaming_rpc"),
            TransportKind::InProcess => f.write_str("in_process"),
        }
    }
}

/// Capabilities negotiated when a transport is constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Wire protocol.
    pub kind: TransportKind,
    /// Whether status updates are pushed by the backend (otherwise polled).
    pub push_updates: bool,
    /// Backend version string.
    pub backend_version: String,
}

/// A status change pushed to subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Kind of entity that changed.
    pub entity_kind: EntityKind,
    /// Entity id.
    pub entity_id: String,
    /// New status.
    pub status: String,
    /// Transaction that caused the change, when known.
    pub tx_hash: Option<TxHash>,
    /// Observation timestamp (unix seconds).
    pub timestamp: u64,
}

/// Ledger backend as seen by the pairing core.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Wire protocol of this transport.
    fn kind(&self) -> TransportKind;

    /// Capabilities negotiated at construction.
    fn capabilities(&self) -> Capabilities;

    /// Register an anonymous component (hashes only).
    async fn register_anonymous_component(
        &self,
        call: LedgerCall<AnonymousComponentRecord>,
    ) -> TxResult<AnonymousComponentRecord>;

    /// Record an anonymous revocation event.
    async fn revoke_anonymous_component(
        &self,
        call: LedgerCall<RevocationEvent>,
    ) -> TxResult<RevocationEvent>;

    /// Record an anonymous pairing authorization.
    async fn authorize_anonymous_pairing(
        &self,
        call: LedgerCall<PairingAuthorization>,
    ) -> TxResult<PairingAuthorization>;

    /// Read an anonymous component record.
    async fn get_anonymous_component(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<AnonymousComponentRecord, TransportError>;

    /// Replace the pairing rules of a registered anonymous component.
    async fn set_component_rules(
        &self,
        call: LedgerCall<ComponentRules>,
    ) -> TxResult<ComponentRules>;

    /// Read the pairing rules of an anonymous component.
    async fn get_component_rules(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<ComponentRules, TransportError>;

    /// Record a new pairing challenge.
    async fn initiate_pairing(
        &self,
        call: LedgerCall<PairingChallenge>,
    ) -> TxResult<PairingChallenge>;

    /// Record a challenge status change.
    async fn update_challenge_status(
        &self,
        call: LedgerCall<StatusChange<ChallengeStatus>>,
    ) -> TxResult<StatusChange<ChallengeStatus>>;

    /// Read a challenge.
    async fn get_challenge(&self, id: &ChallengeId) -> Result<PairingChallenge, TransportError>;

    /// Record a completed pairing and its LCT.
    async fn complete_pairing(&self, call: LedgerCall<LctRecord>) -> TxResult<LctRecord>;

    /// Record an LCT status change.
    async fn update_lct_status(
        &self,
        call: LedgerCall<StatusChange<LctStatus>>,
    ) -> TxResult<StatusChange<LctStatus>>;

    /// Record an LCT revocation.
    async fn revoke_pairing(&self, call: LedgerCall<RevokePairing>) -> TxResult<RevokePairing>;

    /// Read an LCT.
    async fn get_lct(&self, id: &LctId) -> Result<LctRecord, TransportError>;

    /// Every LCT naming `component_id` on either side, oldest first.
    async fn list_component_lcts(&self, component_id: &str)
        -> Result<Vec<LctRecord>, TransportError>;

    /// Record a queued pairing request.
    async fn queue_pairing_request(
        &self,
        call: LedgerCall<PairingRequest>,
    ) -> TxResult<PairingRequest>;

    /// Record a queue entry status change.
    async fn update_request_status(
        &self,
        call: LedgerCall<StatusChange<RequestStatus>>,
    ) -> TxResult<StatusChange<RequestStatus>>;

    /// Read a queued request.
    async fn get_pairing_request(&self, id: &RequestId) -> Result<PairingRequest, TransportError>;

    /// Record a new trust tensor.
    async fn create_trust_tensor(&self, call: LedgerCall<TrustTensor>) -> TxResult<TrustTensor>;

    /// Record a trust score update.
    async fn update_trust_score(&self, call: LedgerCall<ScoreUpdate>) -> TxResult<ScoreUpdate>;

    /// Record a tensor status change.
    async fn update_tensor_status(
        &self,
        call: LedgerCall<StatusChange<TensorStatus>>,
    ) -> TxResult<StatusChange<TensorStatus>>;

    /// Read a trust tensor.
    async fn get_trust_tensor(&self, id: &TensorId) -> Result<TrustTensor, TransportError>;

    /// Subscribe to status changes of one entity.
    ///
    /// The producer stops as soon as `cancel` fires or the stream is dropped.
    async fn watch_status(
        &self,
        entity_id: &str,
        cancel: CancellationToken,
    ) -> Result<StatusStream, TransportError>;
}
