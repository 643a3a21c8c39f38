//! # Domain Entities
//!
//! Core entities of the pairing protocol: component references, challenges,
//! LCT records, queue entries, trust tensors and anonymous identity records.
//!
//! Status enums implement [`LifecycleStatus`]; every entity mutates its
//! status only through `transition_to`, which rejects any transition out of
//! a terminal state.

use crate::errors::{EntityKind, PairingError};
use crate::ids::{AuthorizationId, ChallengeId, LctId, QueueId, RequestId, RevocationId, TensorId};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// LIFECYCLE STATUSES
// =============================================================================

/// Common behaviour of every status enum.
pub trait LifecycleStatus: Copy + fmt::Debug + fmt::Display + PartialEq + Send + Sync {
    /// Whether `self -> next` is a legal transition.
    fn can_transition_to(&self, next: Self) -> bool;

    /// Whether no further transition is possible.
    fn is_terminal(&self) -> bool;

    /// Whether a journalled status update from `self` to `next` is accepted.
    /// Re-stating a non-terminal status is allowed; a terminal one is final.
    fn accepts_update(&self, next: Self) -> bool {
        self.can_transition_to(next) || (*self == next && !self.is_terminal())
    }
}

fn check_transition<S: LifecycleStatus>(
    entity: EntityKind,
    id: &str,
    from: S,
    to: S,
) -> Result<(), PairingError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(PairingError::invalid_state(
            entity,
            id,
            from,
            format!("transition to {to}"),
        ))
    }
}

/// Pairing challenge state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    /// Created, waiting for both sides to acknowledge.
    #[default]
    Pending,
    /// Both sides acknowledged, waiting for authorization tokens.
    AwaitingAuth,
    /// Tokens verified and LCT created.
    Completed,
    /// Withdrawn before completion.
    Revoked,
    /// Left unanswered past its deadline.
    Expired,
}

impl LifecycleStatus for ChallengeStatus {
    fn can_transition_to(&self, next: Self) -> bool {
        use ChallengeStatus::*;
        matches!(
            (self, next),
            (Pending, AwaitingAuth)
                | (Pending, Revoked)
                | (Pending, Expired)
                | (AwaitingAuth, Completed)
                | (AwaitingAuth, Revoked)
                | (AwaitingAuth, Expired)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Revoked | Self::Expired)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::AwaitingAuth => "awaiting_auth",
            Self::Completed => "completed",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// LCT lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LctStatus {
    /// Pairing in force.
    #[default]
    Active,
    /// Temporarily disabled, may be reactivated.
    Suspended,
    /// Permanently ended.
    Terminated,
}

impl LifecycleStatus for LctStatus {
    fn can_transition_to(&self, next: Self) -> bool {
        use LctStatus::*;
        matches!(
            (self, next),
            (Active, Suspended) | (Suspended, Active) | (Active, Terminated) | (Suspended, Terminated)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for LctStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Queue entry lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting in its queue.
    #[default]
    Queued,
    /// Being resolved by an offline processing run.
    Processing,
    /// Resolved into a pairing challenge.
    Completed,
    /// Withdrawn by a caller.
    Cancelled,
    /// Resolution failed; requires an explicit re-enqueue.
    Failed,
}

impl LifecycleStatus for RequestStatus {
    fn can_transition_to(&self, next: Self) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Queued, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Trust tensor lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorStatus {
    /// Accepting updates.
    #[default]
    Active,
    /// Retired; kept for history.
    Inactive,
}

impl LifecycleStatus for TensorStatus {
    fn can_transition_to(&self, next: Self) -> bool {
        matches!((self, next), (Self::Active, Self::Inactive))
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Inactive)
    }
}

impl fmt::Display for TensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Inactive => f.write_str("inactive"),
        }
    }
}

// =============================================================================
// COMPONENT REFERENCES
// =============================================================================

/// Side of a pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRole {
    /// Initiating component.
    A,
    /// Target component.
    B,
}

impl ComponentRole {
    /// Domain tag mixed into role-bound digests.
    pub fn tag(&self) -> &'static str {
        match self {
            ComponentRole::A => "component_a",
            ComponentRole::B => "component_b",
        }
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Fixed-length anonymous digest (64 lowercase hex chars).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityDigest(String);

impl IdentityDigest {
    /// Length of the hex encoding.
    pub const HEX_LEN: usize = 64;

    /// Encode a 32-byte digest.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Parse a hex digest.
    pub fn parse(value: &str) -> Result<Self, PairingError> {
        if Self::is_well_formed(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(PairingError::invalid_input(
                "digest",
                format!("expected {} lowercase hex chars", Self::HEX_LEN),
            ))
        }
    }

    /// Whether `value` is a well-formed digest.
    pub fn is_well_formed(value: &str) -> bool {
        value.len() == Self::HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    /// Borrow the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IdentityDigest {
    type Error = PairingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IdentityDigest> for String {
    fn from(value: IdentityDigest) -> Self {
        value.0
    }
}

impl fmt::Display for IdentityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a physical component, plain or anonymous.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    id: String,
    anonymous: bool,
}

impl ComponentRef {
    /// Reference by real identifier.
    pub fn plain(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            anonymous: false,
        }
    }

    /// Reference by anonymous digest.
    pub fn anonymous(digest: &IdentityDigest) -> Self {
        Self {
            id: digest.as_str().to_string(),
            anonymous: true,
        }
    }

    /// Identifier (real id or digest).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this is a hash-only reference.
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Check that the reference is well formed.
    pub fn validate(&self, field: &str) -> Result<(), PairingError> {
        if self.id.trim().is_empty() {
            return Err(PairingError::invalid_input(field, "component id is empty"));
        }
        if self.id.chars().any(char::is_control) {
            return Err(PairingError::invalid_input(
                field,
                "component id contains control characters",
            ));
        }
        if self.anonymous && !IdentityDigest::is_well_formed(&self.id) {
            return Err(PairingError::invalid_input(
                field,
                "anonymous component id is not a well-formed digest",
            ));
        }
        Ok(())
    }

    /// Validate both sides of a pairing: well formed, same anonymity mode,
    /// and distinct.
    pub fn validate_pair(a: &ComponentRef, b: &ComponentRef) -> Result<(), PairingError> {
        a.validate("component_a")?;
        b.validate("component_b")?;
        if a.anonymous != b.anonymous {
            return Err(PairingError::invalid_input(
                "component_b",
                "cannot mix anonymous and plain references in one pairing",
            ));
        }
        if a.id == b.id {
            return Err(PairingError::invalid_input(
                "component_b",
                "a component cannot pair with itself",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.anonymous {
            // Digests are long; the prefix is enough to correlate logs.
            let prefix: String = self.id.chars().take(12).collect();
            write!(f, "anon:{prefix}")
        } else {
            f.write_str(&self.id)
        }
    }
}

// =============================================================================
// PAIRING CHALLENGE
// =============================================================================

/// Parameters for creating a challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeParams {
    /// Unique identifier.
    pub challenge_id: ChallengeId,
    /// Initiating component.
    pub component_a: ComponentRef,
    /// Target component.
    pub component_b: ComponentRef,
    /// Free-form operational context.
    pub operational_context: String,
    /// Optional intermediary.
    pub proxy_id: Option<String>,
    /// Whether liveness checks were skipped.
    pub force_immediate: bool,
    /// Hex-encoded public challenge material.
    pub nonce: String,
    /// Creation timestamp (unix seconds).
    pub created_at: u64,
    /// Deadline after which the sweep expires the challenge.
    pub expires_at: u64,
}

/// An in-flight handshake attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingChallenge {
    /// Unique identifier.
    pub challenge_id: ChallengeId,
    /// Initiating component.
    pub component_a: ComponentRef,
    /// Target component.
    pub component_b: ComponentRef,
    /// Free-form operational context.
    pub operational_context: String,
    /// Optional intermediary.
    pub proxy_id: Option<String>,
    /// Whether liveness checks were skipped.
    pub force_immediate: bool,
    /// Hex-encoded public challenge material both sides sign over.
    pub nonce: String,
    /// Side A acknowledged.
    pub acknowledged_a: bool,
    /// Side B acknowledged.
    pub acknowledged_b: bool,
    /// Current status.
    pub status: ChallengeStatus,
    /// Creation timestamp (unix seconds).
    pub created_at: u64,
    /// Expiry deadline (unix seconds).
    pub expires_at: u64,
}

impl PairingChallenge {
    /// Create a challenge in `Pending`.
    pub fn new(params: ChallengeParams) -> Self {
        Self {
            challenge_id: params.challenge_id,
            component_a: params.component_a,
            component_b: params.component_b,
            operational_context: params.operational_context,
            proxy_id: params.proxy_id,
            force_immediate: params.force_immediate,
            nonce: params.nonce,
            acknowledged_a: false,
            acknowledged_b: false,
            status: ChallengeStatus::Pending,
            created_at: params.created_at,
            expires_at: params.expires_at,
        }
    }

    /// Component on the given side.
    pub fn component(&self, role: ComponentRole) -> &ComponentRef {
        match role {
            ComponentRole::A => &self.component_a,
            ComponentRole::B => &self.component_b,
        }
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Record one side's acknowledgement, moving to `AwaitingAuth` once both
    /// sides have acknowledged. Returns the resulting status.
    pub fn acknowledge(&mut self, role: ComponentRole) -> Result<ChallengeStatus, PairingError> {
        if self.status != ChallengeStatus::Pending {
            return Err(PairingError::invalid_state(
                EntityKind::Challenge,
                &self.challenge_id,
                self.status,
                "acknowledge",
            ));
        }
        match role {
            ComponentRole::A => self.acknowledged_a = true,
            ComponentRole::B => self.acknowledged_b = true,
        }
        if self.acknowledged_a && self.acknowledged_b {
            self.transition_to(ChallengeStatus::AwaitingAuth)?;
        }
        Ok(self.status)
    }

    /// Transition to a new status.
    pub fn transition_to(&mut self, next: ChallengeStatus) -> Result<(), PairingError> {
        check_transition(
            EntityKind::Challenge,
            self.challenge_id.as_str(),
            self.status,
            next,
        )?;
        self.status = next;
        Ok(())
    }
}

// =============================================================================
// LCT RECORD
// =============================================================================

/// Persisted view of a Logical Connection Token.
///
/// Key halves never appear here; only SHA-256 commitments of each half are
/// recorded so a holder can later prove possession.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LctRecord {
    /// Unique identifier.
    pub lct_id: LctId,
    /// Challenge this LCT completed.
    pub challenge_id: ChallengeId,
    /// First component.
    pub component_a: ComponentRef,
    /// Second component.
    pub component_b: ComponentRef,
    /// Operational context of the pairing.
    pub context: String,
    /// Session context supplied at completion.
    pub session_context: String,
    /// Optional intermediary.
    pub proxy_id: Option<String>,
    /// Current status.
    pub status: LctStatus,
    /// Commitment to the LCT-side key half.
    pub lct_key_commitment: String,
    /// Commitment to the device-side key half.
    pub device_key_commitment: String,
    /// Creation timestamp (unix seconds).
    pub created_at: u64,
    /// Last status change (unix seconds).
    pub updated_at: u64,
    /// Who may use the LCT, and at what level.
    #[serde(default)]
    pub access_rules: LctAccessRules,
}

/// Access rule for one side of an LCT.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    /// Access is refused outright.
    #[serde(default)]
    pub denied: bool,
    /// Level granted, e.g. "full" or "read_only".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
}

impl AccessRule {
    /// Grant `level`.
    pub fn level(level: impl Into<String>) -> Self {
        Self {
            denied: false,
            access_level: Some(level.into()),
        }
    }

    /// Refuse access.
    pub fn denied() -> Self {
        Self {
            denied: true,
            access_level: None,
        }
    }
}

/// Per-side access rules of an LCT. A side without its own rule falls back
/// to `default`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LctAccessRules {
    /// Rule for component A.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_a: Option<AccessRule>,
    /// Rule for component B.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_b: Option<AccessRule>,
    /// Rule for either side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AccessRule>,
}

impl LctAccessRules {
    /// Rule of one side, if any.
    pub fn for_role(&self, role: ComponentRole) -> Option<&AccessRule> {
        match role {
            ComponentRole::A => self.component_a.as_ref(),
            ComponentRole::B => self.component_b.as_ref(),
        }
    }
}

impl LctRecord {
    /// Transition to a new status.
    pub fn transition_to(&mut self, next: LctStatus, now: u64) -> Result<(), PairingError> {
        check_transition(EntityKind::Lct, self.lct_id.as_str(), self.status, next)?;
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// PAIRING REQUEST (QUEUE ENTRY)
// =============================================================================

/// A pairing deferred to a queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRequest {
    /// Unique identifier.
    pub request_id: RequestId,
    /// Queue holding the entry.
    pub queue_id: QueueId,
    /// First component.
    pub component_a: ComponentRef,
    /// Second component.
    pub component_b: ComponentRef,
    /// Operational context.
    pub context: String,
    /// Optional intermediary.
    pub proxy_id: Option<String>,
    /// Current status.
    pub status: RequestStatus,
    /// Caller that enqueued the request.
    pub creator: String,
    /// Position within its queue (assigned on append).
    pub sequence: u64,
    /// Challenge created when the request completed.
    pub challenge_id: Option<ChallengeId>,
    /// Why processing failed.
    pub failure_reason: Option<String>,
    /// Why the request was cancelled.
    pub cancel_reason: Option<String>,
    /// Creation timestamp (unix seconds).
    pub created_at: u64,
    /// Last status change (unix seconds).
    pub updated_at: u64,
}

impl PairingRequest {
    /// Transition to a new status.
    pub fn transition_to(&mut self, next: RequestStatus, now: u64) -> Result<(), PairingError> {
        check_transition(
            EntityKind::Request,
            self.request_id.as_str(),
            self.status,
            next,
        )?;
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// TRUST TENSOR
// =============================================================================

/// Outcome of a pairing, consumed by trust updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingOutcome {
    /// Handshake completed and an LCT was created.
    Completed,
    /// An existing LCT was revoked.
    Revoked,
    /// A pairing attempt failed.
    Failed,
}

impl PairingOutcome {
    /// Score the outcome pulls toward.
    pub fn target_score(&self) -> f64 {
        match self {
            PairingOutcome::Completed => 1.0,
            PairingOutcome::Revoked | PairingOutcome::Failed => 0.0,
        }
    }
}

impl fmt::Display for PairingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Revoked => "revoked",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Clamp a score into [0, 1]; NaN collapses to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Per-pair trust record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustTensor {
    /// Unique identifier.
    pub tensor_id: TensorId,
    /// First component.
    pub component_a: ComponentRef,
    /// Second component.
    pub component_b: ComponentRef,
    /// Context the score applies to.
    pub context: String,
    /// Score in [0, 1].
    pub score: f64,
    /// Current status.
    pub status: TensorStatus,
    /// Number of outcomes applied.
    pub evidence_count: u64,
    /// Monotonic version, bumped on every update.
    pub version: u64,
    /// Creation timestamp (unix seconds).
    pub created_at: u64,
    /// Last update (unix seconds).
    pub updated_at: u64,
}

impl TrustTensor {
    /// Store a new score, clamped, and bump bookkeeping.
    pub fn apply_score(&mut self, score: f64, now: u64) {
        self.score = clamp_score(score);
        self.evidence_count += 1;
        self.version += 1;
        self.updated_at = now;
    }

    /// Transition to a new status.
    pub fn transition_to(&mut self, next: TensorStatus, now: u64) -> Result<(), PairingError> {
        check_transition(
            EntityKind::Tensor,
            self.tensor_id.as_str(),
            self.status,
            next,
        )?;
        self.status = next;
        self.version += 1;
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// ANONYMOUS IDENTITY RECORDS
// =============================================================================

/// What the ledger learns about an anonymous component: hashes only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousComponentRecord {
    /// Component digest.
    pub component_hash: IdentityDigest,
    /// Manufacturer digest.
    pub manufacturer_hash: IdentityDigest,
    /// Category digest.
    pub category_hash: IdentityDigest,
    /// Registration timestamp (unix seconds).
    pub registered_at: u64,
}

/// Scope of a revocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationType {
    /// A single component.
    Individual,
    /// A production batch.
    Batch,
    /// Everything from one manufacturer.
    Manufacturer,
}

/// How quickly peers must act on a revocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    /// Routine.
    Low,
    /// Default.
    Normal,
    /// Act immediately.
    Critical,
}

/// Anonymous revocation of a registered component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEvent {
    /// Unique identifier.
    pub revocation_id: RevocationId,
    /// Revoked component digest.
    pub target_hash: IdentityDigest,
    /// Scope.
    pub revocation_type: RevocationType,
    /// Urgency.
    pub urgency: UrgencyLevel,
    /// Free-form reason category (e.g. "safety_recall").
    pub reason_category: String,
    /// Digest of the revoking party.
    pub initiator_hash: IdentityDigest,
    /// When the revocation takes effect (unix seconds).
    pub effective_at: u64,
}

/// Status of an anonymous pairing authorization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// In force until `expires_at`.
    #[default]
    Active,
    /// Withdrawn.
    Revoked,
}

/// Pre-authorization for two anonymous components to pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairingAuthorization {
    /// Unique identifier.
    pub auth_id: AuthorizationId,
    /// First component digest.
    pub component_hash_a: IdentityDigest,
    /// Second component digest.
    pub component_hash_b: IdentityDigest,
    /// Digest of the governing rule.
    pub rule_hash: String,
    /// Minimum trust score required to pair.
    pub trust_requirement: f64,
    /// Current status.
    pub status: AuthorizationStatus,
    /// Creation timestamp (unix seconds).
    pub created_at: u64,
    /// Expiry (unix seconds).
    pub expires_at: u64,
}

/// How much trust a component's pairing rules demand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationLevel {
    /// Everyday pairings.
    #[default]
    Basic,
    /// Pairings that move energy or control.
    Enhanced,
    /// Safety-relevant pairings.
    Critical,
}

impl AuthorizationLevel {
    /// Minimum trust score a pairing at this level must meet.
    pub fn min_trust(self) -> f64 {
        match self {
            Self::Basic => 0.50,
            Self::Enhanced => 0.70,
            Self::Critical => 0.85,
        }
    }
}

fn default_rules_context() -> String {
    "component_authorization".into()
}

/// Which partner categories a component accepts, by category digest.
///
/// `outbound` governs pairings the component starts and `inbound` those it
/// answers. A direction without its own list uses `allowed`. With no list
/// at all every partner is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRules {
    /// LCT the rules were agreed under.
    pub lct_id: LctId,
    /// Trust level the rules demand.
    #[serde(default)]
    pub authorization_level: AuthorizationLevel,
    /// Application context.
    #[serde(default = "default_rules_context")]
    pub context: String,
    /// Partner categories for pairings this component starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<Vec<IdentityDigest>>,
    /// Partner categories for pairings this component answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<Vec<IdentityDigest>>,
    /// Partner categories for either direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<IdentityDigest>>,
}

/// Direction of a pairing from one component's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairingDirection {
    /// The component starts the pairing.
    Outbound,
    /// The component answers it.
    Inbound,
}

impl PairingRules {
    /// Unrestricted basic rules agreed under `lct_id`.
    pub fn new(lct_id: LctId) -> Self {
        Self {
            lct_id,
            authorization_level: AuthorizationLevel::Basic,
            context: default_rules_context(),
            outbound: None,
            inbound: None,
            allowed: None,
        }
    }

    /// Whether a partner of `category` is accepted in `direction`.
    pub fn accepts(&self, category: &IdentityDigest, direction: PairingDirection) -> bool {
        let directed = match direction {
            PairingDirection::Outbound => self.outbound.as_ref(),
            PairingDirection::Inbound => self.inbound.as_ref(),
        };
        match directed.or(self.allowed.as_ref()) {
            Some(list) => list.contains(category),
            None => true,
        }
    }

    /// Categories accepted for pairings the component starts, deduplicated
    /// in first-seen order. Empty when nothing restricts them.
    pub fn partner_categories(&self) -> Vec<IdentityDigest> {
        let mut out: Vec<IdentityDigest> = Vec::new();
        let lists = [self.outbound.as_ref(), self.allowed.as_ref()];
        for category in lists.into_iter().flatten().flatten() {
            if !out.contains(category) {
                out.push(category.clone());
            }
        }
        out
    }
}

/// Pairing rules journalled for one anonymous component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRules {
    /// Component digest.
    pub component_hash: IdentityDigest,
    /// The rules.
    #[serde(flatten)]
    pub rules: PairingRules,
    /// Last update (unix seconds).
    pub updated_at: u64,
}
