//! # Inbound Ports
//!
//! What the pairing handshake can do.

use crate::domain::{
    AccessDecision, CompleteRequest, InitiateOutcome, InitiateRequest, PairingCompletion, RevokeOutcome,
};
use async_trait::async_trait;
use shared_types::{
    ChallengeId, ChallengeStatus, Committed, ComponentRole, LctId, LctRecord, LctStatus,
    PairingChallenge, PairingError,
};

/// Pairing handshake API - inbound port.
#[async_trait]
pub trait PairingHandshakeApi: Send + Sync {
    /// Create a challenge, or queue the pairing when a peer is unreachable.
    async fn initiate(
        &self,
        creator: &str,
        request: InitiateRequest,
    ) -> Result<InitiateOutcome, PairingError>;

    /// Record one side's acknowledgement.
    async fn acknowledge(
        &self,
        creator: &str,
        challenge_id: &ChallengeId,
        role: ComponentRole,
    ) -> Result<ChallengeStatus, PairingError>;

    /// Verify both tokens and create the LCT.
    async fn complete(
        &self,
        creator: &str,
        request: CompleteRequest,
    ) -> Result<PairingCompletion, PairingError>;

    /// Terminate an LCT. Revoking a terminated LCT is a no-op.
    async fn revoke(
        &self,
        creator: &str,
        lct_id: &LctId,
        reason: &str,
        notify_offline: bool,
    ) -> Result<RevokeOutcome, PairingError>;

    /// Withdraw a challenge that has not completed.
    async fn revoke_challenge(
        &self,
        creator: &str,
        challenge_id: &ChallengeId,
        reason: &str,
    ) -> Result<Committed<PairingChallenge>, PairingError>;

    /// Suspend or reactivate an LCT.
    async fn update_lct_status(
        &self,
        creator: &str,
        lct_id: &LctId,
        status: LctStatus,
        reason: Option<String>,
    ) -> Result<LctRecord, PairingError>;

    /// Current status of a challenge.
    async fn get_status(&self, challenge_id: &ChallengeId) -> Result<ChallengeStatus, PairingError>;

    /// Full challenge.
    async fn get_challenge(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<PairingChallenge, PairingError>;

    /// LCT record.
    async fn get_lct(&self, lct_id: &LctId) -> Result<LctRecord, PairingError>;

    /// Every LCT the component is paired through, oldest first.
    async fn component_lcts(&self, component_id: &str) -> Result<Vec<LctRecord>, PairingError>;

    /// Whether `requestor_id` may use the LCT, and at what level. Decided on
    /// the ledger's copy.
    async fn validate_lct_access(
        &self,
        lct_id: &LctId,
        requestor_id: &str,
    ) -> Result<AccessDecision, PairingError>;

    /// Expire every open challenge past its deadline.
    async fn expire_stale(&self, creator: &str) -> Result<Vec<ChallengeId>, PairingError>;
}
