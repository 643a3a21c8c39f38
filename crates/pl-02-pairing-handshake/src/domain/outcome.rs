//! Requests and results of the handshake API.

use super::lct::Lct;
use shared_types::{
    ChallengeId, Committed, ComponentRef, LctAccessRules, LctId, PairingChallenge,
    PairingRequest, TxReceipt,
};

/// Input of `initiate`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitiateRequest {
    /// Initiating component.
    pub component_a: ComponentRef,
    /// Target component.
    pub component_b: ComponentRef,
    /// Operational context.
    pub context: String,
    /// Optional intermediary.
    pub proxy_id: Option<String>,
    /// Skip the liveness check and never queue.
    pub force_immediate: bool,
}

impl InitiateRequest {
    /// Request with no proxy that respects liveness.
    pub fn new(component_a: ComponentRef, component_b: ComponentRef, context: impl Into<String>) -> Self {
        Self {
            component_a,
            component_b,
            context: context.into(),
            proxy_id: None,
            force_immediate: false,
        }
    }

    /// Route through `proxy_id`.
    pub fn with_proxy(mut self, proxy_id: impl Into<String>) -> Self {
        self.proxy_id = Some(proxy_id.into());
        self
    }

    /// Skip the liveness check.
    pub fn immediate(mut self) -> Self {
        self.force_immediate = true;
        self
    }
}

/// Result of `initiate`.
#[derive(Clone, Debug, PartialEq)]
pub enum InitiateOutcome {
    /// A challenge was created.
    Challenge(Committed<PairingChallenge>),
    /// A peer was unreachable and the pairing was queued.
    Queued(Committed<PairingRequest>),
}

impl InitiateOutcome {
    /// Challenge, if one was created.
    pub fn challenge(&self) -> Option<&PairingChallenge> {
        match self {
            InitiateOutcome::Challenge(c) => Some(&c.entity),
            InitiateOutcome::Queued(_) => None,
        }
    }

    /// Queue entry, if the pairing was deferred.
    pub fn queued(&self) -> Option<&PairingRequest> {
        match self {
            InitiateOutcome::Queued(r) => Some(&r.entity),
            InitiateOutcome::Challenge(_) => None,
        }
    }

    /// Whether the pairing was deferred.
    pub fn is_queued(&self) -> bool {
        matches!(self, InitiateOutcome::Queued(_))
    }

    /// Receipt of the journal write.
    pub fn receipt(&self) -> &TxReceipt {
        match self {
            InitiateOutcome::Challenge(c) => &c.receipt,
            InitiateOutcome::Queued(r) => &r.receipt,
        }
    }
}

/// Input of `complete`.
#[derive(Clone, PartialEq, Eq)]
pub struct CompleteRequest {
    /// Challenge being answered.
    pub challenge_id: ChallengeId,
    /// Token of side A.
    pub auth_a: String,
    /// Token of side B.
    pub auth_b: String,
    /// Session context recorded on the LCT.
    pub session_context: String,
    /// Who may use the LCT.
    pub access_rules: LctAccessRules,
}

impl std::fmt::Debug for CompleteRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompleteRequest")
            .field("challenge_id", &self.challenge_id)
            .field("auth_a", &"***")
            .field("auth_b", &"***")
            .field("session_context", &self.session_context)
            .field("access_rules", &self.access_rules)
            .finish()
    }
}

/// Result of `complete`.
#[derive(Debug)]
pub struct PairingCompletion {
    /// The new LCT, with both key halves.
    pub lct: Lct,
    /// Receipt of the `complete_pairing` write.
    pub receipt: TxReceipt,
    /// Trust score after the update, when the trust ledger answered.
    pub trust_score: Option<f64>,
}

/// Result of `revoke`.
#[derive(Clone, Debug, PartialEq)]
pub struct RevokeOutcome {
    /// Revoked LCT.
    pub lct_id: LctId,
    /// The LCT was already terminated; nothing was done.
    pub already_terminated: bool,
    /// Receipt of the `revoke_pairing` write.
    pub receipt: Option<TxReceipt>,
    /// Peers that were sent an offline notice.
    pub notified: Vec<ComponentRef>,
    /// Trust score after the update, when the trust ledger answered.
    pub trust_score: Option<f64>,
}
