//! # Outbound Ports
//!
//! The queue needs one thing from the outside: a way to start a handshake
//! for a queued request once its peer is reachable, and to withdraw it when
//! the entry does not keep the result.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{ChallengeId, PairingError, PairingRequest, RequestId, TransportError};
use std::collections::HashSet;

/// Starts handshakes for queued requests - outbound port.
#[async_trait]
pub trait HandshakeGateway: Send + Sync {
    /// Start the handshake for `request` now, skipping liveness checks.
    async fn initiate_immediate(
        &self,
        creator: &str,
        request: &PairingRequest,
    ) -> Result<ChallengeId, PairingError>;

    /// Revoke a challenge started for an entry that ended without it.
    async fn abandon(
        &self,
        creator: &str,
        challenge_id: &ChallengeId,
        reason: &str,
    ) -> Result<(), PairingError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock gateway: succeeds unless a component is marked unresolvable.
#[derive(Default)]
pub struct MockHandshakeGateway {
    unresolvable: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RequestId>>,
    started: Mutex<Vec<ChallengeId>>,
    abandoned: Mutex<Vec<ChallengeId>>,
}

impl MockHandshakeGateway {
    /// Create a gateway that resolves everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make handshakes involving `component_id` fail.
    pub fn mark_unresolvable(&self, component_id: &str) {
        self.unresolvable.lock().insert(component_id.to_string());
    }

    /// Requests seen, in call order.
    pub fn calls(&self) -> Vec<RequestId> {
        self.calls.lock().clone()
    }

    /// Challenges handed out, in call order.
    pub fn started(&self) -> Vec<ChallengeId> {
        self.started.lock().clone()
    }

    /// Challenges withdrawn, in call order.
    pub fn abandoned(&self) -> Vec<ChallengeId> {
        self.abandoned.lock().clone()
    }
}

#[async_trait]
impl HandshakeGateway for MockHandshakeGateway {
    async fn initiate_immediate(
        &self,
        _creator: &str,
        request: &PairingRequest,
    ) -> Result<ChallengeId, PairingError> {
        self.calls.lock().push(request.request_id.clone());
        let unresolvable = self.unresolvable.lock();
        if unresolvable.contains(request.component_a.id())
            || unresolvable.contains(request.component_b.id())
        {
            return Err(PairingError::TransportFailure(TransportError::Unreachable(
                format!("{} did not answer", request.component_b),
            )));
        }
        let id = ChallengeId::generate();
        self.started.lock().push(id.clone());
        Ok(id)
    }

    async fn abandon(
        &self,
        _creator: &str,
        challenge_id: &ChallengeId,
        _reason: &str,
    ) -> Result<(), PairingError> {
        self.abandoned.lock().push(challenge_id.clone());
        Ok(())
    }
}
