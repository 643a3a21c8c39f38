//! HMAC token verifier keyed by a shared authority key.

use crate::algorithms::auth_token::{component_key, compute_token, verify_token};
use crate::ports::AuthVerifier;
use async_trait::async_trait;
use shared_types::{ChallengeId, ComponentRef, ComponentRole, PairingChallenge, PairingError};
use tracing::debug;
use zeroize::Zeroizing;

/// Verifies tokens derived from an authority key.
///
/// Component keys are `HMAC(authority_key, component_id)`, so the authority
/// can provision a component without storing per-component secrets.
#[derive(Clone)]
pub struct HmacAuthVerifier {
    authority_key: Zeroizing<Vec<u8>>,
}

impl HmacAuthVerifier {
    /// Build from the authority key.
    pub fn new(authority_key: impl Into<Vec<u8>>) -> Result<Self, PairingError> {
        let authority_key = Zeroizing::new(authority_key.into());
        if authority_key.is_empty() {
            return Err(PairingError::Configuration("authority key is empty".into()));
        }
        Ok(Self { authority_key })
    }

    /// Key a component signs its tokens with.
    pub fn component_key(&self, component: &ComponentRef) -> Result<Zeroizing<[u8; 32]>, PairingError> {
        component_key(&self.authority_key, component.id())
    }

    /// Token `component` would present for `role` of a challenge.
    pub fn issue_token(
        &self,
        component: &ComponentRef,
        challenge_id: &ChallengeId,
        nonce: &str,
        role: ComponentRole,
    ) -> Result<String, PairingError> {
        let key = self.component_key(component)?;
        compute_token(&key[..], challenge_id, nonce, role)
    }

    /// Tokens for both sides of `challenge`.
    pub fn issue_pair(&self, challenge: &PairingChallenge) -> Result<(String, String), PairingError> {
        let a = self.issue_token(
            &challenge.component_a,
            &challenge.challenge_id,
            &challenge.nonce,
            ComponentRole::A,
        )?;
        let b = self.issue_token(
            &challenge.component_b,
            &challenge.challenge_id,
            &challenge.nonce,
            ComponentRole::B,
        )?;
        Ok((a, b))
    }
}

#[async_trait]
impl AuthVerifier for HmacAuthVerifier {
    async fn verify(
        &self,
        component: &ComponentRef,
        challenge: &PairingChallenge,
        role: ComponentRole,
        token: &str,
    ) -> bool {
        let Ok(key) = self.component_key(component) else {
            return false;
        };
        let ok = verify_token(
            &key[..],
            &challenge.challenge_id,
            &challenge.nonce,
            role,
            token,
        );
        if !ok {
            debug!(
                "[pl-02] Token rejected for {} of challenge {}",
                role, challenge.challenge_id
            );
        }
        ok
    }
}

impl std::fmt::Debug for HmacAuthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacAuthVerifier")
            .field("authority_key", &"***")
            .finish()
    }
}
