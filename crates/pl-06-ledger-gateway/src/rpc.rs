//! # JSON-RPC Server
//!
//! [`LedgerRpcServer`] over the [`InMemoryLedger`]. Errors are encoded with
//! [`wire::rpc_error`]; `ledger_subscribeStatus` sends the current status
//! of the entity first, then every change until the client unsubscribes.

use crate::ledger::InMemoryLedger;
use jsonrpsee::core::{async_trait, SubscriptionResult};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage};
use pl_05_ledger_transport::api::{LedgerRpcServer, RpcResult};
use pl_05_ledger_transport::wire;
use shared_types::{
    AnonymousComponentRecord, Capabilities, ChallengeId, ChallengeStatus, Committed,
    ComponentRules, IdentityDigest, LctId, LctRecord, LctStatus, LedgerCall, LedgerTransport,
    PairingAuthorization, PairingChallenge, PairingRequest, RejectCode, RequestId, RequestStatus,
    RevocationEvent, RevokePairing, ScoreUpdate, StatusChange, StatusUpdate, TensorId,
    TensorStatus, TransportError, TransportKind, TrustTensor,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// RPC handlers bound to one ledger.
#[derive(Clone, Debug)]
pub struct LedgerRpcHandler {
    ledger: Arc<InMemoryLedger>,
}

impl LedgerRpcHandler {
    /// Serve `ledger`.
    pub fn new(ledger: Arc<InMemoryLedger>) -> Self {
        Self { ledger }
    }
}

fn encode<T>(result: Result<T, TransportError>) -> RpcResult<T> {
    result.map_err(|e| wire::rpc_error(&e))
}

fn parse_digest(hash: &str) -> Result<IdentityDigest, ErrorObjectOwned> {
    IdentityDigest::parse(hash).map_err(|e| {
        wire::rpc_error(&TransportError::Rejected {
            code: RejectCode::InvalidRequest,
            message: e.to_string(),
        })
    })
}

#[async_trait]
impl LedgerRpcServer for LedgerRpcHandler {
    async fn capabilities(&self) -> RpcResult<Capabilities> {
        Ok(Capabilities {
            kind: TransportKind::StreamingRpc,
            push_updates: true,
            backend_version: self.ledger.backend_version().to_string(),
        })
    }

    async fn register_anonymous_component(
        &self,
        call: LedgerCall<AnonymousComponentRecord>,
    ) -> RpcResult<Committed<AnonymousComponentRecord>> {
        encode(self.ledger.register_anonymous_component(call).await)
    }

    async fn revoke_anonymous_component(
        &self,
        call: LedgerCall<RevocationEvent>,
    ) -> RpcResult<Committed<RevocationEvent>> {
        encode(self.ledger.revoke_anonymous_component(call).await)
    }

    async fn authorize_anonymous_pairing(
        &self,
        call: LedgerCall<PairingAuthorization>,
    ) -> RpcResult<Committed<PairingAuthorization>> {
        encode(self.ledger.authorize_anonymous_pairing(call).await)
    }

    async fn get_anonymous_component(
        &self,
        component_hash: String,
    ) -> RpcResult<AnonymousComponentRecord> {
        let digest = parse_digest(&component_hash)?;
        encode(self.ledger.get_anonymous_component(&digest).await)
    }

    async fn set_component_rules(
        &self,
        call: LedgerCall<ComponentRules>,
    ) -> RpcResult<Committed<ComponentRules>> {
        encode(self.ledger.set_component_rules(call).await)
    }

    async fn get_component_rules(&self, component_hash: String) -> RpcResult<ComponentRules> {
        let digest = parse_digest(&component_hash)?;
        encode(self.ledger.get_component_rules(&digest).await)
    }

    async fn initiate_pairing(
        &self,
        call: LedgerCall<PairingChallenge>,
    ) -> RpcResult<Committed<PairingChallenge>> {
        encode(self.ledger.initiate_pairing(call).await)
    }

    async fn update_challenge_status(
        &self,
        call: LedgerCall<StatusChange<ChallengeStatus>>,
    ) -> RpcResult<Committed<StatusChange<ChallengeStatus>>> {
        encode(self.ledger.update_challenge_status(call).await)
    }

    async fn get_challenge(&self, challenge_id: String) -> RpcResult<PairingChallenge> {
        encode(self.ledger.get_challenge(&ChallengeId::new(challenge_id)).await)
    }

    async fn complete_pairing(&self, call: LedgerCall<LctRecord>) -> RpcResult<Committed<LctRecord>> {
        encode(self.ledger.complete_pairing(call).await)
    }

    async fn update_lct_status(
        &self,
        call: LedgerCall<StatusChange<LctStatus>>,
    ) -> RpcResult<Committed<StatusChange<LctStatus>>> {
        encode(self.ledger.update_lct_status(call).await)
    }

    async fn revoke_pairing(
        &self,
        call: LedgerCall<RevokePairing>,
    ) -> RpcResult<Committed<RevokePairing>> {
        encode(self.ledger.revoke_pairing(call).await)
    }

    async fn get_lct(&self, lct_id: String) -> RpcResult<LctRecord> {
        encode(self.ledger.get_lct(&LctId::new(lct_id)).await)
    }

    async fn list_component_lcts(&self, component_id: String) -> RpcResult<Vec<LctRecord>> {
        encode(self.ledger.list_component_lcts(&component_id).await)
    }

    async fn queue_pairing_request(
        &self,
        call: LedgerCall<PairingRequest>,
    ) -> RpcResult<Committed<PairingRequest>> {
        encode(self.ledger.queue_pairing_request(call).await)
    }

    async fn update_request_status(
        &self,
        call: LedgerCall<StatusChange<RequestStatus>>,
    ) -> RpcResult<Committed<StatusChange<RequestStatus>>> {
        encode(self.ledger.update_request_status(call).await)
    }

    async fn get_pairing_request(&self, request_id: String) -> RpcResult<PairingRequest> {
        encode(self.ledger.get_pairing_request(&RequestId::new(request_id)).await)
    }

    async fn create_trust_tensor(
        &self,
        call: LedgerCall<TrustTensor>,
    ) -> RpcResult<Committed<TrustTensor>> {
        encode(self.ledger.create_trust_tensor(call).await)
    }

    async fn update_trust_score(
        &self,
        call: LedgerCall<ScoreUpdate>,
    ) -> RpcResult<Committed<ScoreUpdate>> {
        encode(self.ledger.update_trust_score(call).await)
    }

    async fn update_tensor_status(
        &self,
        call: LedgerCall<StatusChange<TensorStatus>>,
    ) -> RpcResult<Committed<StatusChange<TensorStatus>>> {
        encode(self.ledger.update_tensor_status(call).await)
    }

    async fn get_trust_tensor(&self, tensor_id: String) -> RpcResult<TrustTensor> {
        encode(self.ledger.get_trust_tensor(&TensorId::new(tensor_id)).await)
    }

    async fn get_status(&self, entity_id: String) -> RpcResult<StatusUpdate> {
        encode(self.ledger.current_status(&entity_id))
    }

    async fn subscribe_status(
        &self,
        pending: PendingSubscriptionSink,
        entity_id: String,
    ) -> SubscriptionResult {
        let mut updates = self.ledger.subscribe();
        let current = match self.ledger.current_status(&entity_id) {
            Ok(current) => Some(current),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                pending.reject(wire::rpc_error(&e)).await;
                return Ok(());
            }
        };
        let sink = pending.accept().await?;
        debug!("[pl-06] Status subscription opened for {}", entity_id);

        if let Some(current) = current {
            sink.send(SubscriptionMessage::from_json(&current)?).await?;
        }
        loop {
            let received = tokio::select! {
                biased;
                _ = sink.closed() => break,
                received = updates.recv() => received,
            };
            match received {
                Ok(update) if update.entity_id == entity_id => {
                    if sink
                        .send(SubscriptionMessage::from_json(&update)?)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "[pl-06] Subscription on {} lagged by {} updates",
                        entity_id, skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("[pl-06] Status subscription closed for {}", entity_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> LedgerRpcHandler {
        LedgerRpcHandler::new(Arc::new(InMemoryLedger::new("test", 16)))
    }

    #[tokio::test]
    async fn test_capabilities_advertise_push() {
        let caps = handler().capabilities().await.unwrap();
        assert_eq!(caps.kind, TransportKind::StreamingRpc);
        assert!(caps.push_updates);
        assert_eq!(caps.backend_version, "test");
    }

    #[tokio::test]
    async fn test_missing_lct_encodes_not_found_code() {
        let err = handler().get_lct("lct-404".into()).await.unwrap_err();
        assert_eq!(err.code(), wire::rpc_codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_digest_is_invalid_params() {
        let err = handler()
            .get_anonymous_component("not-hex".into())
            .await
            .unwrap_err();
        assert_eq!(err.code(), wire::rpc_codes::INVALID_PARAMS);
    }
}
