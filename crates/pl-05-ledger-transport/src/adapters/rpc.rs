//! # Streaming RPC Ledger Client
//!
//! JSON-RPC over a single WebSocket connection. Status changes are pushed
//! by the backend through `ledger_subscribeStatus`; the forwarding task
//! unsubscribes as soon as the caller cancels.

use crate::api::LedgerRpcClient;
use crate::config::TransportConfig;
use crate::retry::RetryPolicy;
use crate::wire;
use async_trait::async_trait;
use futures::StreamExt;
use jsonrpsee::core::ClientError;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use shared_types::stream::DEFAULT_STREAM_CAPACITY;
use shared_types::{
    AnonymousComponentRecord, Capabilities, ChallengeId, ChallengeStatus, ComponentRules,
    IdentityDigest, LctId, LctRecord, LctStatus, LedgerCall, LedgerTransport, PairingAuthorization, PairingChallenge,
    PairingRequest, RequestId, RequestStatus, RevocationEvent, RevokePairing, ScoreUpdate,
    StatusChange, StatusStream, TensorId, TensorStatus, TransportError, TransportKind,
    TrustTensor, TxResult,
};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ledger client speaking JSON-RPC over WebSocket.
#[derive(Clone)]
pub struct RpcLedgerClient {
    client: Arc<WsClient>,
    url: String,
    timeout_ms: u64,
    retry: RetryPolicy,
    capabilities: Capabilities,
}

impl RpcLedgerClient {
    /// Open the WebSocket and negotiate capabilities.
    pub async fn connect(config: TransportConfig) -> Result<(Self, Capabilities), TransportError> {
        let timeout_ms = config.request_timeout_ms;
        let client = WsClientBuilder::default()
            .request_timeout(config.request_timeout())
            .connection_timeout(config.connect_timeout())
            .build(&config.rpc_url)
            .await
            .map_err(|e| wire::error_from_client(e, timeout_ms))?;

        let mut negotiated = client
            .capabilities()
            .await
            .map_err(|e| wire::error_from_client(e, timeout_ms))?;
        negotiated.kind = TransportKind::StreamingRpc;
        negotiated.push_updates = true;

        info!(
            "[pl-05] Streaming RPC transport connected to {} (backend {})",
            config.rpc_url, negotiated.backend_version
        );
        let rpc = Self {
            client: Arc::new(client),
            url: config.rpc_url.clone(),
            timeout_ms,
            retry: RetryPolicy::from_config(&config),
            capabilities: negotiated.clone(),
        };
        Ok((rpc, negotiated))
    }

    /// Endpoint the client is connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the underlying WebSocket is still open.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    async fn call<T, Fut>(&self, fut: Fut) -> Result<T, TransportError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        fut.await
            .map_err(|e| wire::error_from_client(e, self.timeout_ms))
    }

    async fn read<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut(Arc<WsClient>) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let timeout_ms = self.timeout_ms;
        let client = &self.client;
        self.retry
            .run(what, move || {
                let fut = op(Arc::clone(client));
                async move { fut.await.map_err(|e| wire::error_from_client(e, timeout_ms)) }
            })
            .await
    }
}

#[async_trait]
impl LedgerTransport for RpcLedgerClient {
    fn kind(&self) -> TransportKind {
        TransportKind::StreamingRpc
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn register_anonymous_component(
        &self,
        call: LedgerCall<AnonymousComponentRecord>,
    ) -> TxResult<AnonymousComponentRecord> {
        self.call(self.client.register_anonymous_component(call)).await
    }

    async fn revoke_anonymous_component(
        &self,
        call: LedgerCall<RevocationEvent>,
    ) -> TxResult<RevocationEvent> {
        self.call(self.client.revoke_anonymous_component(call)).await
    }

    async fn authorize_anonymous_pairing(
        &self,
        call: LedgerCall<PairingAuthorization>,
    ) -> TxResult<PairingAuthorization> {
        self.call(self.client.authorize_anonymous_pairing(call)).await
    }

    async fn get_anonymous_component(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<AnonymousComponentRecord, TransportError> {
        let hash = component_hash.to_string();
        self.read("get_anonymous_component", |c| {
            let hash = hash.clone();
            async move { c.get_anonymous_component(hash).await }
        })
        .await
    }

    async fn set_component_rules(
        &self,
        call: LedgerCall<ComponentRules>,
    ) -> TxResult<ComponentRules> {
        self.call(self.client.set_component_rules(call)).await
    }

    async fn get_component_rules(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<ComponentRules, TransportError> {
        let hash = component_hash.to_string();
        self.read("get_component_rules", |c| {
            let hash = hash.clone();
            async move { c.get_component_rules(hash).await }
        })
        .await
    }

    async fn initiate_pairing(
        &self,
        call: LedgerCall<PairingChallenge>,
    ) -> TxResult<PairingChallenge> {
        self.call(self.client.initiate_pairing(call)).await
    }

    async fn update_challenge_status(
        &self,
        call: LedgerCall<StatusChange<ChallengeStatus>>,
    ) -> TxResult<StatusChange<ChallengeStatus>> {
        self.call(self.client.update_challenge_status(call)).await
    }

    async fn get_challenge(&self, id: &ChallengeId) -> Result<PairingChallenge, TransportError> {
        let id = id.to_string();
        self.read("get_challenge", |c| {
            let id = id.clone();
            async move { c.get_challenge(id).await }
        })
        .await
    }

    async fn complete_pairing(&self, call: LedgerCall<LctRecord>) -> TxResult<LctRecord> {
        self.call(self.client.complete_pairing(call)).await
    }

    async fn update_lct_status(
        &self,
        call: LedgerCall<StatusChange<LctStatus>>,
    ) -> TxResult<StatusChange<LctStatus>> {
        self.call(self.client.update_lct_status(call)).await
    }

    async fn revoke_pairing(&self, call: LedgerCall<RevokePairing>) -> TxResult<RevokePairing> {
        self.call(self.client.revoke_pairing(call)).await
    }

    async fn get_lct(&self, id: &LctId) -> Result<LctRecord, TransportError> {
        let id = id.to_string();
        self.read("get_lct", |c| {
            let id = id.clone();
            async move { c.get_lct(id).await }
        })
        .await
    }

    async fn list_component_lcts(
        &self,
        component_id: &str,
    ) -> Result<Vec<LctRecord>, TransportError> {
        let id = component_id.to_string();
        self.read("list_component_lcts", |c| {
            let id = id.clone();
            async move { c.list_component_lcts(id).await }
        })
        .await
    }

    async fn queue_pairing_request(
        &self,
        call: LedgerCall<PairingRequest>,
    ) -> TxResult<PairingRequest> {
        self.call(self.client.queue_pairing_request(call)).await
    }

    async fn update_request_status(
        &self,
        call: LedgerCall<StatusChange<RequestStatus>>,
    ) -> TxResult<StatusChange<RequestStatus>> {
        self.call(self.client.update_request_status(call)).await
    }

    async fn get_pairing_request(&self, id: &RequestId) -> Result<PairingRequest, TransportError> {
        let id = id.to_string();
        self.read("get_pairing_request", |c| {
            let id = id.clone();
            async move { c.get_pairing_request(id).await }
        })
        .await
    }

    async fn create_trust_tensor(&self, call: LedgerCall<TrustTensor>) -> TxResult<TrustTensor> {
        self.call(self.client.create_trust_tensor(call)).await
    }

    async fn update_trust_score(&self, call: LedgerCall<ScoreUpdate>) -> TxResult<ScoreUpdate> {
        self.call(self.client.update_trust_score(call)).await
    }

    async fn update_tensor_status(
        &self,
        call: LedgerCall<StatusChange<TensorStatus>>,
    ) -> TxResult<StatusChange<TensorStatus>> {
        self.call(self.client.update_tensor_status(call)).await
    }

    async fn get_trust_tensor(&self, id: &TensorId) -> Result<TrustTensor, TransportError> {
        let id = id.to_string();
        self.read("get_trust_tensor", |c| {
            let id = id.clone();
            async move { c.get_trust_tensor(id).await }
        })
        .await
    }

    async fn watch_status(
        &self,
        entity_id: &str,
        cancel: CancellationToken,
    ) -> Result<StatusStream, TransportError> {
        let mut subscription = self
            .call(self.client.subscribe_status(entity_id.to_string()))
            .await?;
        let (tx, stream) = StatusStream::channel(DEFAULT_STREAM_CAPACITY, cancel);
        let entity_id = entity_id.to_string();

        tokio::spawn(async move {
            let mut cancelled = false;
            loop {
                let item = tokio::select! {
                    biased;
                    _ = tx.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    item = subscription.next() => item,
                };
                match item {
                    Some(Ok(update)) => {
                        if !tx.send(update).await {
                            cancelled = true;
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("[pl-05] Undecodable status notification for {}: {}", entity_id, e);
                    }
                    // Backend closed the subscription.
                    None => break,
                }
            }
            if cancelled {
                if let Err(e) = subscription.unsubscribe().await {
                    debug!("[pl-05] Unsubscribe for {} failed: {}", entity_id, e);
                }
            }
            debug!("[pl-05] RPC watch on {} stopped", entity_id);
        });

        Ok(stream)
    }
}

impl std::fmt::Debug for RpcLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedgerClient")
            .field("url", &self.url)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
