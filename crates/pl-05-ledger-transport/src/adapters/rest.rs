//! # REST Ledger Client
//!
//! JSON over HTTP. Status watching polls `GET /v1/status/:id` and emits
//! only when the status changes.

use crate::config::TransportConfig;
use crate::retry::RetryPolicy;
use crate::wire::{self, routes, ErrorBody, HealthResponse};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::stream::DEFAULT_STREAM_CAPACITY;
use reqwest::Url;
use shared_types::{
    AnonymousComponentRecord, Capabilities, ChallengeId, ChallengeStatus, ComponentRules,
    IdentityDigest, LctId,
    LctRecord, LctStatus, LedgerCall, LedgerTransport, PairingAuthorization, PairingChallenge,
    PairingRequest, RejectCode, RequestId, RequestStatus, RevocationEvent, RevokePairing, ScoreUpdate,
    StatusChange, StatusStream, StatusUpdate, TensorId, TensorStatus, TransportError,
    TransportKind, TrustTensor, TxResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Ledger client speaking JSON over HTTP.
#[derive(Clone)]
pub struct RestLedgerClient {
    http: reqwest::Client,
    base_url: Url,
    config: TransportConfig,
    retry: RetryPolicy,
    capabilities: Capabilities,
}

impl RestLedgerClient {
    /// Build a client and check `/health`.
    pub async fn connect(config: TransportConfig) -> Result<(Self, Capabilities), TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| TransportError::Unreachable(format!("http client: {e}")))?;
        let base_url = Url::parse(&config.rest_url).map_err(|e| TransportError::Rejected {
            code: RejectCode::InvalidRequest,
            message: format!("rest url {}: {e}", config.rest_url),
        })?;
        let mut client = Self {
            http,
            base_url,
            retry: RetryPolicy::from_config(&config),
            config,
            capabilities: Capabilities {
                kind: TransportKind::Rest,
                push_updates: false,
                backend_version: String::new(),
            },
        };

        let checker = &client;
        let health: HealthResponse = checker
            .retry
            .run("health check", move || checker.get_json(routes::HEALTH, ""))
            .await?;
        if health.status != "ok" {
            return Err(TransportError::Unreachable(format!(
                "backend reports status '{}'",
                health.status
            )));
        }
        client.capabilities.backend_version = health.backend_version;
        info!(
            "[pl-05] REST transport connected to {} (backend {})",
            client.base_url, client.capabilities.backend_version
        );
        let capabilities = client.capabilities.clone();
        Ok((client, capabilities))
    }

    /// Base URL requests go to.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    async fn decode<R: DeserializeOwned>(&self, response: reqwest::Response) -> Result<R, TransportError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()));
        }
        let body = response.json::<ErrorBody>().await.ok();
        Err(wire::error_from_http(status.as_u16(), body))
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        route: &str,
        id: &str,
    ) -> Result<R, TransportError> {
        let url = routes::endpoint(&self.base_url, route, id)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| wire::error_from_reqwest(e, self.config.request_timeout_ms))?;
        self.decode(response).await
    }

    async fn read<R: DeserializeOwned>(
        &self,
        what: &str,
        route: &str,
        id: &str,
    ) -> Result<R, TransportError> {
        self.retry
            .run(what, move || self.get_json(route, id))
            .await
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        route: &str,
        id: &str,
        body: &B,
    ) -> Result<R, TransportError> {
        let url = routes::endpoint(&self.base_url, route, id)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| wire::error_from_reqwest(e, self.config.request_timeout_ms))?;
        self.decode(response).await
    }
}

#[async_trait]
impl LedgerTransport for RestLedgerClient {
    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn register_anonymous_component(
        &self,
        call: LedgerCall<AnonymousComponentRecord>,
    ) -> TxResult<AnonymousComponentRecord> {
        self.post(routes::COMPONENTS, "", &call).await
    }

    async fn revoke_anonymous_component(
        &self,
        call: LedgerCall<RevocationEvent>,
    ) -> TxResult<RevocationEvent> {
        self.post(routes::COMPONENT_REVOKE, call.payload.target_hash.as_str(), &call).await
    }

    async fn authorize_anonymous_pairing(
        &self,
        call: LedgerCall<PairingAuthorization>,
    ) -> TxResult<PairingAuthorization> {
        self.post(routes::AUTHORIZATIONS, "", &call).await
    }

    async fn get_anonymous_component(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<AnonymousComponentRecord, TransportError> {
        self.read(
            "get_anonymous_component",
            routes::COMPONENT,
            component_hash.as_str(),
        )
        .await
    }

    async fn set_component_rules(
        &self,
        call: LedgerCall<ComponentRules>,
    ) -> TxResult<ComponentRules> {
        self.post(routes::COMPONENT_RULES, call.payload.component_hash.as_str(), &call).await
    }

    async fn get_component_rules(
        &self,
        component_hash: &IdentityDigest,
    ) -> Result<ComponentRules, TransportError> {
        self.read(
            "get_component_rules",
            routes::COMPONENT_RULES,
            component_hash.as_str(),
        )
        .await
    }

    async fn initiate_pairing(
        &self,
        call: LedgerCall<PairingChallenge>,
    ) -> TxResult<PairingChallenge> {
        self.post(routes::CHALLENGES, "", &call).await
    }

    async fn update_challenge_status(
        &self,
        call: LedgerCall<StatusChange<ChallengeStatus>>,
    ) -> TxResult<StatusChange<ChallengeStatus>> {
        self.post(routes::CHALLENGE_STATUS, &call.payload.id, &call).await
    }

    async fn get_challenge(&self, id: &ChallengeId) -> Result<PairingChallenge, TransportError> {
        self.read("get_challenge", routes::CHALLENGE, id.as_str())
            .await
    }

    async fn complete_pairing(&self, call: LedgerCall<LctRecord>) -> TxResult<LctRecord> {
        self.post(routes::LCTS, "", &call).await
    }

    async fn update_lct_status(
        &self,
        call: LedgerCall<StatusChange<LctStatus>>,
    ) -> TxResult<StatusChange<LctStatus>> {
        self.post(routes::LCT_STATUS, &call.payload.id, &call).await
    }

    async fn revoke_pairing(&self, call: LedgerCall<RevokePairing>) -> TxResult<RevokePairing> {
        self.post(routes::LCT_REVOKE, call.payload.lct_id.as_str(), &call).await
    }

    async fn get_lct(&self, id: &LctId) -> Result<LctRecord, TransportError> {
        self.read("get_lct", routes::LCT, id.as_str())
            .await
    }

    async fn list_component_lcts(
        &self,
        component_id: &str,
    ) -> Result<Vec<LctRecord>, TransportError> {
        self.read("list_component_lcts", routes::COMPONENT_LCTS, component_id)
            .await
    }

    async fn queue_pairing_request(
        &self,
        call: LedgerCall<PairingRequest>,
    ) -> TxResult<PairingRequest> {
        self.post(routes::REQUESTS, "", &call).await
    }

    async fn update_request_status(
        &self,
        call: LedgerCall<StatusChange<RequestStatus>>,
    ) -> TxResult<StatusChange<RequestStatus>> {
        self.post(routes::REQUEST_STATUS, &call.payload.id, &call).await
    }

    async fn get_pairing_request(&self, id: &RequestId) -> Result<PairingRequest, TransportError> {
        self.read("get_pairing_request", routes::REQUEST, id.as_str())
            .await
    }

    async fn create_trust_tensor(&self, call: LedgerCall<TrustTensor>) -> TxResult<TrustTensor> {
        self.post(routes::TENSORS, "", &call).await
    }

    async fn update_trust_score(&self, call: LedgerCall<ScoreUpdate>) -> TxResult<ScoreUpdate> {
        self.post(routes::TENSOR_SCORE, call.payload.tensor_id.as_str(), &call).await
    }

    async fn update_tensor_status(
        &self,
        call: LedgerCall<StatusChange<TensorStatus>>,
    ) -> TxResult<StatusChange<TensorStatus>> {
        self.post(routes::TENSOR_STATUS, &call.payload.id, &call).await
    }

    async fn get_trust_tensor(&self, id: &TensorId) -> Result<TrustTensor, TransportError> {
        self.read("get_trust_tensor", routes::TENSOR, id.as_str())
            .await
    }

    async fn watch_status(
        &self,
        entity_id: &str,
        cancel: CancellationToken,
    ) -> Result<StatusStream, TransportError> {
        let (tx, stream) = StatusStream::channel(DEFAULT_STREAM_CAPACITY, cancel);
        let client = self.clone();
        let entity_id = entity_id.to_string();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(client.config.poll_interval());
            let mut last: Option<String> = None;
            loop {
                tokio::select! {
                    biased;
                    _ = tx.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let fetched = tokio::select! {
                    biased;
                    _ = tx.cancelled() => break,
                    fetched = client.get_json::<StatusUpdate>(routes::STATUS, &entity_id) => fetched,
                };
                match fetched {
                    Ok(update) => {
                        if last.as_deref() == Some(update.status.as_str()) {
                            continue;
                        }
                        last = Some(update.status.clone());
                        if !tx.send(update).await {
                            break;
                        }
                    }
                    // Not created yet; keep polling.
                    Err(e) if e.is_not_found() => {}
                    Err(e) => debug!("[pl-05] Status poll for {} failed: {}", entity_id, e),
                }
            }
            debug!("[pl-05] REST watch on {} stopped", entity_id);
        });

        Ok(stream)
    }
}

impl std::fmt::Debug for RestLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestLedgerClient")
            .field("base_url", &self.base_url)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
