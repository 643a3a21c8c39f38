//! # REST Router
//!
//! Serves every route in [`pl_05_ledger_transport::wire::routes`] from the
//! [`InMemoryLedger`]. Failures are rendered through
//! [`wire::http_error`] so the REST client decodes exactly what the RPC
//! client would.

use crate::ledger::InMemoryLedger;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pl_05_ledger_transport::wire::{self, routes, HealthResponse};
use shared_types::{
    AnonymousComponentRecord, ChallengeId, ChallengeStatus, Committed, ComponentRules,
    IdentityDigest, LctId,
    LctRecord, LctStatus, LedgerCall, LedgerTransport, PairingAuthorization, PairingChallenge,
    PairingRequest, RejectCode, RequestId, RequestStatus, RevocationEvent, RevokePairing,
    ScoreUpdate, StatusChange, StatusUpdate, TensorId, TensorStatus, TransportError, TrustTensor,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Ledger failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub TransportError);

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = wire::http_error(&self.0);
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;
type Ledger = State<Arc<InMemoryLedger>>;

/// Build the REST router.
pub fn build_router(ledger: Arc<InMemoryLedger>, request_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route(routes::HEALTH, get(health))
        .route(routes::COMPONENTS, post(register_component))
        .route(routes::AUTHORIZATIONS, post(authorize_pairing))
        .route(routes::COMPONENT, get(get_component))
        .route(routes::COMPONENT_REVOKE, post(revoke_component))
        .route(
            routes::COMPONENT_RULES,
            get(get_component_rules).post(set_component_rules),
        )
        .route(routes::CHALLENGES, post(initiate_pairing))
        .route(routes::CHALLENGE, get(get_challenge))
        .route(routes::CHALLENGE_STATUS, post(update_challenge_status))
        .route(routes::LCTS, post(complete_pairing))
        .route(routes::LCT, get(get_lct))
        .route(routes::LCT_STATUS, post(update_lct_status))
        .route(routes::LCT_REVOKE, post(revoke_pairing))
        .route(routes::COMPONENT_LCTS, get(list_component_lcts))
        .route(routes::REQUESTS, post(queue_request))
        .route(routes::REQUEST, get(get_request))
        .route(routes::REQUEST_STATUS, post(update_request_status))
        .route(routes::TENSORS, post(create_tensor))
        .route(routes::TENSOR, get(get_tensor))
        .route(routes::TENSOR_SCORE, post(update_score))
        .route(routes::TENSOR_STATUS, post(update_tensor_status))
        .route(routes::STATUS, get(get_status))
        .layer(middleware)
        .with_state(ledger)
}

/// The id in the path must name the record in the body.
fn same_id(path: &str, payload: &str) -> Result<(), ApiError> {
    if path == payload {
        Ok(())
    } else {
        Err(ApiError(TransportError::Rejected {
            code: RejectCode::InvalidRequest,
            message: format!("path id {path} does not match payload id {payload}"),
        }))
    }
}

async fn health(State(ledger): Ledger) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        backend_version: ledger.backend_version().to_string(),
        push_updates: false,
    })
}

async fn register_component(
    State(ledger): Ledger,
    Json(call): Json<LedgerCall<AnonymousComponentRecord>>,
) -> ApiResult<Committed<AnonymousComponentRecord>> {
    Ok(Json(ledger.register_anonymous_component(call).await?))
}

async fn revoke_component(
    State(ledger): Ledger,
    Path(hash): Path<String>,
    Json(call): Json<LedgerCall<RevocationEvent>>,
) -> ApiResult<Committed<RevocationEvent>> {
    same_id(&hash, call.payload.target_hash.as_str())?;
    Ok(Json(ledger.revoke_anonymous_component(call).await?))
}

async fn authorize_pairing(
    State(ledger): Ledger,
    Json(call): Json<LedgerCall<PairingAuthorization>>,
) -> ApiResult<Committed<PairingAuthorization>> {
    Ok(Json(ledger.authorize_anonymous_pairing(call).await?))
}

fn digest(hash: &str) -> Result<IdentityDigest, ApiError> {
    IdentityDigest::parse(hash).map_err(|e| {
        ApiError(TransportError::Rejected {
            code: RejectCode::InvalidRequest,
            message: e.to_string(),
        })
    })
}

async fn get_component(
    State(ledger): Ledger,
    Path(hash): Path<String>,
) -> ApiResult<AnonymousComponentRecord> {
    Ok(Json(ledger.get_anonymous_component(&digest(&hash)?).await?))
}

async fn set_component_rules(
    State(ledger): Ledger,
    Path(hash): Path<String>,
    Json(call): Json<LedgerCall<ComponentRules>>,
) -> ApiResult<Committed<ComponentRules>> {
    same_id(&hash, call.payload.component_hash.as_str())?;
    Ok(Json(ledger.set_component_rules(call).await?))
}

async fn get_component_rules(
    State(ledger): Ledger,
    Path(hash): Path<String>,
) -> ApiResult<ComponentRules> {
    Ok(Json(ledger.get_component_rules(&digest(&hash)?).await?))
}

async fn initiate_pairing(
    State(ledger): Ledger,
    Json(call): Json<LedgerCall<PairingChallenge>>,
) -> ApiResult<Committed<PairingChallenge>> {
    Ok(Json(ledger.initiate_pairing(call).await?))
}

async fn list_component_lcts(
    State(ledger): Ledger,
    Path(id): Path<String>,
) -> ApiResult<Vec<LctRecord>> {
    Ok(Json(ledger.list_component_lcts(&id).await?))
}

async fn get_challenge(State(ledger): Ledger, Path(id): Path<String>) -> ApiResult<PairingChallenge> {
    Ok(Json(ledger.get_challenge(&ChallengeId::new(id)).await?))
}

async fn update_challenge_status(
    State(ledger): Ledger,
    Path(id): Path<String>,
    Json(call): Json<LedgerCall<StatusChange<ChallengeStatus>>>,
) -> ApiResult<Committed<StatusChange<ChallengeStatus>>> {
    same_id(&id, &call.payload.id)?;
    Ok(Json(ledger.update_challenge_status(call).await?))
}

async fn complete_pairing(
    State(ledger): Ledger,
    Json(call): Json<LedgerCall<LctRecord>>,
) -> ApiResult<Committed<LctRecord>> {
    Ok(Json(ledger.complete_pairing(call).await?))
}

async fn get_lct(State(ledger): Ledger, Path(id): Path<String>) -> ApiResult<LctRecord> {
    Ok(Json(ledger.get_lct(&LctId::new(id)).await?))
}

async fn update_lct_status(
    State(ledger): Ledger,
    Path(id): Path<String>,
    Json(call): Json<LedgerCall<StatusChange<LctStatus>>>,
) -> ApiResult<Committed<StatusChange<LctStatus>>> {
    same_id(&id, &call.payload.id)?;
    Ok(Json(ledger.update_lct_status(call).await?))
}

async fn revoke_pairing(
    State(ledger): Ledger,
    Path(id): Path<String>,
    Json(call): Json<LedgerCall<RevokePairing>>,
) -> ApiResult<Committed<RevokePairing>> {
    same_id(&id, call.payload.lct_id.as_str())?;
    Ok(Json(ledger.revoke_pairing(call).await?))
}

async fn queue_request(
    State(ledger): Ledger,
    Json(call): Json<LedgerCall<PairingRequest>>,
) -> ApiResult<Committed<PairingRequest>> {
    Ok(Json(ledger.queue_pairing_request(call).await?))
}

async fn get_request(State(ledger): Ledger, Path(id): Path<String>) -> ApiResult<PairingRequest> {
    Ok(Json(ledger.get_pairing_request(&RequestId::new(id)).await?))
}

async fn update_request_status(
    State(ledger): Ledger,
    Path(id): Path<String>,
    Json(call): Json<LedgerCall<StatusChange<RequestStatus>>>,
) -> ApiResult<Committed<StatusChange<RequestStatus>>> {
    same_id(&id, &call.payload.id)?;
    Ok(Json(ledger.update_request_status(call).await?))
}

async fn create_tensor(
    State(ledger): Ledger,
    Json(call): Json<LedgerCall<TrustTensor>>,
) -> ApiResult<Committed<TrustTensor>> {
    Ok(Json(ledger.create_trust_tensor(call).await?))
}

async fn get_tensor(State(ledger): Ledger, Path(id): Path<String>) -> ApiResult<TrustTensor> {
    Ok(Json(ledger.get_trust_tensor(&TensorId::new(id)).await?))
}

async fn update_score(
    State(ledger): Ledger,
    Path(id): Path<String>,
    Json(call): Json<LedgerCall<ScoreUpdate>>,
) -> ApiResult<Committed<ScoreUpdate>> {
    same_id(&id, call.payload.tensor_id.as_str())?;
    Ok(Json(ledger.update_trust_score(call).await?))
}

async fn update_tensor_status(
    State(ledger): Ledger,
    Path(id): Path<String>,
    Json(call): Json<LedgerCall<StatusChange<TensorStatus>>>,
) -> ApiResult<Committed<StatusChange<TensorStatus>>> {
    same_id(&id, &call.payload.id)?;
    Ok(Json(ledger.update_tensor_status(call).await?))
}

async fn get_status(State(ledger): Ledger, Path(id): Path<String>) -> ApiResult<StatusUpdate> {
    Ok(Json(ledger.current_status(&id)?))
}
