//! # Wire Mapping
//!
//! Routes, error bodies and the code tables that make both protocols fail
//! the same way. The gateway encodes with these functions and the clients
//! decode with their inverses.
//!
//! | Rejection | HTTP | JSON-RPC |
//! |-----------|------|----------|
//! | `NotFound` | 404 | -32001 |
//! | `Conflict` | 409 | -32009 |
//! | `InvalidRequest` | 400 | -32602 |
//! | `Forbidden` | 403 | -32003 |
//! | `Unsupported` | 501 | -32004 |
//! | `Unreachable` | 503 | -32002 |

use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};
use shared_types::{RejectCode, TransportError};

/// REST routes. `:name` segments are path parameters.
pub mod routes {
    /// Capabilities check.
    pub const HEALTH: &str = "/health";
    /// Register an anonymous component.
    pub const COMPONENTS: &str = "/v1/components/anonymous";
    /// Read an anonymous component.
    pub const COMPONENT: &str = "/v1/components/anonymous/:hash";
    /// Revoke an anonymous component.
    pub const COMPONENT_REVOKE: &str = "/v1/components/anonymous/:hash/revoke";
    /// Read or replace the pairing rules of an anonymous component.
    pub const COMPONENT_RULES: &str = "/v1/components/anonymous/:hash/rules";
    /// Authorize an anonymous pairing.
    pub const AUTHORIZATIONS: &str = "/v1/components/anonymous/authorizations";
    /// Create a challenge.
    pub const CHALLENGES: &str = "/v1/pairing/challenges";
    /// Read a challenge.
    pub const CHALLENGE: &str = "/v1/pairing/challenges/:id";
    /// Change a challenge status.
    pub const CHALLENGE_STATUS: &str = "/v1/pairing/challenges/:id/status";
    /// Complete a pairing.
    pub const LCTS: &str = "/v1/pairing/lcts";
    /// Read an LCT.
    pub const LCT: &str = "/v1/pairing/lcts/:id";
    /// Change an LCT status.
    pub const LCT_STATUS: &str = "/v1/pairing/lcts/:id/status";
    /// Revoke an LCT.
    pub const LCT_REVOKE: &str = "/v1/pairing/lcts/:id/revoke";
    /// Every LCT of one component.
    pub const COMPONENT_LCTS: &str = "/v1/pairing/components/:id/lcts";
    /// Queue a pairing request.
    pub const REQUESTS: &str = "/v1/queue/requests";
    /// Read a queued request.
    pub const REQUEST: &str = "/v1/queue/requests/:id";
    /// Change a queued request status.
    pub const REQUEST_STATUS: &str = "/v1/queue/requests/:id/status";
    /// Create a trust tensor.
    pub const TENSORS: &str = "/v1/trust/tensors";
    /// Read a trust tensor.
    pub const TENSOR: &str = "/v1/trust/tensors/:id";
    /// Update a trust score.
    pub const TENSOR_SCORE: &str = "/v1/trust/tensors/:id/score";
    /// Change a tensor status.
    pub const TENSOR_STATUS: &str = "/v1/trust/tensors/:id/status";
    /// Current status of any entity.
    pub const STATUS: &str = "/v1/status/:id";

    use reqwest::Url;
    use shared_types::{RejectCode, TransportError};

    /// Absolute URL of `pattern` under `base` with its path parameter set to
    /// `value`. Every segment is percent-encoded, so an id holding `/`, `?`
    /// or `#` stays one segment.
    pub fn endpoint(base: &Url, pattern: &str, value: &str) -> Result<Url, TransportError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Rejected {
                code: RejectCode::InvalidRequest,
                message: format!("{base} cannot carry a path"),
            })?
            .pop_if_empty()
            .extend(
                pattern
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| if segment.starts_with(':') { value } else { segment }),
            );
        Ok(url)
    }
}

/// Response of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the backend answers.
    pub status: String,
    /// Backend version string.
    pub backend_version: String,
    /// Whether the backend also serves push subscriptions.
    pub push_updates: bool,
}

/// Error body of every non-success REST response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable class.
    pub code: String,
    /// Backend message.
    pub message: String,
}

/// JSON-RPC error codes.
pub mod rpc_codes {
    /// Invalid params.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Resource not found.
    pub const NOT_FOUND: i32 = -32001;
    /// Resource unavailable.
    pub const UNAVAILABLE: i32 = -32002;
    /// Operation refused.
    pub const FORBIDDEN: i32 = -32003;
    /// Method not supported.
    pub const UNSUPPORTED: i32 = -32004;
    /// Request timed out.
    pub const TIMEOUT: i32 = -32006;
    /// Conflicts with ledger state.
    pub const CONFLICT: i32 = -32009;
}

// =============================================================================
// HTTP
// =============================================================================

/// HTTP status for a rejection class.
pub fn http_status_for_reject(code: RejectCode) -> u16 {
    match code {
        RejectCode::NotFound => 404,
        RejectCode::Conflict => 409,
        RejectCode::InvalidRequest => 400,
        RejectCode::Forbidden => 403,
    }
}

/// HTTP status and body the backend answers `err` with.
pub fn http_error(err: &TransportError) -> (u16, ErrorBody) {
    let (status, code) = match err {
        TransportError::Rejected { code, .. } => (http_status_for_reject(*code), code.to_string()),
        TransportError::Unsupported(_) => (501, "unsupported".to_string()),
        TransportError::Unreachable(_) => (503, "unavailable".to_string()),
        TransportError::Timeout { .. } => (504, "timeout".to_string()),
        TransportError::Decode(_) => (400, RejectCode::InvalidRequest.to_string()),
        TransportError::Status { code, .. } => (
            u16::try_from(*code)
                .ok()
                .filter(|c| (400..600).contains(c))
                .unwrap_or(500),
            "status".to_string(),
        ),
        TransportError::StreamClosed => (500, "internal".to_string()),
    };
    let message = match err {
        TransportError::Rejected { message, .. } | TransportError::Status { message, .. } => {
            message.clone()
        }
        TransportError::Unsupported(m)
        | TransportError::Unreachable(m)
        | TransportError::Decode(m) => m.clone(),
        other => other.to_string(),
    };
    (status, ErrorBody { code, message })
}

/// Client-side decoding of a non-success HTTP response.
pub fn error_from_http(status: u16, body: Option<ErrorBody>) -> TransportError {
    let message = body
        .map(|b| b.message)
        .unwrap_or_else(|| format!("HTTP {status}"));
    let reject = |code| TransportError::Rejected {
        code,
        message: message.clone(),
    };
    match status {
        404 => reject(RejectCode::NotFound),
        409 => reject(RejectCode::Conflict),
        400 | 422 => reject(RejectCode::InvalidRequest),
        401 | 403 => reject(RejectCode::Forbidden),
        501 => TransportError::Unsupported(message),
        503 => TransportError::Unreachable(message),
        other => TransportError::Status {
            code: i64::from(other),
            message,
        },
    }
}

/// Client-side mapping of a reqwest failure.
pub fn error_from_reqwest(err: reqwest::Error, timeout_ms: u64) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            after_ms: timeout_ms,
        }
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
        error_from_http(status.as_u16(), None)
    } else {
        TransportError::Unreachable(err.to_string())
    }
}

// =============================================================================
// JSON-RPC
// =============================================================================

/// JSON-RPC code for a rejection class.
pub fn rpc_code_for_reject(code: RejectCode) -> i32 {
    match code {
        RejectCode::NotFound => rpc_codes::NOT_FOUND,
        RejectCode::Conflict => rpc_codes::CONFLICT,
        RejectCode::InvalidRequest => rpc_codes::INVALID_PARAMS,
        RejectCode::Forbidden => rpc_codes::FORBIDDEN,
    }
}

/// Error object the backend answers `err` with.
pub fn rpc_error(err: &TransportError) -> ErrorObjectOwned {
    let (code, message) = match err {
        TransportError::Rejected { code, message } => (rpc_code_for_reject(*code), message.clone()),
        TransportError::Unsupported(m) => (rpc_codes::UNSUPPORTED, m.clone()),
        TransportError::Unreachable(m) => (rpc_codes::UNAVAILABLE, m.clone()),
        TransportError::Timeout { .. } => (rpc_codes::TIMEOUT, err.to_string()),
        TransportError::Decode(m) => (rpc_codes::INVALID_PARAMS, m.clone()),
        TransportError::Status { message, .. } => (rpc_codes::INTERNAL_ERROR, message.clone()),
        TransportError::StreamClosed => (rpc_codes::INTERNAL_ERROR, err.to_string()),
    };
    ErrorObjectOwned::owned(code, message, None::<()>)
}

/// Client-side decoding of a JSON-RPC error object.
pub fn error_from_rpc_code(code: i32, message: String) -> TransportError {
    let reject = |code| TransportError::Rejected {
        code,
        message: message.clone(),
    };
    match code {
        rpc_codes::NOT_FOUND => reject(RejectCode::NotFound),
        rpc_codes::CONFLICT => reject(RejectCode::Conflict),
        rpc_codes::INVALID_PARAMS => reject(RejectCode::InvalidRequest),
        rpc_codes::FORBIDDEN => reject(RejectCode::Forbidden),
        rpc_codes::UNSUPPORTED => TransportError::Unsupported(message),
        rpc_codes::UNAVAILABLE => TransportError::Unreachable(message),
        other => TransportError::Status {
            code: i64::from(other),
            message,
        },
    }
}

/// Client-side mapping of a jsonrpsee client failure.
pub fn error_from_client(err: jsonrpsee::core::ClientError, timeout_ms: u64) -> TransportError {
    use jsonrpsee::core::ClientError;
    match err {
        ClientError::Call(obj) => error_from_rpc_code(obj.code(), obj.message().to_string()),
        ClientError::RequestTimeout => TransportError::Timeout {
            after_ms: timeout_ms,
        },
        ClientError::ParseError(e) => TransportError::Decode(e.to_string()),
        ClientError::Transport(e) => TransportError::Unreachable(e.to_string()),
        ClientError::RestartNeeded(e) => TransportError::Unreachable(e.to_string()),
        other => TransportError::Status {
            code: i64::from(rpc_codes::INTERNAL_ERROR),
            message: other.to_string(),
        },
    }
}
