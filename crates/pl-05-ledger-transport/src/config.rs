//! # Transport Configuration

use serde::{Deserialize, Serialize};
use shared_types::PairingError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which wire protocol to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportPreference {
    /// JSON over HTTP.
    Rest,
    /// JSON-RPC over WebSocket.
    StreamingRpc,
    /// Streaming RPC if the backend answers, REST otherwise.
    #[default]
    Auto,
}

impl FromStr for TransportPreference {
    type Err = PairingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "http" => Ok(Self::Rest),
            "rpc" | "ws" | "streaming_rpc" => Ok(Self::StreamingRpc),
            "auto" => Ok(Self::Auto),
            other => Err(PairingError::Configuration(format!(
                "unknown transport '{other}' (expected rest, rpc or auto)"
            ))),
        }
    }
}

impl fmt::Display for TransportPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest => f.write_str("rest"),
            Self::StreamingRpc => f.write_str("streaming_rpc"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Client settings shared by both protocols.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Protocol selection.
    pub preference: TransportPreference,
    /// Base URL of the REST API.
    pub rest_url: String,
    /// WebSocket URL of the RPC API.
    pub rpc_url: String,
    /// Per-request budget in milliseconds.
    pub request_timeout_ms: u64,
    /// Connection establishment budget in milliseconds.
    pub connect_timeout_ms: u64,
    /// Extra attempts for reads failing with `Unreachable` or `Timeout`.
    pub read_retries: u32,
    /// First backoff delay in milliseconds; doubles per attempt.
    pub retry_base_delay_ms: u64,
    /// Status polling period of the REST client in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            preference: TransportPreference::Auto,
            rest_url: "http://127.0.0.1:7700".into(),
            rpc_url: "ws://127.0.0.1:7701".into(),
            request_timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            read_retries: 3,
            retry_base_delay_ms: 100,
            poll_interval_ms: 500,
        }
    }
}

impl TransportConfig {
    /// Short timeouts and fast polling for tests.
    pub fn for_testing() -> Self {
        Self {
            request_timeout_ms: 2_000,
            connect_timeout_ms: 1_000,
            read_retries: 1,
            retry_base_delay_ms: 10,
            poll_interval_ms: 25,
            ..Self::default()
        }
    }

    /// Point both clients at explicit URLs.
    pub fn with_urls(mut self, rest_url: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        self.rest_url = rest_url.into();
        self.rpc_url = rpc_url.into();
        self
    }

    /// Request budget.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Connect budget.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Polling period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the clients cannot run with.
    pub fn validate(&self) -> Result<(), PairingError> {
        if !(self.rest_url.starts_with("http://") || self.rest_url.starts_with("https://")) {
            return Err(PairingError::Configuration(format!(
                "rest_url must be http(s): {}",
                self.rest_url
            )));
        }
        if !(self.rpc_url.starts_with("ws://") || self.rpc_url.starts_with("wss://")) {
            return Err(PairingError::Configuration(format!(
                "rpc_url must be ws(s): {}",
                self.rpc_url
            )));
        }
        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(PairingError::Configuration("timeouts must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(PairingError::Configuration(
                "poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
