//! Gateway configuration with validation.

use super::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default REST port.
pub const DEFAULT_REST_PORT: u16 = 7700;
/// Default JSON-RPC (WebSocket) port.
pub const DEFAULT_RPC_PORT: u16 = 7701;

/// Ledger gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// REST listen address. Port 0 binds an ephemeral port.
    pub rest_addr: SocketAddr,
    /// JSON-RPC listen address. Port 0 binds an ephemeral port.
    pub rpc_addr: SocketAddr,
    /// Version string reported by `/health` and `ledger_capabilities`.
    pub backend_version: String,
    /// Per-request timeout of the REST server.
    pub request_timeout_secs: u64,
    /// Buffered status updates per subscriber before it lags.
    pub broadcast_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_REST_PORT)),
            rpc_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_RPC_PORT)),
            backend_version: format!("pl-ledger-gateway/{}", crate::VERSION),
            request_timeout_secs: 30,
            broadcast_capacity: 1024,
        }
    }
}

impl GatewayConfig {
    /// Ephemeral ports on localhost.
    pub fn for_testing() -> Self {
        Self {
            rest_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            rpc_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            request_timeout_secs: 5,
            broadcast_capacity: 256,
            ..Self::default()
        }
    }

    /// REST request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.rest_addr.port() != 0 && self.rest_addr == self.rpc_addr {
            return Err(GatewayError::Config(format!(
                "REST and RPC share address {}",
                self.rest_addr
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(GatewayError::Config(
                "request_timeout_secs cannot be 0".into(),
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(GatewayError::Config(
                "broadcast_capacity cannot be 0".into(),
            ));
        }
        if self.backend_version.trim().is_empty() {
            return Err(GatewayError::Config("backend_version is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
        assert!(GatewayConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_shared_port_rejected() {
        let mut config = GatewayConfig::default();
        config.rpc_addr = config.rest_addr;
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = GatewayConfig {
            broadcast_capacity: 0,
            ..GatewayConfig::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: GatewayConfig = serde_json::from_str(r#"{"request_timeout_secs": 9}"#).unwrap();
        assert_eq!(config.request_timeout_secs, 9);
        assert_eq!(config.rest_addr.port(), DEFAULT_REST_PORT);
    }
}
