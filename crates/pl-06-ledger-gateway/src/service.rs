//! Ledger gateway service: binds both listeners over one ledger.

use crate::domain::{GatewayConfig, GatewayError};
use crate::ledger::InMemoryLedger;
use crate::router::build_router;
use crate::rpc::LedgerRpcHandler;
use jsonrpsee::server::{Server, ServerHandle};
use pl_05_ledger_transport::api::LedgerRpcServer;
use pl_05_ledger_transport::{TransportConfig, TransportPreference};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Running gateway. Dropping it leaves the servers running until
/// [`GatewayServer::shutdown`] is called or the runtime stops.
pub struct GatewayServer {
    ledger: Arc<InMemoryLedger>,
    rest_addr: SocketAddr,
    rpc_addr: SocketAddr,
    shutdown: CancellationToken,
    rest_task: JoinHandle<()>,
    rpc_handle: ServerHandle,
}

impl GatewayServer {
    /// Start over a fresh ledger.
    pub async fn start(config: GatewayConfig) -> Result<Self, GatewayError> {
        let ledger = Arc::new(InMemoryLedger::new(
            config.backend_version.clone(),
            config.broadcast_capacity,
        ));
        Self::start_with_ledger(config, ledger).await
    }

    /// Start over an existing ledger.
    pub async fn start_with_ledger(
        config: GatewayConfig,
        ledger: Arc<InMemoryLedger>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        info!("[pl-06] Starting ledger gateway...");

        let listener = tokio::net::TcpListener::bind(config.rest_addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: config.rest_addr.to_string(),
                source,
            })?;
        let rest_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        let rpc_server = Server::builder()
            .build(config.rpc_addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: config.rpc_addr.to_string(),
                source,
            })?;
        let rpc_addr = rpc_server
            .local_addr()
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        let shutdown = CancellationToken::new();
        let router = build_router(Arc::clone(&ledger), config.request_timeout());
        let token = shutdown.clone();
        let rest_task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!("[pl-06] REST server error: {}", e);
            }
        });

        let rpc_handle = rpc_server.start(LedgerRpcHandler::new(Arc::clone(&ledger)).into_rpc());

        info!(
            "[pl-06] Ledger gateway serving REST on {} and JSON-RPC on {}",
            rest_addr, rpc_addr
        );
        Ok(Self {
            ledger,
            rest_addr,
            rpc_addr,
            shutdown,
            rest_task,
            rpc_handle,
        })
    }

    /// Ledger behind both listeners.
    pub fn ledger(&self) -> Arc<InMemoryLedger> {
        Arc::clone(&self.ledger)
    }

    /// Bound REST address.
    pub fn rest_addr(&self) -> SocketAddr {
        self.rest_addr
    }

    /// Bound JSON-RPC address.
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    /// Base URL for [`pl_05_ledger_transport::RestLedgerClient`].
    pub fn rest_url(&self) -> String {
        format!("http://{}", self.rest_addr)
    }

    /// Endpoint for [`pl_05_ledger_transport::RpcLedgerClient`].
    pub fn rpc_url(&self) -> String {
        format!("ws://{}", self.rpc_addr)
    }

    /// Client settings pointing at this gateway.
    pub fn transport_config(&self, preference: TransportPreference) -> TransportConfig {
        TransportConfig {
            preference,
            ..TransportConfig::for_testing()
        }
        .with_urls(self.rest_url(), self.rpc_url())
    }

    /// Stop both listeners and wait for them.
    pub async fn shutdown(self) {
        info!("[pl-06] Stopping ledger gateway");
        self.shutdown.cancel();
        if self.rpc_handle.stop().is_ok() {
            self.rpc_handle.stopped().await;
        }
        if let Err(e) = self.rest_task.await {
            error!("[pl-06] REST task ended abnormally: {}", e);
        }
        info!("[pl-06] Ledger gateway stopped");
    }
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer")
            .field("rest_addr", &self.rest_addr)
            .field("rpc_addr", &self.rpc_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pl_05_ledger_transport::wire::{routes, HealthResponse};

    #[tokio::test]
    async fn test_binds_ephemeral_ports_and_answers_health() {
        let gateway = GatewayServer::start(GatewayConfig::for_testing())
            .await
            .unwrap();
        assert_ne!(gateway.rest_addr().port(), 0);
        assert_ne!(gateway.rpc_addr().port(), 0);

        let health: HealthResponse = reqwest::get(format!("{}{}", gateway.rest_url(), routes::HEALTH))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health.status, "ok");
        assert!(health.backend_version.starts_with("pl-ledger-gateway/"));

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_status_is_404() {
        let gateway = GatewayServer::start(GatewayConfig::for_testing())
            .await
            .unwrap();
        let base = reqwest::Url::parse(&gateway.rest_url()).unwrap();
        let url = routes::endpoint(&base, routes::STATUS, "nothing/here").unwrap();
        let response = reqwest::get(url).await.unwrap();
        assert_eq!(response.status().as_u16(), 404);
        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_refused() {
        let config = GatewayConfig {
            request_timeout_secs: 0,
            ..GatewayConfig::for_testing()
        };
        assert!(matches!(
            GatewayServer::start(config).await,
            Err(GatewayError::Config(_))
        ));
    }
}
