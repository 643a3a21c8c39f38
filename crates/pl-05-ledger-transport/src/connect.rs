//! Transport selection.

use crate::adapters::{RestLedgerClient, RpcLedgerClient};
use crate::config::{TransportConfig, TransportPreference};
use shared_types::{Capabilities, LedgerTransport, RejectCode, TransportError};
use std::sync::Arc;
use tracing::warn;

/// Connect the transport named by `config.preference`.
///
/// `Auto` tries streaming RPC first and falls back to REST when the RPC
/// endpoint cannot be reached. Configuration errors are never retried
/// over the other protocol.
pub async fn connect_transport(
    config: &TransportConfig,
) -> Result<(Arc<dyn LedgerTransport>, Capabilities), TransportError> {
    config.validate().map_err(|e| TransportError::Rejected {
        code: RejectCode::InvalidRequest,
        message: e.to_string(),
    })?;
    match config.preference {
        TransportPreference::Rest => {
            let (client, caps) = RestLedgerClient::connect(config.clone()).await?;
            Ok((Arc::new(client), caps))
        }
        TransportPreference::StreamingRpc => {
            let (client, caps) = RpcLedgerClient::connect(config.clone()).await?;
            Ok((Arc::new(client), caps))
        }
        TransportPreference::Auto => match RpcLedgerClient::connect(config.clone()).await {
            Ok((client, caps)) => Ok((Arc::new(client), caps)),
            Err(e) => {
                warn!(
                    "[pl-05] Streaming RPC at {} unavailable ({}), falling back to REST",
                    config.rpc_url, e
                );
                let (client, caps) = RestLedgerClient::connect(config.clone()).await?;
                Ok((Arc::new(client), caps))
            }
        },
    }
}
