//! Gateway error types.

use thiserror::Error;

/// Failure to configure or start the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error on {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
