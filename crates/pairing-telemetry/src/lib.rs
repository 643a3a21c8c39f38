//! # Pairing Telemetry
//!
//! Logging and metrics shared by the pairing node.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pairing_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _metrics = init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PL_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `PL_JSON_LOGS` | `false` | JSON log lines |
//! | `PL_SERVICE_NAME` | `pairing-node` | Service name in logs |

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, CHALLENGES_EXPIRED, OPEN_CHALLENGES,
    PAIRINGS_COMPLETED, PAIRINGS_INITIATED, PAIRINGS_QUEUED, QUEUE_ENTRIES_PROCESSED, REVOCATIONS,
    TRUST_UPDATES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),

    /// Metric registration failed.
    #[error("failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install logging.
///
/// An already installed subscriber is tolerated so embedding processes
/// keep their own.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<MetricsHandle, TelemetryError> {
    let metrics = register_metrics()?;
    match init_logging(config) {
        Ok(()) | Err(TelemetryError::AlreadyInitialized(_)) => Ok(metrics),
        Err(e) => Err(e),
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
