//! Prometheus metrics for the pairing subsystems.
//!
//! All metrics follow the naming convention: `pl_<subsystem>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // HANDSHAKE METRICS (Subsystem 2)
    // =========================================================================

    /// Challenges created
    pub static ref PAIRINGS_INITIATED: Counter = Counter::new(
        "pl_handshake_pairings_initiated_total",
        "Total pairing challenges created"
    ).expect("metric creation failed");

    /// LCTs issued
    pub static ref PAIRINGS_COMPLETED: Counter = Counter::new(
        "pl_handshake_pairings_completed_total",
        "Total pairings completed with an active LCT"
    ).expect("metric creation failed");

    /// Challenges expired by the sweeper
    pub static ref CHALLENGES_EXPIRED: Counter = Counter::new(
        "pl_handshake_challenges_expired_total",
        "Total challenges expired by the expiry sweep"
    ).expect("metric creation failed");

    /// Challenges still awaiting authentication
    pub static ref OPEN_CHALLENGES: Gauge = Gauge::new(
        "pl_handshake_open_challenges",
        "Challenges awaiting authentication"
    ).expect("metric creation failed");

    /// Revocations by kind
    pub static ref REVOCATIONS: CounterVec = CounterVec::new(
        Opts::new("pl_revocations_total", "Total revocations"),
        &["kind"]  // kind: lct/component
    ).expect("metric creation failed");

    // =========================================================================
    // QUEUE METRICS (Subsystem 3)
    // =========================================================================

    /// Requests deferred to the offline queue
    pub static ref PAIRINGS_QUEUED: Counter = Counter::new(
        "pl_queue_pairings_queued_total",
        "Total pairing requests deferred to the offline queue"
    ).expect("metric creation failed");

    /// Queue entries processed by outcome
    pub static ref QUEUE_ENTRIES_PROCESSED: CounterVec = CounterVec::new(
        Opts::new("pl_queue_entries_processed_total", "Queue entries processed"),
        &["outcome"]  // outcome: completed/failed/aborted
    ).expect("metric creation failed");

    // =========================================================================
    // TRUST METRICS (Subsystem 4)
    // =========================================================================

    /// Trust updates by pairing outcome
    pub static ref TRUST_UPDATES: CounterVec = CounterVec::new(
        Opts::new("pl_trust_updates_total", "Trust tensor updates"),
        &["outcome"]
    ).expect("metric creation failed");
}

/// Keeps the registry alive for exporters.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Registry the metrics live in.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Handshake
        Box::new(PAIRINGS_INITIATED.clone()),
        Box::new(PAIRINGS_COMPLETED.clone()),
        Box::new(CHALLENGES_EXPIRED.clone()),
        Box::new(OPEN_CHALLENGES.clone()),
        Box::new(REVOCATIONS.clone()),
        // Queue
        Box::new(PAIRINGS_QUEUED.clone()),
        Box::new(QUEUE_ENTRIES_PROCESSED.clone()),
        // Trust
        Box::new(TRUST_UPDATES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
