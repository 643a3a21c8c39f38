//! # Expiry Sweeper
//!
//! Background task that expires challenges past their deadline.

use std::sync::Arc;
use std::time::Duration;

use pairing_telemetry::CHALLENGES_EXPIRED;
use pl_02_pairing_handshake::PairingHandshakeApi;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run one sweep. Returns how many challenges expired.
pub async fn sweep_once(service: &dyn PairingHandshakeApi, creator: &str) -> usize {
    match service.expire_stale(creator).await {
        Ok(expired) => {
            if !expired.is_empty() {
                CHALLENGES_EXPIRED.inc_by(expired.len() as f64);
                debug!("[runtime] Sweep expired {} challenge(s)", expired.len());
            }
            expired.len()
        }
        Err(e) => {
            warn!("[runtime] Expiry sweep failed: {}", e);
            0
        }
    }
}

/// Sweep every `interval` until `cancel` fires.
pub fn spawn_expiry_sweeper(
    service: Arc<dyn PairingHandshakeApi>,
    creator: impl Into<String>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let creator = creator.into();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("[runtime] Expiry sweeper started ({:?})", interval);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sweep_once(service.as_ref(), &creator) => {}
            }
        }
        debug!("[runtime] Expiry sweeper stopped");
    })
}
