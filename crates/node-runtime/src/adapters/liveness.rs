//! # Heartbeat Liveness
//!
//! Reachability from heartbeats. A component is reachable while its last
//! heartbeat is inside the window; a component never heard from is not.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use pl_02_pairing_handshake::LivenessOracle;
use shared_types::{ComponentRef, SystemTimeSource, TimeSource};
use tracing::debug;

/// [`LivenessOracle`] fed by component heartbeats.
pub struct HeartbeatLiveness {
    window_secs: u64,
    clock: Arc<dyn TimeSource>,
    last_seen: DashMap<String, u64>,
}

impl HeartbeatLiveness {
    /// Tracker on the system clock.
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemTimeSource))
    }

    /// Tracker with an explicit clock.
    pub fn with_clock(window: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            window_secs: window.as_secs(),
            clock,
            last_seen: DashMap::new(),
        }
    }

    /// Record a heartbeat from `component_id` now.
    pub fn heartbeat(&self, component_id: &str) {
        let now = self.clock.now();
        self.last_seen.insert(component_id.to_string(), now);
        debug!("[runtime] Heartbeat from {} at {}", component_id, now);
    }

    /// Drop a component; it is unreachable until its next heartbeat.
    pub fn forget(&self, component_id: &str) {
        self.last_seen.remove(component_id);
    }

    /// Timestamp of the last heartbeat.
    pub fn last_seen(&self, component_id: &str) -> Option<u64> {
        self.last_seen.get(component_id).map(|t| *t)
    }

    /// Components with at least one heartbeat.
    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }
}

#[async_trait]
impl LivenessOracle for HeartbeatLiveness {
    async fn is_reachable(&self, component: &ComponentRef) -> bool {
        let now = self.clock.now();
        self.last_seen(component.id())
            .is_some_and(|seen| now.saturating_sub(seen) <= self.window_secs)
    }
}
