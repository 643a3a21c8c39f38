//! # Subsystem Container
//!
//! Holds every pairing subsystem instance and the adapters between them.
//!
//! ## Initialization Order
//!
//! Subsystems are initialized in dependency order:
//!
//! ```text
//! Level 0: Ledger transport (REST or streaming RPC)
//! Level 1: Identity hashing, Trust ledger, Pairing queue (ledger only)
//! Level 2: Liveness, Notifier, Auth verifier (runtime adapters)
//! Level 3: Pairing handshake (queue + trust through bridges)
//! ```
//!
//! ## Thread Safety
//!
//! - All subsystems wrapped in `Arc` for shared ownership
//! - Subsystems synchronise internally; the container adds no locks
//!   beyond its task list

use std::sync::Arc;

use parking_lot::Mutex;
use pl_01_identity_hashing::{AnonymousRegistry, IdentityHasher};
use pl_02_pairing_handshake::{HandshakeDeps, HmacAuthVerifier, PairingHandshakeService};
use pl_03_pairing_queue::PairingQueueService;
use pl_04_trust_ledger::TrustLedgerService;
use pl_05_ledger_transport::connect_transport;
use shared_types::{
    Capabilities, LedgerTransport, PairingError, SystemTimeSource, TimeSource, TransportError,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::{ChannelNotifier, HeartbeatLiveness, QueueBridge, TrustBridge};
use crate::container::config::{ConfigError, NodeConfig};

/// Errors while assembling the node.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The ledger could not be reached.
    #[error("ledger transport: {0}")]
    Transport(#[from] TransportError),

    /// A subsystem refused its configuration.
    #[error("subsystem: {0}")]
    Subsystem(#[from] PairingError),
}

/// Central container holding all subsystem instances.
pub struct PairingContainer {
    /// Configuration the container was built from.
    pub config: NodeConfig,
    /// Ledger journal shared by every subsystem.
    pub ledger: Arc<dyn LedgerTransport>,
    /// What the connected backend supports.
    pub capabilities: Capabilities,

    // =========================================================================
    // LEVEL 1: Ledger only
    // =========================================================================
    /// Anonymous registry; `None` when no salt/context is configured.
    pub registry: Option<Arc<AnonymousRegistry>>,
    /// Trust ledger.
    pub trust: Arc<TrustLedgerService>,
    /// Offline pairing queue.
    pub queue: Arc<PairingQueueService>,

    // =========================================================================
    // LEVEL 2: Runtime adapters
    // =========================================================================
    /// Heartbeat-driven reachability.
    pub liveness: Arc<HeartbeatLiveness>,
    /// Offline notice channel.
    pub notifier: ChannelNotifier,
    /// Auth token verifier (also issues tokens for provisioning).
    pub verifier: Arc<HmacAuthVerifier>,

    // =========================================================================
    // LEVEL 3: Depends on Level 1-2
    // =========================================================================
    /// Pairing handshake.
    pub handshake: Arc<PairingHandshakeService>,

    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PairingContainer {
    /// Connect the configured transport and build every subsystem.
    pub async fn connect(config: NodeConfig) -> Result<Self, ContainerError> {
        let (ledger, capabilities) = connect_transport(&config.transport).await?;
        Self::new(config, ledger, capabilities)
    }

    /// Build on an existing transport using the system clock.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        config: NodeConfig,
        ledger: Arc<dyn LedgerTransport>,
        capabilities: Capabilities,
    ) -> Result<Self, ContainerError> {
        Self::with_clock(config, ledger, capabilities, Arc::new(SystemTimeSource))
    }

    /// Build on an existing transport with an explicit clock.
    pub fn with_clock(
        config: NodeConfig,
        ledger: Arc<dyn LedgerTransport>,
        capabilities: Capabilities,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, ContainerError> {
        config.validate()?;
        info!(
            "[runtime] Building subsystems on {:?} transport (backend {})",
            capabilities.kind, capabilities.backend_version
        );

        // Level 1
        let registry = match IdentityHasher::new(&config.hasher) {
            Ok(hasher) => {
                info!("[runtime] Anonymous mode available (context {})", hasher.context());
                Some(Arc::new(AnonymousRegistry::with_clock(
                    hasher,
                    ledger.clone(),
                    config.registry.clone(),
                    clock.clone(),
                )))
            }
            Err(e) => {
                warn!("[runtime] Anonymous mode disabled: {}", e);
                None
            }
        };
        let trust = Arc::new(TrustLedgerService::with_clock(
            ledger.clone(),
            config.trust.clone(),
            clock.clone(),
        )?);
        let queue = Arc::new(PairingQueueService::with_clock(
            ledger.clone(),
            config.queue.clone(),
            clock.clone(),
        )?);

        // Level 2
        let shutdown = CancellationToken::new();
        let liveness = Arc::new(HeartbeatLiveness::with_clock(
            config.runtime.heartbeat_window(),
            clock.clone(),
        ));
        let (notifier, drain) = ChannelNotifier::spawn(
            config.runtime.notice_outbox_capacity,
            shutdown.child_token(),
        );
        let authority_key = config
            .authority_key()
            .ok_or(ConfigError::MissingSecret("PL_AUTHORITY_KEY"))?;
        let verifier = Arc::new(HmacAuthVerifier::new(authority_key.to_vec())?);

        // Level 3
        let deps = HandshakeDeps {
            ledger: ledger.clone(),
            liveness: liveness.clone(),
            queue: Arc::new(QueueBridge::new(queue.clone())),
            trust: Arc::new(TrustBridge::new(trust.clone())),
            notifier: Arc::new(notifier.clone()),
            verifier: verifier.clone(),
        };
        let handshake = Arc::new(PairingHandshakeService::with_clock(
            config.handshake.clone(),
            deps,
            clock,
        )?);

        info!("[runtime] All pairing subsystems initialized");
        Ok(Self {
            config,
            ledger,
            capabilities,
            registry,
            trust,
            queue,
            liveness,
            notifier,
            verifier,
            handshake,
            shutdown,
            tasks: Mutex::new(vec![drain]),
        })
    }

    /// Token cancelled on shutdown; background tasks should take a child.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Keep `task` so shutdown can wait for it.
    pub fn track(&self, task: JoinHandle<()>) {
        self.tasks.lock().push(task);
    }

    /// Stop background tasks and wait for them.
    pub async fn shutdown(&self) {
        info!("[runtime] Initiating graceful shutdown...");
        self.shutdown.cancel();
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!("[runtime] Background task ended abnormally: {}", e);
            }
        }
        info!("[runtime] Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{MockLedger, TransportKind};

    fn capabilities() -> Capabilities {
        Capabilities {
            kind: TransportKind::InProcess,
            push_updates: false,
            backend_version: "mock".into(),
        }
    }

    #[tokio::test]
    async fn test_builds_all_subsystems() {
        let container = PairingContainer::new(
            NodeConfig::for_testing(),
            Arc::new(MockLedger::new()),
            capabilities(),
        )
        .unwrap();
        assert!(container.registry.is_some());
        assert_eq!(container.handshake.challenge_count(), 0);
        container.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_authority_key_is_rejected() {
        let mut config = NodeConfig::for_testing();
        config.runtime.authority_key = None;
        let err = PairingContainer::new(config, Arc::new(MockLedger::new()), capabilities())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ContainerError::Config(ConfigError::MissingSecret("PL_AUTHORITY_KEY"))
        ));
    }

    #[tokio::test]
    async fn test_no_salt_disables_anonymous_mode() {
        let mut config = NodeConfig::for_testing();
        config.hasher.salt = None;
        let container =
            PairingContainer::new(config, Arc::new(MockLedger::new()), capabilities()).unwrap();
        assert!(container.registry.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_transport_fails_connect() {
        let mut config = NodeConfig::for_testing();
        config.transport = config
            .transport
            .with_urls("http://127.0.0.1:9", "ws://127.0.0.1:9");
        config.transport.read_retries = 0;
        let err = PairingContainer::connect(config).await.err().unwrap();
        assert!(matches!(err, ContainerError::Transport(_)));
    }
}
