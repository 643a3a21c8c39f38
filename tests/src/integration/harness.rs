//! # Integration Harness
//!
//! Starts a ledger gateway on ephemeral ports and connects clients and
//! pairing nodes to it over either wire protocol.

use std::sync::Arc;

use node_runtime::{NodeConfig, PairingContainer, PairingCoordinator};
use pl_05_ledger_transport::{connect_transport, TransportPreference};
use pl_06_ledger_gateway::{GatewayConfig, GatewayServer};
use shared_types::{
    ChallengeId, ChallengeStatus, ComponentRef, LedgerTransport, ManualTimeSource,
    PairingChallenge, TimeSource,
};

/// Creator used by every flow.
pub const CREATOR: &str = "integration";

/// Both wire protocols, in the order flows are run.
pub const PROTOCOLS: [TransportPreference; 2] =
    [TransportPreference::Rest, TransportPreference::StreamingRpc];

/// Gateway on `127.0.0.1:0` for both listeners.
pub async fn start_gateway() -> GatewayServer {
    GatewayServer::start(GatewayConfig::for_testing())
        .await
        .expect("gateway failed to start")
}

/// Raw client of `gateway` speaking `preference`.
pub async fn connect(
    gateway: &GatewayServer,
    preference: TransportPreference,
) -> Arc<dyn LedgerTransport> {
    let (client, _) = connect_transport(&gateway.transport_config(preference))
        .await
        .expect("client failed to connect");
    client
}

/// A pairing node wired to `gateway`.
pub struct TestNode {
    /// Every subsystem of the node.
    pub container: Arc<PairingContainer>,
    /// Entry point used by the flows.
    pub coordinator: PairingCoordinator,
    /// Clock shared by the node's subsystems.
    pub clock: Arc<ManualTimeSource>,
}

impl TestNode {
    /// Connect a node over `preference` with a manual clock.
    pub async fn connect(gateway: &GatewayServer, preference: TransportPreference) -> Self {
        let mut config = NodeConfig::for_testing();
        config.transport = gateway.transport_config(preference);
        config.runtime.creator = CREATOR.to_string();

        let (ledger, capabilities) = connect_transport(&config.transport)
            .await
            .expect("node failed to connect");
        let clock = Arc::new(ManualTimeSource::new(1_700_000_000));
        let container = Arc::new(
            PairingContainer::with_clock(
                config,
                ledger,
                capabilities,
                clock.clone() as Arc<dyn TimeSource>,
            )
            .expect("container failed to build"),
        );
        let coordinator = PairingCoordinator::new(&container);
        Self {
            container,
            coordinator,
            clock,
        }
    }

    /// Journal the node writes through.
    pub fn ledger(&self) -> Arc<dyn LedgerTransport> {
        self.container.ledger.clone()
    }

    /// Stop the node's background tasks.
    pub async fn shutdown(self) {
        self.container.shutdown().await;
    }
}

/// A challenge ready to be journalled directly.
pub fn challenge(id: &str) -> PairingChallenge {
    PairingChallenge {
        challenge_id: ChallengeId::new(id),
        component_a: ComponentRef::plain("battery-001"),
        component_b: ComponentRef::plain("motor-001"),
        operational_context: "pack-7".into(),
        proxy_id: None,
        force_immediate: false,
        nonce: "ab".repeat(32),
        acknowledged_a: true,
        acknowledged_b: true,
        status: ChallengeStatus::AwaitingAuth,
        created_at: 1_700_000_000,
        expires_at: 1_700_000_300,
    }
}
