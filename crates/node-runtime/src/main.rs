//! # Pairing Node Runtime
//!
//! The main entry point for a pairing node.
//!
//! ## Modular Structure
//!
//! - `container/` - Subsystem container with dependency injection
//! - `adapters/` - Port implementations connecting subsystems
//! - `wiring/` - Coordinator and background tasks
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Load configuration (file, then `PL_*` environment)
//! 3. Connect the ledger transport (streaming RPC or REST)
//! 4. Initialize subsystems in dependency order
//! 5. Start background tasks (expiry sweep, notice drain)
//! 6. Signal ready

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use node_runtime::{spawn_expiry_sweeper, NodeConfig, PairRequest, PairingContainer, PairingCoordinator};
use pairing_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use pl_02_pairing_handshake::CompleteRequest;
use pl_05_ledger_transport::TransportPreference;
use pl_06_ledger_gateway::GatewayServer;
use shared_types::PairingRules;

/// LCT pairing node
#[derive(Parser, Debug)]
#[command(name = "node-runtime", version)]
#[command(about = "Device pairing over a ledger: handshake, offline queue, trust scoring")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PL_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the in-memory ledger over REST and streaming RPC
    Gateway,

    /// Run a pairing node against the configured ledger
    Node,

    /// Start a private gateway and walk through a complete pairing
    Demo {
        /// Transport to use: rest, rpc or auto
        #[arg(long, default_value = "auto")]
        transport: TransportPreference,

        /// Pair by hashed identity instead of real id
        #[arg(long)]
        anonymous: bool,
    },
}

/// The node runtime: container, coordinator and background tasks.
struct NodeRuntime {
    container: Arc<PairingContainer>,
    coordinator: Arc<PairingCoordinator>,
}

impl NodeRuntime {
    /// Connect the transport and build every subsystem.
    async fn connect(config: NodeConfig) -> Result<Self> {
        info!("Creating pairing node runtime");
        let container = Arc::new(
            PairingContainer::connect(config)
                .await
                .context("Failed to build pairing subsystems")?,
        );
        let coordinator = Arc::new(PairingCoordinator::new(&container));
        Ok(Self {
            container,
            coordinator,
        })
    }

    /// Start background tasks.
    fn start(&self) {
        info!("===========================================");
        info!("  Pairing Node Runtime v{}", node_runtime::VERSION);
        info!("  Transport: {:?}", self.container.capabilities.kind);
        info!("===========================================");

        let runtime = &self.container.config.runtime;
        let sweeper = spawn_expiry_sweeper(
            self.container.handshake.clone(),
            runtime.creator.clone(),
            runtime.sweep_interval(),
            self.container.shutdown_token().child_token(),
        );
        self.container.track(sweeper);
        info!(
            "Expiry sweep every {:?}, heartbeat window {:?}",
            runtime.sweep_interval(),
            runtime.heartbeat_window()
        );
    }

    /// Stop background tasks.
    async fn shutdown(&self) {
        self.container.shutdown().await;
    }
}

async fn run_gateway(config: NodeConfig) -> Result<()> {
    let gateway = GatewayServer::start(config.gateway)
        .await
        .context("Failed to start ledger gateway")?;
    info!("Ledger gateway REST at {}", gateway.rest_url());
    info!("Ledger gateway RPC at {}", gateway.rpc_url());

    info!("Gateway is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    gateway.shutdown().await;
    Ok(())
}

async fn run_node(config: NodeConfig) -> Result<()> {
    config
        .validate_for_production()
        .context("Configuration is not production ready")?;
    let runtime = NodeRuntime::connect(config).await?;
    runtime.start();

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    runtime.shutdown().await;
    Ok(())
}

fn print_json<T: serde::Serialize>(title: &str, value: &T) -> Result<()> {
    println!("== {title}");
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_demo(mut config: NodeConfig, transport: TransportPreference, anonymous: bool) -> Result<()> {
    let localhost = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    config.gateway.rest_addr = localhost;
    config.gateway.rpc_addr = localhost;
    let gateway = GatewayServer::start(config.gateway.clone())
        .await
        .context("Failed to start demo gateway")?;
    config.transport = gateway.transport_config(transport);

    if config.authority_key().is_none() {
        warn!("No authority key configured; using a demo key");
        config.runtime.authority_key = Some("demo-authority-key".to_string());
    }
    if anonymous && (config.hasher.salt.is_none() || config.hasher.context.is_none()) {
        warn!("No hash salt/context configured; using demo values");
        config.hasher.salt.get_or_insert_with(|| "demo-salt".to_string());
        config.hasher.context.get_or_insert_with(|| "demo-fleet".to_string());
    }

    let runtime = NodeRuntime::connect(config).await?;
    runtime.start();
    let result = demo_flow(&runtime, anonymous).await;
    runtime.shutdown().await;
    gateway.shutdown().await;
    result
}

async fn demo_flow(runtime: &NodeRuntime, anonymous: bool) -> Result<()> {
    let creator = runtime.container.config.runtime.creator.clone();
    let coordinator = &runtime.coordinator;

    if anonymous {
        for (id, category) in [
            ("battery-001", "battery"),
            ("motor-001", "motor"),
            ("battery-002", "battery"),
            ("motor-002", "motor"),
        ] {
            let registration = coordinator
                .register_anonymous(&creator, id, "demo-manufacturer", category)
                .await?;
            info!("Registered {} as {}", category, registration.receipt.tx_hash);
        }
    }

    // Both sides online: immediate challenge.
    coordinator.heartbeat("battery-001", anonymous)?;
    coordinator.heartbeat("motor-001", anonymous)?;
    let mut request = PairRequest::new("battery-001", "motor-001", "demo-pack");
    request.anonymous = anonymous;
    let outcome = coordinator.pair(&creator, request).await?;
    let challenge = outcome
        .challenge()
        .cloned()
        .context("Both sides were online but the pairing was queued")?;
    print_json("challenge", &challenge)?;

    let (auth_a, auth_b) = runtime.container.verifier.issue_pair(&challenge)?;
    let completion = coordinator
        .complete(
            &creator,
            CompleteRequest {
                challenge_id: challenge.challenge_id.clone(),
                auth_a,
                auth_b,
                session_context: "demo-session".to_string(),
                access_rules: Default::default(),
            },
        )
        .await?;
    print_json("lct", completion.lct.record())?;
    if let Some(score) = completion.trust_score {
        println!("trust score after pairing: {score:.3}");
    }
    let lct_id = completion.lct.record().lct_id.clone();
    let lcts = coordinator.component_lcts("motor-001", anonymous).await?;
    println!("motor-001 is paired through {} lct(s)", lcts.len());
    let access = coordinator
        .validate_lct_access(&lct_id, "battery-001", anonymous)
        .await?;
    println!("battery-001 access to {lct_id}: {:?}", access.access_level);
    if anonymous {
        let rules = PairingRules::new(lct_id.clone());
        let committed = coordinator
            .update_authorization(&creator, "battery-001", rules)
            .await?;
        print_json("pairing rules", &committed.entity)?;
        let check = coordinator
            .check_pairing_auth("battery-001", "motor-001")
            .await?;
        println!("pairing check: {}", check.reason);
    }

    // Motor offline: the pairing waits on the proxy's queue.
    coordinator.heartbeat("battery-002", anonymous)?;
    let mut request =
        PairRequest::new("battery-002", "motor-002", "demo-pack").with_proxy("proxy-1");
    request.anonymous = anonymous;
    let outcome = coordinator.pair(&creator, request).await?;
    if let Some(queued) = outcome.queued() {
        print_json("queued request", queued)?;
    }
    for report in coordinator.process_pending("proxy-1", "demo-pack").await? {
        print_json("queue report", &report)?;
    }

    let revoked = coordinator
        .revoke(
            &creator,
            &completion.lct.record().lct_id,
            "demo finished",
            true,
        )
        .await?;
    println!(
        "revoked {} (notified {} offline peer(s))",
        revoked.lct_id,
        revoked.notified.len()
    );

    println!("== metrics");
    println!("{}", encode_metrics()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging and metrics
    init_telemetry(&TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    // Load configuration
    let config = NodeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Gateway => run_gateway(config).await,
        Command::Node => run_node(config).await,
        Command::Demo {
            transport,
            anonymous,
        } => run_demo(config, transport, anonymous).await,
    }
}
