//! # Node Configuration
//!
//! Unified configuration for every pairing subsystem and the runtime itself.
//! Loaded from an optional TOML file, then overridden by `PL_*` variables.
//!
//! ## Security Requirements
//!
//! - `runtime.authority_key` and `hasher.salt` MUST be set in production
//! - Both are redacted from `Debug` output

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use pl_01_identity_hashing::{HasherConfig, RegistryConfig};
use pl_02_pairing_handshake::HandshakeConfig;
use pl_03_pairing_queue::QueueConfig;
use pl_04_trust_ledger::TrustConfig;
use pl_05_ledger_transport::{TransportConfig, TransportPreference};
use pl_06_ledger_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Handshake policy.
    pub handshake: HandshakeConfig,
    /// Offline queue limits.
    pub queue: QueueConfig,
    /// Trust ledger policy.
    pub trust: TrustConfig,
    /// Ledger transport client.
    pub transport: TransportConfig,
    /// In-memory ledger gateway (the `gateway` subcommand).
    pub gateway: GatewayConfig,
    /// Anonymous identity salt and context.
    pub hasher: HasherConfig,
    /// Anonymous registry policy.
    pub registry: RegistryConfig,
    /// Runtime tasks and adapters.
    pub runtime: RuntimeConfig,
}

/// Runtime configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Creator recorded on background writes (sweeps, queue drains).
    pub creator: String,
    /// Period of the expiry sweep in seconds.
    pub sweep_interval_secs: u64,
    /// A component is reachable when its last heartbeat is this recent.
    pub heartbeat_window_secs: u64,
    /// Notices kept for inspection by the notifier.
    pub notice_outbox_capacity: usize,
    /// Key component auth tokens are derived from.
    pub authority_key: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            creator: "pairing-node".to_string(),
            sweep_interval_secs: 30,
            heartbeat_window_secs: 60,
            notice_outbox_capacity: 256,
            authority_key: None,
        }
    }
}

impl RuntimeConfig {
    /// Expiry sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Heartbeat freshness window.
    pub fn heartbeat_window(&self) -> Duration {
        Duration::from_secs(self.heartbeat_window_secs)
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("creator", &self.creator)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("heartbeat_window_secs", &self.heartbeat_window_secs)
            .field("notice_outbox_capacity", &self.notice_outbox_capacity)
            .field("authority_key", &self.authority_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path:?}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`NodeConfig`].
    #[error("invalid config file: {0}")]
    Parse(String),

    /// An environment override could not be parsed.
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv {
        /// Variable name.
        var: String,
        /// Rejected value.
        value: String,
    },

    /// A section failed validation.
    #[error("invalid [{section}] section: {reason}")]
    Invalid {
        /// Section name.
        section: &'static str,
        /// What is wrong.
        reason: String,
    },

    /// A secret required outside development is unset.
    #[error(
        "SECURITY VIOLATION: {0} is not set. \
         Provide it in the config file or the environment."
    )]
    MissingSecret(&'static str),
}

fn invalid(section: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        section,
        reason: reason.to_string(),
    }
}

fn parse_env<T: FromStr>(var: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value,
    })
}

impl NodeConfig {
    /// Settings for tests: short deadlines, ephemeral gateway ports, fixed
    /// secrets.
    pub fn for_testing() -> Self {
        Self {
            handshake: HandshakeConfig::for_testing(),
            queue: QueueConfig::for_testing(),
            trust: TrustConfig::for_testing(),
            transport: TransportConfig::for_testing(),
            gateway: GatewayConfig::for_testing(),
            hasher: HasherConfig::for_testing(),
            registry: RegistryConfig::default(),
            runtime: RuntimeConfig {
                sweep_interval_secs: 1,
                heartbeat_window_secs: 5,
                notice_outbox_capacity: 16,
                authority_key: Some("test-authority-key".to_string()),
                ..RuntimeConfig::default()
            },
        }
    }

    /// Parse a TOML document. Missing sections keep their defaults.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        toml::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from `path` (if any), apply `PL_*` overrides from the process
    /// environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&document)?
            }
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PL_*` overrides read through `lookup`.
    ///
    /// # Environment Variables
    ///
    /// - `PL_TRANSPORT`: rest, rpc or auto
    /// - `PL_LEDGER_REST_URL` / `PL_LEDGER_RPC_URL`: ledger endpoints
    /// - `PL_GATEWAY_REST_ADDR` / `PL_GATEWAY_RPC_ADDR`: gateway listeners
    /// - `PL_HASH_SALT` / `PL_HASH_CONTEXT`: anonymous identity hashing
    /// - `PL_AUTHORITY_KEY`: auth token authority key
    /// - `PL_CHALLENGE_TTL_SECS`: handshake deadline
    /// - `PL_SWEEP_INTERVAL_SECS`: expiry sweep period
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PL_TRANSPORT") {
            self.transport.preference =
                TransportPreference::from_str(&value).map_err(|_| ConfigError::InvalidEnv {
                    var: "PL_TRANSPORT".to_string(),
                    value,
                })?;
        }
        if let Some(url) = lookup("PL_LEDGER_REST_URL") {
            self.transport.rest_url = url;
        }
        if let Some(url) = lookup("PL_LEDGER_RPC_URL") {
            self.transport.rpc_url = url;
        }
        if let Some(addr) = lookup("PL_GATEWAY_REST_ADDR") {
            self.gateway.rest_addr = parse_env::<SocketAddr>("PL_GATEWAY_REST_ADDR", addr)?;
        }
        if let Some(addr) = lookup("PL_GATEWAY_RPC_ADDR") {
            self.gateway.rpc_addr = parse_env::<SocketAddr>("PL_GATEWAY_RPC_ADDR", addr)?;
        }
        if let Some(salt) = lookup("PL_HASH_SALT") {
            self.hasher.salt = Some(salt);
        }
        if let Some(context) = lookup("PL_HASH_CONTEXT") {
            self.hasher.context = Some(context);
        }
        if let Some(key) = lookup("PL_AUTHORITY_KEY") {
            self.runtime.authority_key = Some(key);
        }
        if let Some(ttl) = lookup("PL_CHALLENGE_TTL_SECS") {
            self.handshake.challenge_ttl_secs = parse_env("PL_CHALLENGE_TTL_SECS", ttl)?;
        }
        if let Some(interval) = lookup("PL_SWEEP_INTERVAL_SECS") {
            self.runtime.sweep_interval_secs = parse_env("PL_SWEEP_INTERVAL_SECS", interval)?;
        }
        Ok(())
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.handshake
            .validate()
            .map_err(|e| invalid("handshake", e))?;
        self.queue.validate().map_err(|e| invalid("queue", e))?;
        self.trust.validate().map_err(|e| invalid("trust", e))?;
        self.transport
            .validate()
            .map_err(|e| invalid("transport", e))?;
        self.gateway.validate().map_err(|e| invalid("gateway", e))?;

        let requirement = self.registry.default_trust_requirement;
        if !(0.0..=1.0).contains(&requirement) {
            return Err(invalid(
                "registry",
                format!("default_trust_requirement {requirement} is outside [0, 1]"),
            ));
        }

        let runtime = &self.runtime;
        if runtime.creator.trim().is_empty() {
            return Err(invalid("runtime", "creator is empty"));
        }
        if runtime.sweep_interval_secs == 0 {
            return Err(invalid("runtime", "sweep_interval_secs must be positive"));
        }
        if runtime.heartbeat_window_secs == 0 {
            return Err(invalid("runtime", "heartbeat_window_secs must be positive"));
        }
        if runtime.notice_outbox_capacity == 0 {
            return Err(invalid("runtime", "notice_outbox_capacity must be positive"));
        }
        Ok(())
    }

    /// Validate configuration for production readiness.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - any section is invalid
    /// - the authority key is unset or empty
    /// - the hash salt or context is unset or empty
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.authority_key().is_none() {
            return Err(ConfigError::MissingSecret("PL_AUTHORITY_KEY"));
        }
        let unset = |v: &Option<String>| v.as_deref().map_or(true, str::is_empty);
        if unset(&self.hasher.salt) {
            return Err(ConfigError::MissingSecret("PL_HASH_SALT"));
        }
        if unset(&self.hasher.context) {
            return Err(ConfigError::MissingSecret("PL_HASH_CONTEXT"));
        }
        Ok(())
    }

    /// Authority key bytes, if configured.
    pub fn authority_key(&self) -> Option<&[u8]> {
        self.runtime
            .authority_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(str::as_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.handshake.challenge_ttl_secs, 300);
        assert_eq!(config.transport.preference, TransportPreference::Auto);
        assert_eq!(config.runtime.sweep_interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_for_production_rejects_missing_secrets() {
        let config = NodeConfig::default();
        assert!(matches!(
            config.validate_for_production(),
            Err(ConfigError::MissingSecret("PL_AUTHORITY_KEY"))
        ));

        let mut config = NodeConfig::default();
        config.runtime.authority_key = Some("authority".into());
        assert!(matches!(
            config.validate_for_production(),
            Err(ConfigError::MissingSecret("PL_HASH_SALT"))
        ));
    }

    #[test]
    fn test_testing_config_is_production_ready() {
        assert!(NodeConfig::for_testing().validate_for_production().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = NodeConfig::from_toml_str(
            r#"
            [handshake]
            challenge_ttl_secs = 120

            [transport]
            preference = "rest"
            rest_url = "http://ledger.local:7700"

            [runtime]
            sweep_interval_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.handshake.challenge_ttl_secs, 120);
        assert!(config.handshake.auto_acknowledge);
        assert_eq!(config.transport.preference, TransportPreference::Rest);
        assert_eq!(config.transport.rest_url, "http://ledger.local:7700");
        assert_eq!(config.transport.rpc_url, TransportConfig::default().rpc_url);
        assert_eq!(config.runtime.sweep_interval_secs, 5);
        assert_eq!(config.runtime.heartbeat_window_secs, 60);
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let err = NodeConfig::from_toml_str("[handshake\nchallenge_ttl_secs = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = NodeConfig::default();
        config
            .apply_env(lookup(&[
                ("PL_TRANSPORT", "rpc"),
                ("PL_LEDGER_RPC_URL", "ws://ledger:9000"),
                ("PL_GATEWAY_REST_ADDR", "0.0.0.0:8800"),
                ("PL_HASH_SALT", "s3cret"),
                ("PL_HASH_CONTEXT", "fleet-7"),
                ("PL_AUTHORITY_KEY", "authority"),
                ("PL_CHALLENGE_TTL_SECS", "45"),
            ]))
            .unwrap();
        assert_eq!(config.transport.preference, TransportPreference::StreamingRpc);
        assert_eq!(config.transport.rpc_url, "ws://ledger:9000");
        assert_eq!(config.gateway.rest_addr.port(), 8800);
        assert_eq!(config.hasher.context.as_deref(), Some("fleet-7"));
        assert_eq!(config.authority_key(), Some(&b"authority"[..]));
        assert_eq!(config.handshake.challenge_ttl_secs, 45);
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let mut config = NodeConfig::default();
        let err = config
            .apply_env(lookup(&[("PL_SWEEP_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == "PL_SWEEP_INTERVAL_SECS")
        );

        let err = config
            .apply_env(lookup(&[("PL_TRANSPORT", "carrier-pigeon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validate_names_the_failing_section() {
        let mut config = NodeConfig::default();
        config.handshake.challenge_ttl_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { section: "handshake", .. })
        ));

        let mut config = NodeConfig::default();
        config.runtime.sweep_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { section: "runtime", .. })
        ));

        let mut config = NodeConfig::default();
        config.registry.default_trust_requirement = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { section: "registry", .. })
        ));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "[queue]\nmax_entries_per_queue = 42\n").unwrap();
        let config = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.queue.max_entries_per_queue, 42);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = NodeConfig::load(Some(Path::new("/nonexistent/node.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_debug_redacts_authority_key() {
        let config = NodeConfig::for_testing();
        let printed = format!("{config:?}");
        assert!(!printed.contains("test-authority-key"));
        assert!(!printed.contains("test-salt-0123456789"));
    }
}
