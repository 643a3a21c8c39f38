//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to colour console output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "pairing-node".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PL_SERVICE_NAME`: Service name (default: pairing-node)
    /// - `PL_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `PL_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `NO_COLOR`: Disable ANSI colours when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`TelemetryConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            service_name: lookup("PL_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("PL_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: lookup("PL_JSON_LOGS")
                .map(|v| is_truthy(&v))
                .unwrap_or(defaults.json_logs),
            ansi: lookup("NO_COLOR").is_none(),
        }
    }

    /// Quiet configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            service_name: "pairing-test".to_string(),
            log_level: "warn".to_string(),
            json_logs: false,
            ansi: false,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
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
        let config = TelemetryConfig::from_lookup(lookup(&[]));
        assert_eq!(config, TelemetryConfig::default());
    }

    #[test]
    fn test_pl_log_level_wins_over_rust_log() {
        let config =
            TelemetryConfig::from_lookup(lookup(&[("PL_LOG_LEVEL", "debug"), ("RUST_LOG", "trace")]));
        assert_eq!(config.log_level, "debug");

        let config = TelemetryConfig::from_lookup(lookup(&[("RUST_LOG", "trace")]));
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_json_logs_flag() {
        assert!(TelemetryConfig::from_lookup(lookup(&[("PL_JSON_LOGS", "true")])).json_logs);
        assert!(TelemetryConfig::from_lookup(lookup(&[("PL_JSON_LOGS", "1")])).json_logs);
        assert!(!TelemetryConfig::from_lookup(lookup(&[("PL_JSON_LOGS", "no")])).json_logs);
    }

    #[test]
    fn test_no_color_disables_ansi() {
        assert!(!TelemetryConfig::from_lookup(lookup(&[("NO_COLOR", "1")])).ansi);
    }
}
