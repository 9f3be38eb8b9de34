//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (RIPPLE_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport endpoints.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Cross-origin policy.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Long-polling fallback tuning.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for the WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Base path for the long-polling endpoints.
    #[serde(default = "default_polling_path")]
    pub polling_path: String,

    /// Maximum accepted inbound event size in bytes.
    #[serde(default = "default_max_event_size")]
    pub max_event_size: usize,
}

/// Cross-origin policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to make credentialed requests.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Long-polling fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// How long a poll request waits for events, in milliseconds.
    #[serde(default = "default_poll_wait")]
    pub wait_ms: u64,

    /// Idle time after which a session is pruned, in milliseconds.
    #[serde(default = "default_poll_idle_timeout")]
    pub idle_timeout_ms: u64,

    /// Interval between prune sweeps, in milliseconds.
    #[serde(default = "default_prune_interval")]
    pub prune_interval_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("RIPPLE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("RIPPLE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_polling_path() -> String {
    "/poll".to_string()
}

fn default_max_event_size() -> usize {
    ripple_protocol::MAX_EVENT_SIZE
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_poll_wait() -> u64 {
    25_000 // 25 seconds
}

fn default_poll_idle_timeout() -> u64 {
    60_000 // 60 seconds
}

fn default_prune_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            cors: CorsConfig::default(),
            polling: PollingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
            polling_path: default_polling_path(),
            max_event_size: default_max_event_size(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            wait_ms: default_poll_wait(),
            idle_timeout_ms: default_poll_idle_timeout(),
            prune_interval_ms: default_prune_interval(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "ripple.toml",
            "/etc/ripple/ripple.toml",
            "~/.config/ripple/ripple.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if the host/port pair is not a valid address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}
