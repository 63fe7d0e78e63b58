//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (BEACON_HOST, BEACON_PORT)
//! - TOML configuration file
//! - Command line arguments (`--config <path>`)

use anyhow::{ensure, Context, Result};
use beacon_core::{HubConfig, RegistryConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP routes.
    #[serde(default)]
    pub http: HttpConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Session hub behaviour.
    #[serde(default)]
    pub hub: HubSection,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// HTTP route configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Path prefix of the session upgrade endpoint.
    #[serde(default = "default_session_path")]
    pub session_path: String,

    /// File served at `/`.
    #[serde(default = "default_homepage")]
    pub homepage: PathBuf,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Capacity of each connection's outbound queue.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Capacity of each hub's command queue.
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,

    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Session hub configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubSection {
    /// Deliver a sender's own payloads back to it.
    #[serde(default)]
    pub echo_to_sender: bool,
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
    std::env::var("BEACON_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("BEACON_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_true() -> bool {
    true
}

fn default_session_path() -> String {
    "/session".to_string()
}

fn default_homepage() -> PathBuf {
    PathBuf::from("./index.html")
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_outbound_queue_capacity() -> usize {
    beacon_core::DEFAULT_OUTBOUND_CAPACITY
}

fn default_command_queue_capacity() -> usize {
    1024
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            http: HttpConfig::default(),
            limits: LimitsConfig::default(),
            hub: HubSection::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            session_path: default_session_path(),
            homepage: default_homepage(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            command_queue_capacity: default_command_queue_capacity(),
            max_message_size: default_max_message_size(),
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

impl HttpConfig {
    /// Route pattern of the upgrade endpoint.
    #[must_use]
    pub fn session_route(&self) -> String {
        format!("{}/:key", self.session_prefix())
    }

    /// Path a client opens to join the session `key`.
    #[must_use]
    pub fn session_url(&self, key: &str) -> String {
        format!("{}/{}", self.session_prefix(), key)
    }

    fn session_prefix(&self) -> &str {
        self.session_path.trim_end_matches('/')
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        // Try to load from default paths
        let config_paths = [
            "beacon.toml",
            "/etc/beacon/beacon.toml",
            "~/.config/beacon/beacon.toml",
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

    /// Load configuration, honouring a `--config <path>` argument.
    ///
    /// # Errors
    ///
    /// Returns an error if the argument is incomplete or the file cannot be
    /// read or parsed.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--config" {
                let path = args.next().context("--config requires a path")?;
                return Self::from_file(shellexpand::tilde(&path).as_ref());
            }
        }
        Self::load()
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

    /// Check limits that would otherwise fail at runtime.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.limits.outbound_queue_capacity > 0,
            "limits.outbound_queue_capacity must be greater than zero"
        );
        ensure!(
            self.limits.command_queue_capacity > 0,
            "limits.command_queue_capacity must be greater than zero"
        );
        ensure!(
            self.http.session_path.starts_with('/'),
            "http.session_path must start with '/'"
        );
        ensure!(
            !self.http.session_prefix().is_empty(),
            "http.session_path must not be the root path"
        );
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid host:port {}:{}", self.host, self.port))
    }

    /// Registry settings derived from this configuration.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            max_sessions: self.limits.max_sessions,
            hub: HubConfig {
                command_capacity: self.limits.command_queue_capacity,
                echo_to_sender: self.hub.echo_to_sender,
            },
        }
    }
}
