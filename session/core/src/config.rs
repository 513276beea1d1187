//! Session Configuration
//!
//! Values are layered with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`TICTACTOE_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! service_timeout_ms = 50
//! tick_interval_ms = 100
//! max_frame_size = 512
//! greeting = "CONNECTED"
//!
//! [endpoint]
//! address = "game.example.net"
//! port = 8080
//! path = "/"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the effective configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Where the server lives
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// Host name or IP address
    pub address: String,
    /// TCP port
    pub port: u16,
    /// Request path, starting with `/`
    pub path: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 8080,
            path: "/".to_string(),
        }
    }
}

impl Endpoint {
    /// Build an endpoint for `address:port/path`
    pub fn new(address: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port,
            path: path.into(),
        }
    }

    /// The WebSocket URL
    pub fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("ws://{}:{}{path}", self.address, self.port)
    }
}

/// Everything the session needs to know before connecting
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server location
    pub endpoint: Endpoint,

    /// Upper bound on one service-loop wait in milliseconds
    ///
    /// Also bounds shutdown latency and the graceful-close wait.
    pub service_timeout_ms: u64,

    /// Control-thread drain cadence in milliseconds
    pub tick_interval_ms: u64,

    /// How long the WebSocket handshake may take
    pub connect_timeout_ms: u64,

    /// Largest outbound text frame in bytes; longer lines are truncated
    pub max_frame_size: usize,

    /// Payload sent as soon as the connection is established
    pub greeting: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            service_timeout_ms: 100,
            tick_interval_ms: 100,
            connect_timeout_ms: 5000,
            max_frame_size: 512,
            greeting: Some(crate::protocol::CONNECTED_MARKER.to_string()),
        }
    }
}

impl SessionConfig {
    /// Service-loop wait bound
    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }

    /// Dispatcher cadence
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Handshake bound
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `TICTACTOE_*` variables from the process environment
    pub fn apply_env(&mut self) -> bool {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `TICTACTOE_*` variables through a lookup function
    ///
    /// Variables:
    /// - `TICTACTOE_ADDRESS`, `TICTACTOE_PORT`, `TICTACTOE_PATH`
    /// - `TICTACTOE_SERVICE_TIMEOUT`, `TICTACTOE_TICK_INTERVAL`,
    ///   `TICTACTOE_CONNECT_TIMEOUT`: milliseconds
    /// - `TICTACTOE_MAX_FRAME`: bytes
    /// - `TICTACTOE_GREETING`: empty disables the greeting
    ///
    /// Unparseable numbers are ignored. Returns whether anything was applied.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = false;
        if let Some(address) = lookup("TICTACTOE_ADDRESS") {
            self.endpoint.address = address;
            applied = true;
        }
        if let Some(port) = parse_var(&lookup, "TICTACTOE_PORT") {
            self.endpoint.port = port;
            applied = true;
        }
        if let Some(path) = lookup("TICTACTOE_PATH") {
            self.endpoint.path = path;
            applied = true;
        }
        if let Some(ms) = parse_var(&lookup, "TICTACTOE_SERVICE_TIMEOUT") {
            self.service_timeout_ms = ms;
            applied = true;
        }
        if let Some(ms) = parse_var(&lookup, "TICTACTOE_TICK_INTERVAL") {
            self.tick_interval_ms = ms;
            applied = true;
        }
        if let Some(ms) = parse_var(&lookup, "TICTACTOE_CONNECT_TIMEOUT") {
            self.connect_timeout_ms = ms;
            applied = true;
        }
        if let Some(bytes) = parse_var(&lookup, "TICTACTOE_MAX_FRAME") {
            self.max_frame_size = bytes;
            applied = true;
        }
        if let Some(greeting) = lookup("TICTACTOE_GREETING") {
            self.greeting = (!greeting.is_empty()).then_some(greeting);
            applied = true;
        }

        applied
    }

    /// Reject values the transport cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint.address must not be empty".into(),
            ));
        }
        if self.endpoint.port == 0 {
            return Err(ConfigError::ValidationError(
                "endpoint.port must be non-zero".into(),
            ));
        }
        if self.service_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "service_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick_interval_ms must be greater than 0".into(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_frame_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Values given on the command line
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Server host
    pub address: Option<String>,
    /// Server port
    pub port: Option<u16>,
    /// Request path
    pub path: Option<String>,
    /// Service-loop wait in milliseconds
    pub service_timeout_ms: Option<u64>,
    /// Drain cadence in milliseconds
    pub tick_interval_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Whether any override is set
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.port.is_none()
            && self.path.is_none()
            && self.service_timeout_ms.is_none()
            && self.tick_interval_ms.is_none()
    }

    /// Write the set overrides into `config`
    pub fn apply(&self, config: &mut SessionConfig) {
        if let Some(ref address) = self.address {
            config.endpoint.address = address.clone();
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        if let Some(ref path) = self.path {
            config.endpoint.path = path.clone();
        }
        if let Some(ms) = self.service_timeout_ms {
            config.service_timeout_ms = ms;
        }
        if let Some(ms) = self.tick_interval_ms {
            config.tick_interval_ms = ms;
        }
    }
}

/// `$XDG_CONFIG_HOME/tictactoe/client.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tictactoe").join("client.toml"))
}

/// Resolve the effective configuration.
///
/// An explicit `path` must exist; the default path is optional.
/// Returns the config and the highest-priority layer that contributed.
pub fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<(SessionConfig, ConfigSource), ConfigError> {
    let mut source = ConfigSource::Default;

    let mut config = match path {
        Some(path) => {
            source = ConfigSource::File;
            SessionConfig::from_file(path)?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                tracing::debug!(path = ?path, "Loading default config file");
                source = ConfigSource::File;
                SessionConfig::from_file(&path)?
            }
            None => SessionConfig::default(),
        },
    };

    if config.apply_env() {
        source = ConfigSource::Env;
    }
    if !overrides.is_empty() {
        overrides.apply(&mut config);
        source = ConfigSource::Cli;
    }

    config.validate()?;
    Ok((config, source))
}
