//! Configuration loading and config file resolution

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PULSE_CONFIG";

/// Service configuration from TOML
///
/// Every field has a compiled default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to
    pub bind_address: String,
    /// TCP port for the HTTP listener
    pub port: u16,
    /// Delay between successive stream events, in milliseconds
    pub emit_interval_ms: u64,
    /// Reconnection hint advertised to clients, in milliseconds
    pub retry_ms: u64,
    /// Default log level when RUST_LOG is not set
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5780,
            emit_interval_ms: 2000,
            retry_ms: 60_000,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load configuration
    ///
    /// Priority order:
    /// 1. Explicit path (command-line argument)
    /// 2. `PULSE_CONFIG` environment variable
    /// 3. Platform config file (`<config_dir>/pulse/config.toml`)
    /// 4. Compiled defaults
    ///
    /// An explicit path from 1 or 2 must exist and parse. A broken platform
    /// file is skipped and recorded in [`LoadedConfig::ignored`]. Nothing is
    /// logged here since this runs before the subscriber exists; call
    /// [`LoadedConfig::log_outcome`] once tracing is up.
    pub fn load(cli_path: Option<&Path>) -> Result<LoadedConfig> {
        if let Some(path) = cli_path {
            let config = Self::from_file(path)?;
            return Ok(LoadedConfig::new(config, ConfigSource::CommandLine(path.to_path_buf())));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                let path = PathBuf::from(path);
                let config = Self::from_file(&path)?;
                return Ok(LoadedConfig::new(config, ConfigSource::Environment(path)));
            }
        }

        let mut ignored = None;
        if let Some(path) = default_config_path().filter(|p| p.exists()) {
            match Self::from_file(&path) {
                Ok(config) => {
                    return Ok(LoadedConfig::new(config, ConfigSource::PlatformFile(path)))
                }
                Err(e) => ignored = Some(IgnoredConfig { path, reason: e.to_string() }),
            }
        }

        Ok(LoadedConfig {
            config: Self::default(),
            source: ConfigSource::Defaults,
            ignored,
        })
    }

    /// Check value ranges that TOML types alone cannot express
    pub fn validate(&self) -> Result<()> {
        if self.emit_interval_ms == 0 {
            return Err(Error::Config(
                "emit_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.bind_address.trim().is_empty() {
            return Err(Error::Config("bind_address must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    /// `host:port` string for binding the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    PlatformFile(PathBuf),
    Defaults,
}

/// Platform config file that existed but could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredConfig {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of config resolution
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ServiceConfig,
    pub source: ConfigSource,
    /// Set when a broken platform file was skipped in favour of defaults
    pub ignored: Option<IgnoredConfig>,
}

impl LoadedConfig {
    fn new(config: ServiceConfig, source: ConfigSource) -> Self {
        Self {
            config,
            source,
            ignored: None,
        }
    }

    /// Report how configuration was resolved
    pub fn log_outcome(&self) {
        if let Some(ignored) = &self.ignored {
            warn!(
                "Ignoring config file {}: {}",
                ignored.path.display(),
                ignored.reason
            );
        }

        match &self.source {
            ConfigSource::CommandLine(path) => {
                info!("Loaded config from command-line path {}", path.display())
            }
            ConfigSource::Environment(path) => {
                info!("Loaded config from {}={}", CONFIG_ENV_VAR, path.display())
            }
            ConfigSource::PlatformFile(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Defaults => debug!("No config file found, using compiled defaults"),
        }
    }
}

/// Platform config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pulse").join("config.toml"))
}
