//! Configuration loading and resolution
//!
//! Client settings are resolved per field in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:7000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Lower bound for the poll interval
pub const MIN_POLL_INTERVAL_MS: u64 = 50;

pub const ENV_SERVER_URL: &str = "INGEST_SERVER_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "INGEST_POLL_INTERVAL_MS";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// `[logging]` table of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Contents of `ingest-sync.toml`; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub server_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub track_cache: Option<bool>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the config file, falling back to defaults when it does not exist
    ///
    /// A missing file is not an error. A file that exists but does not parse is.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::load_with_source(path)?;
        source.log();
        Ok(config)
    }

    /// Same as [`TomlConfig::load_or_default`], without logging
    ///
    /// The returned [`ConfigSource`] says where the values came from, so a
    /// binary can report it once its subscriber is installed.
    pub fn load_with_source(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok((Self::default(), ConfigSource::NoConfigDir)),
            },
        };

        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Missing(path)));
        }

        let config = Self::load(&path)?;
        Ok((config, ConfigSource::File(path)))
    }
}

/// Where the TOML layer of the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// File does not exist; defaults used
    Missing(PathBuf),
    /// No config directory on this platform; defaults used
    NoConfigDir,
}

impl ConfigSource {
    pub fn is_default(&self) -> bool {
        !matches!(self, ConfigSource::File(_))
    }

    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Missing(path) => {
                warn!("Config file {} not found, using defaults", path.display())
            }
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using defaults")
            }
        }
    }
}

/// Default config file location (`~/.config/ingest/ingest-sync.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ingest").join("ingest-sync.toml"))
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub track_cache: Option<bool>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub track_cache: bool,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            track_cache: true,
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server_url must be an http(s) URL, got '{}'",
                self.server_url
            )));
        }
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(Error::Config(format!(
                "poll_interval_ms must be at least {}, got {}",
                MIN_POLL_INTERVAL_MS, self.poll_interval_ms
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Resolve the client configuration from CLI, environment, TOML and defaults
pub fn resolve_client_config(cli: &ConfigOverrides, toml: &TomlConfig) -> Result<ClientConfig> {
    let defaults = ClientConfig::default();

    // Priority 1: CLI, Priority 2: environment, Priority 3: TOML
    let server_url = cli
        .server_url
        .clone()
        .or_else(|| std::env::var(ENV_SERVER_URL).ok())
        .or_else(|| toml.server_url.clone())
        .unwrap_or(defaults.server_url);

    let env_interval = match std::env::var(ENV_POLL_INTERVAL_MS) {
        Ok(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
            Error::Config(format!("{}='{}' is not a number: {}", ENV_POLL_INTERVAL_MS, raw, e))
        })?),
        Err(_) => None,
    };

    let poll_interval_ms = cli
        .poll_interval_ms
        .or(env_interval)
        .or(toml.poll_interval_ms)
        .unwrap_or(defaults.poll_interval_ms);

    let config = ClientConfig {
        server_url: server_url.trim_end_matches('/').to_string(),
        poll_interval_ms,
        request_timeout_ms: toml.request_timeout_ms.unwrap_or(defaults.request_timeout_ms),
        track_cache: cli.track_cache.or(toml.track_cache).unwrap_or(defaults.track_cache),
        log_level: toml.logging.level.clone(),
    };

    config.validate()?;
    Ok(config)
}
