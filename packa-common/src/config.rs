//! Bootstrap configuration
//!
//! All settings come from one optional TOML file. Every field has a
//! built-in default, so a missing file (or a missing table inside it) never
//! prevents startup.
//!
//! # Config file resolution priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`PACKA_CONFIG`)
//! 3. `<user config dir>/packa/config.toml`
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PACKA_CONFIG";

/// Top-level configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session lifecycle timings
    #[serde(default)]
    pub session: SessionConfig,

    /// Queue view paging and expiry
    #[serde(default)]
    pub queue_view: QueueViewConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
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

/// Session inactivity timings, in seconds
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Grace period after joining before an idle session is torn down
    #[serde(default = "default_join_grace_secs")]
    pub join_grace_secs: u64,

    /// Default grace period for a paused session
    #[serde(default = "default_pause_grace_secs")]
    pub pause_grace_secs: u64,

    /// Grace period after the queue runs dry
    #[serde(default = "default_queue_empty_grace_secs")]
    pub queue_empty_grace_secs: u64,

    /// Broadcast channel capacity for session events
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_grace_secs: default_join_grace_secs(),
            pause_grace_secs: default_pause_grace_secs(),
            queue_empty_grace_secs: default_queue_empty_grace_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SessionConfig {
    pub fn join_grace(&self) -> Duration {
        Duration::from_secs(self.join_grace_secs)
    }

    pub fn pause_grace(&self) -> Duration {
        Duration::from_secs(self.pause_grace_secs)
    }

    pub fn queue_empty_grace(&self) -> Duration {
        Duration::from_secs(self.queue_empty_grace_secs)
    }
}

/// Queue view paging and expiry
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QueueViewConfig {
    /// Entries per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Lifetime of a view before the sweep destroys it
    #[serde(default = "default_view_lifetime_secs")]
    pub lifetime_secs: u64,

    /// Interval between expiry sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for QueueViewConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            lifetime_secs: default_view_lifetime_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl QueueViewConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_join_grace_secs() -> u64 {
    3 * 60 * 60
}

fn default_pause_grace_secs() -> u64 {
    3 * 60 * 60
}

fn default_queue_empty_grace_secs() -> u64 {
    5 * 60
}

fn default_event_capacity() -> usize {
    256
}

fn default_page_size() -> usize {
    10
}

fn default_view_lifetime_secs() -> u64 {
    10 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load configuration following the priority order
    ///
    /// An explicitly requested file (CLI or env) that cannot be read is an
    /// error. A missing default-location file falls back to built-in
    /// defaults with a warning.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            info!("Loading config from command-line path: {}", path.display());
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            info!("Loading config from {}: {}", CONFIG_ENV_VAR, path.display());
            return Self::load(&path);
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                info!("Loading config from {}", path.display());
                return Self::load(&path);
            }
        }

        warn!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Check values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.queue_view.page_size == 0 {
            return Err(Error::Config("queue_view.page_size must be at least 1".to_string()));
        }
        if self.queue_view.lifetime_secs == 0 {
            return Err(Error::Config("queue_view.lifetime_secs must be positive".to_string()));
        }
        if self.queue_view.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "queue_view.sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.session.event_capacity == 0 {
            return Err(Error::Config("session.event_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

/// Platform config location (`~/.config/packa/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("packa").join("config.toml"))
}
