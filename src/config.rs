//! Configuration management for yapscope
//!
//! Config is stored at ~/.config/yapscope/config.toml

use crate::error::{YapError, YapResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default Ethereum RPC URL used for ENS lookups
pub const DEFAULT_RPC_URL: &str = "https://eth.llamarpc.com";

/// Default ENS name carrying the content id
pub const DEFAULT_ENS_NAME: &str = "kaito-attestations.webfree.eth";

/// Default ENS text record key
pub const DEFAULT_RECORD_KEY: &str = "kaito-scores";

/// IPFS gateways, in priority order
pub const DEFAULT_GATEWAYS: &[&str] = &[
    "https://ipfs.filebase.io/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
];

/// 5 days
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 5 * 24 * 60 * 60;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 5;
/// Daily
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;
/// Upper bound for every `*_secs` setting
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Config directory name
const CONFIG_DIR: &str = "yapscope";

/// Config file name
const CONFIG_FILE: &str = "config.toml";

/// ENS name and text record key that point at the current snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecordConfig {
    #[serde(default = "default_ens_name")]
    pub name: String,

    #[serde(default = "default_record_key")]
    pub key: String,
}

impl Default for NameRecordConfig {
    fn default() -> Self {
        Self {
            name: default_ens_name(),
            key: default_record_key(),
        }
    }
}

/// yapscope configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Ethereum RPC URL for ENS lookups
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Gateway base URLs, tried in order
    #[serde(default = "default_gateways")]
    pub gateways: Vec<String>,

    #[serde(default)]
    pub name_record: NameRecordConfig,

    /// How long a cached snapshot stays valid
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,

    /// Per-gateway request timeout
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Bound on each naming-service call
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,

    /// Bound on each cache read or write
    #[serde(default = "default_storage_timeout_secs")]
    pub storage_timeout_secs: u64,

    /// Interval of the scheduled background refresh in `serve` mode
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_ens_name() -> String {
    DEFAULT_ENS_NAME.to_string()
}

fn default_record_key() -> String {
    DEFAULT_RECORD_KEY.to_string()
}

fn default_gateways() -> Vec<String> {
    DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect()
}

fn default_freshness_window_secs() -> u64 {
    DEFAULT_FRESHNESS_WINDOW_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_resolve_timeout_secs() -> u64 {
    DEFAULT_RESOLVE_TIMEOUT_SECS
}

fn default_storage_timeout_secs() -> u64 {
    DEFAULT_STORAGE_TIMEOUT_SECS
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            gateways: default_gateways(),
            name_record: NameRecordConfig::default(),
            freshness_window_secs: default_freshness_window_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            storage_timeout_secs: default_storage_timeout_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl Config {
    /// Get the config directory path (~/.config/yapscope/)
    pub fn dir_path() -> YapResult<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR))
            .ok_or_else(|| YapError::ConfigError("Could not determine config directory".into()))
    }

    /// Get the config file path (~/.config/yapscope/config.toml)
    pub fn file_path() -> YapResult<PathBuf> {
        Self::dir_path().map(|p| p.join(CONFIG_FILE))
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::file_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Load config from file, returning defaults if file doesn't exist
    pub fn load() -> YapResult<Self> {
        let path = Self::file_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(YapError::IoError)?;
        Self::from_toml(&contents)
    }

    /// Parse config from TOML text; blank input yields defaults
    pub fn from_toml(contents: &str) -> YapResult<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(contents)
            .map_err(|e| YapError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save config to file, creating directories if needed
    pub fn save(&self) -> YapResult<()> {
        let dir = Self::dir_path()?;
        let path = Self::file_path()?;

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(YapError::IoError)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| YapError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&path, contents).map_err(YapError::IoError)?;

        Ok(())
    }

    /// Validate the config values
    pub fn validate(&self) -> YapResult<()> {
        if !is_http_url(&self.rpc_url) {
            return Err(YapError::ConfigError(
                "RPC URL must start with http:// or https://".into(),
            ));
        }

        if self.gateways.is_empty() {
            return Err(YapError::ConfigError(
                "At least one gateway must be configured".into(),
            ));
        }

        if let Some(bad) = self.gateways.iter().find(|g| !is_http_url(g)) {
            return Err(YapError::ConfigError(format!(
                "Gateway URL must start with http:// or https://: {}",
                bad
            )));
        }

        if self.name_record.name.trim().is_empty() || self.name_record.key.trim().is_empty() {
            return Err(YapError::ConfigError(
                "Name record name and key must not be empty".into(),
            ));
        }

        let durations = [
            ("freshness_window_secs", self.freshness_window_secs),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("resolve_timeout_secs", self.resolve_timeout_secs),
            ("storage_timeout_secs", self.storage_timeout_secs),
            ("refresh_interval_secs", self.refresh_interval_secs),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            return Err(YapError::ConfigError(format!("{} must be greater than 0", field)));
        }
        if let Some((field, secs)) = durations.iter().find(|(_, secs)| *secs > MAX_DURATION_SECS) {
            return Err(YapError::ConfigError(format!(
                "{} must be at most {} (one year), got {}",
                field, MAX_DURATION_SECS, secs
            )));
        }

        Ok(())
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
