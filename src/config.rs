//! Application configuration management.
//!
//! Configuration covers the boundary the environment supplies: the remote
//! dataset URL, where the local store lives, the optional bundled snapshot,
//! and the freshness-check interval.
//!
//! Stored at `~/.config/gridcache/config.json`. Each config value points at
//! one dataset; running several datasets side by side means one `Config`
//! (and one store file) per dataset.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "gridcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default period between background freshness checks, in seconds.
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Which persistence backend holds the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL of the remote dataset document.
    pub data_url: String,

    /// Persistence backend. Flat-file JSON unless configured otherwise.
    #[serde(default)]
    pub store_kind: StoreKind,

    /// Local store location. Defaults to a file under the user cache dir.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Read-only snapshot shipped with the application, used when the local
    /// store is unreadable.
    #[serde(default)]
    pub bundled_snapshot: Option<PathBuf>,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Disable TLS verification on outbound requests. Off by default; only
    /// flip this for sources you control.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_url: String::new(),
            store_kind: StoreKind::default(),
            store_path: None,
            bundled_snapshot: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            accept_invalid_certs: false,
        }
    }
}

impl Config {
    pub fn new(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the dataset store lives: the configured path, or a default
    /// under the user cache dir with an extension matching the backend.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.store_path {
            return Ok(path.clone());
        }
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        let file = match self.store_kind {
            StoreKind::Json => "data.json",
            StoreKind::Sqlite => "data.db",
        };
        Ok(cache_dir.join(APP_NAME).join(file))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
