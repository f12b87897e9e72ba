//! Configuration types for mediastore
//!
//! Every section falls back to its defaults, so a partial TOML file (or
//! no file at all) yields a usable configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration for mediastore
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Media storage configuration
    pub storage: StorageConfig,
    /// Metadata database configuration
    pub metadata: MetadataConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Configuration(e.to_string()))?;
        config.storage.validate()?;
        Ok(config)
    }

    /// Load a TOML file, or the defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the HTTP API
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Media storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the media tree
    pub root: PathBuf,
    /// Upload parts up to this size are buffered in memory; larger parts
    /// are spooled to a temporary file (default: 1 MB)
    pub memory_threshold: usize,
    /// Largest accepted upload part (default: 100 MB)
    pub max_upload_size: u64,
    /// Directory for spooled parts (default: system temp dir)
    pub spool_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/mediastore/media"),
            memory_threshold: 1024 * 1024,      // 1 MB
            max_upload_size: 100 * 1024 * 1024, // 100 MB
            spool_dir: None,
        }
    }
}

impl StorageConfig {
    /// Storage config rooted at `root` with default limits
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Reject settings the pipelines cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::Configuration("storage.root cannot be empty".into()));
        }
        if self.max_upload_size == 0 {
            return Err(Error::Configuration(
                "storage.max_upload_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Where oversized upload parts are spooled
    #[must_use]
    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Metadata database configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Path of the redb database file
    pub path: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/mediastore/meta.redb"),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
