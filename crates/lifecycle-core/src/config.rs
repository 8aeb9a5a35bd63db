//! Lifecycle configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [cache]
//! ttl_ms = 1000
//! max_capacity = 1024
//!
//! [migration]
//! refuse_partial = false
//! log_capacity = 50
//!
//! [storage]
//! data_dir = "./data"
//! audit_dir = "./data/audit"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Validation cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a transition check stays valid
    pub ttl_ms: u64,
    pub max_capacity: u64,
}

impl CacheConfig {
    /// TTL as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 1_000,
            max_capacity: 1_024,
        }
    }
}

/// Migration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Fail loads whose migration stopped early instead of using the partial document
    pub refuse_partial: bool,
    /// Entries kept in the in-process migration log
    pub log_capacity: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            refuse_partial: false,
            log_capacity: lifecycle_migration::DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Where documents and audit backups live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/audit`
    pub audit_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved audit directory
    #[must_use]
    pub fn audit_dir(&self) -> PathBuf {
        self.audit_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("audit"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            audit_dir: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub cache: CacheConfig,
    pub migration: MigrationConfig,
    pub storage: StorageConfig,
}

impl LifecycleConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration TOML
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With validation cache TTL
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With partial-migration policy
    #[inline]
    #[must_use]
    pub fn with_refuse_partial(mut self, refuse: bool) -> Self {
        self.migration.refuse_partial = refuse;
        self
    }

    /// With data directory
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = dir.into();
        self
    }

    /// With audit directory
    #[inline]
    #[must_use]
    pub fn with_audit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.audit_dir = Some(dir.into());
        self
    }
}
