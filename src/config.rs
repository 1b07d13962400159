//! Configuration for kvshell
//!
//! Centralized store configuration with sensible defaults. A `Config` is
//! handed to [`Store::open`](crate::Store::open) and is immutable from then on.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::error::{Result, StoreError};

pub const MB: usize = 1 << 20;

/// How often the maintenance worker looks for reclaimable space
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(25 * 60);

/// Fraction of a segment that must be reclaimable before compaction runs
pub const DEFAULT_DISCARD_RATIO: f64 = 0.5;

/// Main configuration for a store
#[derive(Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the store file (parent directories are created on open)
    pub path: PathBuf,

    /// Key material for value encryption; empty disables encryption
    pub encryption_key: Zeroizing<Vec<u8>>,

    // -------------------------------------------------------------------------
    // Engine Tuning
    // -------------------------------------------------------------------------
    /// Segment size (bytes) the discard ratio is measured against
    pub value_log_file_size: usize,

    /// Engine page cache size (bytes); keeps index pages hot, which matters
    /// most for encrypted stores
    pub index_cache_size: usize,

    // -------------------------------------------------------------------------
    // Maintenance Configuration
    // -------------------------------------------------------------------------
    /// Interval between reclaim passes
    pub maintenance_interval: Duration,

    /// Reclaimable fraction that makes a segment eligible, in (0, 1)
    pub discard_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./kvshell.redb"),
            encryption_key: Zeroizing::new(Vec::new()),
            value_log_file_size: 100 * MB,
            index_cache_size: 50 * MB,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            discard_ratio: DEFAULT_DISCARD_RATIO,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Whether values are sealed with the encryption key
    pub fn is_encrypted(&self) -> bool {
        !self.encryption_key.is_empty()
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::Config("store path is empty".to_string()));
        }
        if self.maintenance_interval.is_zero() {
            return Err(StoreError::Config(
                "maintenance interval must be greater than zero".to_string(),
            ));
        }
        if !(self.discard_ratio > 0.0 && self.discard_ratio < 1.0) {
            return Err(StoreError::Config(format!(
                "discard ratio must be between 0 and 1, got {}",
                self.discard_ratio
            )));
        }
        if self.value_log_file_size == 0 {
            return Err(StoreError::Config(
                "value log file size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field(
                "encryption_key",
                &if self.is_encrypted() { "[REDACTED]" } else { "[NONE]" },
            )
            .field("value_log_file_size", &self.value_log_file_size)
            .field("index_cache_size", &self.index_cache_size)
            .field("maintenance_interval", &self.maintenance_interval)
            .field("discard_ratio", &self.discard_ratio)
            .finish()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the encryption key (an empty key disables encryption)
    pub fn encryption_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.config.encryption_key = Zeroizing::new(key.into());
        self
    }

    /// Set the segment size used for reclaim eligibility (in bytes)
    pub fn value_log_file_size(mut self, size: usize) -> Self {
        self.config.value_log_file_size = size;
        self
    }

    /// Set the engine cache size (in bytes)
    pub fn index_cache_size(mut self, size: usize) -> Self {
        self.config.index_cache_size = size;
        self
    }

    /// Set the interval between maintenance passes
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.config.maintenance_interval = interval;
        self
    }

    /// Set the discard ratio for reclaim eligibility
    pub fn discard_ratio(mut self, ratio: f64) -> Self {
        self.config.discard_ratio = ratio;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_encrypted());
        assert_eq!(config.value_log_file_size, 100 * MB);
        assert_eq!(config.index_cache_size, 50 * MB);
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let config = Config::builder().discard_ratio(1.0).build();
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));

        let config = Config::builder().discard_ratio(0.0).build();
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn rejects_zero_interval() {
        let config = Config::builder()
            .maintenance_interval(Duration::ZERO)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let config = Config::builder().encryption_key("hunter2").build();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }
}
