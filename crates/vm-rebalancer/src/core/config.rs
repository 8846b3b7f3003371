//! Rebalancer configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors are reported at construction or setter time,
/// invalid values are never silently clamped.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse YAML from file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("overload threshold must be greater than 0 and not greater than 1, got {0}")]
    InvalidOverloadThreshold(f64),
    #[error("under utilization threshold must be greater than 0 and lower than 1, got {0}")]
    InvalidUnderloadThreshold(f64),
    #[error("host search retry delay must be non-negative, got {0}")]
    InvalidRetryDelay(f64),
    #[error("migration cpu overhead factor must be positive, got {0}")]
    InvalidMigrationOverhead(f64),
}

/// Raw form of the configuration as found in a YAML file,
/// all parameters are optional.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ConfigDataRaw {
    /// host CPU utilization above which the host is considered overloaded
    pub overload_threshold: Option<f64>,
    /// host requested demand ratio below which the host is considered underloaded
    pub underload_threshold: Option<f64>,
    /// delay before retrying a failed host search, 0 means immediately
    pub host_search_retry_delay: Option<f64>,
    /// peak CPU usage fraction a VM exhibits while being live-migrated out
    pub max_cpu_usage_during_out_migration: Option<f64>,
    /// CPU overhead factor of live migration on the destination host
    pub migration_cpu_overhead: Option<f64>,
    /// cluster the planner detects load on and drains by default
    pub home_cluster: Option<u32>,
}

/// Validated rebalancer configuration.
#[derive(Debug, Clone)]
pub struct RebalancerConfig {
    /// default overload threshold, hosts may carry a per-host override
    pub overload_threshold: f64,
    /// global underload threshold, must lie in the open interval (0, 1)
    pub underload_threshold: f64,
    /// delay reported in retry events, 0 means immediately
    pub host_search_retry_delay: f64,
    /// peak CPU usage fraction a VM exhibits while being live-migrated out
    pub max_cpu_usage_during_out_migration: f64,
    /// CPU overhead factor of live migration on the destination host
    pub migration_cpu_overhead: f64,
    /// cluster the planner detects load on and drains by default
    pub home_cluster: u32,
}

impl RebalancerConfig {
    pub const DEFAULT_OVERLOAD_THRESHOLD: f64 = 0.8;
    pub const DEFAULT_UNDERLOAD_THRESHOLD: f64 = 0.35;

    /// Creates config with default parameter values.
    pub fn new() -> Self {
        Self {
            overload_threshold: Self::DEFAULT_OVERLOAD_THRESHOLD,
            underload_threshold: Self::DEFAULT_UNDERLOAD_THRESHOLD,
            host_search_retry_delay: 0.,
            max_cpu_usage_during_out_migration: 0.1,
            migration_cpu_overhead: 1.,
            home_cluster: 0,
        }
    }

    /// Creates config by reading parameter values from a YAML file
    /// (uses default values for absent parameters).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let raw: ConfigDataRaw =
            serde_yaml::from_str(&std::fs::read_to_string(file_name).map_err(|e| ConfigError::Io {
                path: file_name.to_string(),
                source: e,
            })?)
            .map_err(|e| ConfigError::Parse {
                path: file_name.to_string(),
                source: e,
            })?;
        let default = Self::new();
        let config = Self {
            overload_threshold: raw.overload_threshold.unwrap_or(default.overload_threshold),
            underload_threshold: raw.underload_threshold.unwrap_or(default.underload_threshold),
            host_search_retry_delay: raw.host_search_retry_delay.unwrap_or(default.host_search_retry_delay),
            max_cpu_usage_during_out_migration: raw
                .max_cpu_usage_during_out_migration
                .unwrap_or(default.max_cpu_usage_during_out_migration),
            migration_cpu_overhead: raw.migration_cpu_overhead.unwrap_or(default.migration_cpu_overhead),
            home_cluster: raw.home_cluster.unwrap_or(default.home_cluster),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks all parameter values, returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.overload_threshold > 0. && self.overload_threshold <= 1.) {
            return Err(ConfigError::InvalidOverloadThreshold(self.overload_threshold));
        }
        if !(self.underload_threshold > 0. && self.underload_threshold < 1.) {
            return Err(ConfigError::InvalidUnderloadThreshold(self.underload_threshold));
        }
        if self.host_search_retry_delay < 0. {
            return Err(ConfigError::InvalidRetryDelay(self.host_search_retry_delay));
        }
        if self.migration_cpu_overhead <= 0. {
            return Err(ConfigError::InvalidMigrationOverhead(self.migration_cpu_overhead));
        }
        Ok(())
    }

    /// Sets the underload threshold, rejecting values outside the open interval (0, 1).
    pub fn set_underload_threshold(&mut self, threshold: f64) -> Result<(), ConfigError> {
        if !(threshold > 0. && threshold < 1.) {
            return Err(ConfigError::InvalidUnderloadThreshold(threshold));
        }
        self.underload_threshold = threshold;
        Ok(())
    }
}

impl Default for RebalancerConfig {
    fn default() -> Self {
        Self::new()
    }
}
