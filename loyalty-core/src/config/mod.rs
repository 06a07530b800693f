//! Configuration types for the loyalty ledger.
//!
//! These types represent the validated runtime configuration. Loading and
//! layering (file, environment, flags) is handled by the server crate.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Tuning of the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of concurrent workers querying the accrual service.
    pub workers: usize,
    /// Capacity of the queue between discovery and workers.
    pub queue_capacity: usize,
    /// Pause between two discovery cycles.
    pub discovery_interval: Duration,
    /// How long the whole pool stays paused after an overload signal.
    pub overload_cooldown: Duration,
    /// Upper bound of a single accrual query.
    pub oracle_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 64,
            discovery_interval: Duration::from_secs(5),
            overload_cooldown: Duration::from_secs(120),
            oracle_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Validation("engine.workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "engine.queue_capacity must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("discovery_interval_secs", self.discovery_interval),
            ("overload_cooldown_secs", self.overload_cooldown),
            ("oracle_timeout_secs", self.oracle_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Validation(format!(
                    "engine.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}
