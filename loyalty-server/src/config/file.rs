//! TOML file configuration structures.
//!
//! Every key is optional: values missing from the file fall back to the
//! built-in defaults, and environment variables and flags override the file.
//!
//! ```toml
//! [server]
//! run_address = "0.0.0.0:8080"
//! database_uri = "postgres://loyalty@localhost/loyalty"
//! accrual_system_address = "http://localhost:8081"
//! log_level = "info"
//!
//! [engine]
//! workers = 5
//! queue_capacity = 64
//! discovery_interval_secs = 5
//! overload_cooldown_secs = 120
//! oracle_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub run_address: Option<SocketAddr>,
    pub database_uri: Option<String>,
    pub accrual_system_address: Option<String>,
    pub log_level: Option<String>,
    /// Base64 cookie-signing key.
    pub secret_key: Option<String>,
    pub migrate: Option<bool>,
}

/// Reconciliation engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub workers: usize,
    pub queue_capacity: usize,
    pub discovery_interval_secs: u64,
    pub overload_cooldown_secs: u64,
    pub oracle_timeout_secs: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 64,
            discovery_interval_secs: 5,
            overload_cooldown_secs: 120,
            oracle_timeout_secs: 10,
        }
    }
}
