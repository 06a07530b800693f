//! Configuration module for loyalty-server.
//!
//! Layers, lowest priority first: built-in defaults, the optional TOML
//! file, environment variables, command-line flags. Environment and flags
//! are merged by clap before they reach [`ConfigLoader`].

pub mod file;

use crate::config::file::FileConfig;
use loyalty_core::config::EngineConfig;
use rand::Rng;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Minimum length of a user-supplied cookie-signing key.
pub const MIN_SECRET_KEY_LEN: usize = 16;

const DEFAULT_RUN_ADDRESS: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, 8080));
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("database URI is not set (-d, DATABASE_URI or [server].database_uri)")]
    MissingDatabaseUri,

    #[error(
        "accrual system address is not set (-r, ACCRUAL_SYSTEM_ADDRESS or [server].accrual_system_address)"
    )]
    MissingAccrualAddress,

    #[error("invalid accrual system address: {0}")]
    InvalidAccrualAddress(#[from] url::ParseError),
}

impl From<loyalty_core::config::ConfigError> for ConfigError {
    fn from(e: loyalty_core::config::ConfigError) -> Self {
        ConfigError::ValidationError(e.to_string())
    }
}

/// Values coming from flags or the environment. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub run_address: Option<SocketAddr>,
    pub database_uri: Option<String>,
    pub accrual_system_address: Option<String>,
    pub log_level: Option<String>,
    pub secret_key: Option<String>,
    pub migrate: Option<bool>,
}

/// Where the cookie-signing key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKeySource {
    Configured,
    /// No key was configured.
    Generated,
    /// A key was configured but was not valid base64 or too short.
    Rejected,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub run_address: SocketAddr,
    pub database_uri: String,
    pub accrual_system_address: Url,
    pub log_level: String,
    pub secret_key: Vec<u8>,
    pub secret_key_source: SecretKeySource,
    pub migrate: bool,
    pub engine: EngineConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    overrides: Overrides,
}

impl ConfigLoader {
    pub fn new(overrides: Overrides) -> Self {
        Self { overrides }
    }

    /// Read the file (if any), apply overrides and validate.
    pub fn load(&self) -> Result<ServerConfig, ConfigError> {
        let file_config = match &self.overrides.config {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => FileConfig::default(),
        };
        self.build(file_config)
    }

    fn build(&self, file_config: FileConfig) -> Result<ServerConfig, ConfigError> {
        let o = self.overrides.clone();
        let server = file_config.server;

        let database_uri = o
            .database_uri
            .or(server.database_uri)
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUri)?;

        let accrual = o
            .accrual_system_address
            .or(server.accrual_system_address)
            .filter(|addr| !addr.trim().is_empty())
            .ok_or(ConfigError::MissingAccrualAddress)?;
        let accrual_system_address = parse_accrual_address(&accrual)?;

        let (secret_key, secret_key_source) =
            match o.secret_key.or(server.secret_key).filter(|k| !k.is_empty()) {
                Some(encoded) => match decode_secret_key(&encoded) {
                    Some(key) => (key, SecretKeySource::Configured),
                    None => (random_secret_key(), SecretKeySource::Rejected),
                },
                None => (random_secret_key(), SecretKeySource::Generated),
            };

        let engine = EngineConfig {
            workers: file_config.engine.workers,
            queue_capacity: file_config.engine.queue_capacity,
            discovery_interval: Duration::from_secs(file_config.engine.discovery_interval_secs),
            overload_cooldown: Duration::from_secs(file_config.engine.overload_cooldown_secs),
            oracle_timeout: Duration::from_secs(file_config.engine.oracle_timeout_secs),
        };
        engine.validate()?;

        Ok(ServerConfig {
            run_address: o
                .run_address
                .or(server.run_address)
                .unwrap_or(DEFAULT_RUN_ADDRESS),
            database_uri,
            accrual_system_address,
            log_level: o
                .log_level
                .or(server.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
            secret_key,
            secret_key_source,
            migrate: o.migrate.or(server.migrate).unwrap_or(true),
            engine,
        })
    }
}

/// Accept a bare `host:port` as well as a full URL.
fn parse_accrual_address(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let url = if raw.contains("://") {
        Url::parse(raw)?
    } else {
        Url::parse(&format!("http://{raw}"))?
    };
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::ValidationError(format!(
            "accrual system address must be http or https, got {other}"
        ))),
    }
}

fn decode_secret_key(encoded: &str) -> Option<Vec<u8>> {
    let encoded = encoded.trim();
    let key = fast32::base64::RFC4648
        .decode_str(encoded)
        .or_else(|_| fast32::base64::RFC4648_NOPAD.decode_str(encoded))
        .ok()?;
    (key.len() >= MIN_SECRET_KEY_LEN).then_some(key)
}

fn random_secret_key() -> Vec<u8> {
    let mut key = vec![0u8; 32];
    rand::rng().fill(key.as_mut_slice());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::{EngineSection, ServerSection};

    fn required() -> Overrides {
        Overrides {
            database_uri: Some("postgres://localhost/loyalty".into()),
            accrual_system_address: Some("http://localhost:8081".into()),
            ..Overrides::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::new(required()).build(FileConfig::default()).unwrap();
        assert_eq!(config.run_address, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.log_level, "info");
        assert!(config.migrate);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.secret_key_source, SecretKeySource::Generated);
        assert_eq!(config.secret_key.len(), 32);
    }

    #[test]
    fn test_overrides_beat_file() {
        let file = FileConfig {
            server: ServerSection {
                run_address: Some("0.0.0.0:9000".parse().unwrap()),
                log_level: Some("debug".into()),
                migrate: Some(false),
                ..ServerSection::default()
            },
            engine: EngineSection {
                workers: 2,
                ..EngineSection::default()
            },
        };
        let overrides = Overrides {
            run_address: Some("127.0.0.1:7000".parse().unwrap()),
            ..required()
        };
        let config = ConfigLoader::new(overrides).build(file).unwrap();
        assert_eq!(config.run_address.port(), 7000);
        assert_eq!(config.log_level, "debug");
        assert!(!config.migrate);
        assert_eq!(config.engine.workers, 2);
    }

    #[test]
    fn test_missing_required_values() {
        let loader = ConfigLoader::new(Overrides {
            database_uri: None,
            ..required()
        });
        assert!(matches!(
            loader.build(FileConfig::default()),
            Err(ConfigError::MissingDatabaseUri)
        ));

        let loader = ConfigLoader::new(Overrides {
            accrual_system_address: None,
            ..required()
        });
        assert!(matches!(
            loader.build(FileConfig::default()),
            Err(ConfigError::MissingAccrualAddress)
        ));
    }

    #[test]
    fn test_accrual_address_forms() {
        assert_eq!(
            parse_accrual_address("localhost:8081").unwrap().as_str(),
            "http://localhost:8081/"
        );
        assert_eq!(
            parse_accrual_address("https://accrual.example.com").unwrap().as_str(),
            "https://accrual.example.com/"
        );
        assert!(parse_accrual_address("ftp://accrual.example.com").is_err());
    }

    #[test]
    fn test_secret_key_validation() {
        let key = fast32::base64::RFC4648.encode(b"0123456789abcdef0123");
        let config = ConfigLoader::new(Overrides {
            secret_key: Some(key),
            ..required()
        })
        .build(FileConfig::default())
        .unwrap();
        assert_eq!(config.secret_key_source, SecretKeySource::Configured);
        assert_eq!(config.secret_key, b"0123456789abcdef0123");

        let short = fast32::base64::RFC4648.encode(b"short");
        let config = ConfigLoader::new(Overrides {
            secret_key: Some(short),
            ..required()
        })
        .build(FileConfig::default())
        .unwrap();
        assert_eq!(config.secret_key_source, SecretKeySource::Rejected);
        assert_eq!(config.secret_key.len(), 32);
    }

    #[test]
    fn test_invalid_engine_values() {
        let file = FileConfig {
            engine: EngineSection {
                workers: 0,
                ..EngineSection::default()
            },
            ..FileConfig::default()
        };
        assert!(matches!(
            ConfigLoader::new(required()).build(file),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
