//! Loyalty Points Server
//!
//! Accepts order numbers from users, reconciles them against the external
//! accrual service and lets users spend the points they earned.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::{Parser, ValueEnum};
use config::{ConfigLoader, MIN_SECRET_KEY_LEN, Overrides, SecretKeySource};
use loyalty_core::ledger::{Ledger, PgLedger};
use loyalty_core::oracle::{AccrualClient, AccrualOracle};
use loyalty_core::processors::ReconciliationEngine;
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Loyalty points ledger with accrual reconciliation
#[derive(Parser, Debug)]
#[command(name = "loyalty-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on (e.g., 0.0.0.0:8080)
    #[arg(short = 'a', long, env = "RUN_ADDRESS")]
    run_address: Option<SocketAddr>,

    /// PostgreSQL connection string
    #[arg(short = 'd', long, env = "DATABASE_URI")]
    database_uri: Option<String>,

    /// Accrual service address, `host:port` or a full URL
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS")]
    accrual_system_address: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(short = 'l', long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Base64 encoded session signing key
    #[arg(short = 'k', long, env = "SECRET_KEY")]
    secret_key: Option<String>,

    /// Path to an optional TOML configuration file
    #[arg(long, env = "LOYALTY_CONFIG")]
    config: Option<PathBuf>,

    /// Run database migrations on startup
    #[arg(long, env = "LOYALTY_MIGRATE")]
    migrate: Option<bool>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl From<&Args> for Overrides {
    fn from(args: &Args) -> Self {
        Overrides {
            config: args.config.clone(),
            run_address: args.run_address,
            database_uri: args.database_uri.clone(),
            accrual_system_address: args.accrual_system_address.clone(),
            log_level: args.log_level.clone(),
            secret_key: args.secret_key.clone(),
            migrate: args.migrate,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // The log level lives in the configuration, so load it first
    let config = ConfigLoader::new(Overrides::from(&args)).load()?;
    init_tracing(&config.log_level, args.log_format);

    tracing::info!("Starting loyalty-server v{}", env!("CARGO_PKG_VERSION"));
    match config.secret_key_source {
        SecretKeySource::Configured => {}
        SecretKeySource::Generated => {
            tracing::warn!("No secret key configured, sessions will not survive a restart");
        }
        SecretKeySource::Rejected => {
            tracing::warn!(
                "Configured secret key is not valid base64 of at least {} bytes, using a random key",
                MIN_SECRET_KEY_LEN
            );
        }
    }

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_uri)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if config.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let ledger: Arc<dyn Ledger> = Arc::new(PgLedger::new(db_pool.clone()));
    let http_client = reqwest::Client::builder()
        .timeout(config.engine.oracle_timeout)
        .build()?;
    let oracle: Arc<dyn AccrualOracle> = Arc::new(AccrualClient::with_client(
        &config.accrual_system_address,
        http_client,
    ));
    tracing::info!(
        accrual = %config.accrual_system_address,
        workers = config.engine.workers,
        "Starting reconciliation engine"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine = ReconciliationEngine::spawn(ledger.clone(), oracle, config.engine, shutdown_rx);

    let router = build_router(AppState::new(ledger, &config.secret_key));

    tracing::info!("Starting HTTP server on {}", config.run_address);
    let result = run_server(router, config.run_address).await;

    // Stop the engine before the pool goes away
    let _ = shutdown_tx.send(true);
    let stats = engine.join().await;
    tracing::info!(
        applied = stats.applied,
        overloads = stats.overloads,
        oracle_failures = stats.oracle_failures,
        ledger_failures = stats.ledger_failures,
        "Reconciliation engine stopped"
    );

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},sqlx=warn")));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
