//! Verity Indexer
//!
//! Mirrors `verity_vest` module events from the Aptos ledger into Postgres.

mod config;
mod shutdown;

use clap::{Parser, ValueEnum};
use config::{ConfigLoader, Overrides, get_database_url};
use shutdown::shutdown_signal;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use verity_core::events::EventKind;
use verity_core::framework::DatabaseProcessor;
use verity_core::ledger::aptos::{AptosIndexerClient, Network};
use verity_core::processors::{IndexerOrchestrator, StreamPoller, StreamSettings};

/// Verity Indexer - ledger event mirror for the verity_vest module
#[derive(Parser, Debug)]
#[command(name = "verity-indexer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address the verity_vest module is published under
    #[arg(long, env = "MODULE_ADDRESS")]
    module_address: Option<String>,

    /// Ledger network to index
    #[arg(long, env = "APTOS_NETWORK")]
    network: Option<Network>,

    /// Poll interval per stream, in milliseconds
    #[arg(long, env = "INDEXER_POLL_MS")]
    poll_interval_ms: Option<u64>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_format);

    tracing::info!("Starting verity-indexer v{}", env!("CARGO_PKG_VERSION"));

    // Frontend deployments only export the VITE_ prefixed name.
    let module_address = args
        .module_address
        .or_else(|| std::env::var("VITE_MODULE_ADDRESS").ok());

    let config_loader = ConfigLoader::new(
        args.config.as_deref(),
        Overrides {
            module_address,
            network: args.network,
            poll_interval_ms: args.poll_interval_ms,
        },
    );
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!(
        module_address = %config.ledger.module_address,
        network = %config.ledger.network,
        indexer_url = %config.ledger.indexer_url,
        poll_interval_ms = config.schedule.interval.as_millis() as u64,
        "Configuration loaded"
    );

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
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

    let ledger = Arc::new(AptosIndexerClient::new(
        config.ledger.indexer_url.clone(),
        config.ledger.fetch_timeout,
    )?);
    let database = Arc::new(DatabaseProcessor::new(db_pool.clone()));

    let orchestrator = EventKind::ALL
        .into_iter()
        .fold(IndexerOrchestrator::new(config.schedule), |orchestrator, kind| {
            let settings = StreamSettings {
                kind,
                account: config.ledger.module_address.clone(),
                batch_size: config.ledger.batch_size,
                fetch_timeout: config.ledger.fetch_timeout,
            };
            orchestrator.with_stream(StreamPoller::new(
                settings,
                ledger.clone(),
                database.clone(),
                database.clone(),
            ))
        });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let indexer = tokio::spawn(orchestrator.run(shutdown_rx));

    let signal_result = shutdown_signal().await;
    if let Err(e) = &signal_result {
        tracing::error!("Failed to install signal handlers: {}", e);
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = indexer.await {
        tracing::error!("Indexer task failed: {}", e);
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Indexer shutdown complete");

    signal_result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
