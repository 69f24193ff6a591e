use anyhow::{Context, Result};
use dotenv::dotenv;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use btc_etl::db;
use btc_etl::processor::RecordProcessor;
use btc_etl::settings::Settings;
use btc_etl::store::ChainStore;

/// Console logging on stderr honours RUST_LOG (default `info`); when a log
/// file is configured it additionally captures everything at DEBUG, the
/// per-address and per-edge lines included.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_filter(console_filter);
    let registry = tracing_subscriber::registry().with(console_layer);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file))
                        .with_filter(LevelFilter::DEBUG),
                )
                .init();
        }
        None => registry.init(),
    }

    Ok(())
}

fn run(settings: &Settings) -> Result<()> {
    let db_pool = db::create_connection_pool(&settings.database_url)
        .context("Failed to create database connection pool")?;

    let mut conn = db_pool
        .get()
        .context("Failed to get database connection for migrations")?;
    db::run_migrations(&mut conn).context("Failed to run database migrations")?;

    let mut store = db::PgStore::from_pool(&db_pool)?;
    match store.last_block_number()? {
        Some(number) => info!("Resuming ingestion; highest block already stored is {}", number),
        None => info!("No blocks stored yet; starting from an empty database"),
    }

    let mut processor = RecordProcessor::new(store);
    let stdin = io::stdin();
    processor.run(stdin.lock())?;

    let stats = processor.stats();
    info!(
        "Input stream exhausted: {} blocks, {} transactions, {} inputs, {} outputs, {} new addresses, {} address interactions, {} lines skipped",
        stats.blocks,
        stats.transactions,
        stats.inputs,
        stats.outputs,
        stats.addresses_created,
        stats.interactions,
        stats.skipped_lines
    );

    Ok(())
}

fn main() {
    dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(settings.log_file.as_deref()) {
        eprintln!("Failed to initialise logging: {:#}", e);
        std::process::exit(1);
    }

    info!("Starting Bitcoin block and transaction ingestion");
    if let Err(e) = run(&settings) {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
    info!("Application has finished and is shutting down.");
}
