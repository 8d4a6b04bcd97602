//! fieldscan recorder daemon: load the fleet, reconcile the table, poll
//! until interrupted.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fieldscan::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "fieldscan", version, about = "Modbus fleet recorder")]
struct Args {
    /// Fleet description file.
    #[arg(long, env = "FIELDSCAN_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    /// Override the config file's log level (Python-logging numbering).
    #[arg(long)]
    log_level: Option<u8>,

    #[arg(long, env = "POSTGRES_HOST")]
    db_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    db_port: u16,

    #[arg(long, env = "POSTGRES_DB")]
    db_name: String,

    #[arg(long, env = "POSTGRES_USER")]
    db_user: String,

    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    db_password: String,
}

fn init_tracing(level: u8) {
    let default = match level {
        0..=10 => "debug",
        11..=20 => "info",
        21..=30 => "warn",
        _ => "error",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fieldscan={default}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    init_tracing(args.log_level.unwrap_or(config.log_level));

    let catalog = Catalog::from_config(&config)?;
    info!(
        devices = config.active_devices().count(),
        points = catalog.len(),
        table = %config.table,
        "fleet loaded"
    );

    let options = PgConnectOptions::new()
        .host(&args.db_host)
        .port(args.db_port)
        .database(&args.db_name)
        .username(&args.db_user)
        .password(&args.db_password);
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("connecting to the database")?;

    reconcile(&pool, &config.table, &catalog).await?;

    let writer = PgRowWriter::new(pool, &config.table, &catalog);
    let mut engine = Engine::new(&config, ModbusTransport, writer);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received, draining");
        let _ = stop_tx.send(true);
    });

    engine.run(stop_rx).await;
    Ok(())
}
