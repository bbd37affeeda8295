use anyhow::{Context, Result};
use clap::Parser;
use readtrack_core::config::load_config;
use readtrack_core::EngineConfig;
use readtrack_server::config;
use readtrack_server::server::Server;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database file; overrides the config file and READTRACK_DB.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Optional YAML engine config.
    #[arg(long, env = "READTRACK_CONFIG")]
    config: Option<PathBuf>,
}

use tracing_subscriber::{fmt, EnvFilter};

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the protocol; logs go to stderr.
    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .init();
}

fn engine_config(args: &Args) -> Result<EngineConfig> {
    let mut cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    cfg.apply_env().context("invalid READTRACK_* environment")?;
    if let Some(db) = &args.db {
        cfg.db_path = db.clone();
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::ServerConfig::from_env();

    init_logging(&cfg.log_level);

    let engine_cfg = engine_config(&args)?;
    tracing::info!(
        event = "server_start",
        db = ?engine_cfg.db_path,
        config = ?cfg
    );

    Server::run(engine_cfg, cfg).await
}
