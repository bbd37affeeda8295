use crate::cli::args::{Cli, Command, DbArgs};
use anyhow::{Context, Result};
use readtrack_core::config::load_config;
use readtrack_core::EngineConfig;

pub mod call;
pub mod doctor;
pub mod init;
pub mod migrate;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.cmd {
        Command::Init(args) => init::run(args),
        Command::Migrate(args) => migrate::run(args),
        Command::Doctor(args) => doctor::run(args),
        Command::Call(args) => call::run(args).await,
    }
}

/// Config file, then `READTRACK_*` env, then `--db`.
pub(crate) fn engine_config(db: &DbArgs) -> Result<EngineConfig> {
    let mut cfg = match &db.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    cfg.apply_env().context("invalid READTRACK_* environment")?;
    if let Some(path) = &db.db {
        cfg.db_path = path.clone();
    }
    Ok(cfg)
}
