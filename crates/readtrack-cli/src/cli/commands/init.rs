use super::{engine_config, exit_codes};
use crate::cli::args::InitArgs;
use anyhow::{Context, Result};
use readtrack_core::{Engine, SchemaState};

pub fn run(args: InitArgs) -> Result<i32> {
    let cfg = engine_config(&args.db)?;
    let db_path = cfg.db_path.clone();

    let engine = Engine::open(cfg)
        .with_context(|| format!("failed to initialise {}", db_path.display()))?;
    let state = engine.schema_state();
    engine.close()?;

    println!("Database ready: {}", db_path.display());
    if state == SchemaState::Legacy {
        eprintln!("warning: legacy tables could not be migrated; run `readtrack migrate` for details");
        return Ok(exit_codes::FAILED);
    }
    Ok(exit_codes::OK)
}
