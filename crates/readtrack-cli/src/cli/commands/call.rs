use super::{engine_config, exit_codes};
use crate::cli::args::CallArgs;
use anyhow::{Context, Result};
use readtrack_core::Engine;
use readtrack_server::config::ServerConfig;
use readtrack_server::handlers::{handle_call, list_methods, HandlerContext};
use serde_json::Value;

pub async fn run(args: CallArgs) -> Result<i32> {
    if args.method == "rpc.methods" {
        println!("{}", serde_json::to_string_pretty(&list_methods())?);
        return Ok(exit_codes::OK);
    }

    let params: Value = serde_json::from_str(&args.params)
        .with_context(|| format!("params is not valid JSON: {}", args.params))?;

    let cfg = engine_config(&args.db)?;
    let engine = Engine::open(cfg)?;
    let ctx = HandlerContext {
        engine,
        cfg: ServerConfig::from_env(),
    };

    let result = handle_call(&ctx, &args.method, params).await;
    ctx.engine.close()?;

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(exit_codes::OK)
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err)?);
            Ok(exit_codes::FAILED)
        }
    }
}
