use crate::config::ServerConfig;
use crate::handlers::{self, HandlerContext, MethodError, OnFailure};
use anyhow::{Context, Result};
use readtrack_core::{Engine, EngineConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::timeout;

static RID: AtomicU64 = AtomicU64::new(1);

fn next_rid() -> String {
    let n = RID.fetch_add(1, Ordering::Relaxed);
    format!("r-{n:06}")
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Option<Value>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MethodError>,
    id: Option<Value>,
}

impl JsonRpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Option<Value>, error: MethodError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    fn from_result(id: Option<Value>, result: Result<Value, MethodError>) -> Self {
        match result {
            Ok(v) => Self::ok(id, v),
            Err(e) => Self::error(id, e),
        }
    }
}

fn write_response<W: Write>(out: &mut W, resp: &JsonRpcResponse) -> Result<()> {
    let resp_json = serde_json::to_string(resp)?;
    writeln!(out, "{}", resp_json)?;
    out.flush()?;
    Ok(())
}

pub struct Server;

impl Server {
    /// Opens the engine and serves stdin/stdout until stdin closes.
    pub async fn run(engine_cfg: EngineConfig, cfg: ServerConfig) -> Result<()> {
        let engine = Engine::open(engine_cfg).context("failed to initialise database schema")?;
        let ctx = HandlerContext {
            engine: engine.clone(),
            cfg,
        };

        let stdin = io::stdin();
        let stdout = io::stdout();
        Self::serve(&ctx, stdin.lock(), stdout.lock()).await?;

        drop(ctx);
        engine.close().context("failed to close database")?;
        tracing::info!(event = "server_stop");
        Ok(())
    }

    /// One JSON-RPC request per line in, one response per line out.
    pub async fn serve<R: BufRead, W: Write>(
        ctx: &HandlerContext,
        reader: R,
        mut out: W,
    ) -> Result<()> {
        let cfg = &ctx.cfg;

        for line in reader.lines() {
            let line = line?;
            let rid = next_rid();

            if line.len() > cfg.max_msg_bytes {
                tracing::warn!(
                    event = "limit_exceeded",
                    rid = %rid,
                    bytes_in = line.len(),
                    max = cfg.max_msg_bytes
                );
                let resp = JsonRpcResponse::error(
                    None,
                    MethodError::new(
                        -32600,
                        format!("message bytes={} > max={}", line.len(), cfg.max_msg_bytes),
                    ),
                );
                write_response(&mut out, &resp)?;
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let req: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(event = "json_parse_error", rid = %rid, error = %e);
                    continue;
                }
            };

            let resp = match req.method.as_str() {
                "initialize" => {
                    let info = serde_json::json!({
                        "serverInfo": {
                            "name": "readtrack-server",
                            "version": env!("CARGO_PKG_VERSION"),
                        },
                        "schema": ctx.engine.schema_state(),
                    });
                    JsonRpcResponse::ok(req.id, info)
                }
                "notifications/initialized" => {
                    tracing::info!(event = "initialized", rid = %rid);
                    continue;
                }
                "rpc.methods" => JsonRpcResponse::ok(
                    req.id,
                    serde_json::json!({ "methods": handlers::list_methods() }),
                ),
                method => {
                    let params = req.params.unwrap_or_else(|| serde_json::json!({}));
                    let result = Self::call(ctx, &rid, &req.id, method, params).await;
                    JsonRpcResponse::from_result(req.id, result)
                }
            };

            write_response(&mut out, &resp)?;
        }

        Ok(())
    }

    async fn call(
        ctx: &HandlerContext,
        rid: &str,
        rpc_id: &Option<Value>,
        method: &str,
        params: Value,
    ) -> Result<Value, MethodError> {
        let start = Instant::now();
        tracing::info!(event = "method_call_start", rid = %rid, rpc_id = ?rpc_id, method = method);

        let fallback_params = params.clone();
        let fut = handlers::handle_call(ctx, method, params);

        // A timed-out write would still commit on the blocking pool, so the
        // caller must hear how it actually ended.
        let is_write = matches!(
            handlers::lookup(method),
            Some(info) if info.on_failure == OnFailure::Error
        );
        if is_write {
            let result = fut.await;
            Self::log_done(rid, method, start, &result);
            return result;
        }

        let result = match timeout(Duration::from_millis(ctx.cfg.timeout_ms), fut).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(
                    event = "method_call_timeout",
                    rid = %rid,
                    method = method,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                match handlers::lookup(method) {
                    Some(info) => handlers::unavailable(ctx, info, &fallback_params),
                    None => Err(MethodError::new(handlers::E_METHOD_NOT_FOUND, "Method not found")),
                }
            }
        };

        Self::log_done(rid, method, start, &result);
        result
    }

    fn log_done(rid: &str, method: &str, start: Instant, result: &Result<Value, MethodError>) {
        let dur = start.elapsed().as_millis() as u64;
        match result {
            Ok(_) => tracing::info!(
                event = "method_call_done",
                rid = %rid,
                method = method,
                duration_ms = dur,
                outcome = "ok"
            ),
            Err(e) => tracing::info!(
                event = "method_call_done",
                rid = %rid,
                method = method,
                duration_ms = dur,
                outcome = "error",
                code = e.code
            ),
        }
    }
}
