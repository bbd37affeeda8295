use readtrack_core::errors::FRIENDLY_RETRY_MESSAGE;
use readtrack_core::model::{BadgeStats, CompletionStatus, OverallProgress, UserStats};
use readtrack_core::{Engine, StoreError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ServerConfig;

pub mod auth;
pub mod badge;
pub mod progress;
pub mod quiz;

pub const E_APP: i32 = -32000;
pub const E_METHOD_NOT_FOUND: i32 = -32601;
pub const E_INVALID_PARAMS: i32 = -32602;

pub struct HandlerContext {
    pub engine: Engine,
    pub cfg: ServerConfig,
}

/// Error surfaced to the caller. `message` is always safe to show a child.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MethodError {
    pub code: i32,
    pub message: String,
}

impl MethodError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn retry() -> Self {
        Self::new(E_APP, FRIENDLY_RETRY_MESSAGE)
    }
}

/// What a handler can fail with before the failure policy is applied.
#[derive(Debug)]
pub enum HandlerError {
    InvalidParams(String),
    Store(StoreError),
    Internal(String),
}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        HandlerError::Store(e)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::InvalidParams(e.to_string())
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

pub(crate) fn parse_args<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerError> {
    Ok(serde_json::from_value(params.clone())?)
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| HandlerError::Internal(e.to_string()))
}

/// How a store failure is reported for a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Answer with a safe empty value.
    Default,
    /// Answer with a JSON-RPC error carrying a retry message.
    Error,
}

pub struct MethodInfo {
    pub name: &'static str,
    pub on_failure: OnFailure,
    pub description: &'static str,
}

const fn method(name: &'static str, on_failure: OnFailure, description: &'static str) -> MethodInfo {
    MethodInfo {
        name,
        on_failure,
        description,
    }
}

pub const METHODS: &[MethodInfo] = &[
    method("auth.login", OnFailure::Default, "Log in with name and birthdate."),
    method("auth.register", OnFailure::Default, "Create an account."),
    method("user.get", OnFailure::Default, "Fetch a user by id."),
    method("progress.markViewed", OnFailure::Error, "Mark a segment as read."),
    method("progress.saveLastViewed", OnFailure::Error, "Save the resume position."),
    method("progress.getLastViewed", OnFailure::Default, "Resume position for a story."),
    method("progress.getCompletionStatus", OnFailure::Default, "Completion status for one story."),
    method("progress.getBulkCompletionStatus", OnFailure::Default, "Completion status for every story."),
    method("progress.getStory", OnFailure::Default, "Progress rows for one story."),
    method("progress.getOverall", OnFailure::Default, "Completed segments across the catalog."),
    method("story.finish", OnFailure::Error, "Complete every segment and award the story badge."),
    method("quiz.save", OnFailure::Error, "Record a quiz attempt."),
    method("quiz.finish", OnFailure::Error, "Record a quiz attempt and apply badge rules."),
    method("quiz.getBestScore", OnFailure::Default, "Best attempt for a quiz."),
    method("quiz.getResults", OnFailure::Default, "Quiz attempt history."),
    method("badge.award", OnFailure::Error, "Award a badge; tiers never go down."),
    method("badge.upgrade", OnFailure::Error, "Overwrite the story-completion badge."),
    method("badge.getAllOrdered", OnFailure::Default, "All badges, oldest first."),
    method("badge.getStory", OnFailure::Default, "Badges for one story."),
    method("badge.has", OnFailure::Default, "Whether a badge exists."),
    method("badge.getStats", OnFailure::Default, "Badge counts per tier."),
    method("stats.get", OnFailure::Default, "Summary statistics for a user."),
];

pub fn lookup(name: &str) -> Option<&'static MethodInfo> {
    METHODS.iter().find(|m| m.name == name)
}

pub fn list_methods() -> Vec<Value> {
    METHODS
        .iter()
        .map(|m| {
            serde_json::json!({
                "name": m.name,
                "description": m.description,
                "mutates": m.on_failure == OnFailure::Error,
            })
        })
        .collect()
}

/// Safe answer for a read method whose store call failed.
pub fn fallback_for(ctx: &HandlerContext, name: &str, params: &Value) -> Value {
    let config = ctx.engine.config();
    match name {
        "auth.login" | "auth.register" => serde_json::json!({
            "success": false,
            "message": FRIENDLY_RETRY_MESSAGE,
        }),
        "progress.getLastViewed" => serde_json::json!(0),
        "progress.getCompletionStatus" => {
            let total = params
                .get("totalSegments")
                .and_then(Value::as_i64)
                .unwrap_or(config.segments_per_story);
            serde_json::to_value(CompletionStatus::empty(total)).unwrap_or(Value::Null)
        }
        "progress.getBulkCompletionStatus" => serde_json::json!({}),
        "progress.getOverall" => serde_json::to_value(OverallProgress {
            completed: 0,
            total: config.catalog_segments,
            percentage: 0,
        })
        .unwrap_or(Value::Null),
        "progress.getStory" | "quiz.getResults" | "badge.getAllOrdered" | "badge.getStory" => {
            serde_json::json!([])
        }
        "badge.has" => serde_json::json!(false),
        "badge.getStats" => serde_json::to_value(BadgeStats::default()).unwrap_or(Value::Null),
        "stats.get" => serde_json::to_value(UserStats {
            progress: OverallProgress {
                completed: 0,
                total: config.catalog_segments,
                percentage: 0,
            },
            total_badges: 0,
            total_quizzes: 0,
            average_quiz_score: 0,
        })
        .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Answer used when a call could not complete (store failure or timeout).
pub fn unavailable(ctx: &HandlerContext, info: &MethodInfo, params: &Value) -> Result<Value, MethodError> {
    match info.on_failure {
        OnFailure::Default => Ok(fallback_for(ctx, info.name, params)),
        OnFailure::Error => Err(MethodError::retry()),
    }
}

fn dispatch(engine: &Engine, name: &str, params: &Value) -> HandlerResult {
    match name {
        "auth.login" => auth::login(engine, params),
        "auth.register" => auth::register(engine, params),
        "user.get" => auth::get_user(engine, params),
        "progress.markViewed" => progress::mark_viewed(engine, params),
        "progress.saveLastViewed" => progress::save_last_viewed(engine, params),
        "progress.getLastViewed" => progress::get_last_viewed(engine, params),
        "progress.getCompletionStatus" => progress::completion_status(engine, params),
        "progress.getBulkCompletionStatus" => progress::bulk_completion_status(engine, params),
        "progress.getStory" => progress::story_progress(engine, params),
        "progress.getOverall" => progress::overall(engine, params),
        "story.finish" => progress::finish_story(engine, params),
        "quiz.save" => quiz::save(engine, params),
        "quiz.finish" => quiz::finish(engine, params),
        "quiz.getBestScore" => quiz::best_score(engine, params),
        "quiz.getResults" => quiz::results(engine, params),
        "badge.award" => badge::award(engine, params),
        "badge.upgrade" => badge::upgrade(engine, params),
        "badge.getAllOrdered" => badge::all_ordered(engine, params),
        "badge.getStory" => badge::story(engine, params),
        "badge.has" => badge::has(engine, params),
        "badge.getStats" => badge::stats(engine, params),
        "stats.get" => badge::user_stats(engine, params),
        _ => Err(HandlerError::Internal(format!("no handler for {}", name))),
    }
}

/// Runs one method and applies the failure policy. Raw store text only reaches the log.
pub async fn handle_call(
    ctx: &HandlerContext,
    name: &str,
    params: Value,
) -> Result<Value, MethodError> {
    let Some(info) = lookup(name) else {
        return Err(MethodError::new(
            E_METHOD_NOT_FOUND,
            format!("Method not found: {}", name),
        ));
    };

    let engine = ctx.engine.clone();
    let call_params = params.clone();
    let joined =
        tokio::task::spawn_blocking(move || dispatch(&engine, info.name, &call_params)).await;
    let outcome = match joined {
        Ok(res) => res,
        Err(e) => Err(HandlerError::Internal(e.to_string())),
    };

    match outcome {
        Ok(v) => Ok(v),
        Err(HandlerError::InvalidParams(msg)) => {
            tracing::debug!(event = "method_invalid_params", method = name, error = %msg);
            Err(MethodError::new(E_INVALID_PARAMS, format!("Invalid params: {}", msg)))
        }
        Err(HandlerError::Store(e @ StoreError::InvalidArgument(_))) => {
            tracing::warn!(event = "method_invalid_argument", method = name, error = %e);
            match info.on_failure {
                OnFailure::Default => Ok(fallback_for(ctx, name, &params)),
                OnFailure::Error => Err(MethodError::new(E_INVALID_PARAMS, e.friendly_message())),
            }
        }
        Err(HandlerError::Store(e)) => {
            tracing::warn!(event = "method_store_error", method = name, error = %e);
            unavailable(ctx, info, &params)
        }
        Err(HandlerError::Internal(msg)) => {
            tracing::error!(event = "method_internal_error", method = name, error = %msg);
            unavailable(ctx, info, &params)
        }
    }
}
