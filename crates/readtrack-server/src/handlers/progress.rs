use super::auth::UserArgs;
use super::{parse_args, to_json, HandlerResult};
use readtrack_core::Engine;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoryArgs {
    pub user_id: i64,
    pub story_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentArgs {
    user_id: i64,
    story_id: i64,
    segment_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusArgs {
    user_id: i64,
    story_id: i64,
    #[serde(default)]
    total_segments: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkArgs {
    user_id: i64,
    /// storyId -> segment count, for stories that differ from the default.
    #[serde(default)]
    totals: BTreeMap<i64, i64>,
}

fn ack() -> Value {
    serde_json::json!({ "success": true })
}

pub fn mark_viewed(engine: &Engine, params: &Value) -> HandlerResult {
    let a: SegmentArgs = parse_args(params)?;
    engine.mark_viewed(a.user_id, a.story_id, a.segment_id)?;
    Ok(ack())
}

pub fn save_last_viewed(engine: &Engine, params: &Value) -> HandlerResult {
    let a: SegmentArgs = parse_args(params)?;
    engine.save_last_viewed(a.user_id, a.story_id, a.segment_id)?;
    Ok(ack())
}

pub fn get_last_viewed(engine: &Engine, params: &Value) -> HandlerResult {
    let a: StoryArgs = parse_args(params)?;
    Ok(serde_json::json!(engine.last_viewed(a.user_id, a.story_id)?))
}

pub fn completion_status(engine: &Engine, params: &Value) -> HandlerResult {
    let a: StatusArgs = parse_args(params)?;
    to_json(&engine.completion_status(a.user_id, a.story_id, a.total_segments)?)
}

pub fn bulk_completion_status(engine: &Engine, params: &Value) -> HandlerResult {
    let a: BulkArgs = parse_args(params)?;
    to_json(&engine.bulk_completion_status(a.user_id, a.totals)?)
}

pub fn story_progress(engine: &Engine, params: &Value) -> HandlerResult {
    let a: StoryArgs = parse_args(params)?;
    to_json(&engine.story_progress(a.user_id, a.story_id)?)
}

pub fn overall(engine: &Engine, params: &Value) -> HandlerResult {
    let a: UserArgs = parse_args(params)?;
    to_json(&engine.overall_progress(a.user_id)?)
}

pub fn finish_story(engine: &Engine, params: &Value) -> HandlerResult {
    let a: StatusArgs = parse_args(params)?;
    to_json(&engine.finish_story(a.user_id, a.story_id, a.total_segments)?)
}
