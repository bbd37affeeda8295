use super::auth::UserArgs;
use super::progress::StoryArgs;
use super::{parse_args, to_json, HandlerError, HandlerResult};
use readtrack_core::model::{BadgeCategory, BadgeTier};
use readtrack_core::Engine;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AwardArgs {
    user_id: i64,
    story_id: i64,
    #[serde(alias = "badgeType")]
    tier: String,
    #[serde(alias = "badgeCategory")]
    category: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpgradeArgs {
    user_id: i64,
    story_id: i64,
    #[serde(alias = "newBadgeType", alias = "tier")]
    new_tier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HasArgs {
    user_id: i64,
    story_id: i64,
    #[serde(alias = "badgeCategory")]
    category: String,
}

fn tier(raw: &str) -> Result<BadgeTier, HandlerError> {
    raw.parse().map_err(HandlerError::InvalidParams)
}

fn category(raw: &str) -> Result<BadgeCategory, HandlerError> {
    raw.parse().map_err(HandlerError::InvalidParams)
}

pub fn award(engine: &Engine, params: &Value) -> HandlerResult {
    let a: AwardArgs = parse_args(params)?;
    let outcome = engine.award_badge(a.user_id, a.story_id, tier(&a.tier)?, category(&a.category)?)?;

    // {"success": true, "outcome": "upgraded", "from": "silver"}
    let mut body = serde_json::json!({ "success": true });
    if let (Value::Object(dst), Value::Object(src)) = (&mut body, to_json(&outcome)?) {
        dst.extend(src);
    }
    Ok(body)
}

pub fn upgrade(engine: &Engine, params: &Value) -> HandlerResult {
    let a: UpgradeArgs = parse_args(params)?;
    let previous = engine.upgrade_badge(a.user_id, a.story_id, tier(&a.new_tier)?)?;
    Ok(serde_json::json!({ "success": true, "previous": previous }))
}

pub fn all_ordered(engine: &Engine, params: &Value) -> HandlerResult {
    let a: UserArgs = parse_args(params)?;
    to_json(&engine.ordered_badges(a.user_id)?)
}

pub fn story(engine: &Engine, params: &Value) -> HandlerResult {
    let a: StoryArgs = parse_args(params)?;
    to_json(&engine.story_badges(a.user_id, a.story_id)?)
}

pub fn has(engine: &Engine, params: &Value) -> HandlerResult {
    let a: HasArgs = parse_args(params)?;
    Ok(serde_json::json!(engine.has_badge(
        a.user_id,
        a.story_id,
        category(&a.category)?
    )?))
}

pub fn stats(engine: &Engine, params: &Value) -> HandlerResult {
    let a: UserArgs = parse_args(params)?;
    to_json(&engine.badge_stats(a.user_id)?)
}

pub fn user_stats(engine: &Engine, params: &Value) -> HandlerResult {
    let a: UserArgs = parse_args(params)?;
    to_json(&engine.user_stats(a.user_id)?)
}
