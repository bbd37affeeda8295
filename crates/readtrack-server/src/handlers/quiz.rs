use super::{parse_args, to_json, HandlerResult};
use readtrack_core::Engine;
use serde::Deserialize;
use serde_json::Value;

fn first_quiz() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptArgs {
    user_id: i64,
    story_id: i64,
    #[serde(default = "first_quiz")]
    quiz_number: i64,
    score: i64,
    #[serde(alias = "total")]
    total_questions: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BestArgs {
    user_id: i64,
    story_id: i64,
    #[serde(default = "first_quiz")]
    quiz_number: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultsArgs {
    user_id: i64,
    #[serde(default)]
    story_id: Option<i64>,
}

pub fn save(engine: &Engine, params: &Value) -> HandlerResult {
    let a: AttemptArgs = parse_args(params)?;
    let tier = engine.save_quiz(a.user_id, a.story_id, a.quiz_number, a.score, a.total_questions)?;
    to_json(&tier)
}

pub fn finish(engine: &Engine, params: &Value) -> HandlerResult {
    let a: AttemptArgs = parse_args(params)?;
    to_json(&engine.finish_quiz(a.user_id, a.story_id, a.quiz_number, a.score, a.total_questions)?)
}

pub fn best_score(engine: &Engine, params: &Value) -> HandlerResult {
    let a: BestArgs = parse_args(params)?;
    to_json(&engine.best_quiz_score(a.user_id, a.story_id, a.quiz_number)?)
}

pub fn results(engine: &Engine, params: &Value) -> HandlerResult {
    let a: ResultsArgs = parse_args(params)?;
    to_json(&engine.quiz_results(a.user_id, a.story_id)?)
}
