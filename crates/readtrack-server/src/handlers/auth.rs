use super::{parse_args, to_json, HandlerResult};
use readtrack_core::Engine;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct CredentialArgs {
    #[serde(alias = "username")]
    name: String,
    birthdate: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserArgs {
    pub user_id: i64,
}

pub fn login(engine: &Engine, params: &Value) -> HandlerResult {
    let args: CredentialArgs = parse_args(params)?;
    Ok(engine.login(&args.name, &args.birthdate)?.to_json())
}

pub fn register(engine: &Engine, params: &Value) -> HandlerResult {
    let args: CredentialArgs = parse_args(params)?;
    Ok(engine.register(&args.name, &args.birthdate)?.to_json())
}

pub fn get_user(engine: &Engine, params: &Value) -> HandlerResult {
    let args: UserArgs = parse_args(params)?;
    to_json(&engine.user(args.user_id)?)
}
