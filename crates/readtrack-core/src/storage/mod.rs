pub mod badges;
pub mod legacy;
pub mod migrate;
pub mod progress;
pub mod quiz;
pub mod schema;
pub mod store;
pub mod users;

/// Timestamp in SQLite's `CURRENT_TIMESTAMP` layout (UTC) with milliseconds,
/// so rows written here sort together with rows the database defaulted.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}
