pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod scoring;
pub mod storage;

pub use config::EngineConfig;
pub use engine::{Engine, SchemaState};
pub use errors::{ConfigError, MigrationError, SchemaError, StoreError, StoreResult};
pub use model::{BadgeCategory, BadgeTier};
pub use storage::store::Store;
