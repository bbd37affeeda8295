use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "readtrack",
    version,
    about = "Reading progress and badge database for the story app"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database and its tables
    Init(InitArgs),
    /// Rewrite a first-release database into the current layout
    Migrate(MigrateArgs),
    /// Report table counts, columns and migration state
    Doctor(DoctorArgs),
    /// Invoke one engine method and print its JSON result
    Call(CallArgs),
}

/// Where the database lives. Flag beats env beats config file.
#[derive(clap::Args, Debug, Clone)]
pub struct DbArgs {
    #[arg(long, env = "READTRACK_DB")]
    pub db: Option<PathBuf>,

    /// Optional YAML engine config
    #[arg(long, env = "READTRACK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    #[command(flatten)]
    pub db: DbArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Report what would change without touching the file
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the `<name>_backup_<ms>.db` copy
    #[arg(long)]
    pub no_backup: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Output format: text | json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CallArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Method name, e.g. progress.getCompletionStatus
    pub method: String,

    /// JSON params object
    #[arg(default_value = "{}")]
    pub params: String,
}
