use super::{engine_config, exit_codes};
use crate::cli::args::MigrateArgs;
use anyhow::{Context, Result};
use readtrack_core::storage::migrate::MigrationReport;
use readtrack_core::Store;
use std::fs;
use std::path::{Path, PathBuf};

/// `<dir>/<stem>_backup_<unix-ms>.db`
fn backup_path(db_path: &Path) -> PathBuf {
    let stem = db_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "readtrack".to_string());
    let name = format!("{}_backup_{}.db", stem, chrono::Utc::now().timestamp_millis());
    db_path.with_file_name(name)
}

pub fn run(args: MigrateArgs) -> Result<i32> {
    let cfg = engine_config(&args.db)?;
    let db_path = cfg.db_path;
    println!("Migrating database: {}", db_path.display());

    if !db_path.exists() {
        anyhow::bail!("database not found: {}", db_path.display());
    }

    let store = Store::open(&db_path)?;
    let shape = store.legacy_shape()?;
    if !shape.any() {
        println!("Database is already up to date.");
        return Ok(exit_codes::OK);
    }

    if args.dry_run {
        println!("\n--- Pending rewrite (dry run) ---");
        if shape.quiz_results {
            println!(
                "quiz_results: {} rows (adds quiz_number, badge_type)",
                store.count_rows("quiz_results")?
            );
        }
        if shape.user_badges {
            println!(
                "user_badges: {} rows (adds story_id, badge_type, badge_category)",
                store.count_rows("user_badges")?
            );
        }
        return Ok(exit_codes::OK);
    }

    if !args.no_backup {
        let backup = backup_path(&db_path);
        fs::copy(&db_path, &backup)
            .with_context(|| format!("failed to write backup: {}", backup.display()))?;
        tracing::info!(event = "migration_backup", path = %backup.display());
        println!("Backup written: {}", backup.display());
    }

    // Same order as engine startup: missing tables first, then the rewrite.
    // Rows whose user is absent from the fresh `users` table still migrate.
    store.ensure_schema()?;
    let result = store.migrate_legacy_with(|step| {
        println!("  rewrote {}", step);
        Ok(())
    });
    store.close()?;

    match result {
        Ok(MigrationReport::Migrated {
            quiz_rows,
            badge_rows,
        }) => {
            println!(
                "Migrated {} quiz results and {} badges.",
                quiz_rows, badge_rows
            );
            Ok(exit_codes::OK)
        }
        Ok(MigrationReport::UpToDate) => {
            println!("Database is already up to date.");
            Ok(exit_codes::OK)
        }
        Err(e) => {
            eprintln!("Migration failed; database left unchanged: {}", e);
            Ok(exit_codes::FAILED)
        }
    }
}
