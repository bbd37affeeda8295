use super::{engine_config, exit_codes};
use crate::cli::args::DoctorArgs;
use anyhow::Result;
use readtrack_core::storage::store::StoreStats;
use readtrack_core::Store;
use serde::Serialize;
use std::collections::BTreeMap;

const TABLES: &[&str] = &["users", "progress", "quiz_results", "user_badges"];

#[derive(Debug, Serialize)]
struct DoctorReport {
    db_path: String,
    exists: bool,
    stats: StoreStats,
    columns: BTreeMap<String, Vec<String>>,
    legacy_quiz_results: bool,
    legacy_user_badges: bool,
    notes: Vec<String>,
}

pub fn run(args: DoctorArgs) -> Result<i32> {
    let cfg = engine_config(&args.db)?;
    let db_path = cfg.db_path;
    let exists = db_path.exists();

    let mut notes = Vec::new();
    let mut report = DoctorReport {
        db_path: db_path.display().to_string(),
        exists,
        stats: StoreStats::default(),
        columns: BTreeMap::new(),
        legacy_quiz_results: false,
        legacy_user_badges: false,
        notes: Vec::new(),
    };

    if exists {
        let store = Store::open(&db_path)?;
        report.stats = store.stats_best_effort()?;
        for &table in TABLES {
            let mut cols: Vec<String> = store.table_columns(table)?.into_iter().collect();
            cols.sort();
            if cols.is_empty() {
                notes.push(format!("table {} is missing; `readtrack init` creates it", table));
            }
            report.columns.insert(table.to_string(), cols);
        }
        let shape = store.legacy_shape()?;
        report.legacy_quiz_results = shape.quiz_results;
        report.legacy_user_badges = shape.user_badges;
        if shape.any() {
            notes.push("legacy layout detected; run `readtrack migrate`".to_string());
        }
        store.close()?;
    } else {
        notes.push("database file does not exist yet".to_string());
    }
    report.notes = notes;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text(&report),
    }

    let healthy = report.exists && report.notes.is_empty();
    Ok(if healthy {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn print_text(report: &DoctorReport) {
    let show = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".into());

    println!("Database: {}", report.db_path);
    if report.exists {
        println!("  users:        {}", show(report.stats.users));
        println!("  progress:     {}", show(report.stats.progress_rows));
        println!("  quiz_results: {}", show(report.stats.quiz_results));
        println!("  user_badges:  {}", show(report.stats.badges));
        for (table, cols) in &report.columns {
            println!("  {} columns: {}", table, cols.join(", "));
        }
    }
    if report.notes.is_empty() {
        println!("OK");
    }
    for note in &report.notes {
        println!("! {}", note);
    }
}
