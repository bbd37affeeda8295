//! In-place rewrite of the first-release `quiz_results` / `user_badges` shape.
//!
//! Both tables are rebuilt inside one transaction. Either every row lands in
//! the new shape or the database is left exactly as it was.

use crate::errors::MigrationError;
use crate::model::{BadgeCategory, BadgeTier};
use crate::scoring::derive_badge_tier;
use crate::storage::legacy::parse_legacy_badge_id;
use crate::storage::schema;
use crate::storage::store::{get_columns, relax_foreign_keys, Store};
use rusqlite::{params, Connection, Transaction};
use std::collections::HashSet;
use std::fmt;

const QUIZ_TARGET_COLUMNS: &[&str] = &["quiz_number", "badge_type"];
const BADGE_TARGET_COLUMNS: &[&str] = &["story_id", "badge_category"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    QuizResults,
    UserBadges,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStep::QuizResults => f.write_str("quiz_results"),
            MigrationStep::UserBadges => f.write_str("user_badges"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationReport {
    UpToDate,
    Migrated { quiz_rows: usize, badge_rows: usize },
}

/// Which of the two tables still carry the legacy shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LegacyShape {
    pub quiz_results: bool,
    pub user_badges: bool,
}

impl LegacyShape {
    pub fn any(&self) -> bool {
        self.quiz_results || self.user_badges
    }
}

fn missing_any(cols: &HashSet<String>, targets: &[&str]) -> bool {
    // A table that does not exist yet reports no columns; nothing to migrate.
    !cols.is_empty() && targets.iter().any(|c| !cols.contains(*c))
}

pub fn detect(conn: &Connection) -> Result<LegacyShape, MigrationError> {
    let quiz_cols = get_columns(conn, "quiz_results")?;
    let badge_cols = get_columns(conn, "user_badges")?;
    Ok(LegacyShape {
        quiz_results: missing_any(&quiz_cols, QUIZ_TARGET_COLUMNS),
        user_badges: missing_any(&badge_cols, BADGE_TARGET_COLUMNS),
    })
}

pub fn needs_migration(conn: &Connection) -> Result<bool, MigrationError> {
    Ok(detect(conn)?.any())
}

pub fn run(conn: &mut Connection) -> Result<MigrationReport, MigrationError> {
    run_with_checkpoint(conn, |_| Ok(()))
}

/// Runs the rewrite, calling `checkpoint` after each table swap.
/// An error from the checkpoint rolls back everything done so far.
pub fn run_with_checkpoint<F>(
    conn: &mut Connection,
    mut checkpoint: F,
) -> Result<MigrationReport, MigrationError>
where
    F: FnMut(MigrationStep) -> Result<(), MigrationError>,
{
    let shape = detect(conn)?;
    if !shape.any() {
        tracing::debug!(event = "migration_up_to_date");
        return Ok(MigrationReport::UpToDate);
    }

    tracing::info!(
        event = "migration_start",
        quiz_results = shape.quiz_results,
        user_badges = shape.user_badges
    );

    // Legacy rows may point at users that no longer exist.
    relax_foreign_keys(conn)?;

    // Dropping the transaction without commit rolls back.
    let tx = conn.transaction()?;

    let mut quiz_rows = 0;
    if shape.quiz_results {
        quiz_rows = rewrite_quiz_results(&tx)?;
        checkpoint(MigrationStep::QuizResults)?;
        tracing::info!(event = "migration_step_done", step = %MigrationStep::QuizResults, rows = quiz_rows);
    }

    let mut badge_rows = 0;
    if shape.user_badges {
        badge_rows = rewrite_user_badges(&tx)?;
        checkpoint(MigrationStep::UserBadges)?;
        tracing::info!(event = "migration_step_done", step = %MigrationStep::UserBadges, rows = badge_rows);
    }

    tx.commit()?;
    tracing::info!(event = "migration_committed", quiz_rows, badge_rows);

    Ok(MigrationReport::Migrated {
        quiz_rows,
        badge_rows,
    })
}

/// Selects `col` when the legacy table has it, NULL otherwise.
fn column_or_null(cols: &HashSet<String>, col: &str) -> String {
    if cols.contains(col) {
        col.to_string()
    } else {
        format!("NULL AS {}", col)
    }
}

struct LegacyQuizRow {
    id: i64,
    user_id: Option<i64>,
    story_id: Option<i64>,
    quiz_number: Option<i64>,
    score: Option<i64>,
    total_questions: Option<i64>,
    completed_at: Option<String>,
}

fn rewrite_quiz_results(tx: &Transaction<'_>) -> Result<usize, MigrationError> {
    let cols = get_columns(tx, "quiz_results")?;
    let select = format!(
        "SELECT id, user_id, story_id, {}, score, total_questions, {} FROM quiz_results ORDER BY id",
        column_or_null(&cols, "quiz_number"),
        column_or_null(&cols, "completed_at"),
    );

    let rows: Vec<LegacyQuizRow> = {
        let mut stmt = tx.prepare(&select)?;
        let mapped = stmt.query_map([], |r| {
            Ok(LegacyQuizRow {
                id: r.get(0)?,
                user_id: r.get(1)?,
                story_id: r.get(2)?,
                quiz_number: r.get(3)?,
                score: r.get(4)?,
                total_questions: r.get(5)?,
                completed_at: r.get(6)?,
            })
        })?;
        mapped.collect::<rusqlite::Result<_>>()?
    };

    tx.execute_batch(schema::QUIZ_RESULTS_NEW_DDL)?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO quiz_results_new
               (id, user_id, story_id, quiz_number, score, total_questions, badge_type, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, COALESCE(?8, CURRENT_TIMESTAMP))",
        )?;
        for row in &rows {
            let quiz_number = row.quiz_number.filter(|n| *n != 0).unwrap_or(1);
            let tier = derive_badge_tier(
                row.score.unwrap_or(0),
                row.total_questions.unwrap_or(0),
            );
            insert.execute(params![
                row.id,
                row.user_id,
                row.story_id,
                quiz_number,
                row.score,
                row.total_questions,
                tier.as_str(),
                row.completed_at,
            ])?;
        }
    }
    tx.execute_batch(
        "DROP TABLE quiz_results;
         ALTER TABLE quiz_results_new RENAME TO quiz_results;",
    )?;
    Ok(rows.len())
}

struct LegacyBadgeRow {
    id: i64,
    user_id: Option<i64>,
    badge_id: Option<String>,
    story_id: Option<i64>,
    badge_type: Option<String>,
    badge_category: Option<String>,
    earned_at: Option<String>,
}

fn rewrite_user_badges(tx: &Transaction<'_>) -> Result<usize, MigrationError> {
    let cols = get_columns(tx, "user_badges")?;
    let select = format!(
        "SELECT id, user_id, {}, {}, {}, {}, {} FROM user_badges ORDER BY id",
        column_or_null(&cols, "badge_id"),
        column_or_null(&cols, "story_id"),
        column_or_null(&cols, "badge_type"),
        column_or_null(&cols, "badge_category"),
        column_or_null(&cols, "earned_at"),
    );

    let rows: Vec<LegacyBadgeRow> = {
        let mut stmt = tx.prepare(&select)?;
        let mapped = stmt.query_map([], |r| {
            Ok(LegacyBadgeRow {
                id: r.get(0)?,
                user_id: r.get(1)?,
                badge_id: r.get(2)?,
                story_id: r.get(3)?,
                badge_type: r.get(4)?,
                badge_category: r.get(5)?,
                earned_at: r.get(6)?,
            })
        })?;
        mapped.collect::<rusqlite::Result<_>>()?
    };

    tx.execute_batch(schema::USER_BADGES_NEW_DDL)?;
    let mut kept = 0;
    {
        // Rows are visited oldest id first, so collisions keep the oldest badge.
        let mut insert = tx.prepare(
            "INSERT OR IGNORE INTO user_badges_new
               (id, user_id, story_id, badge_type, badge_category, earned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, CURRENT_TIMESTAMP))",
        )?;
        for row in &rows {
            let parsed = parse_legacy_badge_id(row.badge_id.as_deref().unwrap_or(""));
            let story_id = row.story_id.unwrap_or(parsed.story_id);
            let tier = BadgeTier::parse_stored(row.badge_type.as_deref()).unwrap_or(parsed.tier);
            let category = row
                .badge_category
                .as_deref()
                .and_then(|c| c.parse::<BadgeCategory>().ok())
                .unwrap_or(parsed.category);
            kept += insert.execute(params![
                row.id,
                row.user_id,
                story_id,
                tier.as_str(),
                category.as_str(),
                row.earned_at,
            ])?;
        }
    }
    if kept < rows.len() {
        tracing::warn!(
            event = "migration_badges_collapsed",
            dropped = rows.len() - kept
        );
    }
    tx.execute_batch(
        "DROP TABLE user_badges;
         ALTER TABLE user_badges_new RENAME TO user_badges;",
    )?;
    Ok(kept)
}

impl Store {
    pub fn legacy_shape(&self) -> Result<LegacyShape, MigrationError> {
        let conn = self.lock()?;
        detect(&conn)
    }

    pub fn migrate_legacy(&self) -> Result<MigrationReport, MigrationError> {
        self.migrate_legacy_with(|_| Ok(()))
    }

    pub fn migrate_legacy_with<F>(&self, checkpoint: F) -> Result<MigrationReport, MigrationError>
    where
        F: FnMut(MigrationStep) -> Result<(), MigrationError>,
    {
        let mut conn = self.lock()?;
        let result = run_with_checkpoint(&mut conn, checkpoint);
        if let Err(e) = &result {
            tracing::error!(event = "migration_rolled_back", error = %e);
        }
        result
    }
}
