use readtrack_core::model::{AwardOutcome, BadgeCategory, BadgeTier, RegisterOutcome};
use readtrack_core::storage::store::Store;
use tempfile::tempdir;

#[test]
fn test_storage_smoke_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("nested").join("readtrack.db");

    // 1. Open store; parent directory is created on demand
    let store = Store::open(&db_path)?;
    store.ensure_schema()?;

    // 2. Write one of everything
    let RegisterOutcome::Success { user_id } = store.register("Ava", "2017-05-04")? else {
        anyhow::bail!("registration failed");
    };
    store.mark_segment_viewed(user_id, 1, 1)?;
    store.save_last_viewed(user_id, 1, 2)?;
    store.record_attempt(user_id, 1, 1, 4, 5)?;
    assert_eq!(
        store.award(user_id, 1, BadgeTier::Silver, BadgeCategory::Quiz1)?,
        AwardOutcome::Inserted
    );
    store.close()?;

    // 3. Verify via a raw connection
    let conn = rusqlite::Connection::open(&db_path)?;
    let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    assert_eq!(users, 1);

    let progress: i64 = conn.query_row("SELECT COUNT(*) FROM progress", [], |r| r.get(0))?;
    assert_eq!(progress, 2);

    let (quiz_number, badge_type): (i64, String) = conn.query_row(
        "SELECT quiz_number, badge_type FROM quiz_results",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    assert_eq!(quiz_number, 1);
    assert_eq!(badge_type, "silver");

    let category: String =
        conn.query_row("SELECT badge_category FROM user_badges", [], |r| r.get(0))?;
    assert_eq!(category, "quiz-1");

    Ok(())
}

#[test]
fn test_reopen_is_idempotent() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("readtrack.db");

    let store = Store::open(&db_path)?;
    store.ensure_schema()?;
    store.mark_segment_viewed(1, 2, 3)?;
    store.close()?;

    let store = Store::open(&db_path)?;
    store.ensure_schema()?;
    assert_eq!(store.count_rows("progress")?, 1);

    let stats = store.stats_best_effort()?;
    assert_eq!(stats.progress_rows, Some(1));
    assert_eq!(stats.badges, Some(0));
    Ok(())
}
