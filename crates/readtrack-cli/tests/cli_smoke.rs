use assert_cmd::Command;
use predicates::str::contains;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn readtrack() -> Command {
    let mut cmd = Command::cargo_bin("readtrack").unwrap();
    cmd.env_remove("READTRACK_DB")
        .env_remove("READTRACK_CONFIG")
        .env_remove("READTRACK_LOG");
    cmd
}

fn call(db: &Path, method: &str, params: &str) -> Value {
    let out = readtrack()
        .args(["call", "--db", db.to_str().unwrap(), method, params])
        .output()
        .unwrap();
    assert!(out.status.success(), "call {} failed: {:?}", method, out);
    serde_json::from_slice(&out.stdout).unwrap()
}

fn seed_legacy(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE quiz_results (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           user_id INTEGER, story_id INTEGER,
           score INTEGER, total_questions INTEGER,
           completed_at DATETIME DEFAULT CURRENT_TIMESTAMP
         );
         CREATE TABLE user_badges (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           user_id INTEGER, badge_id TEXT,
           earned_at DATETIME DEFAULT CURRENT_TIMESTAMP,
           UNIQUE(user_id, badge_id)
         );
         INSERT INTO quiz_results (user_id, story_id, score, total_questions)
           VALUES (1, 1, 4, 5);
         INSERT INTO user_badges (user_id, badge_id)
           VALUES (1, 'story-1-silver-quiz1');",
    )
    .unwrap();
}

#[test]
fn test_init_creates_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nested").join("app.db");

    readtrack()
        .args(["init", "--db", db.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Database ready"));

    assert!(db.exists());
}

#[test]
fn test_call_reading_session() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");

    let reg = call(&db, "auth.register", r#"{"name":"Mia","birthdate":"2017-03-01"}"#);
    assert_eq!(reg["success"], true);
    let user_id = reg["userId"].as_i64().unwrap();

    let status = call(
        &db,
        "story.finish",
        &format!(r#"{{"userId":{},"storyId":1,"totalSegments":3}}"#, user_id),
    );
    assert_eq!(status["storyCompleted"], true);
    assert_eq!(status["completedSegments"], 3);

    let has = call(
        &db,
        "badge.has",
        &format!(
            r#"{{"userId":{},"storyId":1,"category":"story-completion"}}"#,
            user_id
        ),
    );
    assert_eq!(has, Value::Bool(true));
}

#[test]
fn test_call_unknown_method_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");

    readtrack()
        .args(["call", "--db", db.to_str().unwrap(), "nope.nothing"])
        .assert()
        .code(1)
        .stdout(contains("-32601"));
}

#[test]
fn test_call_lists_methods() {
    readtrack()
        .args(["call", "rpc.methods"])
        .assert()
        .success()
        .stdout(contains("progress.getBulkCompletionStatus"));
}

#[test]
fn test_migrate_dry_run_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("legacy.db");
    seed_legacy(&db);

    readtrack()
        .args(["migrate", "--dry-run", "--db", db.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("quiz_results: 1 rows"))
        .stdout(contains("user_badges: 1 rows"));

    let conn = Connection::open(&db).unwrap();
    let legacy_cols: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('user_badges') WHERE name = 'badge_category'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(legacy_cols, 0);
}

#[test]
fn test_migrate_writes_backup_and_rewrites() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("legacy.db");
    seed_legacy(&db);

    readtrack()
        .args(["migrate", "--db", db.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Backup written"))
        .stdout(contains("Migrated 1 quiz results and 1 badges."));

    let backups: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("legacy_backup_"))
        .collect();
    assert_eq!(backups.len(), 1);

    // The legacy file had no users table; its rows survive the rewrite anyway.
    let conn = Connection::open(&db).unwrap();
    let users: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .unwrap();
    assert_eq!(users, 0);
    let badge: (i64, String) = conn
        .query_row(
            "SELECT story_id, badge_category FROM user_badges WHERE user_id = 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(badge, (1, "quiz-1".to_string()));
    drop(conn);

    readtrack()
        .args(["migrate", "--db", db.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("already up to date"));
}

#[test]
fn test_migrate_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("absent.db");

    readtrack()
        .args(["migrate", "--db", db.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(contains("database not found"));
}

#[test]
fn test_doctor_json_flags_legacy_layout() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("legacy.db");
    seed_legacy(&db);

    let out = readtrack()
        .args(["doctor", "--format", "json", "--db", db.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["legacy_user_badges"], true);
    assert_eq!(report["stats"]["badges"], 1);
    assert_eq!(report["stats"]["users"], Value::Null);
}
