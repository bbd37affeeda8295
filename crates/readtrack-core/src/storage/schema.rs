pub const USERS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  username TEXT NOT NULL,
  birthdate TEXT NOT NULL,
  created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
  UNIQUE(username, birthdate)
);
"#;

pub const PROGRESS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS progress (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER,
  story_id INTEGER,
  segment_id INTEGER,
  completed INTEGER DEFAULT 0,
  completed_at DATETIME,
  last_viewed_segment INTEGER DEFAULT 1,
  FOREIGN KEY (user_id) REFERENCES users(id),
  UNIQUE(user_id, story_id, segment_id)
);
"#;

pub const QUIZ_RESULTS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS quiz_results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER,
  story_id INTEGER,
  quiz_number INTEGER,
  score INTEGER,
  total_questions INTEGER,
  badge_type TEXT,
  completed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
  FOREIGN KEY (user_id) REFERENCES users(id)
);
"#;

pub const USER_BADGES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS user_badges (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER,
  story_id INTEGER,
  badge_type TEXT,
  badge_category TEXT,
  earned_at DATETIME DEFAULT CURRENT_TIMESTAMP,
  FOREIGN KEY (user_id) REFERENCES users(id),
  UNIQUE(user_id, story_id, badge_category)
);
"#;

/// Tables in creation order.
pub const TABLES: &[(&str, &str)] = &[
    ("users", USERS_DDL),
    ("progress", PROGRESS_DDL),
    ("quiz_results", QUIZ_RESULTS_DDL),
    ("user_badges", USER_BADGES_DDL),
];

/// Rewrite targets used by the migrator; created fresh inside its transaction.
pub const QUIZ_RESULTS_NEW_DDL: &str = r#"
DROP TABLE IF EXISTS quiz_results_new;
CREATE TABLE quiz_results_new (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER,
  story_id INTEGER,
  quiz_number INTEGER,
  score INTEGER,
  total_questions INTEGER,
  badge_type TEXT,
  completed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
  FOREIGN KEY (user_id) REFERENCES users(id)
);
"#;

pub const USER_BADGES_NEW_DDL: &str = r#"
DROP TABLE IF EXISTS user_badges_new;
CREATE TABLE user_badges_new (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER,
  story_id INTEGER,
  badge_type TEXT,
  badge_category TEXT,
  earned_at DATETIME DEFAULT CURRENT_TIMESTAMP,
  FOREIGN KEY (user_id) REFERENCES users(id),
  UNIQUE(user_id, story_id, badge_category)
);
"#;

pub const PROGRESS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_progress_user_story ON progress(user_id, story_id)";

/// Column added after the first release; self-healed on startup.
pub const LAST_VIEWED_COLUMN: &str = "last_viewed_segment";
pub const LAST_VIEWED_COLUMN_DEF: &str = "INTEGER DEFAULT 1";
