use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Badge tier, ranked bronze < silver < gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
}

impl BadgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeTier::Bronze => "bronze",
            BadgeTier::Silver => "silver",
            BadgeTier::Gold => "gold",
        }
    }

    /// Lenient parse for values read back from the store. Unknown text yields `None`,
    /// which every real tier outranks.
    pub fn parse_stored(s: Option<&str>) -> Option<Self> {
        s.and_then(|v| v.parse().ok())
    }
}

impl fmt::Display for BadgeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(BadgeTier::Bronze),
            "silver" => Ok(BadgeTier::Silver),
            "gold" => Ok(BadgeTier::Gold),
            other => Err(format!("unknown badge tier '{other}'")),
        }
    }
}

/// Which milestone a badge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BadgeCategory {
    #[serde(rename = "story-completion")]
    StoryCompletion,
    #[serde(rename = "quiz-1")]
    Quiz1,
    #[serde(rename = "quiz-2")]
    Quiz2,
}

impl BadgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeCategory::StoryCompletion => "story-completion",
            BadgeCategory::Quiz1 => "quiz-1",
            BadgeCategory::Quiz2 => "quiz-2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BadgeCategory::StoryCompletion => "Story Complete",
            BadgeCategory::Quiz1 => "Quiz 1",
            BadgeCategory::Quiz2 => "Quiz 2",
        }
    }

    pub fn for_quiz(quiz_number: i64) -> Option<Self> {
        match quiz_number {
            1 => Some(BadgeCategory::Quiz1),
            2 => Some(BadgeCategory::Quiz2),
            _ => None,
        }
    }
}

impl fmt::Display for BadgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "story-completion" | "story_completion" | "complete" => {
                Ok(BadgeCategory::StoryCompletion)
            }
            "quiz-1" | "quiz1" => Ok(BadgeCategory::Quiz1),
            "quiz-2" | "quiz2" => Ok(BadgeCategory::Quiz2),
            other => Err(format!("unknown badge category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub birthdate: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success { user: User },
    Failure { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Success { user_id: i64 },
    Failure { message: String },
}

impl LoginOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            LoginOutcome::Success { user } => serde_json::json!({
                "success": true,
                "user": user,
            }),
            LoginOutcome::Failure { message } => serde_json::json!({
                "success": false,
                "message": message,
            }),
        }
    }
}

impl RegisterOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RegisterOutcome::Success { user_id } => serde_json::json!({
                "success": true,
                "userId": user_id,
                "message": "Account created successfully!",
            }),
            RegisterOutcome::Failure { message } => serde_json::json!({
                "success": false,
                "message": message,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRow {
    pub story_id: i64,
    pub segment_id: i64,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub last_viewed_segment: i64,
}

/// Per-story aggregate the library and story pages route on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStatus {
    pub completed_segments: i64,
    pub total_segments: i64,
    pub story_completed: bool,
    pub quiz1_completed: bool,
    pub quiz2_completed: bool,
    pub last_accessed: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextRoute {
    ContinueStory,
    Quiz1,
    Quiz2,
    Done,
}

impl CompletionStatus {
    pub fn empty(total_segments: i64) -> Self {
        Self {
            completed_segments: 0,
            total_segments,
            story_completed: false,
            quiz1_completed: false,
            quiz2_completed: false,
            last_accessed: None,
        }
    }

    pub fn next_route(&self) -> NextRoute {
        if !self.story_completed {
            NextRoute::ContinueStory
        } else if !self.quiz1_completed {
            NextRoute::Quiz1
        } else if !self.quiz2_completed {
            NextRoute::Quiz2
        } else {
            NextRoute::Done
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallProgress {
    pub completed: i64,
    pub total: i64,
    pub percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: i64,
    pub story_id: i64,
    pub quiz_number: i64,
    pub score: i64,
    pub total_questions: i64,
    pub badge_type: Option<BadgeTier>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestAttempt {
    pub best_score: i64,
    pub total_questions: i64,
    pub badge_type: Option<BadgeTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRecord {
    pub id: i64,
    pub story_id: i64,
    pub badge_type: Option<BadgeTier>,
    pub badge_category: Option<BadgeCategory>,
    pub badge_label: String,
    pub earned_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeStats {
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AwardOutcome {
    Inserted,
    Upgraded { from: Option<BadgeTier> },
    Unchanged { current: BadgeTier },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOutcome {
    pub badge_type: BadgeTier,
    pub passed: bool,
    pub story_badge: Option<BadgeTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub progress: OverallProgress,
    pub total_badges: i64,
    pub total_quizzes: i64,
    pub average_quiz_score: i64,
}
