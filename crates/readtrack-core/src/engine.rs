use crate::config::EngineConfig;
use crate::errors::{SchemaError, StoreError, StoreResult};
use crate::model::{
    AwardOutcome, BadgeCategory, BadgeRecord, BadgeStats, BadgeTier, BestAttempt,
    CompletionStatus, LoginOutcome, OverallProgress, ProgressRow, QuizAttempt, QuizOutcome,
    RegisterOutcome, User, UserStats,
};
use crate::scoring::{passes_upgrade_threshold, upgrade_tier_for_quiz};
use crate::storage::migrate::MigrationReport;
use crate::storage::progress::SegmentTotals;
use crate::storage::store::Store;
use std::collections::BTreeMap;

/// Whether the legacy rewrite has been applied to the open database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
    Current,
    /// Migration failed and was rolled back; the first-release table shapes remain.
    Legacy,
}

/// Entry point for every progress, quiz and badge operation.
#[derive(Clone)]
pub struct Engine {
    store: Store,
    config: EngineConfig,
    schema: SchemaState,
}

impl Engine {
    /// Opens the database at `config.db_path`, creates missing tables and
    /// migrates a legacy file. A failed migration leaves the engine in
    /// [`SchemaState::Legacy`] rather than failing startup.
    pub fn open(config: EngineConfig) -> Result<Self, SchemaError> {
        let store = Store::open(&config.db_path)?;
        Self::start(store, config)
    }

    pub fn in_memory(config: EngineConfig) -> Result<Self, SchemaError> {
        Self::start(Store::memory()?, config)
    }

    fn start(store: Store, config: EngineConfig) -> Result<Self, SchemaError> {
        store.ensure_schema()?;

        let schema = match store.migrate_legacy() {
            Ok(MigrationReport::UpToDate) => SchemaState::Current,
            Ok(report) => {
                tracing::info!(event = "engine_migrated", report = ?report);
                SchemaState::Current
            }
            Err(e) => {
                tracing::error!(event = "engine_degraded", error = %e);
                SchemaState::Legacy
            }
        };

        tracing::info!(
            event = "engine_ready",
            db = %config.db_path.display(),
            schema = ?schema
        );
        Ok(Self {
            store,
            config,
            schema,
        })
    }

    pub fn schema_state(&self) -> SchemaState {
        self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn close(self) -> StoreResult<()> {
        tracing::debug!(event = "engine_close");
        self.store.close()
    }

    // -- accounts --

    pub fn register(&self, name: &str, birthdate: &str) -> StoreResult<RegisterOutcome> {
        self.store.register(name, birthdate)
    }

    pub fn login(&self, name: &str, birthdate: &str) -> StoreResult<LoginOutcome> {
        self.store.login(name, birthdate)
    }

    pub fn user(&self, user_id: i64) -> StoreResult<Option<User>> {
        self.store.get_user(user_id)
    }

    // -- progress --

    pub fn mark_viewed(&self, user_id: i64, story_id: i64, segment_id: i64) -> StoreResult<()> {
        self.store.mark_segment_viewed(user_id, story_id, segment_id)
    }

    pub fn save_last_viewed(&self, user_id: i64, story_id: i64, segment_id: i64) -> StoreResult<()> {
        self.store.save_last_viewed(user_id, story_id, segment_id)
    }

    pub fn last_viewed(&self, user_id: i64, story_id: i64) -> StoreResult<i64> {
        self.store.resume_point(user_id, story_id)
    }

    /// `total_segments` falls back to the configured segments per story.
    pub fn completion_status(
        &self,
        user_id: i64,
        story_id: i64,
        total_segments: Option<i64>,
    ) -> StoreResult<CompletionStatus> {
        let total = total_segments.unwrap_or(self.config.segments_per_story);
        self.store.completion_status(user_id, story_id, total)
    }

    pub fn bulk_completion_status(
        &self,
        user_id: i64,
        per_story: BTreeMap<i64, i64>,
    ) -> StoreResult<BTreeMap<i64, CompletionStatus>> {
        let totals = SegmentTotals {
            default: self.config.segments_per_story,
            per_story,
        };
        self.store.bulk_completion_status(user_id, &totals)
    }

    pub fn story_progress(&self, user_id: i64, story_id: i64) -> StoreResult<Vec<ProgressRow>> {
        self.store.story_progress(user_id, story_id)
    }

    pub fn overall_progress(&self, user_id: i64) -> StoreResult<OverallProgress> {
        self.store
            .overall_progress(user_id, self.config.catalog_segments)
    }

    // -- quizzes --

    pub fn save_quiz(
        &self,
        user_id: i64,
        story_id: i64,
        quiz_number: i64,
        score: i64,
        total_questions: i64,
    ) -> StoreResult<BadgeTier> {
        self.store
            .record_attempt(user_id, story_id, quiz_number, score, total_questions)
    }

    pub fn best_quiz_score(
        &self,
        user_id: i64,
        story_id: i64,
        quiz_number: i64,
    ) -> StoreResult<Option<BestAttempt>> {
        self.store.best_attempt(user_id, story_id, quiz_number)
    }

    pub fn quiz_results(&self, user_id: i64, story_id: Option<i64>) -> StoreResult<Vec<QuizAttempt>> {
        self.store.quiz_attempts(user_id, story_id)
    }

    // -- badges --

    pub fn award_badge(
        &self,
        user_id: i64,
        story_id: i64,
        tier: BadgeTier,
        category: BadgeCategory,
    ) -> StoreResult<AwardOutcome> {
        self.store.award(user_id, story_id, tier, category)
    }

    pub fn upgrade_badge(
        &self,
        user_id: i64,
        story_id: i64,
        new_tier: BadgeTier,
    ) -> StoreResult<Option<BadgeTier>> {
        self.store
            .upgrade_story_completion(user_id, story_id, new_tier)
    }

    pub fn ordered_badges(&self, user_id: i64) -> StoreResult<Vec<BadgeRecord>> {
        self.store.ordered_badges(user_id)
    }

    pub fn story_badges(&self, user_id: i64, story_id: i64) -> StoreResult<Vec<BadgeRecord>> {
        self.store.story_badges(user_id, story_id)
    }

    pub fn has_badge(&self, user_id: i64, story_id: i64, category: BadgeCategory) -> StoreResult<bool> {
        self.store.has_badge(user_id, story_id, category)
    }

    pub fn badge_stats(&self, user_id: i64) -> StoreResult<BadgeStats> {
        self.store.badge_stats(user_id)
    }

    pub fn user_stats(&self, user_id: i64) -> StoreResult<UserStats> {
        let progress = self.overall_progress(user_id)?;
        let badges = self.store.badge_stats(user_id)?;
        let (total_quizzes, average_quiz_score) = self.store.quiz_summary(user_id)?;
        Ok(UserStats {
            progress,
            total_badges: badges.total,
            total_quizzes,
            average_quiz_score,
        })
    }

    // -- composite flows --

    /// Marks segments `1..=total_segments` viewed and awards the bronze
    /// story-completion badge. A higher tier already held is kept.
    pub fn finish_story(
        &self,
        user_id: i64,
        story_id: i64,
        total_segments: Option<i64>,
    ) -> StoreResult<CompletionStatus> {
        let total = total_segments.unwrap_or(self.config.segments_per_story);
        if total <= 0 {
            return Err(StoreError::InvalidArgument(format!(
                "total_segments must be positive (got {})",
                total
            )));
        }
        let segments: Vec<i64> = (1..=total).collect();
        self.store
            .mark_segments_viewed(user_id, story_id, &segments)?;
        self.store.award(
            user_id,
            story_id,
            BadgeTier::Bronze,
            BadgeCategory::StoryCompletion,
        )?;
        self.store.completion_status(user_id, story_id, total)
    }

    /// Records the attempt and awards the quiz badge at the attempt tier.
    /// Meeting the pass threshold also moves story-completion to silver
    /// (quiz 1) or gold (quiz 2).
    pub fn finish_quiz(
        &self,
        user_id: i64,
        story_id: i64,
        quiz_number: i64,
        score: i64,
        total_questions: i64,
    ) -> StoreResult<QuizOutcome> {
        let (Some(category), Some(upgrade_to)) = (
            BadgeCategory::for_quiz(quiz_number),
            upgrade_tier_for_quiz(quiz_number),
        ) else {
            return Err(StoreError::InvalidArgument(format!(
                "quiz_number must be 1 or 2 (got {})",
                quiz_number
            )));
        };

        let tier = self
            .store
            .record_attempt(user_id, story_id, quiz_number, score, total_questions)?;
        self.store.award(user_id, story_id, tier, category)?;

        let passed = passes_upgrade_threshold(score, self.config.pass_threshold);
        let story_badge = if passed {
            self.store
                .upgrade_story_completion(user_id, story_id, upgrade_to)?;
            Some(upgrade_to)
        } else {
            None
        };

        tracing::info!(
            event = "quiz_finished",
            user_id,
            story_id,
            quiz_number,
            passed,
            tier = %tier
        );
        Ok(QuizOutcome {
            badge_type: tier,
            passed,
            story_badge,
        })
    }
}
