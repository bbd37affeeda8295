use crate::errors::{StoreError, StoreResult};
use crate::model::{BadgeTier, BestAttempt, QuizAttempt};
use crate::scoring::derive_badge_tier;
use crate::storage::now_timestamp;
use crate::storage::store::Store;
use rusqlite::{params, OptionalExtension};

const ATTEMPT_COLUMNS: &str =
    "id, story_id, quiz_number, score, total_questions, badge_type, completed_at";

fn row_to_attempt(r: &rusqlite::Row<'_>) -> rusqlite::Result<QuizAttempt> {
    Ok(QuizAttempt {
        id: r.get(0)?,
        story_id: r.get(1)?,
        quiz_number: r.get::<_, Option<i64>>(2)?.unwrap_or(1),
        score: r.get::<_, Option<i64>>(3)?.unwrap_or(0),
        total_questions: r.get::<_, Option<i64>>(4)?.unwrap_or(0),
        badge_type: BadgeTier::parse_stored(r.get::<_, Option<String>>(5)?.as_deref()),
        completed_at: r.get(6)?,
    })
}

impl Store {
    /// Appends one attempt and returns the tier recorded with it.
    pub fn record_attempt(
        &self,
        user_id: i64,
        story_id: i64,
        quiz_number: i64,
        score: i64,
        total_questions: i64,
    ) -> StoreResult<BadgeTier> {
        if score < 0 || total_questions < 0 {
            return Err(StoreError::InvalidArgument(format!(
                "score and total must be non-negative (got {}/{})",
                score, total_questions
            )));
        }
        let tier = derive_badge_tier(score, total_questions);

        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "INSERT INTO quiz_results
               (user_id, story_id, quiz_number, score, total_questions, badge_type, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        stmt.execute(params![
            user_id,
            story_id,
            quiz_number,
            score,
            total_questions,
            tier.as_str(),
            now_timestamp()
        ])?;

        tracing::info!(
            event = "quiz_attempt_recorded",
            user_id,
            story_id,
            quiz_number,
            score,
            total_questions,
            tier = %tier
        );
        Ok(tier)
    }

    /// Highest-scoring attempt; ties go to the earliest.
    pub fn best_attempt(
        &self,
        user_id: i64,
        story_id: i64,
        quiz_number: i64,
    ) -> StoreResult<Option<BestAttempt>> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT score, total_questions, badge_type FROM quiz_results
             WHERE user_id = ?1 AND story_id = ?2 AND quiz_number = ?3
             ORDER BY score DESC, id ASC
             LIMIT 1",
        )?;
        let best = stmt
            .query_row(params![user_id, story_id, quiz_number], |r| {
                Ok(BestAttempt {
                    best_score: r.get::<_, Option<i64>>(0)?.unwrap_or(0),
                    total_questions: r.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    badge_type: BadgeTier::parse_stored(r.get::<_, Option<String>>(2)?.as_deref()),
                })
            })
            .optional()?;
        Ok(best)
    }

    /// Attempt history, newest first.
    pub fn quiz_attempts(&self, user_id: i64, story_id: Option<i64>) -> StoreResult<Vec<QuizAttempt>> {
        let conn = self.lock()?;
        let mut out = Vec::new();
        match story_id {
            Some(story_id) => {
                let sql = format!(
                    "SELECT {} FROM quiz_results WHERE user_id = ?1 AND story_id = ?2
                     ORDER BY completed_at DESC, id DESC",
                    ATTEMPT_COLUMNS
                );
                let mut stmt = self.prepare(&conn, &sql)?;
                for row in stmt.query_map(params![user_id, story_id], row_to_attempt)? {
                    out.push(row?);
                }
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM quiz_results WHERE user_id = ?1
                     ORDER BY completed_at DESC, id DESC",
                    ATTEMPT_COLUMNS
                );
                let mut stmt = self.prepare(&conn, &sql)?;
                for row in stmt.query_map([user_id], row_to_attempt)? {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Attempt count and mean percentage score. Empty quizzes are left out of the mean.
    pub fn quiz_summary(&self, user_id: i64) -> StoreResult<(i64, i64)> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT COUNT(*),
                    AVG(CASE WHEN total_questions > 0
                             THEN score * 100.0 / total_questions END)
             FROM quiz_results WHERE user_id = ?1",
        )?;
        let (count, avg): (i64, Option<f64>) =
            stmt.query_row([user_id], |r| Ok((r.get(0)?, r.get(1)?)))?;
        Ok((count, avg.map(|a| a.round() as i64).unwrap_or(0)))
    }
}
