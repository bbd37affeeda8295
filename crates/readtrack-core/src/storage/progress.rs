use crate::errors::{StoreError, StoreResult};
use crate::model::{BadgeCategory, CompletionStatus, OverallProgress, ProgressRow};
use crate::storage::now_timestamp;
use crate::storage::store::Store;
use rusqlite::params;
use std::collections::BTreeMap;

const MARK_VIEWED_SQL: &str = "
    INSERT INTO progress (user_id, story_id, segment_id, completed, completed_at)
    VALUES (?1, ?2, ?3, 1, ?4)
    ON CONFLICT(user_id, story_id, segment_id)
    DO UPDATE SET completed = 1, completed_at = excluded.completed_at";

/// Segment totals used when building status for many stories at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTotals {
    pub default: i64,
    pub per_story: BTreeMap<i64, i64>,
}

impl SegmentTotals {
    pub fn uniform(default: i64) -> Self {
        Self {
            default,
            per_story: BTreeMap::new(),
        }
    }

    pub fn with_story(mut self, story_id: i64, total: i64) -> Self {
        self.per_story.insert(story_id, total);
        self
    }

    pub fn total_for(&self, story_id: i64) -> i64 {
        self.per_story.get(&story_id).copied().unwrap_or(self.default)
    }
}

fn check_ids(user_id: i64, story_id: i64) -> StoreResult<()> {
    if user_id <= 0 || story_id <= 0 {
        return Err(StoreError::InvalidArgument(format!(
            "user_id and story_id must be positive (got {}, {})",
            user_id, story_id
        )));
    }
    Ok(())
}

fn check_segment(segment_id: i64) -> StoreResult<()> {
    if segment_id <= 0 {
        return Err(StoreError::InvalidArgument(format!(
            "segment_id must be positive (got {})",
            segment_id
        )));
    }
    Ok(())
}

fn quiz_flag(status: &mut CompletionStatus, category: Option<&str>) {
    match category.and_then(|c| c.parse::<BadgeCategory>().ok()) {
        Some(BadgeCategory::Quiz1) => status.quiz1_completed = true,
        Some(BadgeCategory::Quiz2) => status.quiz2_completed = true,
        _ => {}
    }
}

impl Store {
    /// Marks a segment complete. `last_viewed_segment` is left alone.
    pub fn mark_segment_viewed(&self, user_id: i64, story_id: i64, segment_id: i64) -> StoreResult<()> {
        check_ids(user_id, story_id)?;
        check_segment(segment_id)?;
        let conn = self.lock()?;
        let mut stmt = self.prepare(&conn, MARK_VIEWED_SQL)?;
        stmt.execute(params![user_id, story_id, segment_id, now_timestamp()])?;
        tracing::debug!(event = "segment_viewed", user_id, story_id, segment_id);
        Ok(())
    }

    /// Marks every listed segment in one transaction.
    pub fn mark_segments_viewed(
        &self,
        user_id: i64,
        story_id: i64,
        segments: &[i64],
    ) -> StoreResult<()> {
        check_ids(user_id, story_id)?;
        segments.iter().try_for_each(|&s| check_segment(s))?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let now = now_timestamp();
            let mut stmt = self.prepare(&tx, MARK_VIEWED_SQL)?;
            for &segment_id in segments {
                stmt.execute(params![user_id, story_id, segment_id, now])?;
            }
        }
        tx.commit()?;
        tracing::debug!(event = "segments_viewed", user_id, story_id, count = segments.len());
        Ok(())
    }

    /// Records the reading position. Inserts an incomplete row when none exists;
    /// otherwise only `last_viewed_segment` changes.
    pub fn save_last_viewed(&self, user_id: i64, story_id: i64, segment_id: i64) -> StoreResult<()> {
        check_ids(user_id, story_id)?;
        check_segment(segment_id)?;
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "INSERT INTO progress (user_id, story_id, segment_id, completed, last_viewed_segment)
             VALUES (?1, ?2, ?3, 0, ?3)
             ON CONFLICT(user_id, story_id, segment_id)
             DO UPDATE SET last_viewed_segment = excluded.last_viewed_segment",
        )?;
        stmt.execute(params![user_id, story_id, segment_id])?;
        Ok(())
    }

    /// Highest recorded reading position, 0 when the story was never opened.
    pub fn resume_point(&self, user_id: i64, story_id: i64) -> StoreResult<i64> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT COALESCE(MAX(last_viewed_segment), 0) FROM progress
             WHERE user_id = ?1 AND story_id = ?2",
        )?;
        Ok(stmt.query_row(params![user_id, story_id], |r| r.get(0))?)
    }

    pub fn story_progress(&self, user_id: i64, story_id: i64) -> StoreResult<Vec<ProgressRow>> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT story_id, segment_id, completed, completed_at, COALESCE(last_viewed_segment, 1)
             FROM progress WHERE user_id = ?1 AND story_id = ?2
             ORDER BY segment_id",
        )?;
        let rows = stmt.query_map(params![user_id, story_id], |r| {
            Ok(ProgressRow {
                story_id: r.get(0)?,
                segment_id: r.get(1)?,
                completed: r.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0,
                completed_at: r.get(3)?,
                last_viewed_segment: r.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn completion_status(
        &self,
        user_id: i64,
        story_id: i64,
        total_segments: i64,
    ) -> StoreResult<CompletionStatus> {
        let conn = self.lock()?;
        let mut status = CompletionStatus::empty(total_segments);

        {
            let mut stmt = self.prepare(
                &conn,
                "SELECT COALESCE(SUM(CASE WHEN completed = 1 THEN 1 ELSE 0 END), 0), MAX(completed_at)
                 FROM progress WHERE user_id = ?1 AND story_id = ?2",
            )?;
            let (completed, last): (i64, Option<String>) = stmt
                .query_row(params![user_id, story_id], |r| Ok((r.get(0)?, r.get(1)?)))?;
            status.completed_segments = completed;
            status.last_accessed = last;
        }

        {
            let mut stmt = self.prepare(
                &conn,
                "SELECT badge_category FROM user_badges
                 WHERE user_id = ?1 AND story_id = ?2 AND badge_category IN ('quiz-1', 'quiz-2')",
            )?;
            let cats = stmt.query_map(params![user_id, story_id], |r| r.get::<_, Option<String>>(0))?;
            for cat in cats {
                quiz_flag(&mut status, cat?.as_deref());
            }
        }

        status.story_completed = status.completed_segments >= total_segments;
        Ok(status)
    }

    /// Status for every story the user has touched plus every story named in
    /// `totals`. Always exactly two statements, whatever the story count.
    pub fn bulk_completion_status(
        &self,
        user_id: i64,
        totals: &SegmentTotals,
    ) -> StoreResult<BTreeMap<i64, CompletionStatus>> {
        let conn = self.lock()?;
        let mut out: BTreeMap<i64, CompletionStatus> = totals
            .per_story
            .iter()
            .map(|(&story, &total)| (story, CompletionStatus::empty(total)))
            .collect();

        {
            let mut stmt = self.prepare(
                &conn,
                "SELECT story_id,
                        COALESCE(SUM(CASE WHEN completed = 1 THEN 1 ELSE 0 END), 0),
                        MAX(completed_at)
                 FROM progress WHERE user_id = ?1
                 GROUP BY story_id",
            )?;
            let rows = stmt.query_map([user_id], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, Option<String>>(2)?,
                ))
            })?;
            for row in rows {
                let (story_id, completed, last) = row?;
                let entry = out
                    .entry(story_id)
                    .or_insert_with(|| CompletionStatus::empty(totals.total_for(story_id)));
                entry.completed_segments = completed;
                entry.last_accessed = last;
            }
        }

        {
            let mut stmt = self.prepare(
                &conn,
                "SELECT story_id, badge_category FROM user_badges
                 WHERE user_id = ?1 AND badge_category IN ('quiz-1', 'quiz-2')",
            )?;
            let rows = stmt.query_map([user_id], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, Option<String>>(1)?))
            })?;
            for row in rows {
                let (story_id, category) = row?;
                let entry = out
                    .entry(story_id)
                    .or_insert_with(|| CompletionStatus::empty(totals.total_for(story_id)));
                quiz_flag(entry, category.as_deref());
            }
        }

        for status in out.values_mut() {
            status.story_completed = status.completed_segments >= status.total_segments;
        }
        Ok(out)
    }

    /// Completed segments across all stories against the catalog size.
    pub fn overall_progress(&self, user_id: i64, catalog_segments: i64) -> StoreResult<OverallProgress> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT COUNT(*) FROM progress WHERE user_id = ?1 AND completed = 1",
        )?;
        let completed: i64 = stmt.query_row([user_id], |r| r.get(0))?;
        let percentage = if catalog_segments > 0 {
            ((completed as f64 / catalog_segments as f64) * 100.0).round() as i64
        } else {
            0
        };
        Ok(OverallProgress {
            completed,
            total: catalog_segments,
            percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        let store = Store::memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_mark_viewed_keeps_last_viewed() {
        let store = store();
        store.save_last_viewed(1, 1, 5).unwrap();
        store.mark_segment_viewed(1, 1, 5).unwrap();

        let rows = store.story_progress(1, 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].completed);
        assert!(rows[0].completed_at.is_some());
        assert_eq!(rows[0].last_viewed_segment, 5);
    }

    #[test]
    fn test_save_last_viewed_does_not_complete() {
        let store = store();
        store.save_last_viewed(1, 1, 3).unwrap();
        let status = store.completion_status(1, 1, 14).unwrap();
        assert_eq!(status.completed_segments, 0);
        assert_eq!(store.resume_point(1, 1).unwrap(), 3);
    }

    #[test]
    fn test_resume_point_defaults_to_zero() {
        let store = store();
        assert_eq!(store.resume_point(1, 2).unwrap(), 0);
    }

    #[test]
    fn test_rejects_non_positive_ids() {
        let store = store();
        assert!(matches!(
            store.mark_segment_viewed(0, 1, 1),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.mark_segment_viewed(1, 1, -3),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.save_last_viewed(1, 1, 0),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.mark_segments_viewed(1, 1, &[1, 0, 2]),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(store.story_progress(1, 1).unwrap().is_empty());
    }

    #[test]
    fn test_overall_progress_rounds() {
        let store = store();
        store.mark_segments_viewed(1, 1, &[1, 2, 3, 4, 5]).unwrap();
        let overall = store.overall_progress(1, 42).unwrap();
        assert_eq!(overall.completed, 5);
        assert_eq!(overall.percentage, 12);
        assert_eq!(store.overall_progress(1, 0).unwrap().percentage, 0);
    }

    #[test]
    fn test_segment_totals_lookup() {
        let totals = SegmentTotals::uniform(14).with_story(3, 10);
        assert_eq!(totals.total_for(3), 10);
        assert_eq!(totals.total_for(1), 14);
    }
}
