//! Badge ledger: at most one badge per (user, story, category), and tiers only move up
//! through `award`.

use crate::errors::StoreResult;
use crate::model::{AwardOutcome, BadgeCategory, BadgeRecord, BadgeStats, BadgeTier};
use crate::storage::now_timestamp;
use crate::storage::store::Store;
use rusqlite::{params, OptionalExtension};

const BADGE_COLUMNS: &str = "id, story_id, badge_type, badge_category, earned_at";

fn row_to_badge(r: &rusqlite::Row<'_>) -> rusqlite::Result<BadgeRecord> {
    let raw_category: Option<String> = r.get(3)?;
    let category = raw_category
        .as_deref()
        .and_then(|c| c.parse::<BadgeCategory>().ok());
    let label = match category {
        Some(c) => c.label().to_string(),
        None => raw_category.unwrap_or_default(),
    };
    Ok(BadgeRecord {
        id: r.get(0)?,
        story_id: r.get::<_, Option<i64>>(1)?.unwrap_or(0),
        badge_type: BadgeTier::parse_stored(r.get::<_, Option<String>>(2)?.as_deref()),
        badge_category: category,
        badge_label: label,
        earned_at: r.get(4)?,
    })
}

impl Store {
    /// Inserts the badge, or raises its tier when `tier` is strictly higher.
    /// `earned_at` keeps the first award's time.
    pub fn award(
        &self,
        user_id: i64,
        story_id: i64,
        tier: BadgeTier,
        category: BadgeCategory,
    ) -> StoreResult<AwardOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let outcome = {
            let mut select = self.prepare(
                &tx,
                "SELECT badge_type FROM user_badges
                 WHERE user_id = ?1 AND story_id = ?2 AND badge_category = ?3",
            )?;
            let existing: Option<Option<String>> = select
                .query_row(params![user_id, story_id, category.as_str()], |r| r.get(0))
                .optional()?;

            match existing {
                None => {
                    let mut insert = self.prepare(
                        &tx,
                        "INSERT INTO user_badges (user_id, story_id, badge_type, badge_category, earned_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    insert.execute(params![
                        user_id,
                        story_id,
                        tier.as_str(),
                        category.as_str(),
                        now_timestamp()
                    ])?;
                    AwardOutcome::Inserted
                }
                Some(stored) => {
                    let current = BadgeTier::parse_stored(stored.as_deref());
                    match current {
                        Some(current) if tier <= current => AwardOutcome::Unchanged { current },
                        from => {
                            let mut update = self.prepare(
                                &tx,
                                "UPDATE user_badges SET badge_type = ?1
                                 WHERE user_id = ?2 AND story_id = ?3 AND badge_category = ?4",
                            )?;
                            update.execute(params![
                                tier.as_str(),
                                user_id,
                                story_id,
                                category.as_str()
                            ])?;
                            AwardOutcome::Upgraded { from }
                        }
                    }
                }
            }
        };

        tx.commit()?;
        tracing::info!(
            event = "badge_award",
            user_id,
            story_id,
            category = %category,
            tier = %tier,
            outcome = ?outcome
        );
        Ok(outcome)
    }

    /// Replaces the story-completion badge with `new_tier`, whatever it was.
    /// Returns the tier it replaced.
    pub fn upgrade_story_completion(
        &self,
        user_id: i64,
        story_id: i64,
        new_tier: BadgeTier,
    ) -> StoreResult<Option<BadgeTier>> {
        let category = BadgeCategory::StoryCompletion.as_str();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let previous = {
            let mut select = self.prepare(
                &tx,
                "SELECT badge_type FROM user_badges
                 WHERE user_id = ?1 AND story_id = ?2 AND badge_category = ?3",
            )?;
            let stored: Option<Option<String>> = select
                .query_row(params![user_id, story_id, category], |r| r.get(0))
                .optional()?;
            stored.and_then(|s| BadgeTier::parse_stored(s.as_deref()))
        };

        {
            let mut delete = self.prepare(
                &tx,
                "DELETE FROM user_badges
                 WHERE user_id = ?1 AND story_id = ?2 AND badge_category = ?3",
            )?;
            delete.execute(params![user_id, story_id, category])?;

            let mut insert = self.prepare(
                &tx,
                "INSERT INTO user_badges (user_id, story_id, badge_type, badge_category, earned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            insert.execute(params![
                user_id,
                story_id,
                new_tier.as_str(),
                category,
                now_timestamp()
            ])?;
        }
        tx.commit()?;

        if matches!(previous, Some(prev) if prev > new_tier) {
            tracing::warn!(
                event = "badge_downgrade_overwrite",
                user_id,
                story_id,
                from = ?previous,
                to = %new_tier
            );
        } else {
            tracing::info!(event = "badge_upgrade", user_id, story_id, from = ?previous, to = %new_tier);
        }
        Ok(previous)
    }

    /// Every badge the user holds, oldest first, with a display label.
    pub fn ordered_badges(&self, user_id: i64) -> StoreResult<Vec<BadgeRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM user_badges WHERE user_id = ?1 ORDER BY earned_at ASC, id ASC",
            BADGE_COLUMNS
        );
        let mut stmt = self.prepare(&conn, &sql)?;
        let rows = stmt.query_map([user_id], row_to_badge)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn story_badges(&self, user_id: i64, story_id: i64) -> StoreResult<Vec<BadgeRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM user_badges WHERE user_id = ?1 AND story_id = ?2 ORDER BY id",
            BADGE_COLUMNS
        );
        let mut stmt = self.prepare(&conn, &sql)?;
        let rows = stmt.query_map(params![user_id, story_id], row_to_badge)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn has_badge(
        &self,
        user_id: i64,
        story_id: i64,
        category: BadgeCategory,
    ) -> StoreResult<bool> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT EXISTS(SELECT 1 FROM user_badges
                           WHERE user_id = ?1 AND story_id = ?2 AND badge_category = ?3)",
        )?;
        Ok(stmt.query_row(params![user_id, story_id, category.as_str()], |r| r.get(0))?)
    }

    /// Counts per tier. Rows with an unrecognised tier only count toward `total`.
    pub fn badge_stats(&self, user_id: i64) -> StoreResult<BadgeStats> {
        let conn = self.lock()?;
        let mut stmt = self.prepare(
            &conn,
            "SELECT badge_type, COUNT(*) FROM user_badges WHERE user_id = ?1 GROUP BY badge_type",
        )?;
        let rows = stmt.query_map([user_id], |r| {
            Ok((r.get::<_, Option<String>>(0)?, r.get::<_, i64>(1)?))
        })?;

        let mut stats = BadgeStats::default();
        for row in rows {
            let (tier, count) = row?;
            match BadgeTier::parse_stored(tier.as_deref()) {
                Some(BadgeTier::Gold) => stats.gold += count,
                Some(BadgeTier::Silver) => stats.silver += count,
                Some(BadgeTier::Bronze) => stats.bronze += count,
                None => {}
            }
            stats.total += count;
        }
        Ok(stats)
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
    fn test_award_is_monotonic() {
        let store = store();
        let cat = BadgeCategory::Quiz1;
        assert_eq!(store.award(1, 1, BadgeTier::Silver, cat).unwrap(), AwardOutcome::Inserted);
        assert_eq!(
            store.award(1, 1, BadgeTier::Bronze, cat).unwrap(),
            AwardOutcome::Unchanged {
                current: BadgeTier::Silver
            }
        );
        assert_eq!(
            store.award(1, 1, BadgeTier::Silver, cat).unwrap(),
            AwardOutcome::Unchanged {
                current: BadgeTier::Silver
            }
        );
        assert_eq!(
            store.award(1, 1, BadgeTier::Gold, cat).unwrap(),
            AwardOutcome::Upgraded {
                from: Some(BadgeTier::Silver)
            }
        );
        let badges = store.story_badges(1, 1).unwrap();
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].badge_type, Some(BadgeTier::Gold));
    }

    #[test]
    fn test_upgrade_keeps_earned_at() {
        let store = store();
        store
            .award(1, 1, BadgeTier::Bronze, BadgeCategory::Quiz2)
            .unwrap();
        let before = store.story_badges(1, 1).unwrap()[0].earned_at.clone();
        store.award(1, 1, BadgeTier::Gold, BadgeCategory::Quiz2).unwrap();
        let after = store.story_badges(1, 1).unwrap()[0].earned_at.clone();
        assert_eq!(before, after);
    }

    #[test]
    fn test_story_completion_overwrite_can_lower_tier() {
        let store = store();
        assert_eq!(
            store
                .upgrade_story_completion(1, 3, BadgeTier::Gold)
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .upgrade_story_completion(1, 3, BadgeTier::Silver)
                .unwrap(),
            Some(BadgeTier::Gold)
        );
        let badges = store.story_badges(1, 3).unwrap();
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].badge_type, Some(BadgeTier::Silver));
        assert_eq!(badges[0].badge_label, "Story Complete");
    }

    #[test]
    fn test_stats_and_has_badge() {
        let store = store();
        assert_eq!(store.badge_stats(1).unwrap(), BadgeStats::default());
        store
            .award(1, 1, BadgeTier::Gold, BadgeCategory::StoryCompletion)
            .unwrap();
        store.award(1, 1, BadgeTier::Gold, BadgeCategory::Quiz1).unwrap();
        store
            .award(1, 2, BadgeTier::Bronze, BadgeCategory::Quiz1)
            .unwrap();
        store
            .award(2, 1, BadgeTier::Silver, BadgeCategory::Quiz1)
            .unwrap();

        assert_eq!(
            store.badge_stats(1).unwrap(),
            BadgeStats {
                gold: 2,
                silver: 0,
                bronze: 1,
                total: 3
            }
        );
        assert!(store.has_badge(1, 2, BadgeCategory::Quiz1).unwrap());
        assert!(!store.has_badge(1, 2, BadgeCategory::Quiz2).unwrap());
    }

    #[test]
    fn test_ordered_badges_labels() {
        let store = store();
        store
            .award(1, 1, BadgeTier::Bronze, BadgeCategory::StoryCompletion)
            .unwrap();
        store.award(1, 1, BadgeTier::Gold, BadgeCategory::Quiz1).unwrap();
        store.award(1, 1, BadgeTier::Gold, BadgeCategory::Quiz2).unwrap();
        let labels: Vec<String> = store
            .ordered_badges(1)
            .unwrap()
            .into_iter()
            .map(|b| b.badge_label)
            .collect();
        assert_eq!(labels, vec!["Story Complete", "Quiz 1", "Quiz 2"]);
    }
}
