//! Decoding of the free-text badge identifiers written by the first release,
//! e.g. `story-2-gold-quiz1`.

use crate::model::{BadgeCategory, BadgeTier};
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_STORY_ID: i64 = 1;
pub const DEFAULT_TIER: BadgeTier = BadgeTier::Gold;
pub const DEFAULT_CATEGORY: BadgeCategory = BadgeCategory::StoryCompletion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyBadge {
    pub story_id: i64,
    pub tier: BadgeTier,
    pub category: BadgeCategory,
}

fn story_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)story-?(\d+)").expect("static regex"))
}

fn quiz_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)quiz-?([12])").expect("static regex"))
}

/// Never fails: every part falls back to its default when the id does not mention it.
pub fn parse_legacy_badge_id(badge_id: &str) -> LegacyBadge {
    let story_id = story_pattern()
        .captures(badge_id)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(DEFAULT_STORY_ID);

    let lower = badge_id.to_ascii_lowercase();

    let tier = if lower.contains("gold") {
        BadgeTier::Gold
    } else if lower.contains("silver") {
        BadgeTier::Silver
    } else if lower.contains("bronze") {
        BadgeTier::Bronze
    } else {
        DEFAULT_TIER
    };

    let category = match quiz_pattern()
        .captures(badge_id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
    {
        Some("1") => BadgeCategory::Quiz1,
        Some("2") => BadgeCategory::Quiz2,
        _ if lower.contains("complete") => BadgeCategory::StoryCompletion,
        _ => DEFAULT_CATEGORY,
    };

    LegacyBadge {
        story_id,
        tier,
        category,
    }
}
