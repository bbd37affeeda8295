//! Quiz scoring rules.
//!
//! Two independent rules live here. The attempt tier tags every stored quiz
//! attempt; the upgrade threshold decides whether a finished quiz moves the
//! story-completion badge. An attempt can carry a silver tier and still fall
//! short of the upgrade bar.

use crate::model::BadgeTier;

/// Default pass mark for badge upgrades (out of a five question quiz).
pub const DEFAULT_PASS_THRESHOLD: i64 = 4;

/// Tier recorded with a single quiz attempt.
///
/// A perfect score is gold, 3 or 4 correct is silver regardless of the quiz
/// length, anything else is bronze. An empty quiz (`0/0`) is bronze.
pub fn derive_badge_tier(score: i64, total_questions: i64) -> BadgeTier {
    if score == total_questions && total_questions > 0 {
        BadgeTier::Gold
    } else if (3..=4).contains(&score) {
        BadgeTier::Silver
    } else {
        BadgeTier::Bronze
    }
}

pub fn passes_upgrade_threshold(score: i64, threshold: i64) -> bool {
    score >= threshold
}

/// Tier the story-completion badge moves to when quiz `quiz_number` is passed.
pub fn upgrade_tier_for_quiz(quiz_number: i64) -> Option<BadgeTier> {
    match quiz_number {
        1 => Some(BadgeTier::Silver),
        2 => Some(BadgeTier::Gold),
        _ => None,
    }
}
