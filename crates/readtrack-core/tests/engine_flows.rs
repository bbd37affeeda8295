use readtrack_core::model::{
    AwardOutcome, BadgeCategory, BadgeTier, LoginOutcome, NextRoute, RegisterOutcome,
};
use readtrack_core::{Engine, EngineConfig, StoreError};

fn engine() -> anyhow::Result<(Engine, i64)> {
    let engine = Engine::in_memory(EngineConfig::default())?;
    let RegisterOutcome::Success { user_id } = engine.register("Noor", "2016-12-24")? else {
        anyhow::bail!("registration failed");
    };
    Ok((engine, user_id))
}

fn story_tier(engine: &Engine, user_id: i64, story_id: i64) -> anyhow::Result<Option<BadgeTier>> {
    Ok(engine
        .story_badges(user_id, story_id)?
        .into_iter()
        .find(|b| b.badge_category == Some(BadgeCategory::StoryCompletion))
        .and_then(|b| b.badge_type))
}

#[test]
fn test_full_story_journey() -> anyhow::Result<()> {
    let (engine, user) = engine()?;

    let status = engine.finish_story(user, 1, None)?;
    assert!(status.story_completed);
    assert_eq!(status.completed_segments, 14);
    assert_eq!(status.next_route(), NextRoute::Quiz1);
    assert_eq!(story_tier(&engine, user, 1)?, Some(BadgeTier::Bronze));

    let q1 = engine.finish_quiz(user, 1, 1, 4, 5)?;
    assert_eq!(q1.badge_type, BadgeTier::Silver);
    assert!(q1.passed);
    assert_eq!(q1.story_badge, Some(BadgeTier::Silver));
    assert_eq!(story_tier(&engine, user, 1)?, Some(BadgeTier::Silver));

    let q2 = engine.finish_quiz(user, 1, 2, 5, 5)?;
    assert_eq!(q2.badge_type, BadgeTier::Gold);
    assert_eq!(story_tier(&engine, user, 1)?, Some(BadgeTier::Gold));

    let status = engine.completion_status(user, 1, None)?;
    assert_eq!(status.next_route(), NextRoute::Done);

    let stats = engine.badge_stats(user)?;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.gold, 2);
    assert_eq!(stats.silver, 1);
    Ok(())
}

#[test]
fn test_failed_quiz_keeps_story_tier() -> anyhow::Result<()> {
    let (engine, user) = engine()?;
    engine.finish_story(user, 2, Some(10))?;

    let outcome = engine.finish_quiz(user, 2, 1, 3, 5)?;
    assert_eq!(outcome.badge_type, BadgeTier::Silver);
    assert!(!outcome.passed);
    assert_eq!(outcome.story_badge, None);
    assert_eq!(story_tier(&engine, user, 2)?, Some(BadgeTier::Bronze));

    // The quiz badge is still earned and recorded.
    assert!(engine.has_badge(user, 2, BadgeCategory::Quiz1)?);
    Ok(())
}

#[test]
fn test_finish_story_does_not_lower_existing_badge() -> anyhow::Result<()> {
    let (engine, user) = engine()?;
    engine.upgrade_badge(user, 3, BadgeTier::Gold)?;
    engine.finish_story(user, 3, None)?;
    assert_eq!(story_tier(&engine, user, 3)?, Some(BadgeTier::Gold));
    Ok(())
}

#[test]
fn test_quiz_badge_only_moves_up() -> anyhow::Result<()> {
    let (engine, user) = engine()?;
    engine.finish_quiz(user, 1, 2, 5, 5)?;
    engine.finish_quiz(user, 1, 2, 1, 5)?;

    let quiz2 = engine
        .story_badges(user, 1)?
        .into_iter()
        .find(|b| b.badge_category == Some(BadgeCategory::Quiz2))
        .and_then(|b| b.badge_type);
    assert_eq!(quiz2, Some(BadgeTier::Gold));

    let best = engine.best_quiz_score(user, 1, 2)?.expect("best attempt");
    assert_eq!(best.best_score, 5);
    assert_eq!(engine.quiz_results(user, Some(1))?.len(), 2);
    assert_eq!(
        engine.award_badge(user, 1, BadgeTier::Silver, BadgeCategory::Quiz2)?,
        AwardOutcome::Unchanged {
            current: BadgeTier::Gold
        }
    );
    Ok(())
}

#[test]
fn test_invalid_quiz_number_is_rejected() -> anyhow::Result<()> {
    let (engine, user) = engine()?;
    let err = engine.finish_quiz(user, 1, 3, 5, 5).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    assert!(engine.quiz_results(user, None)?.is_empty());
    Ok(())
}

#[test]
fn test_user_stats() -> anyhow::Result<()> {
    let (engine, user) = engine()?;
    engine.finish_story(user, 1, None)?;
    engine.finish_quiz(user, 1, 1, 5, 5)?;
    engine.finish_quiz(user, 1, 2, 3, 5)?;

    let stats = engine.user_stats(user)?;
    assert_eq!(stats.progress.completed, 14);
    assert_eq!(stats.progress.total, 42);
    assert_eq!(stats.progress.percentage, 33);
    assert_eq!(stats.total_quizzes, 2);
    assert_eq!(stats.average_quiz_score, 80);
    assert_eq!(stats.total_badges, 3);
    Ok(())
}

#[test]
fn test_login_roundtrip_through_engine() -> anyhow::Result<()> {
    let (engine, user) = engine()?;
    match engine.login("Noor", "2016-12-24")? {
        LoginOutcome::Success { user: u } => assert_eq!(u.id, user),
        other => anyhow::bail!("unexpected {:?}", other),
    }
    assert!(engine.user(user)?.is_some());
    assert!(matches!(
        engine.register("Noor", "2016-12-24")?,
        RegisterOutcome::Failure { .. }
    ));
    Ok(())
}
