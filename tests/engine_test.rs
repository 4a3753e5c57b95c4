//! Integration tests for the progress tracker and badge unlocker.

use chrono::{DateTime, Duration, Utc};
use studyquest::Engine;
use studyquest::catalog::Catalog;
use studyquest::clock::ManualClock;
use studyquest::event::EventKind;
use studyquest::model::*;
use studyquest::storage::MemoryStore;

fn start() -> DateTime<Utc> {
    // A Monday morning.
    "2026-03-02T09:00:00Z".parse().unwrap()
}

fn empty_catalog() -> Catalog {
    Catalog {
        badges: Vec::new(),
        quests: Vec::new(),
    }
}

async fn test_engine(catalog: Catalog) -> (Engine<MemoryStore>, ManualClock) {
    let clock = ManualClock::new(start());
    let engine = Engine::builder(MemoryStore::new())
        .clock(clock.clone())
        .catalog(catalog)
        .load()
        .await;
    (engine, clock)
}

// ---------------------------------------------------------------------------
// XP and levels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_awards_on_the_same_day() {
    let (mut engine, _clock) = test_engine(empty_catalog()).await;

    for _ in 0..3 {
        engine.add_xp(50, XpSource::Exercise, "exercise").await;
    }

    let progress = engine.progress();
    assert_eq!(progress.xp, 150);
    assert_eq!(progress.xp_history.len(), 3);
    assert_eq!(progress.streak, 1);
    assert_eq!(progress.level, level_for_xp(150));
    assert_eq!(progress.level, 2);
    assert_eq!(progress.last_activity_date, Some(start()));
}

#[tokio::test]
async fn crossing_thresholds_appends_level_ups() {
    let (mut engine, _clock) = test_engine(empty_catalog()).await;

    engine.add_xp(80, XpSource::Manual, "warm-up").await;
    assert!(engine.progress().level_up_history.is_empty());

    engine.add_xp(570, XpSource::Manual, "big session").await;
    let progress = engine.progress();
    assert_eq!(progress.level, 4);
    let levels: Vec<u32> = progress.level_up_history.iter().map(|l| l.level).collect();
    assert_eq!(levels, vec![2, 3, 4]);
    assert!(progress.level_up_history.iter().all(|l| l.total_xp == 650));

    let last = progress.xp_history.last().unwrap();
    assert_eq!((last.level_before, last.level_after), (1, 4));
}

#[tokio::test]
async fn huge_award_keeps_level_history_bounded() {
    let (mut engine, _clock) = test_engine(empty_catalog()).await;

    engine.add_xp(u64::MAX, XpSource::Manual, "everything").await;

    let progress = engine.progress();
    assert_eq!(progress.level, level_for_xp(u64::MAX));
    assert_eq!(progress.level_up_history.len(), LEVEL_UP_HISTORY_CAP);
    assert_eq!(progress.level_up_history.last().unwrap().level, progress.level);
}

#[tokio::test]
async fn zero_xp_is_ignored() {
    let (mut engine, _clock) = test_engine(empty_catalog()).await;
    engine.add_xp(0, XpSource::Manual, "nothing").await;
    assert_eq!(engine.progress(), &Progress::default());
}

#[tokio::test]
async fn history_keeps_the_most_recent_hundred() {
    let (mut engine, _clock) = test_engine(empty_catalog()).await;
    for i in 1..=105u64 {
        engine.add_xp(i, XpSource::Manual, format!("award {i}")).await;
    }
    let history = &engine.progress().xp_history;
    assert_eq!(history.len(), 100);
    assert_eq!(history[0].amount, 6);
    assert_eq!(engine.progress().xp, (1..=105u64).sum::<u64>());
}

// ---------------------------------------------------------------------------
// Streaks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consecutive_days_extend_the_streak() {
    let (mut engine, clock) = test_engine(empty_catalog()).await;

    engine.add_xp(10, XpSource::Exercise, "day 1").await;
    clock.advance(Duration::days(1));
    engine.add_xp(10, XpSource::Exercise, "day 2").await;
    // Second activity on day 2 doesn't count twice.
    engine.add_xp(10, XpSource::Exercise, "day 2 again").await;

    assert_eq!(engine.progress().streak, 2);
    assert_eq!(engine.progress().longest_streak, 2);
    assert_eq!(engine.progress().streak_start_date, Some(start()));
}

#[tokio::test]
async fn gap_resets_streak_then_counts_today() {
    let (mut engine, clock) = test_engine(empty_catalog()).await;

    for _ in 0..3 {
        engine.add_xp(10, XpSource::Exercise, "daily").await;
        clock.advance(Duration::days(1));
    }
    assert_eq!(engine.progress().streak, 3);

    // Three days after the last activity.
    clock.advance(Duration::days(2));
    let mut events = engine.subscribe();
    engine.add_xp(10, XpSource::Exercise, "back again").await;

    assert_eq!(engine.progress().streak, 1);
    assert!(engine.progress().longest_streak >= 3);
    assert_eq!(engine.progress().streak_start_date, Some(clock_now(&clock)));

    let first = events.try_recv().unwrap();
    assert_eq!(
        first.kind,
        EventKind::StreakBroken {
            previous: 3,
            longest: 3
        }
    );
}

fn clock_now(clock: &ManualClock) -> DateTime<Utc> {
    use studyquest::clock::Clock;
    clock.now()
}

#[tokio::test]
async fn check_streak_breaks_stale_streak_without_activity() {
    let (mut engine, clock) = test_engine(empty_catalog()).await;

    engine.add_xp(10, XpSource::Exercise, "day 1").await;
    clock.advance(Duration::days(1));
    engine.add_xp(10, XpSource::Exercise, "day 2").await;

    clock.advance(Duration::days(1));
    assert!(!engine.check_streak().await, "yesterday's streak is still alive");

    clock.advance(Duration::days(1));
    assert!(engine.check_streak().await);
    assert_eq!(engine.progress().streak, 0);
    assert_eq!(engine.progress().longest_streak, 2);
    assert!(!engine.check_streak().await, "already broken");

    engine.add_xp(10, XpSource::Exercise, "restart").await;
    assert_eq!(engine.progress().streak, 1);
}

#[tokio::test]
async fn seventh_day_grants_milestone_bonus() {
    let (mut engine, clock) = test_engine(empty_catalog()).await;

    for day in 1..=7 {
        engine.add_xp(10, XpSource::Exercise, format!("day {day}")).await;
        if day < 7 {
            clock.advance(Duration::days(1));
        }
    }

    let progress = engine.progress();
    assert_eq!(progress.streak, 7);
    assert_eq!(progress.xp, 70 + 100);
    let last = progress.xp_history.last().unwrap();
    assert_eq!(last.source, XpSource::StreakBonus);
    assert_eq!(last.amount, 100);

    // Bonus is granted once, not on every activity that day.
    engine.add_xp(10, XpSource::Exercise, "again").await;
    assert_eq!(engine.progress().xp, 180);
}

// ---------------------------------------------------------------------------
// Subjects and pomodoros
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subject_percentage_is_clamped() {
    let (mut engine, _clock) = test_engine(empty_catalog()).await;

    engine.update_subject_progress("databases", 140.0).await;
    engine.update_subject_progress("design", -5.0).await;
    engine.update_subject_progress("networking", 42.4).await;

    let progress = engine.progress();
    assert_eq!(progress.subject_percentage("databases"), 100);
    assert_eq!(progress.subject_percentage("design"), 0);
    assert_eq!(progress.subject_percentage("networking"), 42);
    // Subject updates are not XP activity.
    assert_eq!(progress.streak, 0);
}

#[tokio::test]
async fn pomodoro_counts_session_hours_and_xp() {
    let (mut engine, _clock) = test_engine(empty_catalog()).await;

    engine.record_pomodoro(30).await;
    engine.record_pomodoro(0).await;

    let progress = engine.progress();
    assert_eq!(progress.stats.pomodoro_sessions, 1);
    assert_eq!(progress.stats.total_hours, 0.5);
    assert_eq!(progress.xp, studyquest::engine::POMODORO_XP);
    assert_eq!(progress.xp_history[0].source, XpSource::Pomodoro);
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

fn badge_catalog() -> Catalog {
    Catalog::from_toml(
        r#"
        [[badge]]
        id = "hundred"
        name = "Hundred"
        category = "milestone"
        xp_reward = 25
        unlock_condition = { type = "xp_at_least", xp = 100 }

        [[badge]]
        id = "one-twenty"
        name = "One Twenty"
        category = "milestone"
        xp_reward = 5
        unlock_condition = { type = "xp_at_least", xp = 120 }

        [[badge]]
        id = "db-half"
        name = "Half a Database"
        category = "subject"
        xp_reward = 0
        unlock_condition = { type = "subject_percentage", subject = "databases", percentage = 50 }
        "#,
    )
    .unwrap()
}

#[tokio::test]
async fn badge_rewards_cascade_and_are_logged() {
    let (mut engine, _clock) = test_engine(badge_catalog()).await;

    engine.add_xp(100, XpSource::Exercise, "big day").await;

    // 100 unlocks "hundred" (+25), which pushes past 120 (+5).
    assert_eq!(engine.progress().xp, 130);
    assert!(engine.badge("hundred").unwrap().unlocked);
    assert!(engine.badge("one-twenty").unwrap().unlocked);

    let badge_grants: Vec<u64> = engine
        .progress()
        .xp_history
        .iter()
        .filter(|t| t.source == XpSource::Badge)
        .map(|t| t.amount)
        .collect();
    assert_eq!(badge_grants, vec![25, 5]);

    let pending: Vec<String> = engine.newly_unlocked().iter().map(|b| b.id.clone()).collect();
    assert_eq!(pending, vec!["hundred", "one-twenty"]);
    assert_eq!(engine.clear_newly_unlocked().len(), 2);
    assert!(engine.newly_unlocked().is_empty());
}

#[tokio::test]
async fn badges_never_relock() {
    let (mut engine, _clock) = test_engine(badge_catalog()).await;

    engine.update_subject_progress("databases", 60.0).await;
    let unlocked_at = engine.badge("db-half").unwrap().unlocked_at;
    assert!(unlocked_at.is_some());

    engine.update_subject_progress("databases", 10.0).await;
    let badge = engine.badge("db-half").unwrap();
    assert!(badge.unlocked);
    assert_eq!(badge.unlocked_at, unlocked_at);
    assert!(engine.check_unlocks().await.is_empty());
}

#[tokio::test]
async fn manual_unlock_grants_reward_once() {
    let (mut engine, _clock) = test_engine(badge_catalog()).await;

    let badge = engine.unlock_badge("hundred").await.unwrap();
    assert_eq!(badge.id, "hundred");
    assert_eq!(engine.progress().xp, 25);
    assert!(engine.unlock_badge("hundred").await.is_none());
    assert!(engine.unlock_badge("missing").await.is_none());
    assert_eq!(engine.progress().xp, 25);
}

#[tokio::test]
async fn default_catalog_first_steps() {
    let mut engine = Engine::in_memory().await;
    engine.add_xp(10, XpSource::Exercise, "first").await;

    assert!(engine.badge("first-steps").unwrap().unlocked);
    assert_eq!(engine.progress().xp, 20);
    assert_eq!(engine.unlocked_badges().count(), 1);
}

// ---------------------------------------------------------------------------
// Notifications and persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_have_monotonic_seq() {
    let (mut engine, _clock) = test_engine(badge_catalog()).await;
    let mut events = engine.subscribe();

    engine.add_xp(100, XpSource::Exercise, "big day").await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(received.len() >= 4);
    for window in received.windows(2) {
        assert!(window[1].seq > window[0].seq);
    }
    assert!(received.iter().any(|e| matches!(
        &e.kind,
        EventKind::BadgeUnlocked { id, .. } if id == "hundred"
    )));
    assert!(received.iter().any(|e| matches!(e.kind, EventKind::LevelUp { from: 1, to: 2 })));
}

#[tokio::test]
async fn watch_replays_latest_progress() {
    let (mut engine, _clock) = test_engine(empty_catalog()).await;
    engine.add_xp(40, XpSource::Note, "notes").await;

    let watcher = engine.watch_progress();
    assert_eq!(watcher.borrow().xp, 40);

    engine.add_xp(2, XpSource::Note, "more").await;
    assert_eq!(watcher.borrow().xp, 42);
}

#[tokio::test]
async fn state_survives_reload() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(start());

    let mut engine = Engine::builder(store.clone())
        .clock(clock.clone())
        .catalog(badge_catalog())
        .load()
        .await;
    engine.add_xp(100, XpSource::Exercise, "persisted").await;
    let progress = engine.progress().clone();
    drop(engine);

    let reloaded = Engine::builder(store)
        .clock(clock)
        .catalog(badge_catalog())
        .load()
        .await;
    assert_eq!(reloaded.progress(), &progress);
    assert!(reloaded.badge("hundred").unwrap().unlocked);
    assert!(reloaded.newly_unlocked().is_empty());
}

#[tokio::test]
async fn new_catalog_entries_are_merged_on_load() {
    let store = MemoryStore::new();
    let mut engine = Engine::builder(store.clone())
        .catalog(empty_catalog())
        .load()
        .await;
    engine.add_xp(150, XpSource::Manual, "before catalog grew").await;
    drop(engine);

    let mut engine = Engine::builder(store).catalog(badge_catalog()).load().await;
    assert_eq!(engine.badges().len(), 3);
    assert!(!engine.badge("hundred").unwrap().unlocked);

    let unlocked = engine.check_unlocks().await;
    assert_eq!(unlocked.len(), 2);
}
