//! Integration tests for export, import and reset.

use chrono::{DateTime, Duration, Utc};
use studyquest::catalog::Catalog;
use studyquest::clock::ManualClock;
use studyquest::engine::SNAPSHOT_VERSION;
use studyquest::event::EventKind;
use studyquest::exercises::ExerciseTracker;
use studyquest::model::*;
use studyquest::storage::{KeyValueStore, MemoryStore, StorageKey};
use studyquest::{Engine, Error};

fn start() -> DateTime<Utc> {
    "2026-03-02T09:00:00Z".parse().unwrap()
}

fn catalog() -> Catalog {
    Catalog::from_toml(
        r#"
        [[badge]]
        id = "hundred"
        name = "Hundred"
        category = "milestone"
        xp_reward = 25
        unlock_condition = { type = "xp_at_least", xp = 100 }

        [[badge]]
        id = "focused"
        name = "Focused"
        category = "focus"
        unlock_condition = { type = "pomodoros_at_least", sessions = 5 }

        [[quest]]
        id = "daily-pomodoro"
        title = "One pomodoro"
        quest_type = "daily"
        objective = { type = "pomodoros" }
        target = 1
        xp_reward = 10
        "#,
    )
    .unwrap()
}

async fn engine_on(store: MemoryStore) -> Engine<MemoryStore> {
    Engine::builder(store)
        .clock(ManualClock::new(start()))
        .catalog(catalog())
        .load()
        .await
}

/// An engine with some history: XP, a pomodoro, a badge and a finished quest.
async fn busy_engine() -> Engine<MemoryStore> {
    let mut engine = engine_on(MemoryStore::new()).await;
    engine.add_xp(150, XpSource::Manual, "seed").await;
    engine.record_pomodoro(30).await;
    engine.update_quest_progress(&ExerciseStats::default()).await;
    engine
}

#[tokio::test]
async fn export_import_round_trip() {
    let source = busy_engine().await;
    assert!(source.badge("hundred").unwrap().unlocked);
    assert_eq!(
        source.quest("daily-pomodoro").unwrap().status,
        QuestStatus::Completed
    );

    let json = source.export_json().unwrap();
    let mut target = engine_on(MemoryStore::new()).await;
    target.import_json(&json).await.unwrap();

    assert_eq!(target.progress(), source.progress());
    assert_eq!(target.badges(), source.badges());
    assert_eq!(target.quests(), source.quests());
}

#[tokio::test]
async fn rejected_imports_leave_state_untouched() {
    let mut engine = busy_engine().await;
    let before = engine.export();

    let err = engine.import_json("{not json").await.unwrap_err();
    assert!(matches!(err, Error::Import(_)));

    let mut bad_level = before.clone();
    bad_level.progress.level = 9;
    let err = engine.import(bad_level).await.unwrap_err();
    assert!(matches!(err, Error::Import(_)));

    let mut future = before.clone();
    future.version = SNAPSHOT_VERSION + 1;
    assert!(engine.import(future).await.is_err());

    let mut half_unlocked = before.clone();
    half_unlocked.badges[0].unlocked_at = None;
    assert!(engine.import(half_unlocked).await.is_err());

    let mut too_much = before.clone();
    too_much.progress.stats.by_subject.insert(
        "databases".to_string(),
        SubjectProgress { percentage: 120 },
    );
    assert!(engine.import(too_much).await.is_err());

    assert_eq!(engine.progress(), &before.progress);
    assert_eq!(engine.badges(), before.badges.as_slice());
}

#[tokio::test]
async fn imported_quests_must_link_to_known_ids() {
    let mut engine = busy_engine().await;
    let before = engine.export();

    let mut zero_target = before.clone();
    zero_target.quests[0].objective.target = 0;
    let err = engine.import(zero_target).await.unwrap_err();
    assert!(matches!(err, Error::Import(_)));

    let mut dangling_prereq = before.clone();
    dangling_prereq.quests[0].prerequisites = vec!["ghost".to_string()];
    let err = engine.import(dangling_prereq).await.unwrap_err();
    assert!(matches!(err, Error::Import(_)));

    let mut dangling_badge = before.clone();
    dangling_badge.quests[0].rewards.badge = Some("ghost".to_string());
    let err = engine.import(dangling_badge).await.unwrap_err();
    assert!(matches!(err, Error::Import(_)));

    assert_eq!(engine.progress(), &before.progress);
    assert_eq!(engine.quests(), before.quests.as_slice());
}

#[tokio::test]
async fn missing_entries_fall_back_to_catalog() {
    let mut engine = busy_engine().await;
    let mut snapshot = engine.export();
    snapshot.badges.retain(|b| b.id == "hundred");
    snapshot.quests.clear();

    engine.import(snapshot).await.unwrap();

    assert!(engine.badge("hundred").unwrap().unlocked);
    assert!(!engine.badge("focused").unwrap().unlocked);
    // An empty quest list keeps the current quests.
    assert_eq!(
        engine.quest("daily-pomodoro").unwrap().status,
        QuestStatus::Completed
    );
}

#[tokio::test]
async fn import_emits_event_and_persists() {
    let store = MemoryStore::new();
    let source = busy_engine().await;

    let mut engine = engine_on(store.clone()).await;
    let mut events = engine.subscribe();
    engine.import(source.export()).await.unwrap();
    assert_eq!(events.try_recv().unwrap().kind, EventKind::DataImported);
    drop(engine);

    let reloaded = engine_on(store).await;
    assert_eq!(reloaded.progress(), source.progress());
    assert!(reloaded.badge("hundred").unwrap().unlocked);
}

#[tokio::test]
async fn reset_restores_catalog_defaults() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(start());
    let mut engine = Engine::builder(store.clone())
        .clock(clock.clone())
        .catalog(catalog())
        .load()
        .await;
    let tracker = ExerciseTracker::new(store.clone());
    tracker.complete("ex-1", "databases", None, start()).await;
    engine.add_xp(150, XpSource::Manual, "seed").await;
    engine.check_schedule(&tracker.stats().await).await;
    clock.advance(Duration::hours(1));

    engine.reset().await;

    assert_eq!(engine.progress(), &Progress::default());
    assert!(engine.badges().iter().all(|b| !b.unlocked));
    assert!(engine.newly_unlocked().is_empty());
    assert_eq!(engine.last_quest_check(), None);
    assert_eq!(store.get(StorageKey::QuestCheck).await.unwrap(), None);
    assert_eq!(store.get(StorageKey::Exercises).await.unwrap(), None);
    assert!(tracker.records().await.is_empty());

    let reloaded = engine_on(store).await;
    assert_eq!(reloaded.progress().xp, 0);
}
