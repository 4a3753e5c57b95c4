//! Integration tests for the SQLite backend.

use chrono::{DateTime, Utc};
use serde_json::json;

use studyquest::Engine;
use studyquest::catalog::Catalog;
use studyquest::clock::ManualClock;
use studyquest::model::*;
use studyquest::storage::{KeyValueStore, SqliteStore, StorageGateway, StorageKey};

fn start() -> DateTime<Utc> {
    "2026-03-02T09:00:00Z".parse().unwrap()
}

#[tokio::test]
async fn sqlite_set_get_remove() {
    let store = SqliteStore::in_memory().await.unwrap();
    store.health_check().await.unwrap();

    assert_eq!(store.get(StorageKey::Notes).await.unwrap(), None);

    store.set(StorageKey::Notes, json!(["first"])).await.unwrap();
    store
        .set(StorageKey::Notes, json!(["first", "second"]))
        .await
        .unwrap();
    assert_eq!(
        store.get(StorageKey::Notes).await.unwrap(),
        Some(json!(["first", "second"]))
    );

    store.remove(StorageKey::Notes).await.unwrap();
    assert_eq!(store.get(StorageKey::Notes).await.unwrap(), None);
    // Removing a missing key is fine.
    store.remove(StorageKey::Notes).await.unwrap();
}

#[tokio::test]
async fn sqlite_file_survives_reconnect() {
    let path = std::env::temp_dir().join(format!("studyquest-{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());

    let store = SqliteStore::connect(&url).await.unwrap();
    store
        .set(StorageKey::Planning, json!({"day": 3}))
        .await
        .unwrap();
    drop(store);

    let store = SqliteStore::connect(&url).await.unwrap();
    assert_eq!(
        store.get(StorageKey::Planning).await.unwrap(),
        Some(json!({"day": 3}))
    );
    drop(store);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn gateway_batches_over_sqlite() {
    let gateway = StorageGateway::new(SqliteStore::in_memory().await.unwrap());
    let results = gateway
        .set_multiple(vec![
            (StorageKey::Notes, json!(["n"])),
            (StorageKey::Summaries, json!(["s"])),
        ])
        .await;
    assert!(results.iter().all(|r| r.is_ok()));

    let values = gateway
        .get_multiple(&[StorageKey::Notes, StorageKey::Summaries, StorageKey::PomodoroSessions])
        .await;
    assert_eq!(values[&StorageKey::Notes], Some(json!(["n"])));
    assert_eq!(values[&StorageKey::Summaries], Some(json!(["s"])));
    assert_eq!(values[&StorageKey::PomodoroSessions], None);
}

#[tokio::test]
async fn engine_state_survives_reload_over_sqlite() {
    let store = SqliteStore::in_memory().await.unwrap();
    let clock = ManualClock::new(start());

    let mut engine = Engine::builder(store.clone())
        .clock(clock.clone())
        .catalog(Catalog::default())
        .load()
        .await;
    engine.add_xp(120, XpSource::Exercise, "Exercise completed").await;
    engine.update_subject_progress("databases", 50.0).await;
    let progress = engine.progress().clone();
    let badges = engine.badges().to_vec();
    drop(engine);

    let engine = Engine::builder(store)
        .clock(clock)
        .catalog(Catalog::default())
        .load()
        .await;
    assert_eq!(engine.progress(), &progress);
    assert_eq!(engine.badges(), badges.as_slice());
}

#[tokio::test]
async fn unreadable_progress_falls_back_to_default() {
    let store = SqliteStore::in_memory().await.unwrap();
    store
        .set(StorageKey::Progress, json!("not a progress record"))
        .await
        .unwrap();

    let engine = Engine::builder(store.clone())
        .catalog(Catalog::default())
        .load()
        .await;
    assert_eq!(engine.progress(), &Progress::default());

    // The repaired default was written back.
    let stored = store.get(StorageKey::Progress).await.unwrap().unwrap();
    assert_eq!(stored["xp"], json!(0));
}
