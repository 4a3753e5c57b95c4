//! Core engine. The public API for recording study activity.
//!
//! The engine owns the learner's progress, the badge and quest collections,
//! and the event stream. Every mutation goes through here: it updates the
//! in-memory snapshot, persists it through the storage gateway and notifies
//! subscribers. Persistence failures are logged and never abort an action.

pub mod badges;
pub mod progress;
pub mod quests;
pub mod scheduler;
pub mod transfer;

pub use progress::{EXERCISE_XP, POMODORO_XP, STREAK_MILESTONES};
pub use scheduler::{QuestScheduler, TickReport};
pub use transfer::{SNAPSHOT_VERSION, Snapshot};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::clock::{Calendar, Clock, SystemClock};
use crate::event::{Event, EventKind};
use crate::model::*;
use crate::storage::{KeyValueStore, MemoryStore, StorageGateway, StorageKey};

const EVENT_CAPACITY: usize = 256;

/// The progression engine. Owns all state and enforces all invariants.
pub struct Engine<S: KeyValueStore> {
    storage: StorageGateway<S>,
    clock: Arc<dyn Clock>,
    calendar: Calendar,
    catalog: Catalog,
    progress: Progress,
    badges: Vec<Badge>,
    quests: Vec<Quest>,
    newly_unlocked: Vec<Badge>,
    last_quest_check: Option<DateTime<Utc>>,
    events: broadcast::Sender<Event>,
    progress_tx: watch::Sender<Progress>,
    seq: u64,
}

/// Builder for loading an engine from storage.
pub struct EngineBuilder<S: KeyValueStore> {
    store: S,
    clock: Arc<dyn Clock>,
    calendar: Calendar,
    catalog: Catalog,
}

impl<S: KeyValueStore> EngineBuilder<S> {
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Read stored state, falling back to catalog defaults for anything
    /// missing or unreadable, and persist the merged result.
    pub async fn load(self) -> Engine<S> {
        let storage = StorageGateway::new(self.store);

        let mut progress: Progress = storage.get_or_default(StorageKey::Progress).await;
        let badges: Option<Vec<Badge>> = storage.get_or_else(StorageKey::Badges, || None).await;
        let quests: Option<Vec<Quest>> = storage.get_or_else(StorageKey::Quests, || None).await;
        let last_quest_check: Option<DateTime<Utc>> =
            storage.get_or_else(StorageKey::QuestCheck, || None).await;

        let repaired = level_for_xp(progress.xp);
        if progress.level != repaired {
            debug!(stored = progress.level, repaired, "repairing stored level");
            progress.level = repaired;
        }

        let first_run = badges.is_none() || quests.is_none();
        let badges = merge_by_id(badges.unwrap_or_default(), self.catalog.badges(), |b| &b.id);
        let quests = merge_by_id(quests.unwrap_or_default(), self.catalog.quests(), |q| &q.id);

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (progress_tx, _) = watch::channel(progress.clone());

        let engine = Engine {
            storage,
            clock: self.clock,
            calendar: self.calendar,
            catalog: self.catalog,
            progress,
            badges,
            quests,
            newly_unlocked: Vec::new(),
            last_quest_check,
            events,
            progress_tx,
            seq: 0,
        };

        if first_run {
            info!(
                badges = engine.badges.len(),
                quests = engine.quests.len(),
                "initialized catalog"
            );
        }
        engine.persist_all().await;
        engine
    }
}

/// Keep stored entries, append catalog entries the store doesn't know yet.
fn merge_by_id<T, F>(mut stored: Vec<T>, catalog: Vec<T>, id: F) -> Vec<T>
where
    F: Fn(&T) -> &String,
{
    let known: HashSet<String> = stored.iter().map(|t| id(t).clone()).collect();
    stored.extend(catalog.into_iter().filter(|t| !known.contains(id(t))));
    stored
}

impl Engine<MemoryStore> {
    /// An engine over a fresh in-memory store (for testing).
    pub async fn in_memory() -> Self {
        Self::builder(MemoryStore::new()).load().await
    }
}

impl<S: KeyValueStore> Engine<S> {
    pub fn builder(store: S) -> EngineBuilder<S> {
        EngineBuilder {
            store,
            clock: Arc::new(SystemClock),
            calendar: Calendar::default(),
            catalog: Catalog::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    pub fn badge(&self, id: &str) -> Option<&Badge> {
        self.badges.iter().find(|b| b.id == id)
    }

    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    pub fn quest(&self, id: &str) -> Option<&Quest> {
        self.quests.iter().find(|q| q.id == id)
    }

    pub fn quests_by_status(&self, status: QuestStatus) -> impl Iterator<Item = &Quest> {
        self.quests.iter().filter(move |q| q.status == status)
    }

    pub fn last_quest_check(&self) -> Option<DateTime<Utc>> {
        self.last_quest_check
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn storage(&self) -> &StorageGateway<S> {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Stream of every event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Latest progress snapshot; the current value is visible immediately.
    pub fn watch_progress(&self) -> watch::Receiver<Progress> {
        self.progress_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Internals shared by the submodules
    // -----------------------------------------------------------------------

    pub(crate) fn emit(&mut self, kind: EventKind) -> Event {
        self.seq += 1;
        let event = Event {
            seq: self.seq,
            timestamp: self.clock.now(),
            kind,
        };
        debug!(seq = event.seq, kind = ?event.kind, "event");
        // No receivers is fine.
        let _ = self.events.send(event.clone());
        event
    }

    pub(crate) fn emit_level_ups(&mut self, (before, after): (u32, u32)) {
        if after > before {
            info!(from = before, to = after, xp = self.progress.xp, "level up");
            self.emit(EventKind::LevelUp {
                from: before,
                to: after,
            });
        }
    }

    pub(crate) async fn persist_progress(&self) {
        self.storage
            .persist(StorageKey::Progress, &self.progress)
            .await;
        self.progress_tx.send_replace(self.progress.clone());
    }

    pub(crate) async fn persist_badges(&self) {
        self.storage.persist(StorageKey::Badges, &self.badges).await;
    }

    pub(crate) async fn persist_quests(&self) {
        self.storage.persist(StorageKey::Quests, &self.quests).await;
    }

    pub(crate) async fn persist_all(&self) {
        self.persist_progress().await;
        self.persist_badges().await;
        self.persist_quests().await;
    }
}
