//! Periodic re-evaluation: streak expiry, daily/weekly regeneration and
//! quest progress.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use super::Engine;
use crate::exercises::ExerciseStatsSource;
use crate::model::ExerciseStats;
use crate::storage::KeyValueStore;

/// What a single scheduler pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub streak_broken: bool,
    pub daily_regenerated: bool,
    pub weekly_regenerated: bool,
    pub completed_quests: Vec<String>,
}

impl<S: KeyValueStore> Engine<S> {
    /// Every time-based check, in order: expire a stale streak, roll
    /// daily/weekly quests over a boundary, then re-evaluate quest progress.
    /// Run once at session start and on every scheduler tick.
    pub async fn run_checks(&mut self, exercises: &ExerciseStats) -> TickReport {
        let streak_broken = self.check_streak().await;
        let (daily_regenerated, weekly_regenerated) = self.check_schedule(exercises).await;
        let completed_quests = self.update_quest_progress(exercises).await;

        TickReport {
            streak_broken,
            daily_regenerated,
            weekly_regenerated,
            completed_quests,
        }
    }
}

/// Runs the engine's time-based checks at session start and then every
/// `interval` until shut down.
pub struct QuestScheduler<S: KeyValueStore, X> {
    engine: Arc<Mutex<Engine<S>>>,
    source: Arc<X>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl<S: KeyValueStore, X> Clone for QuestScheduler<S, X> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            source: Arc::clone(&self.source),
            interval: self.interval,
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<S: KeyValueStore, X: ExerciseStatsSource> QuestScheduler<S, X> {
    pub fn new(engine: Arc<Mutex<Engine<S>>>, source: X, interval: Duration) -> Self {
        Self {
            engine,
            source: Arc::new(source),
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn engine(&self) -> &Arc<Mutex<Engine<S>>> {
        &self.engine
    }

    /// Signal the loop to stop. Safe to call before `run`.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// One pass of every time-based check.
    pub async fn tick(&self) -> TickReport {
        let stats = self.source.exercise_stats().await;
        let report = self.engine.lock().await.run_checks(&stats).await;
        debug!(?report, "scheduler tick");
        report
    }

    /// Tick immediately, then every `interval`, until [`shutdown`](Self::shutdown).
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "quest scheduler started");
        self.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("quest scheduler shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.tick().await;
                }
            }
        }
    }
}
