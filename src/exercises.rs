//! Exercise tracker.
//!
//! Owns the exercise records and hands the engine a read-only
//! [`ExerciseStats`] summary. The engine only ever touches exercise data to
//! wipe it on reset.

use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::model::{ExerciseRecord, ExerciseStats};
use crate::storage::{KeyValueStore, StorageGateway, StorageKey};

/// Anything that can report current exercise stats.
pub trait ExerciseStatsSource: Send + Sync + 'static {
    fn exercise_stats(&self) -> impl Future<Output = ExerciseStats> + Send;
}

/// Fixed stats, handy when the counters live elsewhere.
impl ExerciseStatsSource for ExerciseStats {
    async fn exercise_stats(&self) -> ExerciseStats {
        *self
    }
}

#[derive(Clone)]
pub struct ExerciseTracker<S> {
    storage: StorageGateway<S>,
}

impl<S: KeyValueStore> ExerciseTracker<S> {
    pub fn new(store: S) -> Self {
        Self {
            storage: StorageGateway::new(store),
        }
    }

    pub async fn records(&self) -> Vec<ExerciseRecord> {
        self.storage.get_or_default(StorageKey::Exercises).await
    }

    pub async fn stats(&self) -> ExerciseStats {
        ExerciseStats::from_records(&self.records().await)
    }

    /// Mark an exercise done. Returns false if it was already completed, so
    /// callers can avoid awarding XP twice.
    pub async fn complete(
        &self,
        id: &str,
        subject: &str,
        score: Option<f64>,
        at: DateTime<Utc>,
    ) -> bool {
        let mut records = self.records().await;
        let score = score.filter(|s| s.is_finite()).map(|s| s.clamp(0.0, 100.0));

        match records.iter_mut().find(|r| r.id == id) {
            Some(record) if record.completed => {
                warn!(exercise = id, "exercise already completed");
                return false;
            }
            Some(record) => {
                record.completed = true;
                record.score = score;
                record.completed_at = Some(at);
            }
            None => records.push(ExerciseRecord {
                id: id.to_string(),
                subject: subject.to_string(),
                completed: true,
                score,
                completed_at: Some(at),
            }),
        }

        info!(exercise = id, subject, ?score, "exercise completed");
        self.storage.persist(StorageKey::Exercises, &records).await;
        true
    }

    /// Completion percentage for one subject across its known exercises.
    pub async fn subject_percentage(&self, subject: &str) -> f64 {
        let records = self.records().await;
        let (done, total) = records
            .iter()
            .filter(|r| r.subject == subject)
            .fold((0u32, 0u32), |(done, total), r| {
                (done + u32::from(r.completed), total + 1)
            });
        if total == 0 {
            0.0
        } else {
            f64::from(done) * 100.0 / f64::from(total)
        }
    }

    /// Register exercises that exist but aren't done yet, so subject
    /// percentages have a denominator. Existing ids are left alone.
    pub async fn register(&self, exercises: &[(&str, &str)]) {
        let mut records = self.records().await;
        let mut added = 0;
        for (id, subject) in exercises {
            if records.iter().any(|r| r.id == *id) {
                continue;
            }
            records.push(ExerciseRecord {
                id: id.to_string(),
                subject: subject.to_string(),
                completed: false,
                score: None,
                completed_at: None,
            });
            added += 1;
        }
        if added > 0 {
            self.storage.persist(StorageKey::Exercises, &records).await;
        }
    }
}

impl<S: KeyValueStore> ExerciseStatsSource for ExerciseTracker<S> {
    async fn exercise_stats(&self) -> ExerciseStats {
        self.stats().await
    }
}
