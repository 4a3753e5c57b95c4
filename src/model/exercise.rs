//! Exercise records, owned by the exercise tracker and read by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub id: String,
    pub subject: String,
    pub completed: bool,
    /// 0..=100, if graded.
    pub score: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Read-only summary the quest engine consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseStats {
    pub completed: u32,
    pub average_score: f64,
}

impl ExerciseStats {
    pub fn from_records(records: &[ExerciseRecord]) -> Self {
        let completed: Vec<&ExerciseRecord> = records.iter().filter(|r| r.completed).collect();
        let scores: Vec<f64> = completed.iter().filter_map(|r| r.score).collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        Self {
            completed: completed.len() as u32,
            average_score,
        }
    }
}
