//! Structured events emitted by the engine on every state change.
//!
//! Consumers subscribe to the event stream to drive notifications or an
//! activity feed. Progress snapshots are also published on a watch channel so
//! a late subscriber immediately sees the latest value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{QuestStatus, QuestType, XpSource};

/// A structured event emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    XpAwarded {
        amount: u64,
        source: XpSource,
        total_xp: u64,
    },
    LevelUp {
        from: u32,
        to: u32,
    },
    StreakExtended {
        streak: u32,
    },
    StreakBroken {
        previous: u32,
        longest: u32,
    },
    StreakMilestone {
        streak: u32,
        bonus_xp: u64,
    },
    SubjectProgressUpdated {
        subject: String,
        percentage: u8,
    },
    PomodoroRecorded {
        minutes: u32,
        sessions: u32,
    },
    BadgeUnlocked {
        id: String,
        name: String,
        xp_reward: u64,
    },
    QuestUnlocked {
        id: String,
    },
    QuestStarted {
        id: String,
    },
    QuestProgressed {
        id: String,
        current: u32,
        target: u32,
    },
    QuestCompleted {
        id: String,
        xp_reward: u64,
    },
    QuestAbandoned {
        id: String,
    },
    QuestsRegenerated {
        quest_type: QuestType,
        count: usize,
    },
    QuestTransition {
        id: String,
        from: QuestStatus,
        to: QuestStatus,
    },
    DataImported,
    ProgressReset,
}
