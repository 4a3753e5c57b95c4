//! Quests: tracked goals with an objective, a reward and a lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Quest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub quest_type: QuestType,
    pub status: QuestStatus,
    pub objective: Objective,
    pub rewards: QuestRewards,
    /// Quest ids that must be completed before this one unlocks.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Quest unlocked when this one completes.
    #[serde(default)]
    pub next_quest: Option<String>,
    #[serde(default)]
    pub minimum_level: Option<u32>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Quest {
    pub fn is_objective_met(&self) -> bool {
        self.objective.current >= self.objective.target
    }

    /// Move to `to` if the edge is allowed, stamping timestamps.
    pub(crate) fn transition(&mut self, to: QuestStatus, at: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(to) {
            return false;
        }
        match to {
            QuestStatus::InProgress => self.started_at = Some(at),
            QuestStatus::Completed => self.completed_at = Some(at),
            QuestStatus::Available | QuestStatus::Locked => {}
        }
        self.status = to;
        true
    }

    /// Fresh objective for a new period. Locked quests stay locked; only
    /// the unlock check may open them.
    pub(crate) fn regenerate(&mut self, baseline: u32, deadline: DateTime<Utc>) {
        if self.status != QuestStatus::Locked {
            self.status = QuestStatus::Available;
        }
        self.objective.current = 0;
        self.objective.baseline = baseline;
        self.deadline = Some(deadline);
        self.started_at = None;
        self.completed_at = None;
    }
}

// ---------------------------------------------------------------------------
// Type & status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    Daily,
    Weekly,
    Main,
    Side,
}

impl QuestType {
    /// Periodic quests measure progress since their last regeneration.
    pub fn is_periodic(self) -> bool {
        matches!(self, QuestType::Daily | QuestType::Weekly)
    }
}

impl std::fmt::Display for QuestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuestType::Daily => "daily",
            QuestType::Weekly => "weekly",
            QuestType::Main => "main",
            QuestType::Side => "side",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// Waiting on prerequisites or level.
    Locked,
    /// Can be started.
    Available,
    /// Progress recorded or started manually.
    InProgress,
    /// Objective met, reward granted. Terminal until regeneration.
    Completed,
}

impl QuestStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: QuestStatus) -> bool {
        use QuestStatus::*;
        matches!(
            (self, to),
            (Locked, Available)
                | (Available, InProgress)
                | (Available, Completed)    // objective met in a single update
                | (InProgress, Completed)
                | (InProgress, Available) // abandoned
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, QuestStatus::Available | QuestStatus::InProgress)
    }
}

impl std::fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuestStatus::Locked => "locked",
            QuestStatus::Available => "available",
            QuestStatus::InProgress => "in_progress",
            QuestStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Objective & rewards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub target: u32,
    #[serde(default)]
    pub current: u32,
    /// Counter value at the last regeneration; periodic quests count from here.
    #[serde(default)]
    pub baseline: u32,
}

/// Which external counter an objective tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectiveKind {
    ExercisesCompleted,
    Pomodoros,
    Streak,
    SubjectPercentage { subject: String },
    TotalHours,
    Level,
    Xp,
    BadgesUnlocked,
    AverageScore,
}

impl std::fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveKind::ExercisesCompleted => write!(f, "exercises_completed"),
            ObjectiveKind::Pomodoros => write!(f, "pomodoros"),
            ObjectiveKind::Streak => write!(f, "streak"),
            ObjectiveKind::SubjectPercentage { subject } => {
                write!(f, "subject_percentage({subject})")
            }
            ObjectiveKind::TotalHours => write!(f, "total_hours"),
            ObjectiveKind::Level => write!(f, "level"),
            ObjectiveKind::Xp => write!(f, "xp"),
            ObjectiveKind::BadgesUnlocked => write!(f, "badges_unlocked"),
            ObjectiveKind::AverageScore => write!(f, "average_score"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestRewards {
    pub xp: u64,
    #[serde(default)]
    pub badge: Option<String>,
}
