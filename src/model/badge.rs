//! Achievement badges and their unlock predicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::progress::Progress;

/// A one-way unlockable achievement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: BadgeCategory,
    pub unlock_condition: UnlockCondition,
    pub xp_reward: u64,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Badge {
    /// Does the current progress satisfy this badge's predicate?
    pub fn is_satisfied_by(&self, progress: &Progress) -> bool {
        self.unlock_condition.is_met(progress)
    }

    /// Mark unlocked. Returns false if it already was.
    pub(crate) fn unlock(&mut self, at: DateTime<Utc>) -> bool {
        if self.unlocked {
            return false;
        }
        self.unlocked = true;
        self.unlocked_at = Some(at);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    Milestone,
    Streak,
    Subject,
    Focus,
    Special,
}

impl std::fmt::Display for BadgeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BadgeCategory::Milestone => "milestone",
            BadgeCategory::Streak => "streak",
            BadgeCategory::Subject => "subject",
            BadgeCategory::Focus => "focus",
            BadgeCategory::Special => "special",
        };
        write!(f, "{s}")
    }
}

/// Predicate evaluated against a [`Progress`] snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnlockCondition {
    XpAtLeast { xp: u64 },
    LevelAtLeast { level: u32 },
    StreakAtLeast { days: u32 },
    LongestStreakAtLeast { days: u32 },
    PomodorosAtLeast { sessions: u32 },
    TotalHoursAtLeast { hours: f64 },
    SubjectPercentage { subject: String, percentage: u8 },
    /// Every listed subject (or every tracked subject, if the list is empty)
    /// at or above `percentage`.
    AllSubjectsAtLeast {
        percentage: u8,
        #[serde(default)]
        subjects: Vec<String>,
    },
    /// Only unlocked explicitly, e.g. as a quest reward.
    Manual,
}

impl UnlockCondition {
    pub fn is_met(&self, progress: &Progress) -> bool {
        match self {
            UnlockCondition::XpAtLeast { xp } => progress.xp >= *xp,
            UnlockCondition::LevelAtLeast { level } => progress.level >= *level,
            UnlockCondition::StreakAtLeast { days } => progress.streak >= *days,
            UnlockCondition::LongestStreakAtLeast { days } => {
                progress.longest_streak.max(progress.streak) >= *days
            }
            UnlockCondition::PomodorosAtLeast { sessions } => {
                progress.stats.pomodoro_sessions >= *sessions
            }
            UnlockCondition::TotalHoursAtLeast { hours } => progress.stats.total_hours >= *hours,
            UnlockCondition::SubjectPercentage {
                subject,
                percentage,
            } => progress.subject_percentage(subject) >= *percentage,
            UnlockCondition::AllSubjectsAtLeast {
                percentage,
                subjects,
            } => {
                if subjects.is_empty() {
                    !progress.stats.by_subject.is_empty()
                        && progress
                            .stats
                            .by_subject
                            .values()
                            .all(|s| s.percentage >= *percentage)
                } else {
                    subjects
                        .iter()
                        .all(|s| progress.subject_percentage(s) >= *percentage)
                }
            }
            UnlockCondition::Manual => false,
        }
    }
}
