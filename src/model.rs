//! Core data model.
//!
//! One [`Progress`] per installation, plus the badge and quest catalogs the
//! engine owns after first run. Exercise records belong to the exercise
//! tracker and are only read here.

pub mod badge;
pub mod exercise;
pub mod progress;
pub mod quest;

pub use badge::{Badge, BadgeCategory, UnlockCondition};
pub use exercise::{ExerciseRecord, ExerciseStats};
pub use progress::{
    LEVEL_UP_HISTORY_CAP, LevelUp, Progress, ProgressStats, SubjectProgress, XP_HISTORY_CAP,
    XpSource, XpTransaction, level_for_xp, xp_for_level, xp_to_next_level,
};
pub use quest::{Objective, ObjectiveKind, Quest, QuestRewards, QuestStatus, QuestType};
