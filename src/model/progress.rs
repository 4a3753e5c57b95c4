//! Learner progress: XP, level, streak and per-subject completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Maximum number of transactions retained in `xp_history`.
pub const XP_HISTORY_CAP: usize = 100;

/// Maximum number of entries retained in `level_up_history`.
pub const LEVEL_UP_HISTORY_CAP: usize = 100;

// ---------------------------------------------------------------------------
// Level curve
// ---------------------------------------------------------------------------

/// Cumulative XP needed to reach `level`. Level `n -> n + 1` costs `100 * n`.
pub fn xp_for_level(level: u32) -> u64 {
    u64::try_from(threshold(level)).unwrap_or(u64::MAX)
}

fn threshold(level: u32) -> u128 {
    let n = u128::from(level.max(1));
    50 * n * (n - 1)
}

/// Level reached with `xp` total experience. Always at least 1.
pub fn level_for_xp(xp: u64) -> u32 {
    let xp = u128::from(xp);
    // Solve 50n(n-1) <= xp, then correct for float rounding.
    let estimate = (1.0 + (1.0 + xp as f64 / 12.5).sqrt()) / 2.0;
    let mut level = (estimate as u32).max(1);
    while level > 1 && threshold(level) > xp {
        level -= 1;
    }
    while xp >= threshold(level + 1) {
        level += 1;
    }
    level
}

/// XP still missing before the next level.
pub fn xp_to_next_level(xp: u64) -> u64 {
    xp_for_level(level_for_xp(xp) + 1).saturating_sub(xp)
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// The learner's cumulative progress. Singleton per installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub xp: u64,
    /// Always equal to `level_for_xp(xp)`.
    pub level: u32,
    pub streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub streak_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: ProgressStats,
    /// Oldest first, capped at [`XP_HISTORY_CAP`].
    #[serde(default)]
    pub xp_history: Vec<XpTransaction>,
    #[serde(default)]
    pub level_up_history: Vec<LevelUp>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            streak_start_date: None,
            stats: ProgressStats::default(),
            xp_history: Vec::new(),
            level_up_history: Vec::new(),
        }
    }
}

impl Progress {
    /// Add `amount` XP and recompute the level, appending one `LevelUp`
    /// per level crossed. Only the most recent [`LEVEL_UP_HISTORY_CAP`]
    /// entries are kept. Returns `(level_before, level_after)`.
    pub fn apply_xp(&mut self, amount: u64, at: DateTime<Utc>) -> (u32, u32) {
        let before = self.level;
        self.xp = self.xp.saturating_add(amount);
        let after = level_for_xp(self.xp);

        // Levels that would be evicted anyway are never materialized.
        let cap = LEVEL_UP_HISTORY_CAP as u32;
        let first = (before + 1).max(after.saturating_sub(cap - 1));
        for level in first..=after {
            self.level_up_history.push(LevelUp {
                level,
                achieved_at: at,
                total_xp: self.xp,
            });
        }
        if self.level_up_history.len() > LEVEL_UP_HISTORY_CAP {
            let excess = self.level_up_history.len() - LEVEL_UP_HISTORY_CAP;
            self.level_up_history.drain(..excess);
        }

        self.level = after;
        (before, after)
    }

    /// Append a transaction, evicting the oldest entries past the cap.
    pub fn push_transaction(&mut self, tx: XpTransaction) {
        self.xp_history.push(tx);
        if self.xp_history.len() > XP_HISTORY_CAP {
            let excess = self.xp_history.len() - XP_HISTORY_CAP;
            self.xp_history.drain(..excess);
        }
    }

    /// Fold the current streak into `longest_streak` if it is a record.
    pub fn fold_longest_streak(&mut self) {
        self.longest_streak = self.longest_streak.max(self.streak);
    }

    pub fn subject_percentage(&self, subject: &str) -> u8 {
        self.stats
            .by_subject
            .get(subject)
            .map(|s| s.percentage)
            .unwrap_or(0)
    }

    /// Mean percentage across all tracked subjects.
    pub fn overall_percentage(&self) -> f64 {
        if self.stats.by_subject.is_empty() {
            return 0.0;
        }
        let total: u32 = self
            .stats
            .by_subject
            .values()
            .map(|s| u32::from(s.percentage))
            .sum();
        f64::from(total) / self.stats.by_subject.len() as f64
    }
}

/// Aggregate counters fed by the study trackers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressStats {
    #[serde(default)]
    pub by_subject: BTreeMap<String, SubjectProgress>,
    #[serde(default)]
    pub pomodoro_sessions: u32,
    #[serde(default)]
    pub total_hours: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProgress {
    /// 0..=100
    pub percentage: u8,
}

/// A level reached, recorded once per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUp {
    pub level: u32,
    pub achieved_at: DateTime<Utc>,
    pub total_xp: u64,
}

// ---------------------------------------------------------------------------
// XP transactions
// ---------------------------------------------------------------------------

/// Where XP came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    Exercise,
    Pomodoro,
    Quest,
    Badge,
    StreakBonus,
    Note,
    Summary,
    Manual,
}

impl std::fmt::Display for XpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            XpSource::Exercise => "exercise",
            XpSource::Pomodoro => "pomodoro",
            XpSource::Quest => "quest",
            XpSource::Badge => "badge",
            XpSource::StreakBonus => "streak_bonus",
            XpSource::Note => "note",
            XpSource::Summary => "summary",
            XpSource::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for XpSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exercise" => Ok(XpSource::Exercise),
            "pomodoro" => Ok(XpSource::Pomodoro),
            "quest" => Ok(XpSource::Quest),
            "badge" => Ok(XpSource::Badge),
            "streak_bonus" => Ok(XpSource::StreakBonus),
            "note" => Ok(XpSource::Note),
            "summary" => Ok(XpSource::Summary),
            "manual" => Ok(XpSource::Manual),
            other => Err(format!("unknown xp source: {other}")),
        }
    }
}

/// An immutable record of XP earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpTransaction {
    pub id: Uuid,
    pub amount: u64,
    pub source: XpSource,
    pub description: String,
    pub earned_at: DateTime<Utc>,
    pub level_before: u32,
    pub level_after: u32,
}

impl XpTransaction {
    pub fn new(
        amount: u64,
        source: XpSource,
        description: impl Into<String>,
        earned_at: DateTime<Utc>,
        levels: (u32, u32),
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            source,
            description: description.into(),
            earned_at,
            level_before: levels.0,
            level_after: levels.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_curve_thresholds() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(150), 2);
        assert_eq!(level_for_xp(299), 2);
        assert_eq!(level_for_xp(300), 3);
        assert_eq!(level_for_xp(600), 4);
    }

    #[test]
    fn level_curve_is_monotone() {
        let mut last = level_for_xp(0);
        for xp in (0..20_000).step_by(7) {
            let level = level_for_xp(xp);
            assert!(level >= 1);
            assert!(level >= last, "level dropped at xp={xp}");
            last = level;
        }
    }

    #[test]
    fn huge_xp_does_not_overflow() {
        let level = level_for_xp(u64::MAX);
        assert!(level > 1_000_000);
        assert!(xp_for_level(level + 1) == u64::MAX);
    }

    #[test]
    fn xp_for_level_inverts_level_for_xp() {
        for level in 1..40 {
            assert_eq!(level_for_xp(xp_for_level(level)), level);
        }
        assert_eq!(xp_to_next_level(150), 150);
    }

    #[test]
    fn apply_xp_records_every_level_crossed() {
        let mut progress = Progress::default();
        let (before, after) = progress.apply_xp(650, Utc::now());
        assert_eq!((before, after), (1, 4));
        let levels: Vec<u32> = progress.level_up_history.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![2, 3, 4]);
    }

    #[test]
    fn huge_award_keeps_level_history_bounded() {
        let mut progress = Progress::default();
        progress.apply_xp(150, Utc::now());
        let (before, after) = progress.apply_xp(100_000_000_000_000, Utc::now());
        assert_eq!(before, 2);
        assert_eq!(after, 1_414_214);
        assert_eq!(progress.level_up_history.len(), LEVEL_UP_HISTORY_CAP);
        assert_eq!(progress.level_up_history.last().unwrap().level, after);
        assert_eq!(progress.level_up_history[0].level, after - 99);

        let (_, top) = progress.apply_xp(u64::MAX, Utc::now());
        assert_eq!(progress.level, top);
        assert_eq!(progress.level_up_history.len(), LEVEL_UP_HISTORY_CAP);
    }

    #[test]
    fn history_is_capped() {
        let mut progress = Progress::default();
        for i in 0..130u64 {
            progress.push_transaction(XpTransaction::new(
                i,
                XpSource::Manual,
                "t",
                Utc::now(),
                (1, 1),
            ));
        }
        assert_eq!(progress.xp_history.len(), XP_HISTORY_CAP);
        assert_eq!(progress.xp_history[0].amount, 30);
        assert_eq!(progress.xp_history.last().unwrap().amount, 129);
    }
}
