//! Progress tracker: XP, levels, streaks and subject completion.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::Engine;
use crate::event::EventKind;
use crate::model::*;
use crate::storage::KeyValueStore;

/// XP for finishing one exercise.
pub const EXERCISE_XP: u64 = 50;

/// XP for finishing one pomodoro session.
pub const POMODORO_XP: u64 = 25;

/// Streak lengths that earn a one-off bonus, and the bonus.
pub const STREAK_MILESTONES: [(u32, u64); 5] =
    [(7, 100), (14, 200), (30, 500), (60, 1000), (90, 2000)];

/// Outcome of evaluating the streak for a new activity.
struct StreakUpdate {
    events: Vec<EventKind>,
    bonus: Option<(u32, u64)>,
}

impl<S: KeyValueStore> Engine<S> {
    /// Award XP for an activity.
    ///
    /// Evaluates the streak, logs a transaction, recomputes the level,
    /// persists and re-checks badges. Callers must not fire the same
    /// activity twice; nothing here deduplicates.
    pub async fn add_xp(
        &mut self,
        amount: u64,
        source: XpSource,
        description: impl Into<String>,
    ) -> Progress {
        let description = description.into();
        if amount == 0 {
            warn!(%source, %description, "ignoring zero xp award");
            return self.progress.clone();
        }

        let now = self.now();
        let streak = self.advance_streak(now);
        for kind in streak.events {
            self.emit(kind);
        }

        let levels = self.progress.apply_xp(amount, now);
        self.progress.push_transaction(XpTransaction::new(
            amount,
            source,
            description.clone(),
            now,
            levels,
        ));
        self.progress.last_activity_date = Some(now);
        self.emit(EventKind::XpAwarded {
            amount,
            source,
            total_xp: self.progress.xp,
        });
        self.emit_level_ups(levels);

        if let Some((days, bonus)) = streak.bonus {
            self.grant_direct(bonus, XpSource::StreakBonus, format!("{days}-day streak bonus"));
            self.emit(EventKind::StreakMilestone {
                streak: days,
                bonus_xp: bonus,
            });
        }

        info!(
            amount,
            %source,
            %description,
            xp = self.progress.xp,
            level = self.progress.level,
            streak = self.progress.streak,
            "xp awarded"
        );

        self.persist_progress().await;
        self.check_unlocks().await;
        self.progress.clone()
    }

    /// Apply XP without streak evaluation or badge checks.
    ///
    /// Used for badge rewards and streak bonuses, which are themselves
    /// consequences of an award; routing them through `add_xp` would
    /// re-enter badge evaluation. The grant is still logged and can level up.
    /// The caller persists.
    pub(crate) fn grant_direct(
        &mut self,
        amount: u64,
        source: XpSource,
        description: impl Into<String>,
    ) -> (u32, u32) {
        let now = self.now();
        let levels = self.progress.apply_xp(amount, now);
        self.progress
            .push_transaction(XpTransaction::new(amount, source, description, now, levels));
        self.emit(EventKind::XpAwarded {
            amount,
            source,
            total_xp: self.progress.xp,
        });
        self.emit_level_ups(levels);
        levels
    }

    /// Count `now` toward the streak: same day is a no-op, the next day
    /// extends it, a longer gap resets it before counting today.
    fn advance_streak(&mut self, now: DateTime<Utc>) -> StreakUpdate {
        let calendar = self.calendar;
        let progress = &mut self.progress;
        let mut events = Vec::new();

        match progress.last_activity_date {
            None => {
                progress.streak = 1;
                progress.streak_start_date = Some(now);
            }
            Some(last) => {
                let gap = calendar.days_between(last, now);
                if gap <= 0 {
                    if progress.streak > 0 {
                        return StreakUpdate {
                            events,
                            bonus: None,
                        };
                    }
                    progress.streak = 1;
                    progress.streak_start_date = Some(now);
                } else if gap == 1 {
                    progress.streak += 1;
                    if progress.streak == 1 {
                        progress.streak_start_date = Some(now);
                    }
                } else {
                    let previous = progress.streak;
                    progress.fold_longest_streak();
                    if previous > 0 {
                        events.push(EventKind::StreakBroken {
                            previous,
                            longest: progress.longest_streak,
                        });
                    }
                    progress.streak = 1;
                    progress.streak_start_date = Some(now);
                }
            }
        }

        progress.fold_longest_streak();
        let streak = progress.streak;
        events.push(EventKind::StreakExtended { streak });

        let bonus = STREAK_MILESTONES
            .iter()
            .find(|(days, _)| *days == streak)
            .copied();
        StreakUpdate { events, bonus }
    }

    /// Break the streak if more than one calendar day has passed since the
    /// last activity. Run at session start; does not count as activity.
    /// Returns true if the streak was broken.
    pub async fn check_streak(&mut self) -> bool {
        let Some(last) = self.progress.last_activity_date else {
            return false;
        };
        if self.progress.streak == 0 || self.calendar.days_between(last, self.now()) <= 1 {
            return false;
        }

        let previous = self.progress.streak;
        self.progress.fold_longest_streak();
        self.progress.streak = 0;
        self.progress.streak_start_date = None;
        info!(previous, longest = self.progress.longest_streak, "streak broken");
        self.emit(EventKind::StreakBroken {
            previous,
            longest: self.progress.longest_streak,
        });
        self.persist_progress().await;
        true
    }

    /// Set a subject's completion percentage, clamped to 0..=100.
    pub async fn update_subject_progress(&mut self, subject: &str, percentage: f64) -> Progress {
        let (clamped, out_of_range) = clamp_percentage(percentage);
        if out_of_range {
            warn!(subject, percentage, clamped, "subject percentage clamped");
        }

        self.progress
            .stats
            .by_subject
            .entry(subject.to_string())
            .or_default()
            .percentage = clamped;
        self.emit(EventKind::SubjectProgressUpdated {
            subject: subject.to_string(),
            percentage: clamped,
        });
        info!(subject, percentage = clamped, "subject progress updated");

        self.persist_progress().await;
        self.check_unlocks().await;
        self.progress.clone()
    }

    /// Record a finished pomodoro and award its XP.
    pub async fn record_pomodoro(&mut self, minutes: u32) -> Progress {
        if minutes == 0 {
            warn!("ignoring zero-length pomodoro");
            return self.progress.clone();
        }

        let stats = &mut self.progress.stats;
        stats.pomodoro_sessions += 1;
        stats.total_hours += f64::from(minutes) / 60.0;
        let sessions = stats.pomodoro_sessions;
        self.emit(EventKind::PomodoroRecorded { minutes, sessions });

        self.add_xp(
            POMODORO_XP,
            XpSource::Pomodoro,
            format!("Pomodoro session ({minutes} min)"),
        )
        .await
    }
}

/// Round a percentage into 0..=100. The flag is set when the input was
/// outside that range (or NaN); ordinary rounding doesn't count.
fn clamp_percentage(percentage: f64) -> (u8, bool) {
    if percentage.is_nan() {
        return (0, true);
    }
    let out_of_range = !(0.0..=100.0).contains(&percentage);
    (percentage.clamp(0.0, 100.0).round() as u8, out_of_range)
}
