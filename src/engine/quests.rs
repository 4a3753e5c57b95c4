//! Quest engine: objective tracking, unlocking, regeneration and manual
//! actions.
//!
//! Wrong-state or unknown quest ids never fail: they log a warning and
//! return `None`.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use super::Engine;
use crate::event::EventKind;
use crate::model::*;
use crate::storage::{KeyValueStore, StorageKey};
use crate::telemetry::quest::{quest_span, record_transition};

impl<S: KeyValueStore> Engine<S> {
    /// Current value of the counter an objective tracks.
    pub fn objective_value(&self, kind: &ObjectiveKind, exercises: &ExerciseStats) -> u32 {
        let progress = &self.progress;
        match kind {
            ObjectiveKind::ExercisesCompleted => exercises.completed,
            ObjectiveKind::Pomodoros => progress.stats.pomodoro_sessions,
            ObjectiveKind::Streak => progress.streak,
            ObjectiveKind::SubjectPercentage { subject } => {
                u32::from(progress.subject_percentage(subject))
            }
            ObjectiveKind::TotalHours => progress.stats.total_hours.floor() as u32,
            ObjectiveKind::Level => progress.level,
            ObjectiveKind::Xp => u32::try_from(progress.xp).unwrap_or(u32::MAX),
            ObjectiveKind::BadgesUnlocked => self.badges.iter().filter(|b| b.unlocked).count() as u32,
            ObjectiveKind::AverageScore => exercises.average_score.clamp(0.0, 100.0).round() as u32,
        }
    }

    /// Recompute every active quest's objective from the counters and
    /// complete, start or unlock quests accordingly. Returns the ids of
    /// quests completed by this call.
    ///
    /// Completion rewards can raise other counters (XP, level, badges), so
    /// passes repeat until one completes nothing.
    pub async fn update_quest_progress(&mut self, exercises: &ExerciseStats) -> Vec<String> {
        let mut completed = Vec::new();
        self.unlock_eligible_quests().await;

        loop {
            let pass = self.refresh_objectives(exercises).await;
            if pass.is_empty() {
                break;
            }
            for id in pass {
                if self.complete_quest(&id).await.is_some() {
                    completed.push(id);
                }
            }
        }
        completed
    }

    /// One pass over active quests. Returns those whose objective is met.
    async fn refresh_objectives(&mut self, exercises: &ExerciseStats) -> Vec<String> {
        let now = self.now();
        let mut met = Vec::new();
        let mut events = Vec::new();
        let mut changed = false;

        let values: Vec<Option<u32>> = self
            .quests
            .iter()
            .map(|q| {
                q.status
                    .is_active()
                    .then(|| self.objective_value(&q.objective.kind, exercises))
            })
            .collect();

        for (quest, value) in self.quests.iter_mut().zip(values) {
            let Some(value) = value else { continue };
            let relative = if quest.quest_type.is_periodic() {
                value.saturating_sub(quest.objective.baseline)
            } else {
                value
            };
            let relative = relative.min(quest.objective.target);

            // Objectives only move forward between regenerations.
            if relative > quest.objective.current {
                quest.objective.current = relative;
                changed = true;
                events.push(EventKind::QuestProgressed {
                    id: quest.id.clone(),
                    current: relative,
                    target: quest.objective.target,
                });
            }

            if quest.is_objective_met() {
                met.push(quest.id.clone());
            } else if quest.objective.current > 0 && quest.status == QuestStatus::Available {
                let span = quest_span(quest);
                if quest.transition(QuestStatus::InProgress, now) {
                    record_transition(&span, QuestStatus::Available, QuestStatus::InProgress);
                    changed = true;
                    events.push(EventKind::QuestTransition {
                        id: quest.id.clone(),
                        from: QuestStatus::Available,
                        to: QuestStatus::InProgress,
                    });
                }
            }
        }

        for kind in events {
            self.emit(kind);
        }
        if changed {
            self.persist_quests().await;
        }
        met
    }

    /// Move a quest to completed and pay out its rewards exactly once.
    async fn complete_quest(&mut self, id: &str) -> Option<QuestRewards> {
        let now = self.now();
        let quest = self.quests.iter_mut().find(|q| q.id == id)?;
        let from = quest.status;
        let span = quest_span(quest);
        if !quest.transition(QuestStatus::Completed, now) {
            warn!(quest = id, status = %from, "cannot complete quest from this state");
            return None;
        }
        record_transition(&span, from, QuestStatus::Completed);
        let rewards = quest.rewards.clone();
        let title = quest.title.clone();

        self.emit(EventKind::QuestTransition {
            id: id.to_string(),
            from,
            to: QuestStatus::Completed,
        });
        self.emit(EventKind::QuestCompleted {
            id: id.to_string(),
            xp_reward: rewards.xp,
        });
        info!(quest = id, xp_reward = rewards.xp, "quest completed");
        self.persist_quests().await;

        if rewards.xp > 0 {
            self.add_xp(rewards.xp, XpSource::Quest, format!("Quest completed: {title}"))
                .await;
        }
        if let Some(badge) = &rewards.badge {
            self.unlock_badge(badge).await;
        }
        self.unlock_eligible_quests().await;
        Some(rewards)
    }

    /// Unlock locked quests whose prerequisites (including any quest that
    /// chains into them) are completed and whose level gate is met.
    pub async fn unlock_eligible_quests(&mut self) -> Vec<String> {
        let completed: HashSet<&str> = self
            .quests
            .iter()
            .filter(|q| q.status == QuestStatus::Completed)
            .map(|q| q.id.as_str())
            .collect();
        let mut chained_from: HashMap<&str, Vec<&str>> = HashMap::new();
        for quest in &self.quests {
            if let Some(next) = &quest.next_quest {
                chained_from
                    .entry(next.as_str())
                    .or_default()
                    .push(quest.id.as_str());
            }
        }

        let level = self.progress.level;
        let eligible: Vec<String> = self
            .quests
            .iter()
            .filter(|q| q.status == QuestStatus::Locked)
            .filter(|q| q.minimum_level.is_none_or(|min| level >= min))
            .filter(|q| {
                let chain = chained_from.get(q.id.as_str()).into_iter().flatten();
                q.prerequisites
                    .iter()
                    .map(String::as_str)
                    .chain(chain.copied())
                    .all(|p| completed.contains(p))
            })
            .map(|q| q.id.clone())
            .collect();

        if eligible.is_empty() {
            return eligible;
        }

        let now = self.now();
        for id in &eligible {
            if let Some(quest) = self.quests.iter_mut().find(|q| &q.id == id) {
                let span = quest_span(quest);
                quest.transition(QuestStatus::Available, now);
                record_transition(&span, QuestStatus::Locked, QuestStatus::Available);
            }
            self.emit(EventKind::QuestUnlocked { id: id.clone() });
        }
        self.persist_quests().await;
        eligible
    }

    // -----------------------------------------------------------------------
    // Regeneration
    // -----------------------------------------------------------------------

    /// Reset every daily quest for a new day.
    pub async fn regenerate_daily_quests(&mut self, exercises: &ExerciseStats) -> usize {
        let deadline = self.calendar.next_day_start(self.now());
        self.regenerate(QuestType::Daily, deadline, exercises).await
    }

    /// Reset every weekly quest for a new ISO week.
    pub async fn regenerate_weekly_quests(&mut self, exercises: &ExerciseStats) -> usize {
        let deadline = self.calendar.next_week_start(self.now());
        self.regenerate(QuestType::Weekly, deadline, exercises).await
    }

    async fn regenerate(
        &mut self,
        quest_type: QuestType,
        deadline: chrono::DateTime<chrono::Utc>,
        exercises: &ExerciseStats,
    ) -> usize {
        let baselines: Vec<Option<u32>> = self
            .quests
            .iter()
            .map(|q| {
                (q.quest_type == quest_type)
                    .then(|| self.objective_value(&q.objective.kind, exercises))
            })
            .collect();

        let mut count = 0;
        for (quest, baseline) in self.quests.iter_mut().zip(baselines) {
            if let Some(baseline) = baseline {
                quest.regenerate(baseline, deadline);
                count += 1;
            }
        }

        info!(%quest_type, count, %deadline, "quests regenerated");
        self.emit(EventKind::QuestsRegenerated { quest_type, count });
        self.persist_quests().await;
        count
    }

    /// Regenerate daily/weekly quests if a day/week boundary was crossed
    /// since the last check (or there never was one), then record the check.
    /// Returns `(daily_regenerated, weekly_regenerated)`.
    pub async fn check_schedule(&mut self, exercises: &ExerciseStats) -> (bool, bool) {
        let now = self.now();
        let calendar = self.calendar;
        let last = self.last_quest_check;

        let daily = last.is_none_or(|l| calendar.day_of(l) != calendar.day_of(now));
        let weekly = last.is_none_or(|l| calendar.week_of(l) != calendar.week_of(now));

        if daily {
            self.regenerate_daily_quests(exercises).await;
        }
        if weekly {
            self.regenerate_weekly_quests(exercises).await;
        }

        self.last_quest_check = Some(now);
        self.storage.persist(StorageKey::QuestCheck, &now).await;
        (daily, weekly)
    }

    // -----------------------------------------------------------------------
    // Manual actions
    // -----------------------------------------------------------------------

    /// Start an available quest.
    pub async fn start_quest(&mut self, id: &str) -> Option<Quest> {
        let now = self.now();
        let Some(quest) = self.quests.iter_mut().find(|q| q.id == id) else {
            warn!(quest = id, "start requested for unknown quest");
            return None;
        };
        if quest.status != QuestStatus::Available {
            warn!(quest = id, status = %quest.status, "only available quests can be started");
            return None;
        }
        let span = quest_span(quest);
        quest.transition(QuestStatus::InProgress, now);
        record_transition(&span, QuestStatus::Available, QuestStatus::InProgress);
        let quest = quest.clone();

        self.emit(EventKind::QuestStarted { id: id.to_string() });
        self.persist_quests().await;
        Some(quest)
    }

    /// Read the rewards of a completed quest, or finalize an in-progress
    /// quest whose objective is already met. Rewards are paid only once;
    /// claiming again just returns them.
    pub async fn claim_quest_reward(&mut self, id: &str) -> Option<QuestRewards> {
        let Some(quest) = self.quest(id) else {
            warn!(quest = id, "claim requested for unknown quest");
            return None;
        };
        match quest.status {
            QuestStatus::Completed => Some(quest.rewards.clone()),
            QuestStatus::InProgress if quest.is_objective_met() => self.complete_quest(id).await,
            status => {
                warn!(quest = id, %status, current = quest.objective.current,
                    target = quest.objective.target, "quest has no reward to claim");
                None
            }
        }
    }

    /// Give up an in-progress quest. Numeric progress is kept.
    pub async fn abandon_quest(&mut self, id: &str) -> Option<Quest> {
        let now = self.now();
        let Some(quest) = self.quests.iter_mut().find(|q| q.id == id) else {
            warn!(quest = id, "abandon requested for unknown quest");
            return None;
        };
        if quest.status != QuestStatus::InProgress {
            warn!(quest = id, status = %quest.status, "only in-progress quests can be abandoned");
            return None;
        }
        let span = quest_span(quest);
        quest.transition(QuestStatus::Available, now);
        record_transition(&span, QuestStatus::InProgress, QuestStatus::Available);
        let quest = quest.clone();

        self.emit(EventKind::QuestAbandoned { id: id.to_string() });
        self.persist_quests().await;
        Some(quest)
    }
}
