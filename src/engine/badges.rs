//! Badge unlocker.

use tracing::{info, warn};

use super::Engine;
use crate::event::EventKind;
use crate::model::*;
use crate::storage::KeyValueStore;

impl<S: KeyValueStore> Engine<S> {
    /// Unlock every locked badge whose predicate now holds.
    ///
    /// Rewards from a pass are granted directly (see `grant_direct`), which
    /// can satisfy further XP or level badges, so passes repeat until one
    /// unlocks nothing. Each pass unlocks at least one badge, so this
    /// terminates within the catalog size.
    pub async fn check_unlocks(&mut self) -> Vec<Badge> {
        let mut unlocked = Vec::new();

        loop {
            let now = self.now();
            let mut pass = Vec::new();
            for badge in self.badges.iter_mut().filter(|b| !b.unlocked) {
                if badge.is_satisfied_by(&self.progress) && badge.unlock(now) {
                    pass.push(badge.clone());
                }
            }
            if pass.is_empty() {
                break;
            }
            self.reward_badges(&pass);
            unlocked.extend(pass);
        }

        if !unlocked.is_empty() {
            self.newly_unlocked.extend(unlocked.iter().cloned());
            self.persist_badges().await;
            self.persist_progress().await;
        }
        unlocked
    }

    /// Unlock a specific badge regardless of its predicate (quest rewards).
    /// Returns `None` if it doesn't exist or was already unlocked.
    pub async fn unlock_badge(&mut self, id: &str) -> Option<Badge> {
        let now = self.now();
        let Some(badge) = self.badges.iter_mut().find(|b| b.id == id) else {
            warn!(badge = id, "unlock requested for unknown badge");
            return None;
        };
        if !badge.unlock(now) {
            return None;
        }
        let badge = badge.clone();

        self.reward_badges(std::slice::from_ref(&badge));
        self.newly_unlocked.push(badge.clone());
        self.persist_badges().await;
        self.persist_progress().await;

        // The reward may push XP over further thresholds.
        self.check_unlocks().await;
        Some(badge)
    }

    /// Badges unlocked since the last [`clear_newly_unlocked`](Self::clear_newly_unlocked).
    pub fn newly_unlocked(&self) -> &[Badge] {
        &self.newly_unlocked
    }

    /// Acknowledge pending unlock notifications, returning them.
    pub fn clear_newly_unlocked(&mut self) -> Vec<Badge> {
        std::mem::take(&mut self.newly_unlocked)
    }

    pub fn unlocked_badges(&self) -> impl Iterator<Item = &Badge> {
        self.badges.iter().filter(|b| b.unlocked)
    }

    /// Announce freshly unlocked badges and grant their combined reward.
    fn reward_badges(&mut self, badges: &[Badge]) {
        let mut reward = 0u64;
        for badge in badges {
            info!(badge = %badge.id, name = %badge.name, xp_reward = badge.xp_reward, "badge unlocked");
            self.emit(EventKind::BadgeUnlocked {
                id: badge.id.clone(),
                name: badge.name.clone(),
                xp_reward: badge.xp_reward,
            });
            reward += badge.xp_reward;
        }
        if reward > 0 {
            let names: Vec<&str> = badges.iter().map(|b| b.name.as_str()).collect();
            self.grant_direct(
                reward,
                XpSource::Badge,
                format!("Badge reward: {}", names.join(", ")),
            );
        }
    }
}
