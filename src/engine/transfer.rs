//! Export, import and full reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use super::Engine;
use crate::catalog::{QuestLinks, check_quest_links};
use crate::error::{Error, Result};
use crate::event::EventKind;
use crate::model::*;
use crate::storage::{KeyValueStore, StorageKey};

/// Current export format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the engine owns, as exported to a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub progress: Progress,
    pub badges: Vec<Badge>,
    #[serde(default)]
    pub quests: Vec<Quest>,
}

impl Snapshot {
    /// Reject snapshots that would break engine invariants.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 || self.version > SNAPSHOT_VERSION {
            return Err(Error::Import(format!(
                "unsupported snapshot version {} (expected at most {SNAPSHOT_VERSION})",
                self.version
            )));
        }

        let expected = level_for_xp(self.progress.xp);
        if self.progress.level != expected {
            return Err(Error::Import(format!(
                "level {} does not match {} xp (expected level {expected})",
                self.progress.level, self.progress.xp
            )));
        }

        if let Some((subject, s)) = self
            .progress
            .stats
            .by_subject
            .iter()
            .find(|(_, s)| s.percentage > 100)
        {
            return Err(Error::Import(format!(
                "subject {subject} has percentage {} above 100",
                s.percentage
            )));
        }

        if !self.progress.stats.total_hours.is_finite() || self.progress.stats.total_hours < 0.0 {
            return Err(Error::Import("total hours must be a non-negative number".into()));
        }

        let mut seen = HashSet::new();
        for badge in &self.badges {
            if !seen.insert(badge.id.as_str()) {
                return Err(Error::Import(format!("duplicate badge id {}", badge.id)));
            }
            if badge.unlocked != badge.unlocked_at.is_some() {
                return Err(Error::Import(format!(
                    "badge {} has inconsistent unlock state",
                    badge.id
                )));
            }
        }

        let mut seen = HashSet::new();
        for quest in &self.quests {
            if !seen.insert(quest.id.as_str()) {
                return Err(Error::Import(format!("duplicate quest id {}", quest.id)));
            }
        }
        Ok(())
    }
}

impl<S: KeyValueStore> Engine<S> {
    /// Snapshot of progress, badges and quests.
    pub fn export(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            exported_at: self.now(),
            progress: self.progress.clone(),
            badges: self.badges.clone(),
            quests: self.quests.clone(),
        }
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    /// Parse and import a JSON snapshot. On any error the current state is
    /// left untouched.
    pub async fn import_json(&mut self, json: &str) -> Result<()> {
        let snapshot: Snapshot = serde_json::from_str(json).map_err(|e| {
            warn!(error = %e, "rejected malformed import");
            Error::Import(format!("malformed snapshot: {e}"))
        })?;
        self.import(snapshot).await
    }

    /// Replace owned state with a validated snapshot. Badges and quests the
    /// snapshot doesn't mention keep their catalog defaults; an empty quest
    /// list keeps the current quests.
    pub async fn import(&mut self, snapshot: Snapshot) -> Result<()> {
        if let Err(e) = snapshot.validate() {
            warn!(error = %e, "rejected invalid import");
            return Err(e);
        }

        let Snapshot {
            progress,
            badges,
            quests,
            exported_at,
            ..
        } = snapshot;

        let badges = super::merge_by_id(badges, self.catalog.badges(), |b| &b.id);
        let quests = if quests.is_empty() {
            self.quests.clone()
        } else {
            super::merge_by_id(quests, self.catalog.quests(), |q| &q.id)
        };

        // References are checked after the merge: a quest may point at a
        // catalog badge the snapshot leaves out.
        {
            let badge_ids: HashSet<&str> = badges.iter().map(|b| b.id.as_str()).collect();
            let links: Vec<QuestLinks<'_>> = quests.iter().map(QuestLinks::of).collect();
            if let Err(e) = check_quest_links(&links, &badge_ids) {
                warn!(error = %e, "rejected invalid import");
                return Err(Error::Import(e));
            }
        }

        self.progress = progress;
        self.badges = badges;
        self.quests = quests;
        self.newly_unlocked.clear();

        info!(
            %exported_at,
            xp = self.progress.xp,
            level = self.progress.level,
            unlocked = self.badges.iter().filter(|b| b.unlocked).count(),
            "snapshot imported"
        );
        self.emit(EventKind::DataImported);
        self.persist_all().await;
        Ok(())
    }

    /// Wipe progress and exercise records, and restore the catalog's badges
    /// and quests.
    pub async fn reset(&mut self) {
        self.progress = Progress::default();
        self.badges = self.catalog.badges();
        self.quests = self.catalog.quests();
        self.newly_unlocked.clear();
        self.last_quest_check = None;

        warn!("progress reset");
        self.emit(EventKind::ProgressReset);
        self.persist_all().await;
        for key in [StorageKey::QuestCheck, StorageKey::Exercises] {
            if let Err(e) = self.storage.remove(key).await {
                warn!(%key, error = %e, "failed to clear stored data on reset");
            }
        }
    }
}
