//! Badge and quest catalogs.
//!
//! The built-in catalog follows the 12-day curriculum. A TOML file can
//! replace it; definitions are validated before the engine ever sees them.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::*;

/// Subjects tracked by the built-in curriculum.
pub const SUBJECTS: [&str; 4] = ["databases", "programming", "networking", "design"];

/// Top-level TOML wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "badge")]
    pub badges: Vec<BadgeDefinition>,
    #[serde(default, rename = "quest")]
    pub quests: Vec<QuestDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BadgeDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: BadgeCategory,
    pub unlock_condition: UnlockCondition,
    #[serde(default)]
    pub xp_reward: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub quest_type: QuestType,
    pub objective: ObjectiveKind,
    pub target: u32,
    pub xp_reward: u64,
    #[serde(default)]
    pub reward_badge: Option<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub next_quest: Option<String>,
    #[serde(default)]
    pub minimum_level: Option<u32>,
}

impl Catalog {
    /// Load and validate a catalog from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        let catalog: Catalog = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad catalog {}: {e}", path.display())))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: Catalog =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check ids are unique and every cross-reference resolves.
    pub fn validate(&self) -> Result<()> {
        let mut badge_ids = HashSet::new();
        for badge in &self.badges {
            if !badge_ids.insert(badge.id.as_str()) {
                return Err(Error::Config(format!("duplicate badge id: {}", badge.id)));
            }
        }

        let links: Vec<QuestLinks<'_>> = self
            .quests
            .iter()
            .map(|q| QuestLinks {
                id: &q.id,
                target: q.target,
                prerequisites: &q.prerequisites,
                next_quest: q.next_quest.as_deref(),
                reward_badge: q.reward_badge.as_deref(),
            })
            .collect();
        check_quest_links(&links, &badge_ids).map_err(Error::Config)
    }

    /// Fresh, all-locked badges.
    pub fn badges(&self) -> Vec<Badge> {
        self.badges
            .iter()
            .map(|def| Badge {
                id: def.id.clone(),
                name: def.name.clone(),
                description: def.description.clone(),
                category: def.category,
                unlock_condition: def.unlock_condition.clone(),
                xp_reward: def.xp_reward,
                unlocked: false,
                unlocked_at: None,
            })
            .collect()
    }

    /// Fresh quests. Anything gated by prerequisites, a chain, or a level
    /// above 1 starts locked.
    pub fn quests(&self) -> Vec<Quest> {
        let chained: HashSet<&str> = self
            .quests
            .iter()
            .filter_map(|q| q.next_quest.as_deref())
            .collect();

        self.quests
            .iter()
            .map(|def| {
                let gated = !def.prerequisites.is_empty()
                    || chained.contains(def.id.as_str())
                    || def.minimum_level.is_some_and(|l| l > 1);
                Quest {
                    id: def.id.clone(),
                    title: def.title.clone(),
                    description: def.description.clone(),
                    quest_type: def.quest_type,
                    status: if gated {
                        QuestStatus::Locked
                    } else {
                        QuestStatus::Available
                    },
                    objective: Objective {
                        kind: def.objective.clone(),
                        target: def.target,
                        current: 0,
                        baseline: 0,
                    },
                    rewards: QuestRewards {
                        xp: def.xp_reward,
                        badge: def.reward_badge.clone(),
                    },
                    prerequisites: def.prerequisites.clone(),
                    next_quest: def.next_quest.clone(),
                    minimum_level: def.minimum_level,
                    deadline: None,
                    started_at: None,
                    completed_at: None,
                }
            })
            .collect()
    }
}

/// The parts of a quest that other entries must agree with.
pub(crate) struct QuestLinks<'a> {
    pub id: &'a str,
    pub target: u32,
    pub prerequisites: &'a [String],
    pub next_quest: Option<&'a str>,
    pub reward_badge: Option<&'a str>,
}

impl<'a> QuestLinks<'a> {
    pub fn of(quest: &'a Quest) -> Self {
        Self {
            id: &quest.id,
            target: quest.objective.target,
            prerequisites: &quest.prerequisites,
            next_quest: quest.next_quest.as_deref(),
            reward_badge: quest.rewards.badge.as_deref(),
        }
    }
}

/// Quest ids are unique, targets non-zero, and every prerequisite, chain
/// target and reward badge exists.
pub(crate) fn check_quest_links(
    quests: &[QuestLinks<'_>],
    badge_ids: &HashSet<&str>,
) -> std::result::Result<(), String> {
    let mut quest_ids = HashSet::new();
    for quest in quests {
        if !quest_ids.insert(quest.id) {
            return Err(format!("duplicate quest id: {}", quest.id));
        }
        if quest.target == 0 {
            return Err(format!("quest {} has a zero target", quest.id));
        }
    }

    for quest in quests {
        if let Some(prereq) = quest
            .prerequisites
            .iter()
            .find(|p| !quest_ids.contains(p.as_str()))
        {
            return Err(format!("quest {} requires unknown quest {prereq}", quest.id));
        }
        if let Some(next) = quest.next_quest
            && !quest_ids.contains(next)
        {
            return Err(format!("quest {} chains to unknown quest {next}", quest.id));
        }
        if let Some(badge) = quest.reward_badge
            && !badge_ids.contains(badge)
        {
            return Err(format!("quest {} rewards unknown badge {badge}", quest.id));
        }
    }
    Ok(())
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            badges: default_badges(),
            quests: default_quests(),
        }
    }
}

fn badge(
    id: &str,
    name: &str,
    description: &str,
    category: BadgeCategory,
    unlock_condition: UnlockCondition,
    xp_reward: u64,
) -> BadgeDefinition {
    BadgeDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        unlock_condition,
        xp_reward,
    }
}

fn default_badges() -> Vec<BadgeDefinition> {
    use BadgeCategory::*;
    use UnlockCondition::*;

    let mut badges = vec![
        badge("first-steps", "First Steps", "Earn your first 10 XP", Milestone, XpAtLeast { xp: 10 }, 10),
        badge("apprentice", "Apprentice", "Reach level 3", Milestone, LevelAtLeast { level: 3 }, 50),
        badge("scholar", "Scholar", "Reach level 5", Milestone, LevelAtLeast { level: 5 }, 100),
        badge("master", "Master", "Reach level 10", Milestone, LevelAtLeast { level: 10 }, 250),
        badge("xp-1000", "Thousand Club", "Accumulate 1000 XP", Milestone, XpAtLeast { xp: 1000 }, 100),
        badge("streak-3", "Warming Up", "Study 3 days in a row", Streak, StreakAtLeast { days: 3 }, 30),
        badge("streak-7", "On Fire", "Study 7 days in a row", Streak, StreakAtLeast { days: 7 }, 75),
        badge("streak-12", "Full Curriculum", "Study 12 days in a row", Streak, StreakAtLeast { days: 12 }, 150),
        badge("pomodoro-1", "Tomato Sprout", "Finish a pomodoro", Focus, PomodorosAtLeast { sessions: 1 }, 10),
        badge("pomodoro-25", "Tomato Farmer", "Finish 25 pomodoros", Focus, PomodorosAtLeast { sessions: 25 }, 100),
        badge("hours-10", "Deep Work", "Log 10 hours of focus", Focus, TotalHoursAtLeast { hours: 10.0 }, 100),
        badge("all-half", "Halfway There", "Every subject at 50%", Special, AllSubjectsAtLeast {
            percentage: 50,
            subjects: SUBJECTS.iter().map(|s| s.to_string()).collect(),
        }, 150),
        badge("curriculum-complete", "Graduate", "Every subject at 100%", Special, AllSubjectsAtLeast {
            percentage: 100,
            subjects: SUBJECTS.iter().map(|s| s.to_string()).collect(),
        }, 500),
        badge("quest-champion", "Quest Champion", "Finish the main questline", Special, Manual, 200),
    ];

    for subject in SUBJECTS {
        badges.push(badge(
            &format!("{subject}-complete"),
            &format!("{} Expert", title_case(subject)),
            &format!("Complete every {subject} exercise"),
            Subject,
            SubjectPercentage {
                subject: subject.to_string(),
                percentage: 100,
            },
            100,
        ));
    }
    badges
}

#[allow(clippy::too_many_arguments)]
fn quest(
    id: &str,
    title: &str,
    quest_type: QuestType,
    objective: ObjectiveKind,
    target: u32,
    xp_reward: u64,
    prerequisites: &[&str],
    next_quest: Option<&str>,
) -> QuestDefinition {
    QuestDefinition {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        quest_type,
        objective,
        target,
        xp_reward,
        reward_badge: None,
        prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
        next_quest: next_quest.map(str::to_string),
        minimum_level: None,
    }
}

fn default_quests() -> Vec<QuestDefinition> {
    use ObjectiveKind::*;
    use QuestType::*;

    let mut quests = vec![
        quest("daily-exercises", "Daily practice", Daily, ExercisesCompleted, 3, 30, &[], None),
        quest("daily-pomodoros", "Daily focus", Daily, Pomodoros, 2, 20, &[], None),
        quest("weekly-exercises", "Weekly grind", Weekly, ExercisesCompleted, 15, 150, &[], None),
        quest("weekly-pomodoros", "Weekly focus", Weekly, Pomodoros, 10, 100, &[], None),
        quest("main-1-start", "Begin the journey", Main, ExercisesCompleted, 1, 25, &[], Some("main-2-habit")),
        quest("main-2-habit", "Build the habit", Main, Streak, 3, 75, &[], Some("main-3-depth")),
        quest("main-3-depth", "Go deep", Main, TotalHours, 5, 150, &[], Some("main-4-master")),
        quest("main-4-master", "Master the curriculum", Main, Level, 5, 300, &[], None),
        quest("side-sharpshooter", "Sharpshooter", Side, AverageScore, 90, 100, &["main-1-start"], None),
        quest("side-collector", "Collector", Side, BadgesUnlocked, 5, 100, &[], None),
    ];

    if let Some(last) = quests.iter_mut().find(|q| q.id == "main-4-master") {
        last.reward_badge = Some("quest-champion".to_string());
    }
    if let Some(collector) = quests.iter_mut().find(|q| q.id == "side-collector") {
        collector.minimum_level = Some(2);
    }

    for subject in SUBJECTS {
        quests.push(QuestDefinition {
            id: format!("side-{subject}-half"),
            title: format!("{} halfway", title_case(subject)),
            description: format!("Reach 50% in {subject}"),
            quest_type: Side,
            objective: SubjectPercentage {
                subject: subject.to_string(),
            },
            target: 50,
            xp_reward: 50,
            reward_badge: None,
            prerequisites: Vec::new(),
            next_quest: None,
            minimum_level: None,
        });
    }
    quests
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
