//! studyquest CLI: record study activity and inspect progress.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use studyquest::catalog::Catalog;
use studyquest::clock::Calendar;
use studyquest::config::Config;
use studyquest::engine::{EXERCISE_XP, QuestScheduler};
use studyquest::exercises::ExerciseTracker;
use studyquest::model::{QuestStatus, XpSource, xp_to_next_level};
use studyquest::storage::SqliteStore;
use studyquest::telemetry::{TelemetryConfig, init_telemetry};
use studyquest::Engine;
use tokio::sync::Mutex;

#[derive(Parser)]
#[command(name = "studyquest", about = "XP, streaks, badges and quests for your study plan")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show level, XP and streak
    Status,
    /// Award XP manually
    Xp {
        amount: u64,
        /// exercise, pomodoro, note, summary or manual
        #[arg(long, default_value = "manual")]
        source: String,
        #[arg(long, default_value = "Manual award")]
        description: String,
    },
    /// Mark an exercise as completed
    Exercise {
        id: String,
        subject: String,
        /// Score out of 100
        #[arg(long)]
        score: Option<f64>,
    },
    /// Record a finished pomodoro
    Pomodoro {
        #[arg(long, default_value_t = 25)]
        minutes: u32,
    },
    /// Set a subject's completion percentage
    Subject { subject: String, percentage: f64 },
    /// List quests
    Quests {
        /// Filter by status (locked, available, in_progress, completed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Quest actions
    Quest {
        #[command(subcommand)]
        action: QuestAction,
    },
    /// List badges
    Badges {
        /// Only unlocked badges
        #[arg(long)]
        unlocked: bool,
    },
    /// Write progress, badges and quests to a JSON file
    Export { path: PathBuf },
    /// Replace progress, badges and quests from a JSON file
    Import { path: PathBuf },
    /// Wipe all progress
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Run the periodic quest checks until interrupted
    Serve,
}

#[derive(Subcommand)]
enum QuestAction {
    /// Start an available quest
    Start { id: String },
    /// Claim a completed quest's reward
    Claim { id: String },
    /// Abandon an in-progress quest
    Abandon { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_telemetry(TelemetryConfig {
        log_level: config.log_level.clone(),
        compact: true,
    })?;

    let store = SqliteStore::connect(&config.database_url).await?;
    let mut builder = Engine::builder(store.clone())
        .calendar(Calendar::from_offset_minutes(config.utc_offset_minutes));
    if let Some(path) = &config.catalog_path {
        builder = builder.catalog(Catalog::load(path)?);
    }
    let mut engine = builder.load().await;
    let tracker = ExerciseTracker::new(store);

    // Session start: the same checks the scheduler runs on every tick.
    let report = engine.run_checks(&tracker.stats().await).await;
    if report.streak_broken {
        println!("Streak broken, start a new one today");
    }
    for id in &report.completed_quests {
        println!("Quest completed: {id}");
    }

    match cli.command {
        Command::Status => print_status(&engine),
        Command::Xp {
            amount,
            source,
            description,
        } => {
            let source: XpSource = source.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            engine.add_xp(amount, source, description).await;
            engine.update_quest_progress(&tracker.stats().await).await;
            print_status(&engine);
        }
        Command::Exercise { id, subject, score } => {
            if tracker.complete(&id, &subject, score, engine.now()).await {
                engine
                    .add_xp(EXERCISE_XP, XpSource::Exercise, format!("Exercise {id}"))
                    .await;
                let percentage = tracker.subject_percentage(&subject).await;
                engine.update_subject_progress(&subject, percentage).await;
                engine.update_quest_progress(&tracker.stats().await).await;
            } else {
                println!("Exercise {id} was already completed");
            }
            print_status(&engine);
        }
        Command::Pomodoro { minutes } => {
            engine.record_pomodoro(minutes).await;
            engine.update_quest_progress(&tracker.stats().await).await;
            print_status(&engine);
        }
        Command::Subject {
            subject,
            percentage,
        } => {
            engine.update_subject_progress(&subject, percentage).await;
            engine.update_quest_progress(&tracker.stats().await).await;
            print_status(&engine);
        }
        Command::Quests { status } => {
            let filter = status.as_deref().map(parse_status).transpose()?;
            for quest in engine.quests() {
                if filter.is_some_and(|s| s != quest.status) {
                    continue;
                }
                println!(
                    "{:<24} {:<7} {:<12} {:>4}/{:<4} {:>5} xp  {}",
                    quest.id,
                    quest.quest_type.to_string(),
                    quest.status.to_string(),
                    quest.objective.current,
                    quest.objective.target,
                    quest.rewards.xp,
                    quest.title
                );
            }
        }
        Command::Quest { action } => match action {
            QuestAction::Start { id } => match engine.start_quest(&id).await {
                Some(quest) => println!("Started: {}", quest.title),
                None => println!("Quest {id} cannot be started"),
            },
            QuestAction::Claim { id } => match engine.claim_quest_reward(&id).await {
                Some(rewards) => match rewards.badge {
                    Some(badge) => println!("Reward: {} xp + badge {badge}", rewards.xp),
                    None => println!("Reward: {} xp", rewards.xp),
                },
                None => println!("Quest {id} has no reward to claim"),
            },
            QuestAction::Abandon { id } => match engine.abandon_quest(&id).await {
                Some(quest) => println!("Abandoned: {}", quest.title),
                None => println!("Quest {id} is not in progress"),
            },
        },
        Command::Badges { unlocked } => {
            for badge in engine.badges() {
                if unlocked && !badge.unlocked {
                    continue;
                }
                let mark = if badge.unlocked { "x" } else { " " };
                println!(
                    "[{mark}] {:<22} {:<10} {:>4} xp  {}",
                    badge.id,
                    badge.category.to_string(),
                    badge.xp_reward,
                    badge.description
                );
            }
        }
        Command::Export { path } => {
            tokio::fs::write(&path, engine.export_json()?).await?;
            println!("Exported to {}", path.display());
        }
        Command::Import { path } => {
            let json = tokio::fs::read_to_string(&path).await?;
            engine.import_json(&json).await?;
            println!("Imported from {}", path.display());
            print_status(&engine);
        }
        Command::Reset { yes } => {
            if !yes {
                anyhow::bail!("refusing to reset without --yes");
            }
            engine.reset().await;
            println!("Progress reset");
        }
        Command::Serve => {
            let scheduler = QuestScheduler::new(
                Arc::new(Mutex::new(engine)),
                tracker,
                config.quest_check_interval,
            );
            let sched = scheduler.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                sched.shutdown();
            });
            scheduler.run().await;
            return Ok(());
        }
    }

    for badge in engine.clear_newly_unlocked() {
        println!("Badge unlocked: {} (+{} xp)", badge.name, badge.xp_reward);
    }
    Ok(())
}

fn parse_status(s: &str) -> anyhow::Result<QuestStatus> {
    match s {
        "locked" => Ok(QuestStatus::Locked),
        "available" => Ok(QuestStatus::Available),
        "in_progress" | "in-progress" => Ok(QuestStatus::InProgress),
        "completed" => Ok(QuestStatus::Completed),
        other => anyhow::bail!("invalid status: {other}"),
    }
}

fn print_status<S: studyquest::storage::KeyValueStore>(engine: &Engine<S>) {
    let progress = engine.progress();
    println!(
        "Level {} | {} xp ({} to next) | streak {} (best {}) | {} pomodoros, {:.1} h",
        progress.level,
        progress.xp,
        xp_to_next_level(progress.xp),
        progress.streak,
        progress.longest_streak,
        progress.stats.pomodoro_sessions,
        progress.stats.total_hours,
    );
    for (subject, s) in &progress.stats.by_subject {
        println!("  {subject:<14} {:>3}%", s.percentage);
    }
}
