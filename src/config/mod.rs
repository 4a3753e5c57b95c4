//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Everything has
//! a default, so an empty environment yields a working local setup.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://studyquest.db?mode=rwc";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub log_level: String,
    /// How often the scheduler re-evaluates quests.
    pub quest_check_interval: Duration,
    /// Learner's offset from UTC, used for calendar-day boundaries.
    pub utc_offset_minutes: i32,
    /// Optional TOML file replacing the built-in badge/quest catalog.
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_level: "info".to_string(),
            quest_check_interval: Duration::from_secs(300),
            utc_offset_minutes: 0,
            catalog_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            database_url: std::env::var("STUDYQUEST_DATABASE_URL")
                .unwrap_or(defaults.database_url),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            quest_check_interval: match parsed_var::<u64>("QUEST_CHECK_INTERVAL_SECS")? {
                Some(0) => {
                    return Err(Error::Config(
                        "QUEST_CHECK_INTERVAL_SECS must be greater than zero".to_string(),
                    ));
                }
                Some(secs) => Duration::from_secs(secs),
                None => defaults.quest_check_interval,
            },
            utc_offset_minutes: match parsed_var::<i32>("UTC_OFFSET_MINUTES")? {
                Some(minutes) if minutes.abs() >= 24 * 60 => {
                    return Err(Error::Config(format!(
                        "UTC_OFFSET_MINUTES out of range: {minutes}"
                    )));
                }
                Some(minutes) => minutes,
                None => defaults.utc_offset_minutes,
            },
            catalog_path: std::env::var("STUDYQUEST_CATALOG").ok().map(PathBuf::from),
        })
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {name}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}
