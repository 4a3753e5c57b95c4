//! # studyquest
//!
//! Progression engine for a single-learner study planner.
//!
//! Tracks XP, levels and daily streaks, unlocks badges, drives quests through
//! their lifecycle, and persists everything through an async key-value
//! gateway (SQLite in production, in-memory for tests).

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod exercises;
pub mod model;
pub mod storage;
pub mod telemetry;

pub use engine::Engine;
pub use error::{Error, Result};
