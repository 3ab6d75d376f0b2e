//! # poemlab-core
//!
//! Core library for poemlab - a scripted poetry-writing study.
//!
//! A participant is walked through five fixed steps to write a poem with a
//! simulated assistant. Each session is assigned a random condition
//! (anthropomorphism level and point of view) that changes how the assistant
//! phrases its replies, and every poem it offers carries a configured defect.
//!
//! This library provides:
//! - Domain types for sessions, messages, conditions and feedback
//! - The study engine: conversation policy, poem templates, tone wrapping
//! - Session lifecycle and a persisting runner
//! - Database storage layer with SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use poemlab_core::{Config, Database, Session, StudyRunner};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let now = chrono::Utc::now();
//! let settings = config.study.settings().expect("invalid study settings");
//! let mut runner = StudyRunner::new(Session::new(settings, now), &db);
//! runner.register("Ada", None, true, now).expect("failed to start");
//! let outcome = runner.submit_turn("ready", chrono::Utc::now()).expect("turn failed");
//! println!("{}", outcome.reply);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use recorder::SessionRecorder;
pub use runner::StudyRunner;
pub use session::{Session, StudySettings, TurnOutcome};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod recorder;
pub mod runner;
pub mod session;
pub mod study;
pub mod types;
