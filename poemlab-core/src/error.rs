//! Error types for poemlab-core

use crate::types::Stage;
use thiserror::Error;

/// Main error type for the poemlab-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection mutex was poisoned by a panicking writer
    #[error("database lock poisoned")]
    LockPoisoned,

    /// Operation attempted in the wrong lifecycle stage
    #[error("session is in stage {actual}, expected {expected}")]
    InvalidStage { expected: Stage, actual: Stage },

    /// Participant did not give consent on the welcome stage
    #[error("participant consent is required to start the study")]
    ConsentRequired,

    /// Chat input arrived after the timer expired or the study was ended
    #[error("chat is closed for session {0}")]
    ChatClosed(String),

    /// Final feedback is write-once
    #[error("feedback already submitted for session {0}")]
    FeedbackAlreadySubmitted(String),

    /// A finalized session cannot be resumed
    #[error("session {0} is already final")]
    SessionFinalized(String),

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Summary rows are appended once per session
    #[error("summary already recorded for session {0}")]
    SummaryAlreadyRecorded(String),

    /// Saving a session snapshot or summary row failed
    #[error("failed to persist session {session_id}: {source}")]
    Persistence {
        session_id: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias for poemlab-core
pub type Result<T> = std::result::Result<T, Error>;
