//! Error types for the rating engine
//!
//! Core operations (store, adjuster, engine) return [`RatingError`] so callers
//! can match on the failure kind. Application layers (configuration, feed
//! loading, the CLI) use `anyhow` and attach context.

use chrono::{DateTime, Utc};

/// Result type alias for core rating operations
pub type Result<T> = std::result::Result<T, RatingError>;

/// Errors surfaced by the rating core
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RatingError {
    #[error(
        "Out-of-order timestamp for player {player_id}: {attempted} precedes latest {latest}"
    )]
    InvalidTimestampOrder {
        player_id: String,
        latest: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    #[error("Match {match_id} has no winner")]
    UndecidedMatch { match_id: String },

    #[error("Cannot compute strength-of-field adjustment: {reason}")]
    UnknownAdjustmentInput { reason: String },

    #[error("Invalid match {match_id}: {reason}")]
    InvalidMatch { match_id: String, reason: String },

    #[error("Round {round_id} is already recorded with a different field")]
    RoundConflict { round_id: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RatingError {
    /// Short label used for metrics and batch reports
    pub fn kind(&self) -> &'static str {
        match self {
            RatingError::InvalidTimestampOrder { .. } => "invalid_timestamp_order",
            RatingError::UndecidedMatch { .. } => "undecided_match",
            RatingError::UnknownAdjustmentInput { .. } => "unknown_adjustment_input",
            RatingError::InvalidMatch { .. } => "invalid_match",
            RatingError::RoundConflict { .. } => "round_conflict",
            RatingError::Configuration { .. } => "configuration",
            RatingError::Storage { .. } => "storage",
            RatingError::Internal { .. } => "internal",
        }
    }
}

impl From<rusqlite::Error> for RatingError {
    fn from(err: rusqlite::Error) -> Self {
        RatingError::Storage {
            message: err.to_string(),
        }
    }
}
