//! Rating computation and storage
//!
//! This module holds the rating store (in-memory and SQLite), the pairwise
//! update rules (Elo via skillratings, and a Glicko-style rule), the
//! strength-of-field adjuster and the engine tying them together.

pub mod decay;
pub mod elo;
pub mod engine;
pub mod glicko;
pub mod locks;
pub mod rule;
pub mod sqlite;
pub mod store;
pub mod strength;

// Re-export commonly used types
pub use decay::InactivityPolicy;
pub use elo::EloRule;
pub use engine::{RatingEngine, ReplaySummary};
pub use glicko::GlickoRule;
pub use rule::{build_rule, RuleOutcome, SideUpdate, UpdateRule};
pub use sqlite::SqliteRatingStore;
pub use store::{
    HistoryIter, InMemoryRatingStore, MatchCommit, RatingStore, SnapshotHistory, TimeRange,
};
pub use strength::{Adjustment, FieldRatings, StrengthOfFieldAdjuster, StrengthOfFieldConfig};
