//! Bracket Rating - skill ratings for tournament results
//!
//! This crate turns decided tournament matches into rating changes. Each
//! change comes from a pairwise update rule (Elo by default), scaled by the
//! strength of the round's field, and is kept as an append-only snapshot
//! history per player.

pub mod config;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod metrics;
pub mod rating;
pub mod runner;
pub mod service;
pub mod standings;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RatingError, Result};
pub use types::*;

// Re-export key components
pub use feed::DeltaPublisher;
pub use rating::{RatingEngine, RatingStore};
pub use runner::BatchRunner;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
