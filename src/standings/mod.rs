//! Read-only projections over rating history
//!
//! Neither projection writes to the store; both can be rebuilt at any time
//! from the current snapshots and the committed delta log.

pub mod leaderboard;
pub mod records;

pub use leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardOptions};
pub use records::{HeadToHead, HeadToHeadClass, MatchRecords, PlayerRecord};
