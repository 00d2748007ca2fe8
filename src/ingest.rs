//! Match feed loading
//!
//! A feed is a JSON document listing the rounds of one or more tournaments
//! and the matches played in them:
//!
//! ```json
//! {
//!   "rounds": [
//!     { "id": "spring-r1", "tournament": "spring", "participants": ["ana", "bo", "cy", "di"] }
//!   ],
//!   "matches": [
//!     { "id": "m1", "player_a": "ana", "player_b": "bo", "winner": "ana",
//!       "timestamp": "2024-04-01T18:00:00Z", "round_id": "spring-r1" },
//!     { "id": "m2", "player_a": "cy", "player_b": "di",
//!       "score": { "player_a": 1, "player_b": 3 },
//!       "timestamp": "2024-04-01T18:00:00Z", "round_id": "spring-r1" }
//!   ]
//! }
//! ```
//!
//! A match without `winner` takes it from `score` when one is given. Teams
//! are identified by a single id like any player.

use crate::types::{Match, TournamentRound};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchFeed {
    #[serde(default)]
    pub rounds: Vec<TournamentRound>,
    #[serde(default)]
    pub matches: Vec<Match>,
}

impl MatchFeed {
    /// Load a feed from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read match feed {}", path.display()))?;
        let feed = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse match feed {}", path.display()))?;

        info!(
            "Loaded {} rounds and {} matches from {}",
            feed.rounds.len(),
            feed.matches.len(),
            path.display()
        );
        Ok(feed)
    }

    /// Parse a feed, fill winners from set scores and order matches by time
    pub fn from_json(json: &str) -> Result<Self> {
        let mut feed: MatchFeed = serde_json::from_str(json)?;
        feed.normalize()?;
        Ok(feed)
    }

    /// Fill missing winners from scores, reject duplicate match ids and sort
    /// matches by timestamp. Sorting is stable, so matches sharing a
    /// timestamp keep their feed order.
    pub fn normalize(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        for game in &mut self.matches {
            if !seen.insert(game.id.clone()) {
                anyhow::bail!("Duplicate match id {} in feed", game.id);
            }
            if game.winner.is_none() {
                if let Some(score) = game.score {
                    let resolved = Match::from_scores(
                        game.id.clone(),
                        game.player_a.clone(),
                        game.player_b.clone(),
                        score,
                        game.timestamp,
                        game.round_id.clone(),
                    );
                    game.winner = resolved.winner;
                }
                if game.winner.is_none() {
                    warn!("Match {} has no winner and will be rejected", game.id);
                }
            }
        }

        self.matches.sort_by_key(|game| game.timestamp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FEED: &str = r#"{
        "rounds": [
            { "id": "r1", "tournament": "spring", "participants": ["a", "b", "c", "d"] }
        ],
        "matches": [
            { "id": "m2", "player_a": "c", "player_b": "d",
              "score": { "player_a": 1, "player_b": 3 },
              "timestamp": "2024-04-01T19:00:00Z", "round_id": "r1" },
            { "id": "m1", "player_a": "a", "player_b": "b", "winner": "a",
              "timestamp": "2024-04-01T18:00:00Z", "round_id": "r1" },
            { "id": "m3", "player_a": "a", "player_b": "c",
              "score": { "player_a": 2, "player_b": 2 },
              "timestamp": "2024-04-01T19:00:00Z", "round_id": "r1" }
        ]
    }"#;

    #[test]
    fn test_feed_sorted_and_winners_resolved() {
        let feed = MatchFeed::from_json(FEED).unwrap();

        let ids: Vec<&str> = feed.matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert_eq!(feed.matches[1].winner.as_deref(), Some("d"));
        assert_eq!(feed.matches[2].winner, None);
        assert_eq!(feed.rounds[0].tournament.as_deref(), Some("spring"));
        assert_eq!(feed.rounds[0].len(), 4);
    }

    #[test]
    fn test_duplicate_match_ids_rejected() {
        let json = r#"{ "matches": [
            { "id": "m1", "player_a": "a", "player_b": "b", "winner": "a",
              "timestamp": "2024-04-01T18:00:00Z", "round_id": "r1" },
            { "id": "m1", "player_a": "a", "player_b": "b", "winner": "b",
              "timestamp": "2024-04-02T18:00:00Z", "round_id": "r1" }
        ] }"#;
        assert!(MatchFeed::from_json(json).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FEED.as_bytes()).unwrap();

        let feed = MatchFeed::from_path(file.path()).unwrap();
        assert_eq!(feed.matches.len(), 3);
        assert!(MatchFeed::from_path(Path::new("/nonexistent/feed.json")).is_err());
    }
}
