//! Ranking table

use crate::error::Result;
use crate::rating::RatingStore;
use crate::types::{Player, PlayerId};
use crate::utils::conservative_rating;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardOptions {
    /// Hide players with fewer processed matches
    pub min_matches: u64,
    /// Keep only the top entries
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    pub player_id: PlayerId,
    pub rating: f64,
    pub deviation: f64,
    pub conservative_rating: f64,
    pub matches_played: u64,
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn from_store(store: &dyn RatingStore, options: &LeaderboardOptions) -> Result<Self> {
        Ok(Self::from_players(store.players()?, options))
    }

    /// Rank by rating, highest first. Equal ratings are ordered by id.
    pub fn from_players(players: Vec<Player>, options: &LeaderboardOptions) -> Self {
        let mut players: Vec<Player> = players
            .into_iter()
            .filter(|p| p.matches_played >= options.min_matches)
            .collect();
        players.sort_by(|a, b| b.rating.total_cmp(&a.rating).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = options.limit {
            players.truncate(limit);
        }

        let entries = players
            .into_iter()
            .enumerate()
            .map(|(index, player)| LeaderboardEntry {
                rank: index + 1,
                conservative_rating: conservative_rating(player.rating, player.deviation),
                player_id: player.id,
                rating: player.rating,
                deviation: player.deviation,
                matches_played: player.matches_played,
                last_active: player.last_active,
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position_of(&self, player_id: &str) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|e| e.player_id == player_id)
    }
}
