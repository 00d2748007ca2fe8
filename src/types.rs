//! Common types used throughout the rating engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for players (and teams resolved to a single entity)
pub type PlayerId = String;

/// Unique identifier for matches
pub type MatchId = String;

/// Unique identifier for tournament rounds
pub type RoundId = String;

/// Unique identifier for a batch run
pub type RunId = Uuid;

/// Rating information for a player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerRating {
    pub rating: f64,
    pub deviation: f64,
}

impl Default for PlayerRating {
    fn default() -> Self {
        Self {
            rating: 1500.0,
            deviation: 200.0,
        }
    }
}

/// Immutable record of a player's rating as of a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub rating: f64,
    pub deviation: f64,
    pub timestamp: DateTime<Utc>,
    /// Match that produced this snapshot, `None` for the initial default
    pub match_id: Option<MatchId>,
}

impl RatingSnapshot {
    /// Initial snapshot for a player with no history.
    ///
    /// Stamped with the earliest representable instant so any match may
    /// follow it.
    pub fn initial(rating: PlayerRating) -> Self {
        Self {
            rating: rating.rating,
            deviation: rating.deviation,
            timestamp: DateTime::<Utc>::MIN_UTC,
            match_id: None,
        }
    }

    /// Snapshot produced by processing a match
    pub fn after_match(rating: PlayerRating, timestamp: DateTime<Utc>, match_id: &str) -> Self {
        Self {
            rating: rating.rating,
            deviation: rating.deviation,
            timestamp,
            match_id: Some(match_id.to_string()),
        }
    }

    pub fn is_initial(&self) -> bool {
        self.match_id.is_none()
    }

    pub fn player_rating(&self) -> PlayerRating {
        PlayerRating {
            rating: self.rating,
            deviation: self.deviation,
        }
    }
}

/// Games won by each side of a set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub player_a: u32,
    pub player_b: u32,
}

/// Games taken and conceded by one side of a set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCount {
    pub won: u32,
    pub lost: u32,
}

impl SetScore {
    /// The score seen from player A (`true`) or player B (`false`)
    pub fn for_side(&self, player_a: bool) -> GameCount {
        if player_a {
            GameCount {
                won: self.player_a,
                lost: self.player_b,
            }
        } else {
            GameCount {
                won: self.player_b,
                lost: self.player_a,
            }
        }
    }
}

/// A single decided (or undecided) match between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub player_a: PlayerId,
    pub player_b: PlayerId,
    /// Winner of the match; the game has no draws
    pub winner: Option<PlayerId>,
    pub timestamp: DateTime<Utc>,
    pub round_id: RoundId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<SetScore>,
}

impl Match {
    /// Create a match with a known winner
    pub fn decided(
        id: impl Into<MatchId>,
        player_a: impl Into<PlayerId>,
        player_b: impl Into<PlayerId>,
        winner: impl Into<PlayerId>,
        timestamp: DateTime<Utc>,
        round_id: impl Into<RoundId>,
    ) -> Self {
        Self {
            id: id.into(),
            player_a: player_a.into(),
            player_b: player_b.into(),
            winner: Some(winner.into()),
            timestamp,
            round_id: round_id.into(),
            score: None,
        }
    }

    /// Create a match from a set score. The side with more games wins;
    /// an equal score leaves the match undecided.
    pub fn from_scores(
        id: impl Into<MatchId>,
        player_a: impl Into<PlayerId>,
        player_b: impl Into<PlayerId>,
        score: SetScore,
        timestamp: DateTime<Utc>,
        round_id: impl Into<RoundId>,
    ) -> Self {
        let player_a = player_a.into();
        let player_b = player_b.into();
        let winner = match score.player_a.cmp(&score.player_b) {
            std::cmp::Ordering::Greater => Some(player_a.clone()),
            std::cmp::Ordering::Less => Some(player_b.clone()),
            std::cmp::Ordering::Equal => None,
        };

        Self {
            id: id.into(),
            player_a,
            player_b,
            winner,
            timestamp,
            round_id: round_id.into(),
            score: Some(score),
        }
    }

    pub fn participants(&self) -> [&PlayerId; 2] {
        [&self.player_a, &self.player_b]
    }

    /// The other side of the match, if `player_id` took part
    pub fn opponent_of(&self, player_id: &str) -> Option<&PlayerId> {
        if self.player_a == player_id {
            Some(&self.player_b)
        } else if self.player_b == player_id {
            Some(&self.player_a)
        } else {
            None
        }
    }
}

/// The field of a tournament round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentRound {
    pub id: RoundId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament: Option<String>,
    pub participants: BTreeSet<PlayerId>,
}

impl TournamentRound {
    pub fn new<I, P>(id: impl Into<RoundId>, participants: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PlayerId>,
    {
        Self {
            id: id.into(),
            tournament: None,
            participants: participants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_tournament(mut self, tournament: impl Into<String>) -> Self {
        self.tournament = Some(tournament.into());
        self
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.participants.contains(player_id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// Rating change for one participant of one processed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingDelta {
    pub match_id: MatchId,
    pub round_id: RoundId,
    pub player_id: PlayerId,
    pub opponent_ids: Vec<PlayerId>,
    pub won: bool,
    pub pre_rating: f64,
    pub post_rating: f64,
    pub pre_deviation: f64,
    pub post_deviation: f64,
    /// Change produced by the update rule before the field adjustment
    pub raw_change: f64,
    pub adjustment_factor: f64,
    pub timestamp: DateTime<Utc>,
    /// Games of the set from this player's side, when the feed had a score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games: Option<GameCount>,
}

impl RatingDelta {
    /// Change actually applied to the rating
    pub fn applied_change(&self) -> f64 {
        self.post_rating - self.pre_rating
    }
}

/// Both deltas produced by a single match, winner first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    pub timestamp: DateTime<Utc>,
    pub deltas: Vec<RatingDelta>,
}

impl MatchOutcome {
    pub fn winner(&self) -> Option<&RatingDelta> {
        self.deltas.iter().find(|d| d.won)
    }

    pub fn loser(&self) -> Option<&RatingDelta> {
        self.deltas.iter().find(|d| !d.won)
    }

    pub fn delta_for(&self, player_id: &str) -> Option<&RatingDelta> {
        self.deltas.iter().find(|d| d.player_id == player_id)
    }
}

/// Read-only projection of a player's current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub rating: f64,
    pub deviation: f64,
    /// Timestamp of the last processed match, `None` if never played
    pub last_active: Option<DateTime<Utc>>,
    pub matches_played: u64,
}
