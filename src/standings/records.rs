//! Win/loss records and head-to-head summaries

use crate::error::Result;
use crate::rating::RatingStore;
use crate::types::{GameCount, PlayerId, RatingDelta, RoundId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadToHeadClass {
    Positive,
    Even,
    Negative,
}

/// Record against a single opponent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub wins: u32,
    pub losses: u32,
    /// Games taken in scored sets
    pub games_won: u32,
    pub games_lost: u32,
}

impl HeadToHead {
    pub fn class(&self) -> HeadToHeadClass {
        if self.wins > self.losses {
            HeadToHeadClass::Positive
        } else if self.wins == self.losses && self.wins > 0 {
            HeadToHeadClass::Even
        } else {
            HeadToHeadClass::Negative
        }
    }
}

impl std::fmt::Display for HeadToHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.wins, self.losses)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: PlayerId,
    pub wins: u32,
    pub losses: u32,
    pub head_to_head: BTreeMap<PlayerId, HeadToHead>,
    /// Opponents beaten, in match order, repeats included
    pub won_against: Vec<PlayerId>,
    pub lost_against: Vec<PlayerId>,
    /// Games taken and conceded across scored sets
    pub games_won: u32,
    pub games_lost: u32,
    /// Distinct rounds with at least one processed match
    pub rounds_attended: usize,
    /// Distinct tournaments with at least one processed match. A round
    /// without a known tournament counts as its own event.
    pub events_attended: usize,
}

impl PlayerRecord {
    pub fn total_sets(&self) -> u32 {
        self.wins + self.losses
    }

    /// Opponents with the given head-to-head class, ordered by id
    pub fn opponents(&self, class: HeadToHeadClass) -> Vec<(&PlayerId, &HeadToHead)> {
        self.head_to_head
            .iter()
            .filter(|(_, record)| record.class() == class)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRecords {
    /// Sorted by total sets, most active first; ties by id
    pub players: Vec<PlayerRecord>,
}

impl MatchRecords {
    /// Build records from committed deltas.
    ///
    /// Each delta describes one participant's side of a match, so every
    /// match contributes to both players. Without round information every
    /// round is treated as a separate event.
    pub fn from_deltas<'a, I>(deltas: I) -> Self
    where
        I: IntoIterator<Item = &'a RatingDelta>,
    {
        Self::build(deltas, &HashMap::new())
    }

    /// Build records from the store's delta log, grouping rounds into
    /// events by their tournament
    pub fn from_store(store: &dyn RatingStore) -> Result<Self> {
        let deltas = store.all_deltas()?;

        let mut events: HashMap<RoundId, String> = HashMap::new();
        for delta in &deltas {
            if events.contains_key(&delta.round_id) {
                continue;
            }
            let event = store
                .round(&delta.round_id)?
                .and_then(|round| round.tournament)
                .unwrap_or_else(|| delta.round_id.clone());
            events.insert(delta.round_id.clone(), event);
        }

        Ok(Self::build(&deltas, &events))
    }

    fn build<'a, I>(deltas: I, events: &HashMap<RoundId, String>) -> Self
    where
        I: IntoIterator<Item = &'a RatingDelta>,
    {
        let mut records: BTreeMap<PlayerId, PlayerRecord> = BTreeMap::new();
        let mut rounds: BTreeMap<PlayerId, BTreeSet<&'a str>> = BTreeMap::new();
        let mut attended: BTreeMap<PlayerId, BTreeSet<String>> = BTreeMap::new();

        for delta in deltas {
            let record = records
                .entry(delta.player_id.clone())
                .or_insert_with(|| PlayerRecord {
                    player_id: delta.player_id.clone(),
                    ..PlayerRecord::default()
                });

            if delta.won {
                record.wins += 1;
            } else {
                record.losses += 1;
            }
            let games = delta.games.unwrap_or_default();
            record.games_won += games.won;
            record.games_lost += games.lost;

            for opponent in &delta.opponent_ids {
                let h2h = record.head_to_head.entry(opponent.clone()).or_default();
                h2h.games_won += games.won;
                h2h.games_lost += games.lost;
                if delta.won {
                    h2h.wins += 1;
                    record.won_against.push(opponent.clone());
                } else {
                    h2h.losses += 1;
                    record.lost_against.push(opponent.clone());
                }
            }

            rounds
                .entry(delta.player_id.clone())
                .or_default()
                .insert(delta.round_id.as_str());
            attended
                .entry(delta.player_id.clone())
                .or_default()
                .insert(
                    events
                        .get(&delta.round_id)
                        .cloned()
                        .unwrap_or_else(|| delta.round_id.clone()),
                );
        }

        let mut players: Vec<PlayerRecord> = records
            .into_values()
            .map(|mut record| {
                record.rounds_attended = rounds.get(&record.player_id).map_or(0, |r| r.len());
                record.events_attended = attended.get(&record.player_id).map_or(0, |e| e.len());
                record
            })
            .collect();
        players.sort_by(|a, b| {
            b.total_sets()
                .cmp(&a.total_sets())
                .then_with(|| a.player_id.cmp(&b.player_id))
        });

        Self { players }
    }

    pub fn get(&self, player_id: &str) -> Option<&PlayerRecord> {
        self.players.iter().find(|r| r.player_id == player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::{InMemoryRatingStore, MatchCommit};
    use crate::types::TournamentRound;
    use chrono::Utc;

    fn delta(player: &str, opponent: &str, won: bool, round: &str) -> RatingDelta {
        RatingDelta {
            match_id: format!("{player}-{opponent}-{round}"),
            round_id: round.to_string(),
            player_id: player.to_string(),
            opponent_ids: vec![opponent.to_string()],
            won,
            pre_rating: 1500.0,
            post_rating: 1500.0,
            pre_deviation: 200.0,
            post_deviation: 200.0,
            raw_change: 0.0,
            adjustment_factor: 1.0,
            timestamp: Utc::now(),
            games: None,
        }
    }

    fn both(winner: &str, loser: &str, round: &str) -> [RatingDelta; 2] {
        [delta(winner, loser, true, round), delta(loser, winner, false, round)]
    }

    #[test]
    fn test_records_and_head_to_head() {
        let deltas: Vec<RatingDelta> = [
            both("a", "b", "r1"),
            both("b", "a", "r2"),
            both("a", "c", "r2"),
            both("c", "b", "r3"),
        ]
        .into_iter()
        .flatten()
        .collect();

        let records = MatchRecords::from_deltas(&deltas);
        let a = records.get("a").unwrap();
        assert_eq!((a.wins, a.losses, a.total_sets()), (2, 1, 3));
        assert_eq!(a.rounds_attended, 2);
        assert_eq!(a.head_to_head["b"].class(), HeadToHeadClass::Even);
        assert_eq!(a.head_to_head["c"].class(), HeadToHeadClass::Positive);
        assert_eq!(a.head_to_head["b"].to_string(), "1-1");
        assert_eq!(a.won_against, vec!["b", "c"]);

        let b = records.get("b").unwrap();
        assert_eq!(b.opponents(HeadToHeadClass::Negative).len(), 1);
    }

    #[test]
    fn test_sorted_by_total_sets() {
        let deltas: Vec<RatingDelta> = [both("a", "b", "r1"), both("a", "c", "r1")]
            .into_iter()
            .flatten()
            .collect();

        let records = MatchRecords::from_deltas(&deltas);
        let order: Vec<&str> = records.players.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_game_counts_accumulate_per_opponent() {
        let mut first = both("a", "b", "r1");
        first[0].games = Some(GameCount { won: 3, lost: 1 });
        first[1].games = Some(GameCount { won: 1, lost: 3 });
        let mut second = both("b", "a", "r2");
        second[0].games = Some(GameCount { won: 3, lost: 2 });
        second[1].games = Some(GameCount { won: 2, lost: 3 });
        let unscored = both("a", "b", "r3");

        let deltas: Vec<RatingDelta> = [first, second, unscored].into_iter().flatten().collect();
        let records = MatchRecords::from_deltas(&deltas);

        let a = records.get("a").unwrap();
        assert_eq!((a.games_won, a.games_lost), (5, 4));
        let h2h = a.head_to_head["b"];
        assert_eq!((h2h.wins, h2h.losses), (2, 1));
        assert_eq!((h2h.games_won, h2h.games_lost), (5, 4));
    }

    #[test]
    fn test_events_grouped_by_tournament() {
        let store = InMemoryRatingStore::default();
        store
            .record_round(TournamentRound::new("s1-r1", ["a", "b"]).with_tournament("spring"))
            .unwrap();
        store
            .record_round(TournamentRound::new("s1-r2", ["a", "b"]).with_tournament("spring"))
            .unwrap();
        store
            .record_round(TournamentRound::new("open-r1", ["a", "c"]))
            .unwrap();

        for (winner, loser, round) in [("a", "b", "s1-r1"), ("b", "a", "s1-r2"), ("a", "c", "open-r1")] {
            store
                .commit_match(MatchCommit {
                    snapshots: Vec::new(),
                    deltas: both(winner, loser, round).into(),
                })
                .unwrap();
        }

        let records = MatchRecords::from_store(&store).unwrap();
        let a = records.get("a").unwrap();
        assert_eq!(a.rounds_attended, 3);
        assert_eq!(a.events_attended, 2);
        assert_eq!(records.get("b").unwrap().events_attended, 1);

        let by_round = MatchRecords::from_deltas(&store.all_deltas().unwrap());
        assert_eq!(by_round.get("a").unwrap().events_attended, 3);
    }
}
