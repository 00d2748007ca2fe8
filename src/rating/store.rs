//! Rating store interface and the in-memory implementation
//!
//! The store keeps an append-only, time-ordered snapshot log per player, the
//! recorded tournament rounds, and the committed delta log. The engine is the
//! only writer; everything else reads.

use crate::error::{RatingError, Result};
use crate::types::{
    MatchId, Player, PlayerId, PlayerRating, RatingDelta, RatingSnapshot, RoundId,
    TournamentRound,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Half-open time range `[start, end)`, either bound optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// The whole history
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp < end)
    }
}

/// Everything written for one processed match, committed all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct MatchCommit {
    pub snapshots: Vec<(PlayerId, RatingSnapshot)>,
    pub deltas: Vec<RatingDelta>,
}

/// Trait for rating store operations
pub trait RatingStore: Send + Sync {
    /// Latest snapshot of a player. Unknown players are initialised with the
    /// default snapshot on first lookup.
    fn get_current(&self, player_id: &str) -> Result<RatingSnapshot>;

    /// Append a snapshot; fails if it precedes the player's latest snapshot
    fn append_snapshot(&self, player_id: &str, snapshot: RatingSnapshot) -> Result<()>;

    /// Snapshots of a player inside `range`, ordered by timestamp
    fn history(&self, player_id: &str, range: TimeRange) -> Result<SnapshotHistory>;

    /// Append every snapshot and delta of a match, or none of them
    fn commit_match(&self, commit: MatchCommit) -> Result<()>;

    /// Record a round's field. Re-recording an identical round is a no-op.
    fn record_round(&self, round: TournamentRound) -> Result<()>;

    fn round(&self, round_id: &str) -> Result<Option<TournamentRound>>;

    /// Current state of every known player, ordered by id
    fn players(&self) -> Result<Vec<Player>>;

    /// Committed deltas of a player in commit order
    fn deltas_for(&self, player_id: &str) -> Result<Vec<RatingDelta>>;

    /// Every committed delta in commit order
    fn all_deltas(&self) -> Result<Vec<RatingDelta>>;

    /// Drop all players, rounds and deltas
    fn reset(&self) -> Result<()>;
}

/// Ensure `next` does not precede `latest` for the same player
pub(crate) fn check_order(
    player_id: &str,
    latest: &RatingSnapshot,
    next: &RatingSnapshot,
) -> Result<()> {
    if next.timestamp < latest.timestamp {
        return Err(RatingError::InvalidTimestampOrder {
            player_id: player_id.to_string(),
            latest: latest.timestamp,
            attempted: next.timestamp,
        });
    }
    Ok(())
}

pub(crate) fn ensure_distinct_players(commit: &MatchCommit) -> Result<()> {
    let mut seen = HashSet::new();
    for (player_id, _) in &commit.snapshots {
        if !seen.insert(player_id.as_str()) {
            return Err(RatingError::Internal {
                message: format!("Player {} appears twice in one commit", player_id),
            });
        }
    }
    Ok(())
}

type SnapshotLog = Arc<RwLock<Vec<RatingSnapshot>>>;

#[derive(Debug, Clone)]
enum HistorySource {
    /// Window over a live append-only log
    Shared {
        log: SnapshotLog,
        start: usize,
        end: usize,
    },
    /// Rows already loaded from persistent storage
    Loaded(Arc<[RatingSnapshot]>),
}

/// Finite, restartable sequence of snapshots.
///
/// Every call to [`SnapshotHistory::iter`] starts from the beginning of the
/// range. Entries are read from the log one at a time.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    source: HistorySource,
}

impl SnapshotHistory {
    pub(crate) fn loaded(snapshots: Vec<RatingSnapshot>) -> Self {
        Self {
            source: HistorySource::Loaded(snapshots.into()),
        }
    }

    fn shared(log: SnapshotLog, start: usize, end: usize) -> Self {
        Self {
            source: HistorySource::Shared { log, start, end },
        }
    }

    fn empty() -> Self {
        Self::loaded(Vec::new())
    }

    pub fn iter(&self) -> HistoryIter<'_> {
        HistoryIter {
            history: self,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        match &self.source {
            HistorySource::Shared { start, end, .. } => end - start,
            HistorySource::Loaded(snapshots) => snapshots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<RatingSnapshot> {
        match &self.source {
            HistorySource::Shared { log, start, end } => {
                if start + index >= *end {
                    return None;
                }
                log.read()
                    .ok()
                    .and_then(|entries| entries.get(start + index).cloned())
            }
            HistorySource::Loaded(snapshots) => snapshots.get(index).cloned(),
        }
    }
}

/// Iterator over a [`SnapshotHistory`]
#[derive(Debug)]
pub struct HistoryIter<'a> {
    history: &'a SnapshotHistory,
    position: usize,
}

impl Iterator for HistoryIter<'_> {
    type Item = RatingSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        let snapshot = self.history.get(self.position)?;
        self.position += 1;
        Some(snapshot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.history.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl<'a> IntoIterator for &'a SnapshotHistory {
    type Item = RatingSnapshot;
    type IntoIter = HistoryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    logs: HashMap<PlayerId, SnapshotLog>,
    rounds: HashMap<RoundId, TournamentRound>,
    deltas: Vec<RatingDelta>,
    committed_matches: HashSet<MatchId>,
}

/// In-memory rating store
#[derive(Debug)]
pub struct InMemoryRatingStore {
    state: RwLock<MemoryState>,
    initial_rating: PlayerRating,
}

impl InMemoryRatingStore {
    /// Create a new in-memory store seeding unknown players with `initial_rating`
    pub fn new(initial_rating: PlayerRating) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            initial_rating,
        }
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| RatingError::Internal {
            message: "Failed to acquire store read lock".to_string(),
        })
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| RatingError::Internal {
            message: "Failed to acquire store write lock".to_string(),
        })
    }
}

impl Default for InMemoryRatingStore {
    fn default() -> Self {
        Self::new(PlayerRating::default())
    }
}

fn latest_of(log: &SnapshotLog) -> Result<Option<RatingSnapshot>> {
    let entries = log.read().map_err(|_| RatingError::Internal {
        message: "Failed to acquire snapshot log read lock".to_string(),
    })?;
    Ok(entries.last().cloned())
}

impl RatingStore for InMemoryRatingStore {
    fn get_current(&self, player_id: &str) -> Result<RatingSnapshot> {
        {
            let state = self.read_state()?;
            if let Some(log) = state.logs.get(player_id) {
                if let Some(latest) = latest_of(log)? {
                    return Ok(latest);
                }
            }
        }

        let mut state = self.write_state()?;
        let log = state
            .logs
            .entry(player_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
            .clone();
        drop(state);

        let mut entries = log.write().map_err(|_| RatingError::Internal {
            message: "Failed to acquire snapshot log write lock".to_string(),
        })?;
        if entries.is_empty() {
            entries.push(RatingSnapshot::initial(self.initial_rating));
        }
        entries.last().cloned().ok_or_else(|| RatingError::Internal {
            message: format!("Snapshot log for {} is empty", player_id),
        })
    }

    fn append_snapshot(&self, player_id: &str, snapshot: RatingSnapshot) -> Result<()> {
        self.commit_match(MatchCommit {
            snapshots: vec![(player_id.to_string(), snapshot)],
            deltas: Vec::new(),
        })
    }

    fn history(&self, player_id: &str, range: TimeRange) -> Result<SnapshotHistory> {
        let state = self.read_state()?;
        let Some(log) = state.logs.get(player_id) else {
            return Ok(SnapshotHistory::empty());
        };

        let entries = log.read().map_err(|_| RatingError::Internal {
            message: "Failed to acquire snapshot log read lock".to_string(),
        })?;
        // Logs are sorted by timestamp, so the range maps to a contiguous window
        let start = match range.start {
            Some(start) => entries.partition_point(|s| s.timestamp < start),
            None => 0,
        };
        let end = match range.end {
            Some(end) => entries.partition_point(|s| s.timestamp < end),
            None => entries.len(),
        };

        Ok(SnapshotHistory::shared(log.clone(), start, end.max(start)))
    }

    fn commit_match(&self, commit: MatchCommit) -> Result<()> {
        ensure_distinct_players(&commit)?;
        let mut state = self.write_state()?;

        // Validate everything before touching any log
        for (player_id, snapshot) in &commit.snapshots {
            if let Some(log) = state.logs.get(player_id) {
                if let Some(latest) = latest_of(log)? {
                    check_order(player_id, &latest, snapshot)?;
                }
            }
        }
        if let Some(delta) = commit
            .deltas
            .iter()
            .find(|d| state.committed_matches.contains(&d.match_id))
        {
            return Err(RatingError::InvalidMatch {
                match_id: delta.match_id.clone(),
                reason: "match was already committed".to_string(),
            });
        }

        for (player_id, snapshot) in commit.snapshots {
            let log = state
                .logs
                .entry(player_id)
                .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
                .clone();
            let mut entries = log.write().map_err(|_| RatingError::Internal {
                message: "Failed to acquire snapshot log write lock".to_string(),
            })?;
            entries.push(snapshot);
        }
        for delta in commit.deltas {
            state.committed_matches.insert(delta.match_id.clone());
            state.deltas.push(delta);
        }

        Ok(())
    }

    fn record_round(&self, round: TournamentRound) -> Result<()> {
        let mut state = self.write_state()?;
        match state.rounds.get(&round.id) {
            Some(existing) if existing.participants == round.participants => Ok(()),
            Some(_) => Err(RatingError::RoundConflict { round_id: round.id }),
            None => {
                state.rounds.insert(round.id.clone(), round);
                Ok(())
            }
        }
    }

    fn round(&self, round_id: &str) -> Result<Option<TournamentRound>> {
        Ok(self.read_state()?.rounds.get(round_id).cloned())
    }

    fn players(&self) -> Result<Vec<Player>> {
        let state = self.read_state()?;
        let mut players = Vec::with_capacity(state.logs.len());

        for (player_id, log) in &state.logs {
            let entries = log.read().map_err(|_| RatingError::Internal {
                message: "Failed to acquire snapshot log read lock".to_string(),
            })?;
            let Some(latest) = entries.last() else {
                continue;
            };
            let played: Vec<&RatingSnapshot> =
                entries.iter().filter(|s| !s.is_initial()).collect();

            players.push(Player {
                id: player_id.clone(),
                rating: latest.rating,
                deviation: latest.deviation,
                last_active: played.last().map(|s| s.timestamp),
                matches_played: played.len() as u64,
            });
        }

        players.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(players)
    }

    fn deltas_for(&self, player_id: &str) -> Result<Vec<RatingDelta>> {
        Ok(self
            .read_state()?
            .deltas
            .iter()
            .filter(|d| d.player_id == player_id)
            .cloned()
            .collect())
    }

    fn all_deltas(&self) -> Result<Vec<RatingDelta>> {
        Ok(self.read_state()?.deltas.clone())
    }

    fn reset(&self) -> Result<()> {
        *self.write_state()? = MemoryState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn snapshot(rating: f64, day: u32, match_id: &str) -> RatingSnapshot {
        RatingSnapshot::after_match(
            PlayerRating {
                rating,
                deviation: 180.0,
            },
            at(day),
            match_id,
        )
    }

    #[test]
    fn test_unknown_player_gets_default_snapshot() {
        let store = InMemoryRatingStore::new(PlayerRating {
            rating: 1400.0,
            deviation: 250.0,
        });

        let current = store.get_current("newcomer").unwrap();
        assert_eq!(current.rating, 1400.0);
        assert_eq!(current.deviation, 250.0);
        assert!(current.is_initial());

        // Initialised on first lookup, visible in history
        let history = store.history("newcomer", TimeRange::all()).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_append_and_get_current() {
        let store = InMemoryRatingStore::default();
        store.append_snapshot("p1", snapshot(1510.0, 1, "m1")).unwrap();
        store.append_snapshot("p1", snapshot(1520.0, 2, "m2")).unwrap();

        let current = store.get_current("p1").unwrap();
        assert_eq!(current.rating, 1520.0);
        assert_eq!(current.match_id.as_deref(), Some("m2"));
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let store = InMemoryRatingStore::default();
        store.append_snapshot("p1", snapshot(1510.0, 5, "m1")).unwrap();

        let err = store
            .append_snapshot("p1", snapshot(1490.0, 4, "m0"))
            .unwrap_err();
        assert!(matches!(err, RatingError::InvalidTimestampOrder { .. }));
        assert_eq!(store.get_current("p1").unwrap().rating, 1510.0);
    }

    #[test]
    fn test_equal_timestamps_accepted() {
        let store = InMemoryRatingStore::default();
        store.append_snapshot("p1", snapshot(1510.0, 5, "m1")).unwrap();
        store.append_snapshot("p1", snapshot(1500.0, 5, "m2")).unwrap();
        assert_eq!(store.history("p1", TimeRange::all()).unwrap().len(), 2);
    }

    #[test]
    fn test_history_range_is_half_open_and_restartable() {
        let store = InMemoryRatingStore::default();
        for day in 1..=5 {
            store
                .append_snapshot("p1", snapshot(1500.0 + day as f64, day, &format!("m{day}")))
                .unwrap();
        }

        let history = store
            .history("p1", TimeRange::between(at(2), at(4)))
            .unwrap();
        let first: Vec<f64> = history.iter().map(|s| s.rating).collect();
        let second: Vec<f64> = history.iter().map(|s| s.rating).collect();

        assert_eq!(first, vec![1502.0, 1503.0]);
        assert_eq!(first, second);
        assert_eq!(history.iter().size_hint(), (2, Some(2)));
    }

    #[test]
    fn test_history_is_finite_after_later_appends() {
        let store = InMemoryRatingStore::default();
        store.append_snapshot("p1", snapshot(1510.0, 1, "m1")).unwrap();
        let history = store.history("p1", TimeRange::all()).unwrap();

        store.append_snapshot("p1", snapshot(1520.0, 2, "m2")).unwrap();
        assert_eq!(history.iter().count(), 1);
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let store = InMemoryRatingStore::default();
        store.append_snapshot("p2", snapshot(1500.0, 10, "m1")).unwrap();

        let commit = MatchCommit {
            snapshots: vec![
                ("p1".to_string(), snapshot(1516.0, 9, "m2")),
                ("p2".to_string(), snapshot(1484.0, 9, "m2")),
            ],
            deltas: Vec::new(),
        };

        assert!(store.commit_match(commit).is_err());
        // p1 must not have received its snapshot
        assert!(store.history("p1", TimeRange::all()).unwrap().is_empty());
        assert_eq!(store.get_current("p2").unwrap().rating, 1500.0);
    }

    #[test]
    fn test_round_recording_is_immutable() {
        let store = InMemoryRatingStore::default();
        let round = TournamentRound::new("r1", ["a", "b", "c"]);

        store.record_round(round.clone()).unwrap();
        store.record_round(round.clone()).unwrap();

        let changed = TournamentRound::new("r1", ["a", "b"]);
        let err = store.record_round(changed).unwrap_err();
        assert!(matches!(err, RatingError::RoundConflict { .. }));
        assert_eq!(store.round("r1").unwrap(), Some(round));
    }

    #[test]
    fn test_players_projection() {
        let store = InMemoryRatingStore::default();
        store.get_current("idle").unwrap();
        store.append_snapshot("active", snapshot(1530.0, 3, "m1")).unwrap();

        let players = store.players().unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].id, "active");
        assert_eq!(players[0].matches_played, 1);
        assert_eq!(players[0].last_active, Some(at(3)));
        assert_eq!(players[1].id, "idle");
        assert_eq!(players[1].matches_played, 0);
        assert_eq!(players[1].last_active, None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = InMemoryRatingStore::default();
        store.append_snapshot("p1", snapshot(1530.0, 3, "m1")).unwrap();
        store
            .record_round(TournamentRound::new("r1", ["p1", "p2"]))
            .unwrap();

        store.reset().unwrap();
        assert!(store.players().unwrap().is_empty());
        assert!(store.round("r1").unwrap().is_none());
        assert!(store.all_deltas().unwrap().is_empty());
    }
}
