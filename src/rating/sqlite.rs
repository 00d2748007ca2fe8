//! SQLite-backed rating store
//!
//! Snapshots and deltas are append-only tables; a match commit runs in a
//! single transaction so either both participants are updated or neither is.

use crate::error::{RatingError, Result};
use crate::rating::store::{
    check_order, ensure_distinct_players, MatchCommit, RatingStore, SnapshotHistory, TimeRange,
};
use crate::types::{Player, PlayerRating, RatingDelta, RatingSnapshot, TournamentRound};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS rating_snapshots (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  player_id TEXT NOT NULL,
  rating REAL NOT NULL,
  deviation REAL NOT NULL CHECK (deviation >= 0.0),
  recorded_at_s INTEGER NOT NULL,
  recorded_at_ns INTEGER NOT NULL CHECK (recorded_at_ns >= 0),
  match_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_rating_snapshots_player_time
  ON rating_snapshots(player_id, recorded_at_s, recorded_at_ns, seq);

CREATE TRIGGER IF NOT EXISTS trg_rating_snapshots_no_update
BEFORE UPDATE ON rating_snapshots
BEGIN
  SELECT RAISE(FAIL, 'rating_snapshots is append-only');
END;

CREATE TABLE IF NOT EXISTS tournament_rounds (
  round_id TEXT PRIMARY KEY,
  tournament TEXT,
  participants_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rating_deltas (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  match_id TEXT NOT NULL,
  player_id TEXT NOT NULL,
  delta_json TEXT NOT NULL,
  UNIQUE (match_id, player_id)
);

CREATE TRIGGER IF NOT EXISTS trg_rating_deltas_no_update
BEFORE UPDATE ON rating_deltas
BEGIN
  SELECT RAISE(FAIL, 'rating_deltas is append-only');
END;

CREATE INDEX IF NOT EXISTS idx_rating_deltas_player_seq
  ON rating_deltas(player_id, seq);
";

const DROP_ALL: &str = r"
DROP TABLE IF EXISTS rating_snapshots;
DROP TABLE IF EXISTS tournament_rounds;
DROP TABLE IF EXISTS rating_deltas;
";

/// Durable rating store on a single SQLite connection
pub struct SqliteRatingStore {
    conn: Mutex<Connection>,
    initial_rating: PlayerRating,
}

impl std::fmt::Debug for SqliteRatingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRatingStore")
            .field("initial_rating", &self.initial_rating)
            .finish_non_exhaustive()
    }
}

impl SqliteRatingStore {
    /// Open (and migrate) a database file
    pub fn open(path: &Path, initial_rating: PlayerRating) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::with_connection(conn, initial_rating)
    }

    /// Open a private in-memory database
    pub fn open_in_memory(initial_rating: PlayerRating) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, initial_rating)
    }

    fn with_connection(conn: Connection, initial_rating: PlayerRating) -> Result<Self> {
        conn.execute_batch(SCHEMA_V1)?;
        debug!("SQLite rating store schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
            initial_rating,
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RatingError::Internal {
            message: "Failed to acquire SQLite connection lock".to_string(),
        })
    }
}

/// Full-precision instant as `(seconds, subsecond nanos)`.
///
/// A single nanosecond column cannot hold `DateTime::MIN_UTC`, which stamps
/// initial snapshots, so the instant is split across two columns.
fn to_parts(timestamp: DateTime<Utc>) -> (i64, i64) {
    (
        timestamp.timestamp(),
        i64::from(timestamp.timestamp_subsec_nanos()),
    )
}

fn from_parts(seconds: i64, nanos: i64) -> rusqlite::Result<DateTime<Utc>> {
    u32::try_from(nanos)
        .ok()
        .and_then(|nanos| DateTime::<Utc>::from_timestamp(seconds, nanos))
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Integer,
                format!("timestamp out of range: {seconds}s {nanos}ns").into(),
            )
        })
}

fn parse_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RatingSnapshot> {
    Ok(RatingSnapshot {
        rating: row.get(0)?,
        deviation: row.get(1)?,
        timestamp: from_parts(row.get(2)?, row.get(3)?)?,
        match_id: row.get(4)?,
    })
}

fn latest_snapshot(conn: &Connection, player_id: &str) -> Result<Option<RatingSnapshot>> {
    let sql = "SELECT rating, deviation, recorded_at_s, recorded_at_ns, match_id \
               FROM rating_snapshots WHERE player_id = ?1 \
               ORDER BY recorded_at_s DESC, recorded_at_ns DESC, seq DESC LIMIT 1";
    Ok(conn
        .query_row(sql, params![player_id], parse_snapshot_row)
        .optional()?)
}

fn insert_snapshot(tx: &Transaction<'_>, player_id: &str, snapshot: &RatingSnapshot) -> Result<()> {
    let (seconds, nanos) = to_parts(snapshot.timestamp);
    tx.execute(
        "INSERT INTO rating_snapshots \
           (player_id, rating, deviation, recorded_at_s, recorded_at_ns, match_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            player_id,
            snapshot.rating,
            snapshot.deviation,
            seconds,
            nanos,
            snapshot.match_id
        ],
    )?;
    Ok(())
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| RatingError::Storage {
        message: format!("Corrupt JSON column: {}", e),
    })
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| RatingError::Storage {
        message: format!("Failed to encode JSON column: {}", e),
    })
}

impl RatingStore for SqliteRatingStore {
    fn get_current(&self, player_id: &str) -> Result<RatingSnapshot> {
        let mut conn = self.connection()?;
        if let Some(latest) = latest_snapshot(&conn, player_id)? {
            return Ok(latest);
        }

        let initial = RatingSnapshot::initial(self.initial_rating);
        let tx = conn.transaction()?;
        insert_snapshot(&tx, player_id, &initial)?;
        tx.commit()?;
        Ok(initial)
    }

    fn append_snapshot(&self, player_id: &str, snapshot: RatingSnapshot) -> Result<()> {
        self.commit_match(MatchCommit {
            snapshots: vec![(player_id.to_string(), snapshot)],
            deltas: Vec::new(),
        })
    }

    fn history(&self, player_id: &str, range: TimeRange) -> Result<SnapshotHistory> {
        let conn = self.connection()?;
        let (start_s, start_ns) = range.start.map_or((i64::MIN, 0), to_parts);
        let (end_s, end_ns) = range.end.map_or((i64::MAX, 0), to_parts);

        let mut stmt = conn.prepare(
            "SELECT rating, deviation, recorded_at_s, recorded_at_ns, match_id \
             FROM rating_snapshots \
             WHERE player_id = ?1 \
               AND (recorded_at_s, recorded_at_ns) >= (?2, ?3) \
               AND (recorded_at_s, recorded_at_ns) < (?4, ?5) \
             ORDER BY recorded_at_s ASC, recorded_at_ns ASC, seq ASC",
        )?;
        let rows = stmt
            .query_map(
                params![player_id, start_s, start_ns, end_s, end_ns],
                parse_snapshot_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(SnapshotHistory::loaded(rows))
    }

    fn commit_match(&self, commit: MatchCommit) -> Result<()> {
        ensure_distinct_players(&commit)?;
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        for (player_id, snapshot) in &commit.snapshots {
            if let Some(latest) = latest_snapshot(&tx, player_id)? {
                check_order(player_id, &latest, snapshot)?;
            }
        }
        for delta in &commit.deltas {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT seq FROM rating_deltas WHERE match_id = ?1 LIMIT 1",
                    params![delta.match_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Err(RatingError::InvalidMatch {
                    match_id: delta.match_id.clone(),
                    reason: "match was already committed".to_string(),
                });
            }
        }

        for (player_id, snapshot) in &commit.snapshots {
            insert_snapshot(&tx, player_id, snapshot)?;
        }
        for delta in &commit.deltas {
            tx.execute(
                "INSERT INTO rating_deltas (match_id, player_id, delta_json) VALUES (?1, ?2, ?3)",
                params![delta.match_id, delta.player_id, encode_json(delta)?],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn record_round(&self, round: TournamentRound) -> Result<()> {
        let conn = self.connection()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT participants_json FROM tournament_rounds WHERE round_id = ?1",
                params![round.id],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(raw) => {
                let participants: BTreeSet<String> = decode_json(&raw)?;
                if participants == round.participants {
                    Ok(())
                } else {
                    Err(RatingError::RoundConflict { round_id: round.id })
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO tournament_rounds (round_id, tournament, participants_json) \
                     VALUES (?1, ?2, ?3)",
                    params![round.id, round.tournament, encode_json(&round.participants)?],
                )?;
                Ok(())
            }
        }
    }

    fn round(&self, round_id: &str) -> Result<Option<TournamentRound>> {
        let conn = self.connection()?;
        let row: Option<(Option<String>, String)> = conn
            .query_row(
                "SELECT tournament, participants_json FROM tournament_rounds WHERE round_id = ?1",
                params![round_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(tournament, raw)| {
            Ok(TournamentRound {
                id: round_id.to_string(),
                tournament,
                participants: decode_json(&raw)?,
            })
        })
        .transpose()
    }

    fn players(&self) -> Result<Vec<Player>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT s.player_id, s.rating, s.deviation, \
               (SELECT COUNT(*) FROM rating_snapshots c \
                  WHERE c.player_id = s.player_id AND c.match_id IS NOT NULL), \
               p.recorded_at_s, p.recorded_at_ns \
             FROM rating_snapshots s \
             LEFT JOIN rating_snapshots p ON p.seq = \
               (SELECT c.seq FROM rating_snapshots c \
                  WHERE c.player_id = s.player_id AND c.match_id IS NOT NULL \
                  ORDER BY c.recorded_at_s DESC, c.recorded_at_ns DESC, c.seq DESC LIMIT 1) \
             WHERE s.seq = (SELECT l.seq FROM rating_snapshots l WHERE l.player_id = s.player_id \
                            ORDER BY l.recorded_at_s DESC, l.recorded_at_ns DESC, l.seq DESC \
                            LIMIT 1) \
             ORDER BY s.player_id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let matches_played: i64 = row.get(3)?;
                let last_seconds: Option<i64> = row.get(4)?;
                let last_nanos: Option<i64> = row.get(5)?;
                let last_active = match (last_seconds, last_nanos) {
                    (Some(seconds), Some(nanos)) => Some(from_parts(seconds, nanos)?),
                    _ => None,
                };
                Ok(Player {
                    id: row.get(0)?,
                    rating: row.get(1)?,
                    deviation: row.get(2)?,
                    last_active,
                    matches_played: matches_played.max(0) as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    fn deltas_for(&self, player_id: &str) -> Result<Vec<RatingDelta>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT delta_json FROM rating_deltas WHERE player_id = ?1 ORDER BY seq")?;
        let raw = stmt
            .query_map(params![player_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.iter().map(|json| decode_json(json)).collect()
    }

    fn all_deltas(&self) -> Result<Vec<RatingDelta>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT delta_json FROM rating_deltas ORDER BY seq")?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.iter().map(|json| decode_json(json)).collect()
    }

    fn reset(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(DROP_ALL)?;
        conn.execute_batch(SCHEMA_V1)?;
        Ok(())
    }
}
