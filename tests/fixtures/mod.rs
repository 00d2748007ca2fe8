//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use bracket_rating::config::RatingConfig;
use bracket_rating::error::Result;
use bracket_rating::ingest::MatchFeed;
use bracket_rating::rating::{
    InMemoryRatingStore, MatchCommit, RatingEngine, RatingStore, SnapshotHistory, TimeRange,
};
use bracket_rating::types::{Match, Player, RatingDelta, RatingSnapshot, TournamentRound};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Saturday evening `week` weeks into the season, plus `minute` minutes
pub fn at(week: i64, minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 6, 18, 0, 0).unwrap()
        + Duration::weeks(week)
        + Duration::minutes(minute)
}

pub fn engine_on(store: Arc<dyn RatingStore>) -> Arc<RatingEngine> {
    Arc::new(RatingEngine::new(RatingConfig::default(), store).unwrap())
}

pub fn memory_engine() -> Arc<RatingEngine> {
    engine_on(Arc::new(InMemoryRatingStore::default()))
}

/// Independent weekly tournaments.
///
/// Each tournament has its own player pool and plays a round robin every
/// week. Results come from a fixed pseudo-random sequence, so the feed is
/// the same on every call.
pub fn league_feed(tournaments: usize, players: usize, weeks: i64) -> MatchFeed {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut feed = MatchFeed::default();
    for t in 0..tournaments {
        let pool: Vec<String> = (0..players).map(|p| format!("t{t}-p{p}")).collect();
        for week in 0..weeks {
            let round_id = format!("t{t}-w{week}");
            feed.rounds
                .push(TournamentRound::new(round_id.clone(), pool.clone()).with_tournament(format!("t{t}")));

            let mut minute = 0;
            for a in 0..players {
                for b in (a + 1)..players {
                    // Lower-numbered players are stronger most of the time
                    let winner = if next() % 4 == 0 { &pool[b] } else { &pool[a] };
                    feed.matches.push(Match::decided(
                        format!("t{t}-w{week}-{a}v{b}"),
                        pool[a].clone(),
                        pool[b].clone(),
                        winner.clone(),
                        at(week, minute),
                        round_id.clone(),
                    ));
                    minute += 1;
                }
            }
        }
    }

    feed.normalize().unwrap();
    feed
}

pub fn ratings_of(players: &[Player]) -> Vec<(String, f64, f64, u64)> {
    players
        .iter()
        .map(|p| (p.id.clone(), p.rating, p.deviation, p.matches_played))
        .collect()
}

/// Store that raises the cancellation flag after a number of commits
pub struct CancellingStore {
    inner: InMemoryRatingStore,
    commits: AtomicUsize,
    after: usize,
    cancel: watch::Sender<bool>,
}

impl CancellingStore {
    pub fn new(after: usize) -> (Arc<Self>, watch::Receiver<bool>) {
        let (cancel, receiver) = watch::channel(false);
        let store = Arc::new(Self {
            inner: InMemoryRatingStore::default(),
            commits: AtomicUsize::new(0),
            after,
            cancel,
        });
        (store, receiver)
    }
}

impl RatingStore for CancellingStore {
    fn get_current(&self, player_id: &str) -> Result<RatingSnapshot> {
        self.inner.get_current(player_id)
    }

    fn append_snapshot(&self, player_id: &str, snapshot: RatingSnapshot) -> Result<()> {
        self.inner.append_snapshot(player_id, snapshot)
    }

    fn history(&self, player_id: &str, range: TimeRange) -> Result<SnapshotHistory> {
        self.inner.history(player_id, range)
    }

    fn commit_match(&self, commit: MatchCommit) -> Result<()> {
        self.inner.commit_match(commit)?;
        if self.commits.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.cancel.send_replace(true);
        }
        Ok(())
    }

    fn record_round(&self, round: TournamentRound) -> Result<()> {
        self.inner.record_round(round)
    }

    fn round(&self, round_id: &str) -> Result<Option<TournamentRound>> {
        self.inner.round(round_id)
    }

    fn players(&self) -> Result<Vec<Player>> {
        self.inner.players()
    }

    fn deltas_for(&self, player_id: &str) -> Result<Vec<RatingDelta>> {
        self.inner.deltas_for(player_id)
    }

    fn all_deltas(&self) -> Result<Vec<RatingDelta>> {
        self.inner.all_deltas()
    }

    fn reset(&self) -> Result<()> {
        self.inner.reset()
    }
}
