//! Batch runner
//!
//! Records a feed's rounds, splits its matches into independent groups and
//! rates every group in timestamp order. Committed outcomes flow through a
//! channel to the delta publisher while rating continues.

use crate::config::RunnerSettings;
use crate::error::{RatingError, Result};
use crate::feed::DeltaPublisher;
use crate::ingest::MatchFeed;
use crate::metrics::MetricsCollector;
use crate::rating::RatingEngine;
use crate::runner::partition::partition;
use crate::types::{Match, MatchId, MatchOutcome, RoundId, RunId, TournamentRound};
use crate::utils::generate_run_id;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const OUTCOME_BUFFER: usize = 256;

/// A match the engine refused
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub match_id: MatchId,
    pub timestamp: DateTime<Utc>,
    pub error: RatingError,
}

/// Summary of one batch run
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: RunId,
    pub groups: usize,
    pub processed: usize,
    pub rejected: Vec<Rejection>,
    /// Matches never attempted because their group halted or was cancelled
    pub skipped: usize,
    pub published: usize,
    /// First error returned by the delta publisher. Matches committed after
    /// it are in the store but were never published.
    pub publish_error: Option<RatingError>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    fn new(run_id: RunId, groups: usize) -> Self {
        Self {
            run_id,
            groups,
            processed: 0,
            rejected: Vec::new(),
            skipped: 0,
            published: 0,
            publish_error: None,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Every match was committed
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
            && self.skipped == 0
            && !self.cancelled
            && self.publish_error.is_none()
    }

    fn absorb(&mut self, group: GroupResult) {
        self.processed += group.processed;
        self.rejected.extend(group.rejected);
        self.skipped += group.skipped;
        self.cancelled |= group.cancelled;
    }
}

#[derive(Debug, Default)]
struct GroupResult {
    processed: usize,
    rejected: Vec<Rejection>,
    skipped: usize,
    cancelled: bool,
}

pub struct BatchRunner {
    engine: Arc<RatingEngine>,
    publisher: Arc<dyn DeltaPublisher>,
    metrics: Option<Arc<MetricsCollector>>,
    settings: RunnerSettings,
}

impl BatchRunner {
    pub fn new(
        engine: Arc<RatingEngine>,
        publisher: Arc<dyn DeltaPublisher>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            engine,
            publisher,
            metrics: None,
            settings,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> &Arc<RatingEngine> {
        &self.engine
    }

    /// Rate every match of `feed`.
    ///
    /// Setting `cancel` to `true` stops every group before its next match.
    /// Matches already committed stay committed.
    pub async fn run(&self, feed: MatchFeed, cancel: watch::Receiver<bool>) -> Result<BatchReport> {
        let run_id = generate_run_id();
        let started = Instant::now();
        let MatchFeed { rounds, matches } = feed;

        for round in rounds {
            self.engine.record_round(round)?;
        }

        let total = matches.len();
        let groups = if self.settings.parallel {
            let rounds = self.referenced_rounds(&matches)?;
            partition(matches, &rounds)
        } else if matches.is_empty() {
            Vec::new()
        } else {
            vec![matches]
        };

        info!(
            "Run {}: rating {} matches in {} groups (rule {}, parallel {})",
            run_id,
            total,
            groups.len(),
            self.engine.rule_name(),
            self.settings.parallel
        );

        let mut report = BatchReport::new(run_id, groups.len());
        let (sender, receiver) = mpsc::channel(OUTCOME_BUFFER);
        let publishing = tokio::spawn(publish_all(self.publisher.clone(), receiver));

        let limit = if self.settings.parallel {
            self.settings.max_parallel_groups.max(1)
        } else {
            1
        };
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for group in groups {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| RatingError::Internal {
                    message: format!("Group semaphore closed: {}", e),
                })?;

            let engine = self.engine.clone();
            let sender = sender.clone();
            let cancel = cancel.clone();
            let metrics = self.metrics.clone();
            let halt_on_error = self.settings.halt_on_error;

            tasks.spawn_blocking(move || {
                let _permit = permit;
                process_group(
                    &engine,
                    group,
                    &sender,
                    &cancel,
                    metrics.as_deref(),
                    halt_on_error,
                )
            });
        }
        drop(sender);

        while let Some(joined) = tasks.join_next().await {
            let group = joined.map_err(|e| RatingError::Internal {
                message: format!("Group task failed: {}", e),
            })?;
            report.absorb(group);
        }

        let (published, publish_error) = publishing.await.map_err(|e| RatingError::Internal {
            message: format!("Publisher task failed: {}", e),
        })?;
        report.published = published;
        report.publish_error = publish_error;
        report
            .rejected
            .sort_by(|a, b| (a.timestamp, &a.match_id).cmp(&(b.timestamp, &b.match_id)));
        report.elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_batch(report.elapsed);
            metrics.set_known_players(self.engine.store().players()?.len());
        }

        info!(
            "Run {} finished in {:?}: {} processed, {} published, {} rejected, {} skipped{}",
            run_id,
            report.elapsed,
            report.processed,
            report.published,
            report.rejected.len(),
            report.skipped,
            if report.cancelled { ", cancelled" } else { "" }
        );
        Ok(report)
    }

    fn referenced_rounds(
        &self,
        matches: &[Match],
    ) -> Result<HashMap<RoundId, TournamentRound>> {
        let mut rounds = HashMap::new();
        for game in matches {
            if rounds.contains_key(&game.round_id) {
                continue;
            }
            if let Some(round) = self.engine.store().round(&game.round_id)? {
                rounds.insert(game.round_id.clone(), round);
            }
        }
        Ok(rounds)
    }
}

/// Rate one group in order. Runs on the blocking pool.
fn process_group(
    engine: &RatingEngine,
    group: Vec<Match>,
    outcomes: &mpsc::Sender<MatchOutcome>,
    cancel: &watch::Receiver<bool>,
    metrics: Option<&MetricsCollector>,
    halt_on_error: bool,
) -> GroupResult {
    let mut result = GroupResult::default();
    let total = group.len();
    if let Some(metrics) = metrics {
        metrics.performance().active_groups.inc();
    }

    for (index, game) in group.into_iter().enumerate() {
        if *cancel.borrow() {
            debug!("Group cancelled before match {}", game.id);
            result.cancelled = true;
            result.skipped = total - index;
            break;
        }

        let timer = metrics.map(MetricsCollector::start_timer);
        let processed = engine.process_match(&game);
        if let Some(timer) = timer {
            timer.stop();
        }

        match processed {
            Ok(outcome) => {
                result.processed += 1;
                if let Some(metrics) = metrics {
                    metrics.record_outcome(&outcome);
                }
                if outcomes.blocking_send(outcome).is_err() {
                    warn!(
                        "Delta feed closed, outcome of {} not published, stopping group",
                        game.id
                    );
                    result.skipped = total - index - 1;
                    break;
                }
            }
            Err(error) => {
                warn!("Rejected match {}: {}", game.id, error);
                if let Some(metrics) = metrics {
                    metrics.record_rejection(&error);
                }
                result.rejected.push(Rejection {
                    match_id: game.id,
                    timestamp: game.timestamp,
                    error,
                });
                if halt_on_error {
                    result.skipped = total - index - 1;
                    break;
                }
            }
        }
    }

    if let Some(metrics) = metrics {
        metrics.performance().active_groups.dec();
    }
    result
}

/// Forward outcomes to the publisher until the channel closes or the
/// publisher fails. Returns the number published and the failure, if any.
async fn publish_all(
    publisher: Arc<dyn DeltaPublisher>,
    mut outcomes: mpsc::Receiver<MatchOutcome>,
) -> (usize, Option<RatingError>) {
    let mut published = 0;
    while let Some(outcome) = outcomes.recv().await {
        if let Err(e) = publisher.publish(&outcome).await {
            error!("Failed to publish outcome of {}: {}", outcome.match_id, e);
            return (published, Some(e));
        }
        published += 1;
    }

    match publisher.flush().await {
        Ok(()) => (published, None),
        Err(e) => {
            error!("Failed to flush delta publisher: {}", e);
            (published, Some(e))
        }
    }
}
