//! Metrics collection using Prometheus
//!
//! Counters and histograms describing rating runs: matches processed and
//! rejected, the size of applied rating changes, the strength-of-field
//! factors handed out and how long each match took.

use crate::error::RatingError;
use crate::types::MatchOutcome;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for rating runs
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    rating_metrics: RatingMetrics,

    performance_metrics: PerformanceMetrics,
}

/// Rating-related metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Matches committed to the store
    pub matches_processed_total: IntCounter,

    /// Matches rejected, by error kind
    pub matches_rejected_total: IntCounterVec,

    /// Absolute rating change applied per participant
    pub rating_change: Histogram,

    /// Strength-of-field factor applied per participant
    pub adjustment_factor: Histogram,

    /// Players known to the store
    pub known_players: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time spent processing one match
    pub match_processing_duration: Histogram,

    /// Wall time of a whole batch run
    pub batch_duration: Histogram,

    /// Groups currently being processed
    pub active_groups: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let rating_metrics = RatingMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            rating_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a committed match
    pub fn record_outcome(&self, outcome: &MatchOutcome) {
        self.rating_metrics.matches_processed_total.inc();
        for delta in &outcome.deltas {
            self.rating_metrics
                .rating_change
                .observe(delta.applied_change().abs());
            self.rating_metrics
                .adjustment_factor
                .observe(delta.adjustment_factor);
        }
    }

    /// Record a rejected match
    pub fn record_rejection(&self, error: &RatingError) {
        self.rating_metrics
            .matches_rejected_total
            .with_label_values(&[error.kind()])
            .inc();
    }

    pub fn set_known_players(&self, count: usize) {
        self.rating_metrics.known_players.set(count as i64);
    }

    pub fn record_batch(&self, duration: Duration) {
        self.performance_metrics
            .batch_duration
            .observe(duration.as_secs_f64());
    }

    /// Start timing one match attempt. The duration lands in the match
    /// processing histogram when the timer is stopped.
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new(self.performance_metrics.match_processing_duration.clone())
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Running timer bound to a duration histogram
pub struct MetricsTimer {
    histogram: Histogram,
    start: Instant,
}

impl MetricsTimer {
    fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record the elapsed time in the histogram and return it
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        self.histogram.observe(elapsed.as_secs_f64());
        elapsed
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_processed_total = IntCounter::new(
            "bracket_rating_matches_processed_total",
            "Total matches committed",
        )?;
        registry.register(Box::new(matches_processed_total.clone()))?;

        let matches_rejected_total = IntCounterVec::new(
            Opts::new(
                "bracket_rating_matches_rejected_total",
                "Total matches rejected",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(matches_rejected_total.clone()))?;

        let rating_change = Histogram::with_opts(
            HistogramOpts::new(
                "bracket_rating_rating_change",
                "Absolute rating change per participant",
            )
            .buckets(vec![1.0, 2.5, 5.0, 10.0, 16.0, 25.0, 40.0, 64.0]),
        )?;
        registry.register(Box::new(rating_change.clone()))?;

        let adjustment_factor = Histogram::with_opts(
            HistogramOpts::new(
                "bracket_rating_adjustment_factor",
                "Strength-of-field factor per participant",
            )
            .buckets(vec![0.5, 0.75, 0.9, 1.0, 1.1, 1.25, 1.5, 2.0, 2.5]),
        )?;
        registry.register(Box::new(adjustment_factor.clone()))?;

        let known_players =
            IntGauge::new("bracket_rating_known_players", "Players known to the store")?;
        registry.register(Box::new(known_players.clone()))?;

        Ok(Self {
            matches_processed_total,
            matches_rejected_total,
            rating_change,
            adjustment_factor,
            known_players,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let match_processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bracket_rating_match_processing_duration_seconds",
                "Match processing time",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(match_processing_duration.clone()))?;

        let batch_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bracket_rating_batch_duration_seconds",
                "Batch run wall time",
            )
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        )?;
        registry.register(Box::new(batch_duration.clone()))?;

        let active_groups =
            IntGauge::new("bracket_rating_active_groups", "Groups being processed")?;
        registry.register(Box::new(active_groups.clone()))?;

        Ok(Self {
            match_processing_duration,
            batch_duration,
            active_groups,
        })
    }
}
