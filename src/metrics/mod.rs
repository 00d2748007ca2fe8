//! Metrics for rating runs
//!
//! Prometheus counters and histograms filled in by the batch runner. The
//! CLI can dump them in the text exposition format after a run.

pub mod collector;

pub use collector::{MetricsCollector, MetricsTimer, PerformanceMetrics, RatingMetrics};
