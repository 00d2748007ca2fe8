//! Application state
//!
//! Wires the configured rating store, engine and metrics together for the
//! command line front end.

use crate::config::{AppConfig, StorageBackend, StorageSettings};
use crate::feed::DeltaPublisher;
use crate::metrics::MetricsCollector;
use crate::rating::{InMemoryRatingStore, RatingEngine, RatingStore, SqliteRatingStore};
use crate::runner::BatchRunner;
use crate::types::PlayerRating;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::info;

pub struct AppState {
    config: AppConfig,
    engine: Arc<RatingEngine>,
    metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = open_store(&config.storage, config.rating.initial_rating())?;
        let engine = RatingEngine::new(config.rating.clone(), store)
            .context("Failed to initialize rating engine")?;
        let metrics = MetricsCollector::new().context("Failed to register metrics")?;

        info!(
            "Initialized {} with {} rule and {:?} storage",
            config.service.name,
            engine.rule_name(),
            config.storage.backend
        );

        Ok(Self {
            config,
            engine: Arc::new(engine),
            metrics: Arc::new(metrics),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> Arc<RatingEngine> {
        self.engine.clone()
    }

    pub fn store(&self) -> &Arc<dyn RatingStore> {
        self.engine.store()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Batch runner publishing to `publisher`, using the configured runner settings
    pub fn runner(&self, publisher: Arc<dyn DeltaPublisher>) -> BatchRunner {
        BatchRunner::new(self.engine.clone(), publisher, self.config.runner.clone())
            .with_metrics(self.metrics.clone())
    }
}

/// Open the rating store selected by `settings`
pub fn open_store(
    settings: &StorageSettings,
    initial_rating: PlayerRating,
) -> Result<Arc<dyn RatingStore>> {
    match settings.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryRatingStore::new(initial_rating))),
        StorageBackend::Sqlite => {
            let path = settings
                .database_path
                .as_ref()
                .ok_or_else(|| anyhow!("SQLite storage requires a database path"))?;
            let store = SqliteRatingStore::open(path, initial_rating)
                .with_context(|| format!("Failed to open rating database {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}
