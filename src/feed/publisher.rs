//! Delta publishers

use crate::error::{RatingError, Result};
use crate::types::{MatchOutcome, RatingDelta};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;

/// Trait for publishing committed match outcomes
#[async_trait]
pub trait DeltaPublisher: Send + Sync {
    /// Publish both deltas of a committed match
    async fn publish(&self, outcome: &MatchOutcome) -> Result<()>;

    /// Flush anything buffered
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Publisher that keeps every delta in memory
#[derive(Debug, Default)]
pub struct InMemoryDeltaPublisher {
    deltas: std::sync::Mutex<Vec<RatingDelta>>,
}

impl InMemoryDeltaPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All published deltas in publish order
    pub fn deltas(&self) -> Vec<RatingDelta> {
        self.deltas
            .lock()
            .map(|deltas| deltas.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.deltas.lock().map(|deltas| deltas.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut deltas) = self.deltas.lock() {
            deltas.clear();
        }
    }
}

#[async_trait]
impl DeltaPublisher for InMemoryDeltaPublisher {
    async fn publish(&self, outcome: &MatchOutcome) -> Result<()> {
        let mut deltas = self.deltas.lock().map_err(|_| RatingError::Internal {
            message: "Failed to acquire published deltas lock".to_string(),
        })?;
        deltas.extend(outcome.deltas.iter().cloned());
        Ok(())
    }
}

/// Publisher writing one JSON delta per line
pub struct JsonLinesDeltaPublisher {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesDeltaPublisher {
    /// Create (or truncate) the output file
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await.map_err(|e| io_error(&path, e))?;
        Ok(Self::from_file(path, file))
    }

    /// Append to the output file, creating it if needed
    pub async fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(Self::from_file(path, file))
    }

    fn from_file(path: PathBuf, file: File) -> Self {
        Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeltaPublisher for JsonLinesDeltaPublisher {
    async fn publish(&self, outcome: &MatchOutcome) -> Result<()> {
        let mut buffer = Vec::new();
        for delta in &outcome.deltas {
            serde_json::to_writer(&mut buffer, delta).map_err(|e| RatingError::Internal {
                message: format!("Failed to serialize delta: {}", e),
            })?;
            buffer.push(b'\n');
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&buffer)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        debug!(
            "Wrote {} deltas of match {} to {}",
            outcome.deltas.len(),
            outcome.match_id,
            self.path.display()
        );
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .await
            .flush()
            .await
            .map_err(|e| io_error(&self.path, e))
    }
}

fn io_error(path: &Path, error: std::io::Error) -> RatingError {
    RatingError::Storage {
        message: format!("{}: {}", path.display(), error),
    }
}
