//! Main application configuration
//!
//! This module defines the top-level configuration for the bracket-rating
//! service, including TOML and environment variable loading and validation.

use crate::config::rating::{RatingConfig, UpdateRuleKind};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub storage: StorageSettings,
    pub runner: RunnerSettings,
    pub rating: RatingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Where rating history is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// Rating store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// SQLite database file, required for the sqlite backend
    pub database_path: Option<PathBuf>,
}

/// Batch runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Process independent player groups concurrently
    pub parallel: bool,
    /// Maximum number of groups processed at the same time
    pub max_parallel_groups: usize,
    /// Stop a group at its first rejected match
    pub halt_on_error: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "bracket-rating".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_path: None,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            parallel: false,
            max_parallel_groups: 4,
            halt_on_error: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }

        // Storage settings
        if let Ok(path) = env::var("RATING_DB_PATH") {
            self.storage.backend = StorageBackend::Sqlite;
            self.storage.database_path = Some(PathBuf::from(path));
        }

        // Runner settings
        if let Ok(parallel) = env::var("RUNNER_PARALLEL") {
            self.runner.parallel = parallel
                .parse()
                .map_err(|_| anyhow!("Invalid RUNNER_PARALLEL value: {}", parallel))?;
        }
        if let Ok(groups) = env::var("RUNNER_MAX_PARALLEL_GROUPS") {
            self.runner.max_parallel_groups = groups
                .parse()
                .map_err(|_| anyhow!("Invalid RUNNER_MAX_PARALLEL_GROUPS value: {}", groups))?;
        }
        if let Ok(halt) = env::var("RUNNER_HALT_ON_ERROR") {
            self.runner.halt_on_error = halt
                .parse()
                .map_err(|_| anyhow!("Invalid RUNNER_HALT_ON_ERROR value: {}", halt))?;
        }

        // Rating settings
        if let Ok(rating) = env::var("RATING_DEFAULT_RATING") {
            self.rating.default_rating = parse_f64("RATING_DEFAULT_RATING", &rating)?;
        }
        if let Ok(deviation) = env::var("RATING_DEFAULT_DEVIATION") {
            self.rating.default_deviation = parse_f64("RATING_DEFAULT_DEVIATION", &deviation)?;
        }
        if let Ok(k) = env::var("RATING_K_FACTOR") {
            self.rating.k_factor = parse_f64("RATING_K_FACTOR", &k)?;
        }
        if let Ok(floor) = env::var("RATING_DEVIATION_FLOOR") {
            self.rating.deviation_floor = parse_f64("RATING_DEVIATION_FLOOR", &floor)?;
        }
        if let Ok(window) = env::var("RATING_STALE_WINDOW_DAYS") {
            self.rating.stale_window_days = parse_f64("RATING_STALE_WINDOW_DAYS", &window)?;
        }
        if let Ok(rate) = env::var("RATING_INFLATION_PER_DAY") {
            self.rating.inflation_per_day = parse_f64("RATING_INFLATION_PER_DAY", &rate)?;
        }
        if let Ok(rule) = env::var("RATING_UPDATE_RULE") {
            self.rating.update_rule = match rule.to_lowercase().as_str() {
                "elo" => UpdateRuleKind::Elo,
                "glicko" => UpdateRuleKind::Glicko,
                _ => return Err(anyhow!("Invalid RATING_UPDATE_RULE value: {}", rule)),
            };
        }

        Ok(())
    }
}

fn parse_f64(name: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.storage.backend == StorageBackend::Sqlite && config.storage.database_path.is_none()
    {
        return Err(anyhow!("SQLite storage requires a database path"));
    }

    if config.runner.max_parallel_groups == 0 {
        return Err(anyhow!("Max parallel groups must be greater than 0"));
    }

    config.rating.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.runner.halt_on_error);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_sqlite_requires_path() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Sqlite;
        assert!(validate_config(&config).is_err());

        config.storage.database_path = Some(PathBuf::from("ratings.db"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rating_errors_surface_through_app_validation() {
        let mut config = AppConfig::default();
        config.rating.k_factor = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_from_file_reads_nested_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [service]
            log_level = "debug"

            [runner]
            parallel = true
            max_parallel_groups = 8

            [rating]
            k_factor = 20.0
            sof_max_factor = 1.5
            "#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.service.log_level, "debug");
        assert!(config.runner.parallel);
        assert_eq!(config.runner.max_parallel_groups, 8);
        assert_eq!(config.rating.k_factor, 20.0);
        assert_eq!(config.rating.sof_max_factor, 1.5);
        assert_eq!(config.rating.sof_min_factor, 0.5);
    }
}
