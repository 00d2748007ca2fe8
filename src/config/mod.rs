//! Configuration management for the bracket-rating service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values.

pub mod app;
pub mod rating;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, RunnerSettings, ServiceSettings, StorageBackend, StorageSettings,
};
pub use rating::{RatingConfig, UnknownInputPolicy, UpdateRuleKind};
