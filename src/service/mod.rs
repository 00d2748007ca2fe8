//! Service layer for the bracket-rating command line tool
//!
//! This module contains the application state that opens the configured
//! store and builds the engine, runner and metrics from one configuration.

pub mod app;

pub use app::{open_store, AppState};
