//! Outbound delta feed
//!
//! Committed match outcomes are handed to a [`DeltaPublisher`] so narrative
//! and dashboard consumers can follow rating movement without reading the
//! store.

pub mod publisher;

pub use publisher::{DeltaPublisher, InMemoryDeltaPublisher, JsonLinesDeltaPublisher};
