//! Batch processing of match feeds
//!
//! Matches connected through shared players (or a shared round) must be
//! rated one after another in timestamp order. Unconnected groups are
//! independent and run concurrently on the blocking thread pool.

pub mod batch;
pub mod partition;

pub use batch::{BatchReport, BatchRunner, Rejection};
pub use partition::partition;
