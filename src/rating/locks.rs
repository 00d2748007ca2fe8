//! Per-player write exclusion
//!
//! Two updates touching the same player must not interleave their
//! fetch/compute/commit phases. Updates on disjoint players take different
//! locks and never wait on each other.

use crate::types::PlayerId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct PlayerLocks {
    locks: Mutex<HashMap<PlayerId, Arc<Mutex<()>>>>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handles for the given players, sorted and deduplicated.
    ///
    /// Callers must lock the handles in the returned order so concurrent
    /// callers cannot deadlock.
    pub fn handles(&self, players: &[&str]) -> Vec<Arc<Mutex<()>>> {
        let mut ids: Vec<&str> = players.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        ids.into_iter()
            .map(|id| locks.entry(id.to_string()).or_default().clone())
            .collect()
    }

    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

/// Lock every handle in order. The guarded data is `()`, so a poisoned lock
/// carries no broken state and is recovered.
pub fn lock_all(handles: &[Arc<Mutex<()>>]) -> Vec<MutexGuard<'_, ()>> {
    handles
        .iter()
        .map(|handle| handle.lock().unwrap_or_else(|e| e.into_inner()))
        .collect()
}
