use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use feijump_core::storage::KeyValueStore;
use feijump_core::time::timestamp_now;

use crate::error::GameError;

/// Storage key of the persisted progression record.
pub const PROGRESS_KEY: &str = "gameProgress";

/// Persisted partition of the level pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionState {
    /// Levels not yet completed in the current cycle, in pool order.
    pub levels: Vec<u32>,
    pub played_levels: Vec<u32>,
    /// ISO-8601 time of the last save.
    pub last_updated: String,
}

impl ProgressionState {
    /// Fresh cycle: every level remaining, none played.
    pub fn full(all_levels: &[u32]) -> Self {
        Self {
            levels: all_levels.to_vec(),
            played_levels: Vec::new(),
            last_updated: timestamp_now(),
        }
    }

    /// Check that `levels` and `played_levels` partition `all_levels` exactly.
    pub fn check(&self, all_levels: &[u32]) -> Result<(), GameError> {
        let mut seen = std::collections::HashSet::new();
        for id in self.levels.iter().chain(&self.played_levels) {
            if !all_levels.contains(id) {
                return Err(GameError::InvariantViolation(format!("unknown level {id}")));
            }
            if !seen.insert(*id) {
                return Err(GameError::InvariantViolation(format!(
                    "level {id} listed twice"
                )));
            }
        }
        if seen.len() != all_levels.len() {
            return Err(GameError::InvariantViolation(format!(
                "{} of {} levels accounted for",
                seen.len(),
                all_levels.len()
            )));
        }
        Ok(())
    }
}

/// Owns the remaining/played partition of the level pool and its persistence.
///
/// Storage problems never escape: they are logged and the in-memory state stays
/// authoritative for the running process.
#[derive(Debug)]
pub struct ProgressionTracker<S: KeyValueStore> {
    store: S,
    all_levels: Vec<u32>,
    state: ProgressionState,
}

impl<S: KeyValueStore> ProgressionTracker<S> {
    /// Build a tracker over `all_levels` and load whatever the store holds.
    pub fn new(store: S, all_levels: Vec<u32>) -> Self {
        let state = ProgressionState::full(&all_levels);
        let mut tracker = Self {
            store,
            all_levels,
            state,
        };
        tracker.load();
        tracker
    }

    /// Reload from the store, falling back to the full pool on any problem.
    pub fn load(&mut self) -> &ProgressionState {
        self.state = match self.read_stored() {
            Ok(Some(state)) => state,
            Ok(None) => ProgressionState::full(&self.all_levels),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding stored progress, starting a fresh pool");
                ProgressionState::full(&self.all_levels)
            },
        };
        if self.state.levels.is_empty() {
            self.reset();
        }
        &self.state
    }

    fn read_stored(&self) -> Result<Option<ProgressionState>, GameError> {
        let Some(raw) = self.store.get_item(PROGRESS_KEY)? else {
            return Ok(None);
        };
        let state: ProgressionState = serde_json::from_str(&raw)
            .map_err(|e| GameError::InvariantViolation(format!("unreadable record: {e}")))?;
        state.check(&self.all_levels)?;
        Ok(Some(state))
    }

    /// Move `level` from remaining to played and persist. Returns `true` when that
    /// exhausted the pool and it was reset.
    pub fn mark_completed(&mut self, level: u32) -> bool {
        if let Some(pos) = self.state.levels.iter().position(|&id| id == level) {
            self.state.levels.remove(pos);
            self.state.played_levels.push(level);
        } else if !self.state.played_levels.contains(&level) {
            tracing::warn!(level, "Completed level is not part of the pool");
        }

        let exhausted = self.state.levels.is_empty();
        if exhausted {
            tracing::info!("Every level played, resetting the pool");
            self.reset();
        }
        self.save();
        exhausted
    }

    /// Uniform pick among the remaining levels, resetting an empty pool first.
    /// `None` only when the level table itself is empty.
    pub fn pick_next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<u32> {
        if self.state.levels.is_empty() {
            self.reset();
        }
        self.state.levels.choose(rng).copied()
    }

    /// Start a fresh cycle in memory. Does not persist.
    pub fn reset(&mut self) {
        self.state = ProgressionState::full(&self.all_levels);
    }

    /// Best-effort write of the current state.
    pub fn save(&mut self) {
        self.state.last_updated = timestamp_now();
        let json = match serde_json::to_string(&self.state) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize progress: {e}");
                return;
            },
        };
        if let Err(e) = self.store.set_item(PROGRESS_KEY, &json) {
            tracing::warn!(error = %e, "Failed to save progress");
        }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn remaining(&self) -> &[u32] {
        &self.state.levels
    }

    pub fn played(&self) -> &[u32] {
        &self.state.played_levels
    }

    pub fn all_levels(&self) -> &[u32] {
        &self.all_levels
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
