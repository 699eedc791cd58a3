//! Windowed Counter Store
//!
//! Sharded in-memory storage for per-(platform, principal) window state.
//! Each mutation runs under the owning shard's write lock, so updates to the
//! same key are linearizable and keys on other shards are never blocked.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::quota::WindowState;

/// Key for identifying a window owner
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct QuotaKey {
    /// Platform identifier
    pub platform: String,

    /// Opaque caller-supplied principal identifier
    pub principal: String,
}

impl QuotaKey {
    /// Create a new quota key
    pub fn new(platform: &str, principal: &str) -> Self {
        Self {
            platform: platform.to_string(),
            principal: principal.to_string(),
        }
    }
}

/// In-memory window store
#[derive(Debug, Default)]
pub struct WindowedCounterStore {
    windows: DashMap<QuotaKey, WindowState>,
}

impl WindowedCounterStore {
    /// Create a new store
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Create a store pre-sized for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            windows: DashMap::with_capacity(capacity),
        }
    }

    /// Atomically read, transform and write back the state for `key`.
    ///
    /// `f` receives the stored state (`None` if the key was never written) and
    /// returns the state to store plus a value handed back to the caller. The
    /// shard lock is held for the whole call, so `f` must not touch the store.
    pub fn read_modify_write<F, R>(&self, key: &QuotaKey, f: F) -> R
    where
        F: FnOnce(Option<WindowState>) -> (WindowState, R),
    {
        // Existing keys avoid cloning the key
        if let Some(mut slot) = self.windows.get_mut(key) {
            let (next, out) = f(Some(*slot));
            *slot = next;
            return out;
        }

        match self.windows.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                let (next, out) = f(Some(*slot.get()));
                slot.insert(next);
                out
            }
            Entry::Vacant(slot) => {
                let (next, out) = f(None);
                slot.insert(next);
                out
            }
        }
    }

    /// Get the stored state without mutating anything
    pub fn read(&self, key: &QuotaKey) -> Option<WindowState> {
        self.windows.get(key).map(|slot| *slot)
    }

    /// Copy of every stored entry, sorted by key
    pub fn snapshot(&self) -> Vec<(QuotaKey, WindowState)> {
        let mut entries: Vec<(QuotaKey, WindowState)> = self
            .windows
            .iter()
            .map(|slot| (slot.key().clone(), *slot.value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Drop entries whose window closed at or before `now`.
    ///
    /// Never called implicitly; returns the number of entries removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, state| !state.is_expired(now));
        before.saturating_sub(self.windows.len())
    }

    /// Get stored key count, live or expired
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
