//! Point-in-time consistent snapshots across venues (spec §4.H / §6).
//!
//! A snapshot freezes the facade's current cache contents at the moment it
//! is taken, keyed by venue/data type/symbol, so a caller building e.g. a
//! risk report sees one consistent view instead of each field racing ahead
//! independently between reads. `create_snapshot`/`get_snapshot` are keyed
//! by a caller-supplied id rather than one the store allocates.

use crate::venue::CachedValue;
use market_facade_core::DataType;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

/// One key a snapshot can hold a value under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub venue: String,
    pub data_type: DataType,
    pub symbol: String,
}

/// A single snapshot's contents: the entries captured at `taken_at`, plus
/// what was requested but had no cached value yet (a cache miss at capture
/// time, not an error — the caller decides whether a partial snapshot is
/// usable).
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: SystemTime,
    pub entries: HashMap<SnapshotKey, CachedValue>,
    pub missing: Vec<SnapshotKey>,
}

/// In-memory store of named snapshots.
///
/// Grounded on the registry's `health.rs` use of a plain `Mutex`-guarded
/// map for small, infrequently-written shared state — a snapshot store has
/// the same shape (rare writes, occasional reads, no need for the cache
/// crate's TTL/eviction machinery).
pub struct SnapshotStore {
    snapshots: Mutex<HashMap<String, Snapshot>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self { snapshots: Mutex::new(HashMap::new()) }
    }

    /// Stores `entries`/`missing` under `id`, overwriting any snapshot
    /// already held under that id.
    pub fn create(&self, id: impl Into<String>, entries: HashMap<SnapshotKey, CachedValue>, missing: Vec<SnapshotKey>) {
        let snapshot = Snapshot {
            taken_at: SystemTime::now(),
            entries,
            missing,
        };
        self.snapshots.lock().unwrap().insert(id.into(), snapshot);
    }

    pub fn get(&self, id: &str) -> Option<Snapshot> {
        self.snapshots.lock().unwrap().get(id).cloned()
    }

    /// Drops every snapshot taken before `cutoff`. Called opportunistically
    /// rather than on a timer — snapshots are short-lived scratch state, not
    /// a durable store.
    pub fn prune_older_than(&self, max_age: std::time::Duration) {
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else { return };
        self.snapshots.lock().unwrap().retain(|_, s| s.taken_at >= cutoff);
    }
}
