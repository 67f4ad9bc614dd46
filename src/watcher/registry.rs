//! Watcher bookkeeping: one [`WatcherRecord`] per active `watch()` call,
//! keyed by a monotonically increasing id, holding the event loop timer id
//! backing its poll schedule so `unwatch` can cancel it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;

/// The last observed snapshot of a watched path, used to diff against the
/// next poll.
#[derive(Debug, Clone, Default)]
pub struct WatchSnapshot {
    pub exists: bool,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
    pub content_hash: Option<u64>,
}

pub struct WatcherRecord {
    pub path: PathBuf,
    pub timer_id: u64,
    pub last: Mutex<WatchSnapshot>,
}

#[derive(Default)]
pub struct WatcherRegistry {
    next_id: AtomicU64,
    watchers: Mutex<HashMap<u64, WatcherRecord>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        WatcherRegistry { next_id: AtomicU64::new(1), watchers: Mutex::new(HashMap::new()) }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, id: u64, record: WatcherRecord) {
        self.watchers.lock().insert(id, record);
    }

    /// Removes the record, returning the timer id backing its poll
    /// schedule so the caller can cancel it on the event loop. A poll
    /// already in flight when this is called still delivers its result,
    /// since cancelling the timer only prevents the *next* scheduled poll.
    pub fn remove(&self, id: u64) -> Option<u64> {
        self.watchers.lock().remove(&id).map(|record| record.timer_id)
    }

    pub fn is_active(&self, id: u64) -> bool {
        self.watchers.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.watchers.lock().len()
    }

    pub fn snapshot(&self, id: u64, new_snapshot: WatchSnapshot) -> Option<WatchSnapshot> {
        let watchers = self.watchers.lock();
        let record = watchers.get(&id)?;
        let mut last = record.last.lock();
        let old = last.clone();
        *last = new_snapshot;
        Some(old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_returns_the_backing_timer_id() {
        let registry = WatcherRegistry::new();
        let id = registry.next_id();
        registry.insert(id, WatcherRecord { path: "/tmp/x".into(), timer_id: 42, last: Mutex::new(WatchSnapshot::default()) });

        assert!(registry.is_active(id));
        assert_eq!(registry.remove(id), Some(42));
        assert!(!registry.is_active(id));
        assert_eq!(registry.remove(id), None);
    }

    #[test]
    fn snapshot_returns_previous_value() {
        let registry = WatcherRegistry::new();
        let id = registry.next_id();
        registry.insert(id, WatcherRecord { path: "/tmp/x".into(), timer_id: 1, last: Mutex::new(WatchSnapshot::default()) });

        let prev = registry.snapshot(id, WatchSnapshot { exists: true, size: Some(5), modified: None, content_hash: None });
        assert!(!prev.unwrap().exists);
    }
}
