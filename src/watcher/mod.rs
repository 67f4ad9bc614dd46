//! A polling-based path watcher using stat-diff change detection. Each
//! `watch()` call registers a periodic timer on the event loop; every time
//! it fires, a poll task snapshots the path, compares it against the
//! previous snapshot, and posts the caller's callback onto the event
//! loop's ready queue for delivery on the next `tick()` if the snapshots
//! differ.

pub mod registry;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::event_loop::EventLoop;
use crate::options::WatchOptions;
use registry::{WatchSnapshot, WatcherRecord};

/// What changed about a watched path, delivered to the `watch()` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

pub type WatchCallback = Arc<dyn Fn(WatchEvent) + Send + Sync>;

/// Starts watching `path`. Every time the polling interval elapses, a poll
/// task snapshots the path; if it differs from the previous snapshot, the
/// caller's callback is posted onto the event loop's ready queue and runs
/// on its next `tick()`. Returns a watcher id usable with [`unwatch`].
pub fn watch(path: impl Into<PathBuf>, opts: WatchOptions, callback: WatchCallback) -> u64 {
    let path: PathBuf = path.into();
    let event_loop = EventLoop::instance();
    let id = event_loop.watchers().next_id();

    let watch_path = path.clone();
    let loop_for_timer = Arc::clone(&event_loop);
    let timer_id = event_loop.add_periodic_timer(
        opts.polling_interval,
        Box::new(move || {
            let path = watch_path.clone();
            let callback = Arc::clone(&callback);
            let loop_ = Arc::clone(&loop_for_timer);
            tokio::spawn(async move {
                poll_once(&path, id, opts, &callback, &loop_).await;
            });
        }),
        None,
    );

    event_loop.watchers().insert(
        id,
        WatcherRecord { path, timer_id, last: Mutex::new(WatchSnapshot::default()) },
    );
    id
}

/// Stops watching; a no-op if `id` is not (or no longer) active.
pub fn unwatch(id: u64) -> bool {
    let event_loop = EventLoop::instance();
    match event_loop.watchers().remove(id) {
        Some(timer_id) => {
            event_loop.cancel_timer(timer_id);
            true
        }
        None => false,
    }
}

async fn poll_once(path: &PathBuf, id: u64, opts: WatchOptions, callback: &WatchCallback, loop_: &Arc<EventLoop>) {
    let snapshot = take_snapshot(path, opts).await;
    let registry = loop_.watchers();
    let Some(previous) = registry.snapshot(id, snapshot.clone()) else {
        return; // unwatched between the timer firing and here.
    };
    trace!(watcher_id = id, "watcher poll");

    if let Some(event) = diff(&previous, &snapshot, opts) {
        trace!(watcher_id = id, ?event, "watch event detected");
        let callback = Arc::clone(callback);
        let path = path.clone();
        loop_.post(Box::new(move || callback(WatchEvent { path, kind: event })));
    }
}

async fn take_snapshot(path: &PathBuf, opts: WatchOptions) -> WatchSnapshot {
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            let content_hash = if opts.watch_content {
                tokio::fs::read(path).await.ok().map(|bytes| hash_bytes(&bytes))
            } else {
                None
            };
            WatchSnapshot { exists: true, size: Some(meta.len()), modified: meta.modified().ok(), content_hash }
        }
        Err(_) => WatchSnapshot { exists: false, size: None, modified: None, content_hash: None },
    }
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Compares two snapshots, honouring `watch_size`/`watch_content`: a
/// content-hash mismatch counts as a modification even when size and
/// mtime are unchanged.
fn diff(previous: &WatchSnapshot, current: &WatchSnapshot, opts: WatchOptions) -> Option<WatchEventKind> {
    match (previous.exists, current.exists) {
        (false, true) => Some(WatchEventKind::Created),
        (true, false) => Some(WatchEventKind::Removed),
        (false, false) => None,
        (true, true) => {
            let size_changed = opts.watch_size && previous.size != current.size;
            let mtime_changed = previous.modified != current.modified;
            let content_changed = opts.watch_content && previous.content_hash != current.content_hash;
            if size_changed || mtime_changed || content_changed {
                Some(WatchEventKind::Modified)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_reports_created_and_removed() {
        let opts = WatchOptions::default();
        let absent = WatchSnapshot::default();
        let present = WatchSnapshot { exists: true, size: Some(1), modified: None, content_hash: None };

        assert_eq!(diff(&absent, &present, opts), Some(WatchEventKind::Created));
        assert_eq!(diff(&present, &absent, opts), Some(WatchEventKind::Removed));
        assert_eq!(diff(&absent, &absent, opts), None);
    }

    #[test]
    fn diff_detects_size_change() {
        let opts = WatchOptions { watch_size: true, ..WatchOptions::default() };
        let before = WatchSnapshot { exists: true, size: Some(1), modified: None, content_hash: None };
        let after = WatchSnapshot { exists: true, size: Some(2), modified: None, content_hash: None };
        assert_eq!(diff(&before, &after, opts), Some(WatchEventKind::Modified));
    }

    #[test]
    fn diff_detects_content_hash_change_with_unchanged_size() {
        let opts = WatchOptions { watch_size: true, watch_content: true, ..WatchOptions::default() };
        let before = WatchSnapshot { exists: true, size: Some(4), modified: None, content_hash: Some(1) };
        let after = WatchSnapshot { exists: true, size: Some(4), modified: None, content_hash: Some(2) };
        assert_eq!(diff(&before, &after, opts), Some(WatchEventKind::Modified));
    }

    #[test]
    fn diff_is_quiet_when_nothing_tracked_changed() {
        let opts = WatchOptions { watch_size: false, watch_content: false, ..WatchOptions::default() };
        let before = WatchSnapshot { exists: true, size: Some(4), modified: None, content_hash: None };
        let after = WatchSnapshot { exists: true, size: Some(999), modified: None, content_hash: None };
        assert_eq!(diff(&before, &after, opts), None);
    }
}
