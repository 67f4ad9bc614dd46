//! The cooperative single-threaded event loop: a FIFO ready queue, a timer
//! min-heap, an FS-op registry and a watcher registry, driven by an
//! explicit `tick()`/`run()`/`stop()`. Actual I/O and task waking rides on
//! a current-thread [`tokio::runtime::Runtime`]; this module adds the
//! bookkeeping (operation ids, cancellation, timers) on top of it.

pub mod registry;
pub mod timer;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::watcher::registry::WatcherRegistry;
use registry::OpRegistry;
use timer::{RepeatingCallback, TimerHeap};

type ReadyTask = Box<dyn FnOnce() + Send>;

static INSTANCE: OnceCell<Mutex<Arc<EventLoop>>> = OnceCell::new();

/// The process-wide single-threaded scheduler. Operations and timers are
/// registered here so `cancelFileOperation`/`unwatch` have somewhere to
/// look them up; the actual `async fn`s backing file operations run on
/// tokio's own task system, spawned from [`EventLoop::spawn`]. Its own
/// `tick()` loop, driven by a background [`run`](Self::run) task started
/// the first time [`instance`](Self::instance) is called, is what
/// actually fires due timers (including watcher polls) and drains the
/// ready queue that operation completions are posted onto.
pub struct EventLoop {
    ready: Mutex<VecDeque<ReadyTask>>,
    timers: Mutex<TimerHeap>,
    ops: OpRegistry,
    watchers: WatcherRegistry,
    next_timer_id: AtomicU64,
    running: AtomicBool,
    spawned: AtomicBool,
}

impl EventLoop {
    fn new() -> Self {
        EventLoop {
            ready: Mutex::new(VecDeque::new()),
            timers: Mutex::new(TimerHeap::new()),
            ops: OpRegistry::new(),
            watchers: WatcherRegistry::new(),
            next_timer_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
            spawned: AtomicBool::new(false),
        }
    }

    /// The process-wide instance, created lazily on first access. Ensures
    /// its `tick()` loop is actually running in the background.
    pub fn instance() -> Arc<EventLoop> {
        let cell = INSTANCE.get_or_init(|| Mutex::new(Arc::new(EventLoop::new())));
        let loop_ = Arc::clone(&cell.lock());
        loop_.ensure_running();
        loop_
    }

    /// Spawns the background `run()` task the first time this instance is
    /// reached through [`instance`](Self::instance); a no-op after that.
    /// Requires an active tokio runtime, true for every caller in this
    /// crate (all go through an `async fn` or a `#[tokio::main]`/
    /// `#[tokio::test]` entrypoint).
    fn ensure_running(self: &Arc<Self>) {
        if self.spawned.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            let loop_ = Arc::clone(self);
            tokio::spawn(async move { loop_.run().await });
        }
    }

    /// Replaces the process-wide instance with a fresh one. Intended for
    /// test isolation; any operations, timers or watchers registered on
    /// the previous instance are dropped along with it, and its
    /// background `run()` task is stopped.
    pub fn reset() {
        let fresh = Arc::new(EventLoop::new());
        match INSTANCE.get() {
            Some(cell) => {
                let mut guard = cell.lock();
                guard.stop();
                *guard = fresh;
            }
            None => {
                let _ = INSTANCE.set(Mutex::new(fresh));
            }
        }
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        &self.watchers
    }

    /// Reserves an operation id and registers its cancel handler. The
    /// handler is invoked at most once, either through
    /// [`cancel_file_operation`](Self::cancel_file_operation) or never, if
    /// the operation settles first and calls
    /// [`complete_file_operation`](Self::complete_file_operation).
    pub fn add_file_operation(&self, cancel: Box<dyn FnOnce() + Send>) -> u64 {
        let id = self.ops.next_id();
        self.ops.register(id, cancel);
        trace!(op_id = id, "dispatched file operation");
        id
    }

    pub fn complete_file_operation(&self, id: u64) {
        self.ops.complete(id);
        trace!(op_id = id, "file operation completed");
    }

    pub fn cancel_file_operation(&self, id: u64) -> bool {
        let cancelled = self.ops.cancel(id);
        if cancelled {
            debug!(op_id = id, "file operation cancelled");
        }
        cancelled
    }

    pub fn live_operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Schedules `callback` to run once, after `delay`. Returns a timer id
    /// usable with [`cancel_timer`](Self::cancel_timer).
    pub fn add_timer(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> u64 {
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        self.timers.lock().schedule(id, delay, callback);
        id
    }

    /// Schedules `callback` to run every `period`, starting after the
    /// first `period` elapses. `max_fires` bounds the total number of
    /// firings; `None` runs until [`cancel_timer`](Self::cancel_timer) is
    /// called.
    pub fn add_periodic_timer(&self, period: Duration, callback: Box<dyn Fn() + Send + Sync + 'static>, max_fires: Option<u32>) -> u64 {
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let repeat: RepeatingCallback = Arc::new(callback);
        self.timers.lock().schedule_repeating(id, period, repeat, max_fires);
        id
    }

    pub fn cancel_timer(&self, id: u64) -> bool {
        self.timers.lock().cancel(id)
    }

    /// Pushes a task directly onto the ready queue, to be run on the next
    /// `tick()`. This is how streaming-operation completions and watcher
    /// callbacks are delivered: the async work itself runs on tokio's own
    /// task system, but settling the future or invoking the user's
    /// callback happens here, on the loop's own tick.
    pub fn post(&self, task: Box<dyn FnOnce() + Send>) {
        self.ready.lock().push_back(task);
    }

    /// Runs one iteration: moves every timer due by now onto the ready
    /// queue, then drains and runs the ready queue to completion once.
    pub fn tick(&self) {
        let due = self.timers.lock().drain_due(std::time::Instant::now());
        let due_count = due.len();
        for callback in due {
            self.ready.lock().push_back(callback);
        }
        let batch: Vec<ReadyTask> = self.ready.lock().drain(..).collect();
        if !batch.is_empty() || due_count > 0 {
            trace!(due_timers = due_count, ready_tasks = batch.len(), "tick");
        }
        for task in batch {
            task();
        }
    }

    /// Ticks repeatedly until [`stop`](Self::stop) is called, sleeping
    /// between ticks until the next timer is due (or a short default
    /// interval if there is none, so newly-posted ready tasks aren't
    /// starved).
    pub async fn run(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        debug!("event loop started");
        while self.running.load(Ordering::SeqCst) {
            self.tick();
            let sleep_for = match self.timers.lock().next_due() {
                Some(due) => due.saturating_duration_since(std::time::Instant::now()),
                None => Duration::from_millis(10),
            };
            tokio::time::sleep(sleep_for.min(Duration::from_millis(50))).await;
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
