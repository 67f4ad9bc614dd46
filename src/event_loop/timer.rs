//! The timer min-heap: `addTimer`/`addPeriodicTimer` entries ordered by
//! due-instant, drained by the loop's `tick()`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type TimerCallback = Box<dyn FnOnce() + Send>;
/// A reusable callback backing a periodic timer, cloned onto each
/// rescheduled entry so firing it doesn't consume it.
pub type RepeatingCallback = Arc<dyn Fn() + Send + Sync>;

fn one_shot_from(repeat: RepeatingCallback) -> TimerCallback {
    Box::new(move || repeat())
}

pub struct TimerEntry {
    pub due: Instant,
    pub id: u64,
    pub period: Option<Duration>,
    pub callback: Option<TimerCallback>,
    /// Set for periodic entries; cloned into a fresh one-shot callback each
    /// time the entry is rescheduled so later firings never find an
    /// already-consumed callback.
    pub repeat: Option<RepeatingCallback>,
    /// Firings left after this one, for `maxFires`-bounded timers. `None`
    /// means unbounded.
    pub remaining_fires: Option<u32>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.id == other.id
    }
}
impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due.cmp(&other.due).then_with(|| self.id.cmp(&other.id))
    }
}

/// A min-heap of pending timers, keyed by due-instant. `tick()` pops every
/// entry whose `due` has passed, reinserting periodic ones with their next
/// due-instant.
#[derive(Default)]
pub struct TimerHeap {
    heap: BinaryHeap<Reverse<TimerEntry>>,
}

impl TimerHeap {
    pub fn new() -> Self {
        TimerHeap { heap: BinaryHeap::new() }
    }

    /// Schedules a one-shot timer; never reinserted once fired.
    pub fn schedule(&mut self, id: u64, delay: Duration, callback: TimerCallback) {
        self.heap.push(Reverse(TimerEntry {
            due: Instant::now() + delay,
            id,
            period: None,
            callback: Some(callback),
            repeat: None,
            remaining_fires: None,
        }));
    }

    /// Schedules a periodic timer that fires every `period`, starting after
    /// the first `period` elapses. `max_fires` bounds the total number of
    /// firings; `None` runs indefinitely until cancelled.
    pub fn schedule_repeating(&mut self, id: u64, period: Duration, callback: RepeatingCallback, max_fires: Option<u32>) {
        if max_fires == Some(0) {
            return;
        }
        self.heap.push(Reverse(TimerEntry {
            due: Instant::now() + period,
            id,
            period: Some(period),
            callback: Some(one_shot_from(Arc::clone(&callback))),
            repeat: Some(callback),
            remaining_fires: max_fires.map(|n| n - 1),
        }));
    }

    /// Removes a pending timer by id, if it hasn't fired yet. Linear in the
    /// number of pending timers; fine at the scale a single event loop runs.
    pub fn cancel(&mut self, id: u64) -> bool {
        let before = self.heap.len();
        self.heap = self.heap.drain().filter(|Reverse(entry)| entry.id != id).collect();
        self.heap.len() != before
    }

    /// Returns the due-instant of the next pending timer, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    /// Pops and returns every timer due by `now`, rescheduling periodic
    /// ones. Callbacks are returned rather than invoked here so the caller
    /// can run them outside the lock guarding the heap.
    pub fn drain_due(&mut self, now: Instant) -> Vec<TimerCallback> {
        let mut fired = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            let Reverse(mut entry) = self.heap.pop().unwrap();
            let callback = entry.callback.take().expect("callback present until fired");
            if let Some(period) = entry.period {
                let keep_going = entry.remaining_fires.map_or(true, |n| n > 0);
                if keep_going {
                    let repeat = entry.repeat.clone().expect("periodic entry carries a repeating callback");
                    self.heap.push(Reverse(TimerEntry {
                        due: now + period,
                        id: entry.id,
                        period: Some(period),
                        callback: Some(one_shot_from(Arc::clone(&repeat))),
                        repeat: Some(repeat),
                        remaining_fires: entry.remaining_fires.map(|n| n - 1),
                    }));
                }
            }
            fired.push(callback);
        }
        fired
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
