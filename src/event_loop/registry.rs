//! The operation registry: every in-flight cancellable operation gets a
//! monotonic id when it's added to the loop, and its cancel handler sits
//! here until either the operation settles (and removes itself) or
//! `cancelFileOperation` fires it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A single registered operation: its cancel callback, keyed by id.
pub struct OpRecord {
    pub cancel: Box<dyn FnOnce() + Send>,
}

#[derive(Default)]
pub struct OpRegistry {
    next_id: AtomicU64,
    ops: Mutex<HashMap<u64, OpRecord>>,
}

impl OpRegistry {
    pub fn new() -> Self {
        OpRegistry { next_id: AtomicU64::new(1), ops: Mutex::new(HashMap::new()) }
    }

    /// Reserves a fresh operation id. Ids are opaque and never reused
    /// within a process.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, id: u64, cancel: Box<dyn FnOnce() + Send>) {
        self.ops.lock().insert(id, OpRecord { cancel });
    }

    /// Removes the record for `id` without invoking its cancel handler;
    /// called once an operation settles naturally.
    pub fn complete(&self, id: u64) {
        self.ops.lock().remove(&id);
    }

    /// Removes and invokes the cancel handler for `id`, if still present.
    /// Returns whether an operation was actually found and cancelled.
    pub fn cancel(&self, id: u64) -> bool {
        let record = self.ops.lock().remove(&id);
        match record {
            Some(record) => {
                (record.cancel)();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.ops.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn ids_are_monotonic() {
        let registry = OpRegistry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert!(b > a);
    }

    #[test]
    fn cancel_invokes_handler_once() {
        let registry = OpRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);
        let id = registry.next_id();
        registry.register(id, Box::new(move || f.store(true, Ordering::SeqCst)));

        assert!(registry.cancel(id));
        assert!(fired.load(Ordering::SeqCst));
        assert!(!registry.cancel(id));
    }

    #[test]
    fn complete_removes_without_firing_cancel() {
        let registry = OpRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);
        let id = registry.next_id();
        registry.register(id, Box::new(move || f.store(true, Ordering::SeqCst)));

        registry.complete(id);
        assert!(!registry.cancel(id));
        assert!(!fired.load(Ordering::SeqCst));
    }
}
