//! The in-process weak-reference tier.
//!
//! Maps cache file names to results that are still alive elsewhere in the
//! process, without keeping them alive itself. A hit here skips both disk
//! I/O and deserialization. Entries evaporate as soon as the last strong
//! owner of the value is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug)]
pub(crate) struct WeakCache<T> {
    entries: Mutex<HashMap<String, Weak<T>>>,
}

impl<T> WeakCache<T> {
    pub(crate) fn new() -> Self {
        WeakCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the live value for `key`, if anything still references it.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).and_then(Weak::upgrade)
    }

    /// Records a non-owning reference to `value` under `key`.
    ///
    /// Dead entries are purged on the way, so the map does not accumulate
    /// stale slots over the lifetime of the process.
    pub(crate) fn insert(&self, key: String, value: &Arc<T>) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, slot| slot.strong_count() > 0);
        entries.insert(key, Arc::downgrade(value));
    }
}
