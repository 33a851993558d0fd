//! Cache storage backends

use std::collections::HashMap;
use std::sync::Mutex;

/// A key/value store with atomic insert-if-absent.
///
/// `add` is the only write primitive, and it never overwrites: the first
/// writer for a key wins. That property is what lets two concurrent
/// compiles of the same input race harmlessly.
pub trait CacheBackend: Send + Sync {
    /// Insert only if the key is absent. Returns whether the value was
    /// stored.
    fn add(&self, key: &str, value: &str) -> bool;
    fn get(&self, key: &str) -> Option<String>;
    fn delete(&self, key: &str);
}

/// Process-local backend over a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn add(&self, key: &str, value: &str) -> bool {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), value.to_string());
        true
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .get(key)
            .cloned()
    }

    fn delete(&self, key: &str) {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .remove(key);
    }
}
