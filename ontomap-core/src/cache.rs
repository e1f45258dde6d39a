use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::Result;

/// Lazily populated, process-lifetime cache.
///
/// Each key is populated at most once: the lock is held across population,
/// so a second caller for the same key blocks until the first has inserted
/// the value and then shares it (single-flight). A failed population inserts
/// nothing, leaving the next caller free to retry.
///
/// Entries are never invalidated or evicted; callers rely on the assumption
/// that the backing sources are immutable within a run. The populate closure
/// must not re-enter the same cache or it will deadlock.
pub struct Cache<K, V> {
    inner: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash, V> Cache<K, V> {
    pub fn new() -> Cache<K, V> {
        Cache { inner: Mutex::new(HashMap::new()) }
    }

    pub fn get_or_populate<F>(&self, key: K, populate: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        let mut entries = self.inner.lock().expect("cache lock poisoned");
        if let Some(value) = entries.get(&key) {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(populate()?);
        entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().expect("cache lock poisoned").contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V> Default for Cache<K, V> {
    fn default() -> Cache<K, V> {
        Cache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OntomapError;

    #[test]
    fn test_populates_once() {
        let cache: Cache<&str, u32> = Cache::new();
        let mut populations = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_populate("answer", || {
                    populations += 1;
                    Ok(42)
                })
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(populations, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_population_is_retried() {
        let cache: Cache<&str, u32> = Cache::new();

        let failed = cache.get_or_populate("answer", || {
            Err(OntomapError::MissingField("nope".to_string()))
        });
        assert!(failed.is_err());
        assert!(!cache.contains(&"answer"));

        let value = cache.get_or_populate("answer", || Ok(7)).unwrap();
        assert_eq!(*value, 7);
    }
}
