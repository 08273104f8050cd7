//! The compiled-expression cache (§4.10): `Projector::make`/`Filter::make`
//! reuse a previously compiled module when called again with a
//! structurally-identical schema, expression list, and config.
//!
//! Grounded on the teacher's own module cache, which always takes its lock
//! on both insert and the recency-reorder step of a hit rather than
//! splitting reads and writes across a `RwLock` (see DESIGN.md's Open
//! Question resolution) — compiling and linking an expression dominates
//! cache-lookup cost by orders of magnitude, so lock contention here was
//! never a real concern for the teacher either.

use crate::config::Config;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vectorize_core::Schema;

/// The cache key (§4.10): a schema fingerprint, each expression's
/// canonical string, the config, and — only when any expression mentions
/// `like(` — a salt, so two `LIKE` expressions that are textually
/// identical but were registered through separate `make` calls don't
/// silently alias a shared compiled pattern holder state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    schema_fingerprint: String,
    expression_strings: Vec<String>,
    cache_capacity: usize,
    bytecode_path: Option<String>,
    like_salt: Option<u64>,
}

impl CacheKey {
    pub fn new(
        schema: &Schema,
        expression_strings: Vec<String>,
        config: &Config,
        mentions_like: bool,
        salt: u64,
    ) -> Self {
        CacheKey {
            schema_fingerprint: schema.fingerprint(),
            expression_strings,
            cache_capacity: config.cache_capacity,
            bytecode_path: config
                .bytecode_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            like_salt: mentions_like.then_some(salt),
        }
    }
}

/// An LRU cache of compiled modules, keyed by [`CacheKey`]. `V` is
/// intentionally generic (rather than hard-coding `CompiledModule`) so the
/// cache can hold either a `Projector`'s or a `Filter`'s compiled artifact
/// without a shared base type.
pub struct Cache<V> {
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, Arc<V>>>,
    recency: Mutex<Vec<CacheKey>>,
}

impl<V> Cache<V> {
    pub fn new(capacity: usize) -> Self {
        Cache {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
            recency: Mutex::new(Vec::new()),
        }
    }

    /// Returns the cached value for `key`, bumping it to most-recently-used,
    /// or `None` on a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let entries = self.entries.lock().unwrap();
        let hit = entries.get(key).cloned();
        drop(entries);
        if hit.is_some() {
            let mut recency = self.recency.lock().unwrap();
            recency.retain(|k| k != key);
            recency.push(key.clone());
        }
        hit
    }

    /// Inserts `value` under `key`, evicting the least recently used entry
    /// if the cache is already at capacity. Returns the value reference
    /// kept in the cache (so callers store the same `Arc` they cache).
    pub fn insert(&self, key: CacheKey, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let mut entries = self.entries.lock().unwrap();
        let mut recency = self.recency.lock().unwrap();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            if let Some(oldest) = recency.first().cloned() {
                entries.remove(&oldest);
                recency.retain(|k| k != &oldest);
            }
        }

        entries.insert(key.clone(), Arc::clone(&value));
        recency.retain(|k| k != &key);
        recency.push(key);
        value
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectorize_core::{FieldDescriptor, ValueKind};

    fn schema() -> Schema {
        Schema::new(vec![FieldDescriptor::new("a", ValueKind::Int32, true)])
    }

    #[test]
    fn repeated_make_with_identical_key_hits_the_cache() {
        let cache: Cache<u32> = Cache::new(4);
        let key = CacheKey::new(&schema(), vec!["field(a:int32)".to_string()], &Config::default(), false, 0);
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), 42);
        assert_eq!(*cache.get(&key).unwrap(), 42);
    }

    #[test]
    fn evicts_least_recently_used_entry_at_capacity() {
        let cache: Cache<u32> = Cache::new(2);
        let config = Config::default();
        let k1 = CacheKey::new(&schema(), vec!["e1".to_string()], &config, false, 0);
        let k2 = CacheKey::new(&schema(), vec!["e2".to_string()], &config, false, 0);
        let k3 = CacheKey::new(&schema(), vec!["e3".to_string()], &config, false, 0);
        cache.insert(k1.clone(), 1);
        cache.insert(k2.clone(), 2);
        cache.get(&k1); // k1 now most recently used, k2 is the LRU victim
        cache.insert(k3.clone(), 3);
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn like_expressions_get_distinct_keys_via_salt() {
        let config = Config::default();
        let a = CacheKey::new(&schema(), vec!["call(like(..))".to_string()], &config, true, 1);
        let b = CacheKey::new(&schema(), vec!["call(like(..))".to_string()], &config, true, 2);
        assert_ne!(a, b);
    }
}
