//! Key/field result cache
//!
//! Compiled results are cached per `(compile key, field)` pair. Two rules
//! shape every lookup and write:
//!
//! - **Shadowing**: a cached `compile_error` for a key is authoritative
//!   for every field of that key. Readers check it first, so a request
//!   for e.g. `data_url` against a known-broken source is answered with
//!   the error instead of a miss.
//! - **Size-bounded admission**: values larger than the configured
//!   ceiling are silently never cached. The default ceiling is zero, so
//!   an unconfigured cache never stores anything.

use std::sync::Arc;
use tracing::debug;

use crate::backend::CacheBackend;

/// Reserved field name whose presence shadows all other fields of a key.
pub const COMPILE_ERROR_FIELD: &str = "compile_error";

/// Every field the service may cache; invalidation clears all of them.
pub const CACHED_FIELDS: [&str; 3] = ["pdf", "data_url", COMPILE_ERROR_FIELD];

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The requested field's cached value.
    Hit(String),
    /// A compile error is cached for this key; it shadows the requested
    /// field.
    CompileError(String),
    Miss,
}

/// Field cache over an optional backend.
///
/// The backend is an injected collaborator; when none is configured every
/// operation is a no-op and every lookup a miss, so callers never branch
/// on cache availability.
#[derive(Clone)]
pub struct ResultCache {
    backend: Option<Arc<dyn CacheBackend>>,
    max_bytes: usize,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, max_bytes: usize) -> Self {
        Self {
            backend: Some(backend),
            max_bytes,
        }
    }

    /// A cache with no backend: all writes vanish, all reads miss.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            max_bytes: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Look up a field, honoring compile-error shadowing.
    pub fn get(&self, key: &str, field: &str) -> Lookup {
        let Some(backend) = &self.backend else {
            return Lookup::Miss;
        };

        if field != COMPILE_ERROR_FIELD {
            if let Some(error) = backend.get(&entry_key(key, COMPILE_ERROR_FIELD)) {
                return Lookup::CompileError(error);
            }
        }

        match backend.get(&entry_key(key, field)) {
            Some(value) if field == COMPILE_ERROR_FIELD => Lookup::CompileError(value),
            Some(value) => Lookup::Hit(value),
            None => Lookup::Miss,
        }
    }

    /// Offer a value for admission. Oversized values are skipped, not
    /// errors; an existing entry is never overwritten (first writer
    /// wins).
    pub fn put(&self, key: &str, field: &str, value: &str) {
        let Some(backend) = &self.backend else {
            return;
        };

        if value.len() > self.max_bytes {
            debug!(
                key,
                field,
                size = value.len(),
                ceiling = self.max_bytes,
                "value exceeds cache ceiling, skipping admission"
            );
            return;
        }

        if !backend.add(&entry_key(key, field), value) {
            debug!(key, field, "entry already cached, first writer wins");
        }
    }

    /// Drop every cached field for a key. Called when the owning record
    /// is deleted.
    pub fn invalidate(&self, key: &str) {
        let Some(backend) = &self.backend else {
            return;
        };
        for field in CACHED_FIELDS {
            backend.delete(&entry_key(key, field));
        }
    }
}

fn entry_key(key: &str, field: &str) -> String {
    format!("{}:{}", key, field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use pretty_assertions::assert_eq;

    fn cache(max_bytes: usize) -> ResultCache {
        ResultCache::new(Arc::new(MemoryBackend::new()), max_bytes)
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = cache(1024);
        cache.put("key1", "data_url", "data:application/pdf;base64,AAAA");
        assert_eq!(
            cache.get("key1", "data_url"),
            Lookup::Hit("data:application/pdf;base64,AAAA".to_string())
        );
        assert_eq!(cache.get("key1", "pdf"), Lookup::Miss);
        assert_eq!(cache.get("other", "data_url"), Lookup::Miss);
    }

    #[test]
    fn compile_error_shadows_every_other_field() {
        let cache = cache(1024);
        cache.put("key1", COMPILE_ERROR_FIELD, "! Undefined control sequence.");

        for field in ["data_url", "pdf", "artifact"] {
            assert_eq!(
                cache.get("key1", field),
                Lookup::CompileError("! Undefined control sequence.".to_string()),
                "field {field} must be shadowed"
            );
        }
        assert_eq!(
            cache.get("key1", COMPILE_ERROR_FIELD),
            Lookup::CompileError("! Undefined control sequence.".to_string())
        );
    }

    #[test]
    fn oversized_values_are_never_admitted() {
        let cache = cache(8);
        cache.put("key1", "data_url", "way-too-long-for-the-ceiling");
        assert_eq!(cache.get("key1", "data_url"), Lookup::Miss);

        // The ceiling applies to compile errors too.
        cache.put("key1", COMPILE_ERROR_FIELD, "also much too long to cache");
        assert_eq!(cache.get("key1", COMPILE_ERROR_FIELD), Lookup::Miss);
    }

    #[test]
    fn zero_ceiling_means_never_cache() {
        let cache = cache(0);
        cache.put("key1", "data_url", "x");
        assert_eq!(cache.get("key1", "data_url"), Lookup::Miss);
    }

    #[test]
    fn first_writer_wins() {
        let cache = cache(1024);
        cache.put("key1", "data_url", "first");
        cache.put("key1", "data_url", "second");
        assert_eq!(cache.get("key1", "data_url"), Lookup::Hit("first".to_string()));
    }

    #[test]
    fn invalidate_clears_all_fields_including_the_error() {
        let cache = cache(1024);
        cache.put("key1", "pdf", "main.pdf");
        cache.put("key1", COMPILE_ERROR_FIELD, "! err");
        cache.invalidate("key1");

        assert_eq!(cache.get("key1", "pdf"), Lookup::Miss);
        assert_eq!(cache.get("key1", COMPILE_ERROR_FIELD), Lookup::Miss);
    }

    #[test]
    fn disabled_cache_misses_and_swallows_writes() {
        let cache = ResultCache::disabled();
        assert!(!cache.is_enabled());
        cache.put("key1", "data_url", "x");
        assert_eq!(cache.get("key1", "data_url"), Lookup::Miss);
        cache.invalidate("key1");
    }

    #[test]
    fn keys_do_not_collide_across_fields() {
        let cache = cache(1024);
        cache.put("key1", "pdf", "a.pdf");
        cache.put("key1", "data_url", "data:...");
        assert_eq!(cache.get("key1", "pdf"), Lookup::Hit("a.pdf".to_string()));
        assert_eq!(cache.get("key1", "data_url"), Lookup::Hit("data:...".to_string()));
    }
}
