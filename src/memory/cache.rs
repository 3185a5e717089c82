//! In-memory LRU of recent lookups: normalized query -> best entry id.
//! Key: blake3 hash of target_lang, normalized_text, context and category, with
//! context and category trimmed and case-folded.
//! Purely a performance guard: a miss or a `clear` only costs a full scan.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use super::label_key;

pub type CacheKey = [u8; 32];

/// The whole get/evict/put sequence runs under one lock.
pub struct MatchCache {
    inner: Mutex<LruCache<CacheKey, i64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl MatchCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Compute the cache key for a normalized query.
    pub fn compute_key(
        target_lang: &str,
        normalized_text: &str,
        context: Option<&str>,
        category: Option<&str>,
    ) -> CacheKey {
        let context = label_key(context);
        let category = label_key(category);
        let fields = [
            Some(target_lang),
            Some(normalized_text),
            context.as_deref(),
            category.as_deref(),
        ];

        let mut hasher = blake3::Hasher::new();
        // Length-prefixed so no field can bleed into the next.
        for field in fields {
            match field {
                Some(bytes) => {
                    hasher.update(&(bytes.len() as u64).to_le_bytes());
                    hasher.update(bytes.as_bytes());
                }
                None => {
                    hasher.update(&u64::MAX.to_le_bytes());
                }
            }
        }
        *hasher.finalize().as_bytes()
    }

    /// Look up the best-known entry id, marking the key most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<i64> {
        let hit = self.inner.lock().get(key).copied();
        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Insert or refresh a key, evicting the least recently used one at capacity.
    pub fn put(&self, key: CacheKey, entry_id: i64) {
        self.inner.lock().put(key, entry_id);
    }

    /// Drop one key, e.g. after its entry failed revalidation.
    pub fn invalidate(&self, key: &CacheKey) {
        self.inner.lock().pop(key);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            len: inner.len(),
            capacity: inner.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
