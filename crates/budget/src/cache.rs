//! C10 cache half: an LRU-with-TTL response cache keyed by a content
//! address over `(provider, model, prompt)`.
//!
//! Grounded on the lineage's `CachedProvider` convention: a
//! `std::sync::Mutex` that is never held across an `.await`, a SHA-256
//! content-addressed key, and eviction by oldest `last_accessed` on insert
//! at capacity.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use connectorrt_config::CacheConfig;
use connectorrt_core::CacheEntry;
use sha2::{Digest, Sha256};

pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
    default_ttl_secs: u64,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: config.max_entries,
            default_ttl_secs: config.ttl_secs,
        }
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Content-addressed cache key over the provider, model, and prompt.
    pub fn cache_key(provider: &str, model: &str, prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update(b"\0");
        hasher.update(model.as_bytes());
        hasher.update(b"\0");
        hasher.update(prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a cached response. Expired entries are evicted on read and
    /// never returned. A hit bumps `last_accessed`/`access_count`.
    pub fn get_cached_response(&self, key: &str) -> Option<CacheEntry> {
        let now = Utc::now();
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = guard.get_mut(key) else { return None };
        if entry.is_expired(now) {
            guard.remove(key);
            return None;
        }
        entry.touch(now);
        Some(entry.clone())
    }

    /// Insert or overwrite a cache entry, evicting the oldest entry by
    /// `last_accessed` when the cache is at capacity and the key is new.
    pub fn cache_response(&self, mut entry: CacheEntry) {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !guard.contains_key(&entry.key) && guard.len() >= self.max_entries {
            if let Some(oldest_key) = guard
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone())
            {
                guard.remove(&oldest_key);
            }
        }
        entry.last_accessed = Utc::now();
        guard.insert(entry.key.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry whose TTL has elapsed relative to `now`. Returns
    /// the number of entries evicted. Intended to back the hourly sweep.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(now));
        before - guard.len()
    }
}
