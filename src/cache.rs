//! Rendered-template cache bounded by entry count and estimated memory.
//!
//! Entries expire after their TTL: lazily when read and eagerly through
//! [`TemplateCache::cleanup`], which a background task can run periodically.
//! When an insertion would exceed the memory bound, entries are evicted by
//! ascending [`CacheEntry::eviction_score`]; when the entry count is at
//! capacity, the least recently used entry is evicted. Both may happen on
//! the same insertion.

use crate::constants::cache as defaults;
use crate::options::duration_secs;
use log::{debug, trace};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Cache bounds and timings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Maximum number of entries.
    pub max_size: usize,
    /// Maximum aggregate estimated size of all entries, in bytes.
    pub max_memory: usize,
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: defaults::MAX_SIZE,
            max_memory: defaults::MAX_MEMORY,
            default_ttl: defaults::DEFAULT_TTL,
            cleanup_interval: defaults::CLEANUP_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    /// Estimated size in bytes.
    pub size: usize,
    pub ttl: Duration,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub hit_count: u64,
}

impl CacheEntry {
    fn new(key: String, value: String, ttl: Duration, now: Instant) -> Self {
        let size = estimate_size(&key, &value);
        Self { key, value, size, ttl, created_at: now, last_accessed_at: now, hit_count: 0 }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.ttl.saturating_sub(now.saturating_duration_since(self.created_at))
    }

    /// Retention score; the lowest-scoring entry is evicted first.
    ///
    /// `hits * 1000 + 1_000_000 / (ms since last access + 1)
    ///  + remaining TTL ms / 100 + 10_000 / (size + 1)`
    pub fn eviction_score(&self, now: Instant) -> f64 {
        let idle_ms = now.saturating_duration_since(self.last_accessed_at).as_millis() as f64;
        let remaining_ms = self.remaining_ttl(now).as_millis() as f64;
        self.hit_count as f64 * 1000.0
            + 1_000_000.0 / (idle_ms + 1.0)
            + remaining_ms / 100.0
            + 10_000.0 / (self.size as f64 + 1.0)
    }
}

/// Estimated footprint of an entry: the byte length of key and value.
pub fn estimate_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub memory_usage: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    memory_usage: usize,
    stats: CacheStats,
}

impl CacheState {
    /// The only place entries leave the map, so memory is released exactly once.
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.memory_usage -= entry.size;
        Some(entry)
    }

    fn lowest_score(&self, now: Instant) -> Option<String> {
        self.entries
            .values()
            .map(|entry| (entry.eviction_score(now), entry))
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, entry)| entry.key.clone())
    }

    fn least_recently_used(&self) -> Option<String> {
        self.entries
            .values()
            .min_by_key(|entry| entry.last_accessed_at)
            .map(|entry| entry.key.clone())
    }

    fn evict(&mut self, key: &str, reason: &str) {
        if self.remove(key).is_some() {
            self.stats.evictions += 1;
            debug!("Evicted cache entry '{key}' ({reason})");
        }
    }
}

/// Thread-safe template cache. All operations run under one lock so that
/// eviction decisions see a consistent view.
#[derive(Debug)]
pub struct TemplateCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl TemplateCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config, state: Mutex::new(CacheState::default()) }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut state = self.state.lock();
        let expired = match state.entries.get(key) {
            None => {
                state.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            state.remove(key);
            state.stats.expirations += 1;
            state.stats.misses += 1;
            trace!("Cache entry '{key}' expired");
            return None;
        }
        state.stats.hits += 1;
        let entry = state.entries.get_mut(key)?;
        entry.last_accessed_at = now;
        entry.hit_count += 1;
        Some(entry.value.clone())
    }

    /// Stores `value`, using the configured default TTL when `ttl` is `None`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        self.set_at(key.into(), value.into(), ttl, Instant::now());
    }

    fn set_at(&self, key: String, value: String, ttl: Option<Duration>, now: Instant) {
        let entry = CacheEntry::new(key, value, ttl.unwrap_or(self.config.default_ttl), now);
        if entry.size > self.config.max_memory {
            debug!(
                "Not caching '{}': {} bytes exceeds the {} byte limit",
                entry.key, entry.size, self.config.max_memory
            );
            return;
        }

        let mut state = self.state.lock();
        state.remove(&entry.key);

        while state.memory_usage + entry.size > self.config.max_memory {
            match state.lowest_score(now) {
                Some(victim) => state.evict(&victim, "memory limit"),
                None => break,
            }
        }

        if self.config.max_size > 0 && state.entries.len() >= self.config.max_size {
            if let Some(victim) = state.least_recently_used() {
                state.evict(&victim, "entry limit");
            }
        }

        state.memory_usage += entry.size;
        state.entries.insert(entry.key.clone(), entry);
    }

    pub fn delete(&self, key: &str) -> bool {
        self.state.lock().remove(key).is_some()
    }

    /// Whether a live entry exists. Expired entries are removed.
    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, Instant::now())
    }

    fn has_at(&self, key: &str, now: Instant) -> bool {
        let mut state = self.state.lock();
        match state.entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(false) => true,
            Some(true) => {
                state.remove(key);
                state.stats.expirations += 1;
                false
            }
            None => false,
        }
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    fn cleanup_at(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        state.stats.expirations += expired.len() as u64;
        if !expired.is_empty() {
            debug!("Cache cleanup removed {} expired entries", expired.len());
        }
        expired.len()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.memory_usage = 0;
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_usage(&self) -> usize {
        self.state.lock().memory_usage
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            memory_usage: state.memory_usage,
            ..state.stats.clone()
        }
    }

    /// Runs [`cleanup`](Self::cleanup) every `cleanupInterval` on the tokio
    /// runtime. The task ends once the cache has been dropped.
    pub fn spawn_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let period = self.config.cleanup_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.cleanup();
                    }
                    None => break,
                }
            }
        })
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
