//! In-memory token cache with per-entry expiry
//!
//! Holds the scraped nonce between requests. Entries are checked on read
//! and evicted lazily; an expired entry is a miss even if it was never
//! swept. Hit/miss counters back the /metrics endpoint.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A scraped token plus the window it is trusted for.
#[derive(Debug, Clone)]
pub struct Token {
    pub value: String,
    pub acquired_at: Instant,
    pub ttl: Duration,
}

impl Token {
    pub fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            acquired_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.ttl
    }
}

/// Read-only counters exposed to the metrics endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct TokenCache {
    entries: DashMap<String, Token>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a live token, or `None` if absent or past its validity window.
    /// DashMap gives us an atomic swap per entry, so readers never observe
    /// a half-written value.
    pub fn get(&self, key: &str) -> Option<Token> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.clone());
            }
            // Expired, remove it. Drop the ref first to avoid deadlock.
            drop(entry);
            self.entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value, replacing any previous entry. Returns the stored
    /// token so callers holding no reference can use it directly.
    pub fn set(&self, key: &str, value: String, ttl: Duration) -> Token {
        let token = Token::new(value, ttl);
        self.entries.insert(key.to_string(), token.clone());
        token
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            keys: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_set_returns_token_until_ttl() {
        let cache = TokenCache::new();
        cache.set("nonce", "abc123".to_string(), Duration::from_secs(60));

        let token = cache.get("nonce").expect("fresh entry should hit");
        assert_eq!(token.value, "abc123");

        // Zero TTL entry is expired on the very next read.
        cache.set("nonce", "abc123".to_string(), Duration::from_secs(0));
        assert!(cache.get("nonce").is_none());

        // Expired entry was evicted on read.
        assert_eq!(cache.stats().keys, 0);
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = TokenCache::new();
        cache.set("nonce", "abc123".to_string(), Duration::from_secs(60));

        assert!(cache.invalidate("nonce"));
        assert!(!cache.invalidate("nonce"));
        assert!(cache.get("nonce").is_none());
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let cache = TokenCache::new();

        assert!(cache.get("nonce").is_none());
        cache.set("nonce", "abc123".to_string(), Duration::from_secs(60));
        assert!(cache.get("nonce").is_some());
        assert!(cache.get("nonce").is_some());

        let stats = cache.stats();
        assert_eq!(stats.keys, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn set_overwrites_atomically() {
        let cache = TokenCache::new();
        cache.set("nonce", "old".to_string(), Duration::from_secs(60));
        cache.set("nonce", "new".to_string(), Duration::from_secs(60));

        assert_eq!(cache.get("nonce").unwrap().value, "new");
        assert_eq!(cache.stats().keys, 1);
    }
}
