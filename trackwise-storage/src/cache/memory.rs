//! In-process cache backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::glob::GlobPattern;
use super::traits::{CacheBackend, CacheError, CacheResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// [`CacheBackend`] over a concurrent map with lazy expiry.
#[derive(Debug)]
pub struct InMemoryCacheBackend {
    entries: DashMap<String, Entry>,
    online: AtomicBool,
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            online: AtomicBool::new(true),
        }
    }
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every call fails.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Whether `key` currently holds an unexpired entry.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Unexpired keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    fn ensure_online(&self) -> CacheResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Backend("in-memory cache is offline".to_string()))
        }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_online()?;
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.ensure_online()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.ensure_online()?;
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.ensure_online()?;
        let glob = GlobPattern::compile(pattern)?;
        let mut removed = 0u64;
        self.entries.retain(|key, _| {
            if glob.matches(key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
