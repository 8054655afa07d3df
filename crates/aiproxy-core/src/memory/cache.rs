//! DashMap-backed cache with per-key expiry

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::repositories::{CacheError, CacheStore, Expiry};

struct CacheEntry {
    value: String,
    expires_at: Option<Instant>, // None: no expiry
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Single-process stand-in for Redis. Expired keys are dropped lazily on access.
#[derive(Default)]
pub struct MemoryCache {
    map: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn resolve_expiry(expiry: Expiry, current: Option<Instant>, now: Instant) -> Option<Instant> {
    match expiry {
        Expiry::Never => None,
        Expiry::KeepExisting => current,
        Expiry::After(ttl) => Some(now + ttl),
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let Some(entry) = self.map.get(key) else {
            return Ok(None);
        };
        if entry.is_expired(now) {
            drop(entry);
            self.map.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, expiry: Expiry) -> Result<(), CacheError> {
        let now = Instant::now();
        match self.map.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = if occupied.get().is_expired(now) {
                    None
                } else {
                    occupied.get().expires_at
                };
                occupied.insert(CacheEntry {
                    value,
                    expires_at: resolve_expiry(expiry, current, now),
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    value,
                    expires_at: resolve_expiry(expiry, None, now),
                });
            }
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let now = Instant::now();
        Ok(self
            .map
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.map.remove(key);
        Ok(())
    }
}
