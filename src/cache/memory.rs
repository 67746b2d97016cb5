//! In-memory cache backend.
//!
//! A mutex-guarded map with lazy TTL expiry. Single-process only: used by
//! tests and local development, never as the shared verdict store in a
//! multi-instance deployment.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;

use crate::cache::key::validate_invalidation_pattern;
use crate::cache::types::{Cache, CacheError, CacheStats, CacheTtl};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    stats: CacheStats,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Glob match supporting `*` (any run) and `?` (single char), the subset
    /// the store-side MATCH uses that invalidation patterns rely on.
    fn glob_match(pattern: &str, key: &str) -> bool {
        let p: Vec<char> = pattern.chars().collect();
        let k: Vec<char> = key.chars().collect();

        // Iterative wildcard match with backtracking over the last `*`.
        let (mut pi, mut ki) = (0usize, 0usize);
        let (mut star, mut mark) = (usize::MAX, 0usize);

        while ki < k.len() {
            if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
                pi += 1;
                ki += 1;
            } else if pi < p.len() && p[pi] == '*' {
                star = pi;
                mark = ki;
                pi += 1;
            } else if star != usize::MAX {
                pi = star + 1;
                mark += 1;
                ki = mark;
            } else {
                return false;
            }
        }
        while pi < p.len() && p[pi] == '*' {
            pi += 1;
        }
        pi == p.len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.stats.record_hit();
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                entries.remove(key);
                self.stats.record_miss();
                Ok(None)
            }
            None => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: CacheTtl) -> Result<(), CacheError> {
        let expires_at = ttl
            .as_seconds()
            .map(|secs| Instant::now() + std::time::Duration::from_secs(secs));

        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        self.stats.record_set();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.remove(key);
        self.stats.record_delete();
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        validate_invalidation_pattern(pattern)?;

        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let matching: Vec<String> = entries
            .keys()
            .filter(|k| Self::glob_match(pattern, k))
            .cloned()
            .collect();

        let count = matching.len() as u64;
        for key in matching {
            entries.remove(&key);
            self.stats.record_delete();
        }
        Ok(count)
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
