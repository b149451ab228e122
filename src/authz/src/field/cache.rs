//! Compiled field-matcher cache
//!
//! Rule sets are rebuilt wholesale on every update, but most field pattern
//! sets survive from one generation to the next. The cache lets a rebuild
//! reuse matchers compiled for an earlier generation. It is only touched
//! while building an index, never during permission checks.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::pattern::FieldMatcher;
use crate::error::Result;

/// Joins patterns into a cache key; field names never contain it
const KEY_SEPARATOR: char = '\u{1f}';

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Total number of entries in cache
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe cache of compiled field matchers keyed by pattern set
#[derive(Debug, Default)]
pub struct PatternCache {
    matchers: DashMap<String, Arc<FieldMatcher>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl PatternCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the matcher for `patterns`, compiling it on first use
    pub fn get_or_compile(&self, patterns: &[String]) -> Result<Arc<FieldMatcher>> {
        let key = Self::key(patterns);

        if let Some(matcher) = self.matchers.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(matcher.value()));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let matcher = Arc::new(FieldMatcher::compile(patterns)?);
        self.matchers.insert(key, Arc::clone(&matcher));

        Ok(matcher)
    }

    /// Drops every cached matcher and resets statistics
    pub fn clear(&self) {
        self.matchers.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Keeps only matchers whose pattern set is still in use
    pub fn retain_patterns<'a, I>(&self, live: I)
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let live: std::collections::HashSet<String> =
            live.into_iter().map(Self::key).collect();
        self.matchers.retain(|key, _| live.contains(key));
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.matchers.len(),
        }
    }

    /// Returns the number of cached matchers
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    fn key(patterns: &[String]) -> String {
        let mut key = String::new();
        for (i, pattern) in patterns.iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(pattern);
        }
        key
    }
}
