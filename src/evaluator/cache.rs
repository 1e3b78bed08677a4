// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compiled-expression cache
//!
//! Keyed by exact source text. The index holds weak references so that an
//! entry lives exactly as long as somebody uses it; a bounded LRU set of
//! strong references keeps recently used entries alive between calls.
//! Entries that fall out of both are recompiled transparently on the next
//! request. Parse failures are never cached.

use super::compiled::CompiledExpression;
use super::config::CacheConfig;
use crate::core::ParseResult;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Requests served without compiling
    pub hits: u64,
    /// Requests that compiled
    pub misses: u64,
    /// Entries pushed out of the retained set
    pub evictions: u64,
    /// Sweeps of dropped index entries
    pub sweeps: u64,
    /// Index entries, live or dropped but not yet swept
    pub entries: usize,
    /// Entries kept alive by the cache itself
    pub retained: usize,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0, or 0.0 if nothing was requested
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    sweeps: AtomicU64,
}

/// Concurrent cache of compiled expressions
#[derive(Debug)]
pub struct ExpressionCache {
    /// Source text to compiled expression, kept weakly
    entries: DashMap<String, Weak<CompiledExpression>, FxBuildHasher>,
    /// Strong references for recently used entries
    retained: Option<Mutex<LruCache<String, Arc<CompiledExpression>>>>,
    config: CacheConfig,
    /// Index size at which the next sweep runs
    next_sweep: AtomicUsize,
    counters: Counters,
}

impl ExpressionCache {
    /// Create a cache with default configuration
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache with custom configuration
    pub fn with_config(config: CacheConfig) -> Self {
        let retained = match config.retained_entries {
            None => Some(Mutex::new(LruCache::unbounded())),
            Some(limit) => NonZeroUsize::new(limit).map(|limit| Mutex::new(LruCache::new(limit))),
        };
        Self {
            entries: DashMap::with_hasher(FxBuildHasher),
            retained,
            next_sweep: AtomicUsize::new(config.sweep_threshold),
            config,
            counters: Counters::default(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the compiled form of `source`, compiling it on first request
    ///
    /// Identical text yields the same `Arc` for as long as the entry is
    /// alive. When two threads compile the same text at once, the first one
    /// to store its result wins and the other adopts it.
    pub fn compile_or_get(&self, source: &str) -> ParseResult<Arc<CompiledExpression>> {
        if !self.config.enabled {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return CompiledExpression::compile(source).map(Arc::new);
        }

        if let Some(compiled) = self.get(source) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("Expression cache hit: {source}");
            return Ok(compiled);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        log::trace!("Expression cache miss: {source}");

        let compiled = Arc::new(CompiledExpression::compile(source)?);
        let stored = match self.entries.entry(source.to_string()) {
            Entry::Occupied(mut occupied) => match occupied.get().upgrade() {
                Some(existing) => existing,
                None => {
                    occupied.insert(Arc::downgrade(&compiled));
                    compiled
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::downgrade(&compiled));
                compiled
            }
        };

        self.retain(source, &stored);
        self.maybe_sweep();
        Ok(stored)
    }

    /// Look up a live entry without compiling
    ///
    /// Served from the sharded index; the retained set is only refreshed
    /// when its lock is free, so concurrent hits never queue on it.
    pub fn get(&self, source: &str) -> Option<Arc<CompiledExpression>> {
        let compiled = self
            .entries
            .get(source)
            .and_then(|entry| entry.value().upgrade())?;
        self.touch(source, &compiled);
        Some(compiled)
    }

    fn touch(&self, source: &str, compiled: &Arc<CompiledExpression>) {
        let Some(mut retained) = self.retained.as_ref().and_then(|r| r.try_lock()) else {
            return;
        };
        if retained.promote(source) {
            return;
        }
        // Alive through an outside holder but no longer retained
        if let Some((key, _)) = retained.push(source.to_string(), Arc::clone(compiled)) {
            if key != source {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn retain(&self, source: &str, compiled: &Arc<CompiledExpression>) {
        let Some(retained) = &self.retained else {
            return;
        };
        let pushed_out = retained
            .lock()
            .push(source.to_string(), Arc::clone(compiled));
        if let Some((key, _)) = pushed_out {
            if key != source {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn maybe_sweep(&self) {
        if self.entries.len() > self.next_sweep.load(Ordering::Relaxed) {
            self.sweep();
        }
    }

    /// Drop index entries whose compiled form is no longer alive
    pub fn sweep(&self) {
        self.entries.retain(|_, entry| entry.strong_count() > 0);
        self.counters.sweeps.fetch_add(1, Ordering::Relaxed);

        let live = self.entries.len();
        self.next_sweep
            .store(self.config.sweep_threshold.max(live * 2), Ordering::Relaxed);
        log::trace!("Expression cache swept, {live} live entries");
    }

    /// Number of index entries, including dropped ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry; counters are kept
    pub fn clear(&self) {
        self.entries.clear();
        if let Some(retained) = &self.retained {
            retained.lock().clear();
        }
        self.next_sweep
            .store(self.config.sweep_threshold, Ordering::Relaxed);
    }

    /// Snapshot of the cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            sweeps: self.counters.sweeps.load(Ordering::Relaxed),
            entries: self.entries.len(),
            retained: self
                .retained
                .as_ref()
                .map_or(0, |retained| retained.lock().len()),
        }
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new()
    }
}
