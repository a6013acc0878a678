//! Bounded cache for factor scores.
//!
//! The walk-forward training scan recomputes the same horse histories over
//! and over; caching per-factor scores keyed by horse, history window and
//! race context removes the duplicate work. The cache is cleared on every
//! retrain.

use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use crate::factors::{self, FactorContext, FactorScores};
use crate::types::PastPerformance;

const DEFAULT_MAX_SIZE: usize = 100_000;

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Bounded map from factor-computation keys to scores. Oldest entries are
/// evicted first once the bound is reached.
pub struct FactorCache {
    entries: HashMap<u64, Option<f64>>,
    order: VecDeque<u64>,
    max_size: usize,
    hits: u64,
    misses: u64,
}

impl FactorCache {
    pub fn new(max_size: usize) -> Self {
        FactorCache {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_size,
            hits: 0,
            misses: 0,
        }
    }

    /// Outer Option is hit/miss; the inner one is the cached factor value
    /// (missing factors are cached too, to skip recomputation).
    pub fn get(&mut self, key: u64) -> Option<Option<f64>> {
        match self.entries.get(&key) {
            Some(value) => {
                self.hits += 1;
                Some(*value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: u64, value: Option<f64>) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }
        if self.entries.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, value);
        self.order.push_back(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
        }
    }
}

impl Default for FactorCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

/// Factor computation with a [`FactorCache`] in front of it.
pub struct CachedFactorCalculator {
    cache: FactorCache,
}

impl CachedFactorCalculator {
    pub fn new(cache: FactorCache) -> Self {
        CachedFactorCalculator { cache }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Compute all seven factors, serving history-keyed factors from cache.
    /// The market factor (popularity) depends on per-race data and is never
    /// cached.
    pub fn calculate(
        &mut self,
        horse_id: &str,
        past: &[PastPerformance],
        ctx: &FactorContext,
    ) -> FactorScores {
        let history = history_key(horse_id, past);

        FactorScores {
            past_results: self.cached(key(b"past_results", history, 0), || {
                factors::past_results::score(past, ctx)
            }),
            course_fit: self.cached(key(b"course_fit", history, context_key(ctx)), || {
                factors::course_fit::score(past, ctx)
            }),
            time_index: self.cached(key(b"time_index", history, context_key(ctx)), || {
                factors::time_index::score(past, ctx)
            }),
            last_3f: self.cached(key(b"last_3f", history, 0), || {
                factors::last_3f::score(past, ctx)
            }),
            popularity: factors::popularity::score(past, ctx),
            pedigree: self.cached(key(b"pedigree", history, pedigree_key(ctx)), || {
                factors::pedigree::score(past, ctx)
            }),
            running_style: self.cached(key(b"running_style", history, context_key(ctx)), || {
                factors::running_style::score(past, ctx)
            }),
        }
    }

    fn cached(&mut self, key: u64, compute: impl FnOnce() -> Option<f64>) -> Option<f64> {
        if let Some(hit) = self.cache.get(key) {
            return hit;
        }
        let value = compute();
        self.cache.insert(key, value);
        value
    }
}

impl Default for CachedFactorCalculator {
    fn default() -> Self {
        Self::new(FactorCache::default())
    }
}

fn history_key(horse_id: &str, past: &[PastPerformance]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    horse_id.hash(&mut hasher);
    for run in past {
        run.race_id.hash(&mut hasher);
    }
    hasher.finish()
}

fn context_key(ctx: &FactorContext) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    ctx.surface.map(|s| s.as_str()).hash(&mut hasher);
    ctx.distance.hash(&mut hasher);
    ctx.track_condition.as_str().hash(&mut hasher);
    ctx.venue.hash(&mut hasher);
    hasher.finish()
}

fn pedigree_key(ctx: &FactorContext) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    context_key(ctx).hash(&mut hasher);
    ctx.sire.hash(&mut hasher);
    ctx.dam_sire.hash(&mut hasher);
    hasher.finish()
}

fn key(factor: &[u8], history: u64, context: u64) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    factor.hash(&mut hasher);
    history.hash(&mut hasher);
    context.hash(&mut hasher);
    hasher.finish()
}
