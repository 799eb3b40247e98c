use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use streamchange_core::StreamPosition;
use tracing::trace;

/// Point-in-time view of one named cache, as exported by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetricsSnapshot {
    pub name: String,
    /// Batch queries answered from tracked data
    pub hits: u64,
    /// Batch queries that fell back to returning every input entity
    pub misses: u64,
    /// Hit rate as percentage (0-100)
    pub hit_rate: f64,
    /// Tracked entities, `None` if the cache was never registered
    pub entries: Option<usize>,
    pub max_size: Option<usize>,
    pub earliest_known_position: Option<StreamPosition>,
}

impl CacheMetricsSnapshot {
    pub fn calculate_hit_rate(hits: u64, misses: u64) -> f64 {
        let total_requests = hits + misses;
        if total_requests > 0 {
            (hits as f64 / total_requests as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Lock-free hit/miss counters for a single cache name. Safe to bump from
/// any number of caches and threads at once.
#[derive(Debug, Default)]
pub struct HitMissCounter {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitMissCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        trace!("Stream change cache hit recorded");
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!("Stream change cache miss recorded");
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        CacheMetricsSnapshot::calculate_hit_rate(self.hits(), self.misses())
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
