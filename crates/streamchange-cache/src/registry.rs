use crate::metrics::{CacheMetricsSnapshot, HitMissCounter};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use streamchange_core::{Result, StreamPosition};
use tracing::debug;

/// Read-only live view of a registered cache, for introspection and debugging.
pub trait CacheIntrospect: Send + Sync {
    fn name(&self) -> &str;

    /// Number of tracked entities
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn max_size(&self) -> usize;

    fn earliest_known_position(&self) -> StreamPosition;

    /// Highest position currently tracked, if any
    fn max_tracked_position(&self) -> Option<StreamPosition>;
}

/// Collaborator a cache reports to: registration at construction time and
/// hit/miss counting on batch queries.
///
/// Implementations must not block and must not fail; metrics are best-effort.
pub trait CacheRegistry: Send + Sync {
    fn register(&self, name: &str, cache: Arc<dyn CacheIntrospect>);

    fn record_hit(&self, name: &str);

    fn record_miss(&self, name: &str);
}

/// Registry that drops everything on the floor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistry;

impl NoopRegistry {
    pub fn shared() -> Arc<dyn CacheRegistry> {
        Arc::new(NoopRegistry)
    }
}

impl CacheRegistry for NoopRegistry {
    fn register(&self, _name: &str, _cache: Arc<dyn CacheIntrospect>) {}

    fn record_hit(&self, _name: &str) {}

    fn record_miss(&self, _name: &str) {}
}

/// In-process registry keyed by cache name.
///
/// Entries are only ever added; registering a second cache under an existing
/// name replaces the view but keeps the counters.
#[derive(Default)]
pub struct InMemoryRegistry {
    caches: DashMap<String, Arc<dyn CacheIntrospect>>,
    counters: DashMap<String, Arc<HitMissCounter>>,
}

impl std::fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRegistry")
            .field("caches", &self.caches.len())
            .field("counters", &self.counters.len())
            .finish()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, name: &str) -> Arc<HitMissCounter> {
        if let Some(counter) = self.counters.get(name) {
            return counter.value().clone();
        }
        self.counters
            .entry(name.to_string())
            .or_default()
            .value()
            .clone()
    }

    pub fn hits(&self, name: &str) -> u64 {
        self.counters.get(name).map_or(0, |c| c.hits())
    }

    pub fn misses(&self, name: &str) -> u64 {
        self.counters.get(name).map_or(0, |c| c.misses())
    }

    /// The view most recently registered under `name`.
    pub fn cache(&self, name: &str) -> Option<Arc<dyn CacheIntrospect>> {
        self.caches.get(name).map(|c| c.value().clone())
    }

    /// Every name seen either through registration or a counter bump, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .caches
            .iter()
            .map(|e| e.key().clone())
            .chain(self.counters.iter().map(|e| e.key().clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn snapshot(&self) -> Vec<CacheMetricsSnapshot> {
        self.names()
            .into_iter()
            .map(|name| {
                let view = self.cache(&name);
                let hits = self.hits(&name);
                let misses = self.misses(&name);
                CacheMetricsSnapshot {
                    hits,
                    misses,
                    hit_rate: CacheMetricsSnapshot::calculate_hit_rate(hits, misses),
                    entries: view.as_ref().map(|v| v.len()),
                    max_size: view.as_ref().map(|v| v.max_size()),
                    earliest_known_position: view.as_ref().map(|v| v.earliest_known_position()),
                    name,
                }
            })
            .collect()
    }

    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    pub fn reset_counters(&self) {
        for counter in self.counters.iter() {
            counter.value().reset();
        }
    }
}

impl CacheRegistry for InMemoryRegistry {
    fn register(&self, name: &str, cache: Arc<dyn CacheIntrospect>) {
        if self.caches.insert(name.to_string(), cache).is_some() {
            debug!("Replaced registered stream change cache {:?}", name);
        } else {
            debug!("Registered stream change cache {:?}", name);
        }
    }

    fn record_hit(&self, name: &str) {
        self.counter(name).record_hit();
    }

    fn record_miss(&self, name: &str) {
        self.counter(name).record_miss();
    }
}

static GLOBAL_REGISTRY: Lazy<Arc<InMemoryRegistry>> = Lazy::new(|| Arc::new(InMemoryRegistry::new()));

/// Process-wide registry for callers that want every cache in one place.
/// Caches only report here when handed this registry explicitly.
pub fn global_registry() -> Arc<InMemoryRegistry> {
    GLOBAL_REGISTRY.clone()
}
