use crate::registry::{CacheIntrospect, CacheRegistry};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::borrow::Borrow;
use std::hash::Hash;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;
use streamchange_core::{
    CacheSettings, Result, StreamChangeError, StreamPosition, DEFAULT_MAX_SIZE,
};
use tracing::{debug, trace};

/// Bounds required of a tracked entity id.
pub trait Entity: Eq + Hash + Clone + Send + Sync + 'static {}

impl<T: Eq + Hash + Clone + Send + Sync + 'static> Entity for T {}

/// Forward and reverse indexes plus the watermark, guarded together.
///
/// `e ∈ forward[p]` iff `reverse[e] == p`, and every tracked position is
/// strictly above `earliest_known_position`.
#[derive(Debug)]
struct ChangeIndex<E> {
    forward: BTreeMap<StreamPosition, HashSet<E>>,
    reverse: HashMap<E, StreamPosition>,
    earliest_known_position: StreamPosition,
}

impl<E: Entity> ChangeIndex<E> {
    fn new(earliest_known_position: StreamPosition) -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: HashMap::new(),
            earliest_known_position,
        }
    }

    /// Entities whose last change is strictly after `stream_pos`, oldest first.
    fn changed_after(&self, stream_pos: StreamPosition) -> impl Iterator<Item = &E> {
        self.forward
            .range((Excluded(stream_pos), Unbounded))
            .flat_map(|(_, entities)| entities.iter())
    }

    /// Insert without enforcing the capacity bound. Returns false when the
    /// call carried no new information.
    fn record(&mut self, entity: E, stream_pos: StreamPosition) -> bool {
        if stream_pos <= self.earliest_known_position {
            return false;
        }

        if let Some(&old_pos) = self.reverse.get(&entity) {
            // never move an entity backwards
            if old_pos >= stream_pos {
                return false;
            }
            if let Some(bucket) = self.forward.get_mut(&old_pos) {
                bucket.remove(&entity);
                if bucket.is_empty() {
                    self.forward.remove(&old_pos);
                }
            }
        }

        self.forward
            .entry(stream_pos)
            .or_default()
            .insert(entity.clone());
        self.reverse.insert(entity, stream_pos);
        true
    }

    /// Drop the oldest positions until at most `max_size` entities remain,
    /// advancing the watermark past everything dropped.
    fn evict(&mut self, max_size: usize) -> usize {
        let mut evicted = 0;
        while self.reverse.len() > max_size {
            let Some((pos, entities)) = self.forward.pop_first() else {
                break;
            };
            self.earliest_known_position = self.earliest_known_position.max(pos);
            for entity in entities {
                self.reverse.remove(&entity);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Tracks the stream position of the latest change for a set of entities
/// (typically room or user ids).
///
/// Given entities and a stream position it answers which of them may have
/// changed since that position. Whenever the position predates what the cache
/// still remembers it answers "changed", so callers can always act on the
/// result safely; the worst case is a redundant re-fetch.
///
/// Cloning yields another handle onto the same cache.
#[derive(Clone)]
pub struct StreamChangeCache<E> {
    name: Arc<str>,
    max_size: usize,
    index: Arc<RwLock<ChangeIndex<E>>>,
    registry: Arc<dyn CacheRegistry>,
}

impl<E> std::fmt::Debug for StreamChangeCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.read();
        f.debug_struct("StreamChangeCache")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("entries", &index.reverse.len())
            .field("earliest_known_position", &index.earliest_known_position)
            .finish()
    }
}

impl<E: Entity> StreamChangeCache<E> {
    /// Create a cache bounded to the default of 10 000 entries.
    pub fn new(
        name: impl Into<String>,
        current_stream_pos: StreamPosition,
        registry: Arc<dyn CacheRegistry>,
    ) -> Result<Self> {
        Self::with_max_size(name, current_stream_pos, DEFAULT_MAX_SIZE, registry)
    }

    /// Create a cache whose watermark starts at `current_stream_pos`: nothing
    /// is known about changes at or before it.
    pub fn with_max_size(
        name: impl Into<String>,
        current_stream_pos: StreamPosition,
        max_size: usize,
        registry: Arc<dyn CacheRegistry>,
    ) -> Result<Self> {
        let name: String = name.into();
        if name.trim().is_empty() {
            return Err(StreamChangeError::InvalidName(
                "cache name cannot be empty".to_string(),
            ));
        }
        if max_size == 0 {
            return Err(StreamChangeError::InvalidCapacity(max_size));
        }

        let cache = Self {
            name: Arc::from(name),
            max_size,
            index: Arc::new(RwLock::new(ChangeIndex::new(current_stream_pos))),
            registry,
        };
        cache.registry.register(&cache.name, cache.introspect());
        debug!(
            "Created stream change cache {:?} at position {} (max_size {})",
            cache.name, current_stream_pos, max_size
        );
        Ok(cache)
    }

    /// Create a cache bounded by whatever the settings prescribe for `name`.
    pub fn from_settings(
        name: impl Into<String>,
        current_stream_pos: StreamPosition,
        settings: &CacheSettings,
        registry: Arc<dyn CacheRegistry>,
    ) -> Result<Self> {
        let name: String = name.into();
        let max_size = settings.max_size_for(&name);
        Self::with_max_size(name, current_stream_pos, max_size, registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.index.read().reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positions at or below this value are outside what the cache knows.
    pub fn earliest_known_position(&self) -> StreamPosition {
        self.index.read().earliest_known_position
    }

    /// Read-only view suitable for handing to a registry.
    pub fn introspect(&self) -> Arc<dyn CacheIntrospect> {
        Arc::new(CacheView {
            name: self.name.clone(),
            max_size: self.max_size,
            index: self.index.clone(),
        })
    }

    /// Returns true if the entity may have changed after `stream_pos`.
    pub fn has_entity_changed<Q>(&self, entity: &Q, stream_pos: StreamPosition) -> bool
    where
        E: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.index.read();

        if stream_pos <= index.earliest_known_position {
            return true;
        }

        match index.reverse.get(entity) {
            // not tracked, so nothing proves it unchanged
            None => true,
            Some(&latest) => stream_pos < latest,
        }
    }

    /// Returns the subset of `entities` that may have changed after
    /// `stream_pos`. If the position is too old every entity is returned.
    pub fn get_entities_changed<I>(&self, entities: I, stream_pos: StreamPosition) -> HashSet<E>
    where
        I: IntoIterator<Item = E>,
    {
        let requested: HashSet<E> = entities.into_iter().collect();

        let result = {
            let index = self.index.read();
            if stream_pos <= index.earliest_known_position {
                None
            } else if requested.len() > index.reverse.len() {
                let changed: HashSet<&E> = index.changed_after(stream_pos).collect();
                Some(
                    requested
                        .iter()
                        .filter(|e| changed.contains(e))
                        .cloned()
                        .collect::<HashSet<E>>(),
                )
            } else {
                // same answer as the range scan: reverse[e] > pos iff e is
                // in the forward range above pos
                Some(
                    requested
                        .iter()
                        .filter(|e| index.reverse.get(*e).is_some_and(|&p| p > stream_pos))
                        .cloned()
                        .collect::<HashSet<E>>(),
                )
            }
        };

        match result {
            Some(changed) => {
                self.registry.record_hit(&self.name);
                trace!(
                    "{}: {} of {} entities changed since {}",
                    self.name,
                    changed.len(),
                    requested.len(),
                    stream_pos
                );
                changed
            }
            None => {
                self.registry.record_miss(&self.name);
                trace!(
                    "{}: position {} predates cache, returning all {} entities",
                    self.name,
                    stream_pos,
                    requested.len()
                );
                requested
            }
        }
    }

    /// Returns true if anything at all may have changed after `stream_pos`.
    pub fn has_any_entity_changed(&self, stream_pos: StreamPosition) -> bool {
        let index = self.index.read();
        if stream_pos <= index.earliest_known_position {
            return true;
        }
        let any = index.changed_after(stream_pos).next().is_some();
        any
    }

    /// Every tracked entity changed after `stream_pos`, oldest change first,
    /// or `None` if the position predates the cache.
    pub fn get_all_entities_changed(&self, stream_pos: StreamPosition) -> Option<Vec<E>> {
        let result = {
            let index = self.index.read();
            if stream_pos <= index.earliest_known_position {
                None
            } else {
                Some(index.changed_after(stream_pos).cloned().collect::<Vec<E>>())
            }
        };

        if result.is_some() {
            self.registry.record_hit(&self.name);
        } else {
            self.registry.record_miss(&self.name);
        }
        result
    }

    /// Position of the entity's last tracked change, if it is tracked.
    pub fn max_position_of_last_change<Q>(&self, entity: &Q) -> Option<StreamPosition>
    where
        E: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.read().reverse.get(entity).copied()
    }

    /// Inform the cache that `entity` changed at `stream_pos`.
    pub fn entity_has_changed(&self, entity: E, stream_pos: StreamPosition) {
        let mut index = self.index.write();
        if !index.record(entity, stream_pos) {
            trace!("{}: ignoring change at {}", self.name, stream_pos);
            return;
        }
        self.evict_locked(&mut index);
    }

    /// Inform the cache that every entity in `entities` changed at `stream_pos`.
    pub fn entities_have_changed<I>(&self, entities: I, stream_pos: StreamPosition)
    where
        I: IntoIterator<Item = E>,
    {
        let mut index = self.index.write();
        if stream_pos <= index.earliest_known_position {
            return;
        }
        let mut recorded = false;
        for entity in entities {
            recorded |= index.record(entity, stream_pos);
        }
        if recorded {
            self.evict_locked(&mut index);
        }
    }

    /// Forget everything and move the watermark up to at least `stream_pos`.
    pub fn clear_to(&self, stream_pos: StreamPosition) {
        let mut index = self.index.write();
        index.forward.clear();
        index.reverse.clear();
        index.earliest_known_position = index.earliest_known_position.max(stream_pos);
        debug!(
            "{}: cleared, earliest known position now {}",
            self.name, index.earliest_known_position
        );
    }

    fn evict_locked(&self, index: &mut ChangeIndex<E>) {
        let evicted = index.evict(self.max_size);
        if evicted > 0 {
            debug!(
                "{}: evicted {} entities, earliest known position now {}",
                self.name, evicted, index.earliest_known_position
            );
        }
    }
}

struct CacheView<E> {
    name: Arc<str>,
    max_size: usize,
    index: Arc<RwLock<ChangeIndex<E>>>,
}

impl<E: Entity> CacheIntrospect for CacheView<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.index.read().reverse.len()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn earliest_known_position(&self) -> StreamPosition {
        self.index.read().earliest_known_position
    }

    fn max_tracked_position(&self) -> Option<StreamPosition> {
        self.index.read().forward.keys().next_back().copied()
    }
}
