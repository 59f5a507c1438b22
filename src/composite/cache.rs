use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::animation::state::LayerAnimState;
use crate::foundation::error::LayercastResult;
use crate::foundation::fingerprint::{Fingerprint, StableHasher};
use crate::raster::buffer::Raster;
use crate::scene::layer::{Layer, LayerId};

/// Default byte budget: roughly sixteen 1080p layers.
pub const DEFAULT_CACHE_MAX_BYTES: usize = 16 * 1920 * 1080 * 4;

/// Identity of a prepared layer raster.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub layer_id: LayerId,
    pub fingerprint: Fingerprint,
}

impl CacheKey {
    /// Key for `state`, or `None` when the layer is still changing: only settled or static,
    /// fully opaque, fully revealed, motionless states are cacheable.
    pub fn for_state(layer: &Layer, state: &LayerAnimState) -> Option<Self> {
        let cacheable = state.is_static()
            && state.visible
            && state.opacity == 1.0
            && state.reveal_progress == 1.0
            && state.velocity.x == 0.0
            && state.velocity.y == 0.0;
        if !cacheable {
            return None;
        }
        let mut h = StableHasher::new();
        h.write_f64(state.position.x);
        h.write_f64(state.position.y);
        h.write_f64(state.opacity);
        h.write_f64(state.reveal_progress);
        h.write_f64(layer.opacity);
        match layer.effects.gaussian_blur {
            Some(sigma) => {
                h.write_u8(1);
                h.write_u32(sigma.to_bits());
            }
            None => h.write_u8(0),
        }
        Some(Self {
            layer_id: layer.id.clone(),
            fingerprint: h.finish(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub populations: u64,
    pub evictions: u64,
    pub entries: usize,
    pub bytes: usize,
}

/// One cache entry. Its lock is held for the whole population, so concurrent requests for
/// the same key wait for the first one instead of rendering twice.
type Slot = Mutex<Option<Arc<Raster>>>;

struct Entry {
    slot: Arc<Slot>,
    bytes: usize,
    /// Recency stamp; larger is more recent.
    used: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    /// Keys by recency stamp, oldest first.
    order: BTreeMap<u64, CacheKey>,
    clock: u64,
    bytes: usize,
}

impl Inner {
    /// Mark `key` as most recently used, creating an empty slot for it if needed.
    fn touch(&mut self, key: &CacheKey) -> Arc<Slot> {
        self.clock += 1;
        let used = self.clock;
        let entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            slot: Arc::new(Mutex::new(None)),
            bytes: 0,
            used: 0,
        });
        if entry.used != 0 {
            self.order.remove(&entry.used);
        }
        entry.used = used;
        let slot = Arc::clone(&entry.slot);
        self.order.insert(used, key.clone());
        slot
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        self.bytes -= entry.bytes;
        self.order.remove(&entry.used);
        true
    }

    /// Evict least recently used entries until the total fits `max_bytes`. In-flight entries
    /// and `keep` stay. Returns how many were evicted.
    fn evict_to(&mut self, max_bytes: usize, keep: &CacheKey) -> u64 {
        let mut evicted = 0;
        let mut from = 0;
        while self.bytes > max_bytes {
            let Some((&used, oldest)) = self.order.range(from..).next() else {
                break;
            };
            from = used + 1;
            let resident = self.entries.get(oldest).is_some_and(|e| e.bytes > 0);
            if !resident || oldest == keep {
                continue;
            }
            let oldest = oldest.clone();
            self.remove(&oldest);
            evicted += 1;
        }
        evicted
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared cache of prepared layer rasters.
///
/// Safe to share across render workers. Each key is populated at most once while it stays
/// resident; readers only ever see complete rasters. Entries are evicted least recently used
/// first once the byte budget is exceeded; evicted rasters stay alive for readers still holding
/// them.
pub struct LayerCache {
    inner: Mutex<Inner>,
    max_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    populations: AtomicU64,
    evictions: AtomicU64,
}

impl Default for LayerCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_MAX_BYTES)
    }
}

impl std::fmt::Debug for LayerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerCache")
            .field("max_bytes", &self.max_bytes)
            .field("stats", &self.stats())
            .finish()
    }
}

impl LayerCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            populations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the cached raster for `key`, running `populate` on a miss.
    ///
    /// The boolean is `true` on a hit. A failed population leaves the key empty.
    pub fn get_or_populate<F>(
        &self,
        key: &CacheKey,
        populate: F,
    ) -> LayercastResult<(Arc<Raster>, bool)>
    where
        F: FnOnce() -> LayercastResult<Raster>,
    {
        let slot = lock(&self.inner).touch(key);

        let raster = {
            let mut guard = lock(&slot);
            if let Some(r) = guard.as_ref() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok((Arc::clone(r), true));
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            let raster = match populate() {
                Ok(r) => Arc::new(r),
                Err(e) => {
                    drop(guard);
                    let mut inner = lock(&self.inner);
                    if inner
                        .entries
                        .get(key)
                        .is_some_and(|en| Arc::ptr_eq(&en.slot, &slot) && en.bytes == 0)
                    {
                        inner.remove(key);
                    }
                    return Err(e);
                }
            };
            *guard = Some(Arc::clone(&raster));
            raster
        };
        self.populations.fetch_add(1, Ordering::Relaxed);

        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let size = raster.byte_len();
        if let Some(entry) = inner.entries.get_mut(key)
            && Arc::ptr_eq(&entry.slot, &slot)
        {
            entry.bytes = size;
            inner.bytes += size;
        }
        let evicted = inner.evict_to(self.max_bytes, key);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        Ok((raster, false))
    }

    /// Peek without populating or touching statistics.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Raster>> {
        let slot = lock(&self.inner).entries.get(key).map(|e| Arc::clone(&e.slot))?;
        let guard = lock(&slot);
        guard.clone()
    }

    /// Drop every entry belonging to `id`. Returns how many were removed.
    pub fn invalidate_layer(&self, id: &LayerId) -> usize {
        let mut inner = lock(&self.inner);
        let keys: Vec<CacheKey> = inner
            .entries
            .keys()
            .filter(|k| &k.layer_id == id)
            .cloned()
            .collect();
        keys.iter().filter(|k| inner.remove(k)).count()
    }

    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        *inner = Inner::default();
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let inner = lock(&self.inner);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            populations: self.populations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: inner.entries.len(),
            bytes: inner.bytes,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composite/cache.rs"]
mod tests;
