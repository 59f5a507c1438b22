use std::sync::Barrier;
use std::sync::atomic::AtomicUsize;

use super::*;
use crate::foundation::core::{Point, Rect, Vec2};
use crate::foundation::error::LayercastError;

fn key(id: &str, n: u64) -> CacheKey {
    CacheKey {
        layer_id: LayerId::new(id),
        fingerprint: Fingerprint { hi: 0, lo: n },
    }
}

fn raster(px: u32) -> Raster {
    Raster::transparent(px, 1)
}

#[test]
fn second_request_is_a_hit() {
    let cache = LayerCache::new(1 << 20);
    let k = key("a", 1);
    let (first, hit) = cache.get_or_populate(&k, || Ok(raster(4))).unwrap();
    assert!(!hit);
    let (second, hit) = cache
        .get_or_populate(&k, || panic!("must not populate twice"))
        .unwrap();
    assert!(hit);
    assert!(Arc::ptr_eq(&first, &second));
    let s = cache.stats();
    assert_eq!((s.hits, s.misses, s.populations), (1, 1, 1));
    assert_eq!(s.bytes, 16);
}

#[test]
fn failed_population_leaves_no_entry() {
    let cache = LayerCache::new(1 << 20);
    let k = key("a", 1);
    let err = cache
        .get_or_populate(&k, || Err(LayercastError::validation("boom")))
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert_eq!(cache.stats().entries, 0);
    assert!(cache.get(&k).is_none());
    assert!(!cache.get_or_populate(&k, || Ok(raster(1))).unwrap().1);
}

#[test]
fn least_recently_used_is_evicted_first() {
    // Each raster is 40 bytes; room for two.
    let cache = LayerCache::new(80);
    let (a, b, c) = (key("a", 1), key("b", 1), key("c", 1));
    cache.get_or_populate(&a, || Ok(raster(10))).unwrap();
    cache.get_or_populate(&b, || Ok(raster(10))).unwrap();
    // Touch `a` so `b` becomes the oldest.
    assert!(cache.get_or_populate(&a, || Ok(raster(10))).unwrap().1);
    cache.get_or_populate(&c, || Ok(raster(10))).unwrap();

    assert!(cache.get(&a).is_some());
    assert!(cache.get(&b).is_none());
    assert!(cache.get(&c).is_some());
    let s = cache.stats();
    assert_eq!(s.evictions, 1);
    assert_eq!(s.bytes, 80);
}

#[test]
fn hits_refresh_recency_among_many_entries() {
    // Room for four 40-byte rasters.
    let cache = LayerCache::new(160);
    let keys: Vec<CacheKey> = (0..6).map(|n| key("layer", n)).collect();
    for k in &keys[..4] {
        cache.get_or_populate(k, || Ok(raster(10))).unwrap();
    }
    for _ in 0..3 {
        assert!(cache.get_or_populate(&keys[0], || Ok(raster(10))).unwrap().1);
        assert!(cache.get_or_populate(&keys[1], || Ok(raster(10))).unwrap().1);
    }
    cache.get_or_populate(&keys[4], || Ok(raster(10))).unwrap();
    cache.get_or_populate(&keys[5], || Ok(raster(10))).unwrap();

    let resident: Vec<bool> = keys.iter().map(|k| cache.get(k).is_some()).collect();
    assert_eq!(resident, vec![true, true, false, false, true, true]);
    let s = cache.stats();
    assert_eq!((s.evictions, s.entries, s.bytes), (2, 4, 160));
}

#[test]
fn oversized_entry_is_still_returned() {
    let cache = LayerCache::new(8);
    let (r, hit) = cache.get_or_populate(&key("a", 1), || Ok(raster(100))).unwrap();
    assert!(!hit);
    assert_eq!(r.width, 100);
}

#[test]
fn invalidation_is_per_layer() {
    let cache = LayerCache::new(1 << 20);
    cache.get_or_populate(&key("a", 1), || Ok(raster(1))).unwrap();
    cache.get_or_populate(&key("a", 2), || Ok(raster(1))).unwrap();
    cache.get_or_populate(&key("b", 1), || Ok(raster(1))).unwrap();
    assert_eq!(cache.invalidate_layer(&LayerId::new("a")), 2);
    let s = cache.stats();
    assert_eq!(s.entries, 1);
    assert_eq!(s.bytes, 4);
    cache.clear();
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn concurrent_requests_populate_once() {
    let cache = Arc::new(LayerCache::new(1 << 20));
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (cache, calls, barrier) = (cache.clone(), calls.clone(), barrier.clone());
            std::thread::spawn(move || {
                barrier.wait();
                cache
                    .get_or_populate(&key("shared", 7), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok(raster(8))
                    })
                    .unwrap()
                    .0
            })
        })
        .collect();
    let rasters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(rasters.iter().all(|r| Arc::ptr_eq(r, &rasters[0])));
    assert_eq!(cache.stats().hits, 7);
}

#[test]
fn only_settled_opaque_states_are_cacheable() {
    let layer = Layer::new("l", "l", Rect::new(0.0, 0.0, 10.0, 10.0));
    let mut state = LayerAnimState::at_rest(&layer);
    let k1 = CacheKey::for_state(&layer, &state).unwrap();
    assert_eq!(CacheKey::for_state(&layer, &state), Some(k1.clone()));

    state.position = Point::new(1.0, 0.0);
    assert_ne!(CacheKey::for_state(&layer, &state), Some(k1));

    state.opacity = 0.5;
    assert!(CacheKey::for_state(&layer, &state).is_none());
    state.opacity = 1.0;
    state.velocity = Vec2::new(3.0, 0.0);
    assert!(CacheKey::for_state(&layer, &state).is_none());
    state.velocity = Vec2::ZERO;
    state.phase = crate::animation::state::ActionPhase::Active;
    assert!(CacheKey::for_state(&layer, &state).is_none());
}
