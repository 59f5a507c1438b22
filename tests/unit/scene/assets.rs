use super::*;
use crate::foundation::core::{Rect, Size};
use crate::scene::layer::Layer;

#[test]
fn prepare_shares_memory_rasters_and_records_missing() {
    let px = Arc::new(Raster::new(1, 1, vec![1, 2, 3, 255], false).unwrap());
    let with = Layer::new("with", "with", Rect::new(0.0, 0.0, 1.0, 1.0))
        .with_raster(RasterRef::Memory(Arc::clone(&px)));
    let without = Layer::new("without", "without", Rect::new(0.0, 0.0, 1.0, 1.0)).with_z_index(1);
    let broken = Layer::new("broken", "broken", Rect::new(0.0, 0.0, 1.0, 1.0))
        .with_z_index(2)
        .with_raster(RasterRef::File("/definitely/not/here.png".into()));
    let world = World::new(Size::new(10.0, 10.0), vec![with, without, broken]).unwrap();

    let store = RasterStore::prepare(&world);
    assert_eq!(store.len(), 1);
    assert!(Arc::ptr_eq(store.get(&LayerId::new("with")).unwrap(), &px));
    assert_eq!(
        store.missing(),
        &[LayerId::new("without"), LayerId::new("broken")]
    );
}

#[test]
fn insert_clears_missing_entry() {
    let mut store = RasterStore::new();
    store.missing.push(LayerId::new("a"));
    store.insert(LayerId::new("a"), Arc::new(Raster::transparent(1, 1)));
    assert!(store.missing().is_empty());
    assert!(store.get(&LayerId::new("a")).is_some());
}
