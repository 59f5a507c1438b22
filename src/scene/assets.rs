use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::raster::buffer::Raster;
use crate::scene::layer::{LayerId, RasterRef};
use crate::scene::world::World;

/// Decoded layer rasters, keyed by layer id.
///
/// All file IO happens in [`RasterStore::prepare`], before the render loop starts. Layers whose
/// image cannot be decoded are recorded in `missing()` and left out; the compositor then skips
/// them with a warning.
#[derive(Clone, Debug, Default)]
pub struct RasterStore {
    rasters: HashMap<LayerId, Arc<Raster>>,
    missing: Vec<LayerId>,
}

impl RasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip_all, fields(layers = world.scene().len()))]
    pub fn prepare(world: &World) -> Self {
        let loaded: Vec<(LayerId, Option<Arc<Raster>>)> = world
            .scene()
            .layers()
            .par_iter()
            .filter(|l| !l.is_group)
            .map(|l| {
                let raster = match &l.raster {
                    Some(RasterRef::Memory(r)) => Some(Arc::clone(r)),
                    Some(RasterRef::File(path)) => match image::open(path) {
                        Ok(img) => Some(Arc::new(Raster::from_straight_image(img.to_rgba8()))),
                        Err(e) => {
                            tracing::warn!(
                                layer = %l.id,
                                path = %path.display(),
                                error = %e,
                                "layer image failed to decode"
                            );
                            None
                        }
                    },
                    None => None,
                };
                (l.id.clone(), raster)
            })
            .collect();

        let mut store = Self::new();
        for (id, raster) in loaded {
            match raster {
                Some(r) => {
                    store.rasters.insert(id, r);
                }
                None => store.missing.push(id),
            }
        }
        store
    }

    pub fn insert(&mut self, id: LayerId, raster: Arc<Raster>) {
        self.missing.retain(|m| m != &id);
        self.rasters.insert(id, raster);
    }

    pub fn get(&self, id: &LayerId) -> Option<&Arc<Raster>> {
        self.rasters.get(id)
    }

    /// Layers without pixels, in scene order.
    pub fn missing(&self) -> &[LayerId] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/assets.rs"]
mod tests;
