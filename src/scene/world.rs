use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::{Point, Rect, Size};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::scene::layer::{ActionType, Layer, LayerEffects, LayerId, RasterRef};

/// Ordered layer list, back to front.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    layers: Vec<Layer>,
    index: HashMap<LayerId, usize>,
}

impl Scene {
    /// Sort by `z_index` (stable) and reject duplicate ids.
    pub fn new(mut layers: Vec<Layer>) -> LayercastResult<Self> {
        layers.sort_by_key(|l| l.z_index);
        let mut index = HashMap::with_capacity(layers.len());
        for (i, l) in layers.iter().enumerate() {
            if index.insert(l.id.clone(), i).is_some() {
                return Err(LayercastError::validation(format!(
                    "duplicate layer id '{}'",
                    l.id
                )));
            }
        }
        Ok(Self { layers, index })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.index.get(id).map(|&i| &self.layers[i])
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Document-space canvas and its layers. Immutable once built.
#[derive(Clone, Debug)]
pub struct World {
    size: Size,
    scene: Scene,
}

impl World {
    pub fn new(size: Size, layers: Vec<Layer>) -> LayercastResult<Self> {
        if !(size.width.is_finite() && size.height.is_finite())
            || size.width <= 0.0
            || size.height <= 0.0
        {
            return Err(LayercastError::validation("world size must be positive"));
        }
        Ok(Self {
            size,
            scene: Scene::new(layers)?,
        })
    }

    pub fn from_document(doc: Document) -> LayercastResult<Self> {
        Self::new(doc.size, doc.layers)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Rect {
        self.size.to_rect()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

/// Output of a document loader: canvas size plus flattened layer list.
#[derive(Clone, Debug)]
pub struct Document {
    pub size: Size,
    pub layers: Vec<Layer>,
}

/// Port for anything that can turn a file into a [`Document`].
pub trait DocumentSource {
    fn load(&self, path: &Path) -> LayercastResult<Document>;
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    width: f64,
    height: f64,
    #[serde(default)]
    layers: Vec<ManifestLayer>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestLayer {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default = "default_opacity")]
    opacity: f64,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    image: Option<PathBuf>,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    action: Option<ActionType>,
    #[serde(default)]
    effects: LayerEffects,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

/// Loads a JSON manifest of pre-exported layer PNGs.
///
/// ```json
/// { "width": 1920, "height": 1080,
///   "layers": [{ "name": "[BG] sky", "image": "sky.png" }] }
/// ```
///
/// Image paths are relative to the manifest. When a layer omits its size, the image header
/// is read (pixels are decoded later by `RasterStore`). Array order is back to front.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifestDocumentSource;

impl ManifestDocumentSource {
    pub fn parse(json: &str, base_dir: &Path) -> LayercastResult<Document> {
        let manifest: Manifest = serde_json::from_str(json)?;
        let size = Size::new(manifest.width, manifest.height);

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for (i, ml) in manifest.layers.into_iter().enumerate() {
            let image = ml.image.map(|p| base_dir.join(p));
            let (w, h) = match (ml.width, ml.height, image.as_deref()) {
                (Some(w), Some(h), _) => (w, h),
                (w, h, Some(path)) => match image::image_dimensions(path) {
                    Ok((iw, ih)) => (w.unwrap_or(f64::from(iw)), h.unwrap_or(f64::from(ih))),
                    Err(e) => {
                        tracing::warn!(
                            layer = %ml.name,
                            path = %path.display(),
                            error = %e,
                            "cannot read layer image size"
                        );
                        (w.unwrap_or(0.0), h.unwrap_or(0.0))
                    }
                },
                (w, h, None) => (w.unwrap_or(0.0), h.unwrap_or(0.0)),
            };

            let origin = Point::new(ml.x, ml.y);
            let mut layer = Layer::new(
                ml.id.unwrap_or_else(|| format!("layer-{i}")),
                ml.name,
                Rect::from_origin_size(origin, Size::new(w, h)),
            )
            .with_z_index(i as u32)
            .with_opacity(ml.opacity.clamp(0.0, 1.0))
            .with_effects(ml.effects);
            layer.visible = ml.visible;
            layer.group = ml.group;
            layer.is_group = ml.is_group;
            layer.action_hint = ml.action;
            layer.raster = image.map(RasterRef::File);
            layers.push(layer);
        }

        Ok(Document { size, layers })
    }
}

impl DocumentSource for ManifestDocumentSource {
    fn load(&self, path: &Path) -> LayercastResult<Document> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest '{}'", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&json, base)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/world.rs"]
mod tests;
