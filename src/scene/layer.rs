use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::foundation::core::{Point, Rect, Size};
use crate::raster::buffer::Raster;

/// Stable layer identifier, unique within a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed vocabulary of layer animations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Fly in from off-canvas along a curved path.
    DragDrop,
    /// Revealed in place by a simulated brush stroke.
    BrushReveal,
    /// Full-canvas fade-in.
    Background,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DragDrop => "drag_drop",
            Self::BrushReveal => "brush_reveal",
            Self::Background => "background",
        }
    }
}

/// Optional per-layer effects.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayerEffects {
    /// Gaussian blur standard deviation in pixels.
    pub gaussian_blur: Option<f32>,
    /// Streak the layer along its velocity while it moves.
    pub motion_blur: bool,
}

/// Where a layer's pixels come from.
#[derive(Clone, Debug)]
pub enum RasterRef {
    /// Already decoded (straight alpha).
    Memory(Arc<Raster>),
    /// Decoded lazily from an image file.
    File(PathBuf),
}

/// One design element. Immutable once the document is loaded.
#[derive(Clone, Debug)]
pub struct Layer {
    pub id: LayerId,
    /// Display name as authored, hint prefix included.
    pub name: String,
    /// World-space bounds; `origin()` is the resting top-left corner.
    pub bounds: Rect,
    pub opacity: f64,
    pub visible: bool,
    /// Back-to-front order; lower draws first.
    pub z_index: u32,
    /// Slash-separated group path, `None` at the document root.
    pub group: Option<String>,
    /// Group containers carry no pixels and never animate.
    pub is_group: bool,
    /// Document-supplied action, consulted after naming prefixes.
    pub action_hint: Option<ActionType>,
    pub effects: LayerEffects,
    pub raster: Option<RasterRef>,
}

impl Layer {
    pub fn new(id: impl Into<String>, name: impl Into<String>, bounds: Rect) -> Self {
        Self {
            id: LayerId::new(id),
            name: name.into(),
            bounds,
            opacity: 1.0,
            visible: true,
            z_index: 0,
            group: None,
            is_group: false,
            action_hint: None,
            effects: LayerEffects::default(),
            raster: None,
        }
    }

    pub fn with_raster(mut self, raster: RasterRef) -> Self {
        self.raster = Some(raster);
        self
    }

    pub fn with_z_index(mut self, z: u32) -> Self {
        self.z_index = z;
        self
    }

    pub fn with_effects(mut self, effects: LayerEffects) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn position(&self) -> Point {
        self.bounds.origin()
    }

    pub fn size(&self) -> Size {
        self.bounds.size()
    }

    pub fn short_edge(&self) -> f64 {
        self.bounds.width().min(self.bounds.height())
    }

    /// Participates in planning: visible, not a group container.
    pub fn is_animated(&self) -> bool {
        self.visible && !self.is_group
    }

    /// Display name with a leading `[..]` hint prefix removed.
    pub fn clean_name(&self) -> &str {
        let name = self.name.trim_start();
        if let Some(rest) = name.strip_prefix('[')
            && let Some(close) = rest.find(']')
        {
            return rest[close + 1..].trim_start();
        }
        name
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/layer.rs"]
mod tests;
