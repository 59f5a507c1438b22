use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::foundation::core::{Affine, FrameIndex, Rgba8Premul, Vec2};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::buffer::Raster;
use crate::raster::processor::ImageProcessor;
use crate::scene::camera::Viewport;

/// Where the UI chrome goes relative to the rendered content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OverlayPlacement {
    /// Chrome is blended on top of the content; both share one size.
    Over,
    /// Output is the chrome's size and the content sits inside it at this offset.
    Around { content_x: u32, content_y: u32 },
}

/// Source of the editor chrome composited with every frame.
///
/// The chrome must keep the same size for the whole render.
pub trait UiOverlay: Send + Sync {
    fn chrome(&self, frame: FrameIndex) -> Arc<Raster>;

    fn placement(&self) -> OverlayPlacement;
}

/// One image used for every frame.
#[derive(Clone, Debug)]
pub struct StaticOverlay {
    chrome: Arc<Raster>,
    placement: OverlayPlacement,
}

impl StaticOverlay {
    pub fn new(chrome: Raster, placement: OverlayPlacement) -> Self {
        Self {
            chrome: Arc::new(chrome),
            placement,
        }
    }

    pub fn from_path(path: &Path, placement: OverlayPlacement) -> LayercastResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("decode overlay image '{}'", path.display()))?;
        Ok(Self::new(Raster::from_straight_image(img.to_rgba8()), placement))
    }
}

impl UiOverlay for StaticOverlay {
    fn chrome(&self, _frame: FrameIndex) -> Arc<Raster> {
        Arc::clone(&self.chrome)
    }

    fn placement(&self) -> OverlayPlacement {
        self.placement
    }
}

/// Final frame size once the overlay is applied.
pub fn output_size(
    content: Viewport,
    overlay: Option<&dyn UiOverlay>,
) -> LayercastResult<Viewport> {
    let Some(overlay) = overlay else {
        return Ok(content);
    };
    match overlay.placement() {
        OverlayPlacement::Over => Ok(content),
        OverlayPlacement::Around {
            content_x,
            content_y,
        } => {
            let chrome = overlay.chrome(FrameIndex(0));
            let fits_x = u64::from(content_x) + u64::from(content.width) <= u64::from(chrome.width);
            let fits_y =
                u64::from(content_y) + u64::from(content.height) <= u64::from(chrome.height);
            if !(fits_x && fits_y) {
                return Err(LayercastError::validation(format!(
                    "content {}x{} at ({content_x}, {content_y}) does not fit in {}x{} chrome",
                    content.width, content.height, chrome.width, chrome.height
                )));
            }
            Ok(Viewport::new(chrome.width, chrome.height))
        }
    }
}

/// Combine a rendered frame with the overlay's chrome for `frame`.
pub fn apply_overlay(
    processor: &dyn ImageProcessor,
    content: Raster,
    overlay: &dyn UiOverlay,
    frame: FrameIndex,
) -> LayercastResult<Raster> {
    let chrome = overlay.chrome(frame);
    let chrome = if chrome.premultiplied {
        chrome
    } else {
        Arc::new(processor.premultiply(&chrome))
    };
    match overlay.placement() {
        OverlayPlacement::Over => {
            if (chrome.width, chrome.height) != (content.width, content.height) {
                return Err(LayercastError::validation(format!(
                    "overlay chrome {}x{} does not match frame {}x{}",
                    chrome.width, chrome.height, content.width, content.height
                )));
            }
            let mut out = content;
            processor.blend(&mut out, &chrome, Affine::IDENTITY, 1.0)?;
            Ok(out)
        }
        OverlayPlacement::Around {
            content_x,
            content_y,
        } => {
            let mut out =
                processor.new_canvas(chrome.width, chrome.height, Rgba8Premul::transparent());
            processor.blend(&mut out, &chrome, Affine::IDENTITY, 1.0)?;
            let offset = Vec2::new(f64::from(content_x), f64::from(content_y));
            processor.blend(&mut out, &content, Affine::translate(offset), 1.0)?;
            Ok(out)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composite/overlay.rs"]
mod tests;
