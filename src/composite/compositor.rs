use std::sync::Arc;

use crate::animation::state::{FrameStates, LayerAnimState};
use crate::composite::cache::{CacheKey, LayerCache};
use crate::foundation::core::{Affine, Fps, Rgba8Premul, Vec2};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::buffer::Raster;
use crate::raster::processor::{ImageProcessor, ShapeStyle};
use crate::reveal::mask::{RevealConfig, RevealMask, RevealParams, mask_for};
use crate::scene::assets::RasterStore;
use crate::scene::camera::{Camera, ViewTransform, Viewport};
use crate::scene::layer::{Layer, LayerId};
use crate::scene::world::World;

/// Velocities below this many raster pixels per frame are not streaked.
const MIN_MOTION_BLUR_PX: f64 = 0.5;

/// Overlays drawn on top of the layers.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositorOptions {
    /// Ring at the brush cursor while a reveal is being painted.
    pub draw_brush_cursor: bool,
    /// Premultiplied ring colour.
    pub cursor_color: Rgba8Premul,
    /// Ring stroke width in output pixels.
    pub cursor_stroke_px: f64,
    /// Outline every animating layer, like an editor's selection box.
    pub draw_selection_guides: bool,
    pub guide_color: Rgba8Premul,
    pub reveal: RevealConfig,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            draw_brush_cursor: true,
            cursor_color: Rgba8Premul::from_straight_rgba(255, 255, 255, 220),
            cursor_stroke_px: 3.0,
            draw_selection_guides: false,
            guide_color: Rgba8Premul::from_straight_rgba(0, 153, 255, 255),
            reveal: RevealConfig::default(),
        }
    }
}

impl CompositorOptions {
    pub fn validate(&self) -> LayercastResult<()> {
        if !self.cursor_stroke_px.is_finite() || self.cursor_stroke_px < 0.0 {
            return Err(LayercastError::validation(
                "cursor_stroke_px must be finite and >= 0",
            ));
        }
        self.reveal.validate()
    }
}

/// Per-frame bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FrameDiagnostics {
    /// Layers drawn onto the canvas.
    pub composited: u32,
    /// Of those, layers whose prepared raster came from the cache.
    pub cached: u32,
    /// Layers not drawn at all: hidden, transparent or not yet revealed.
    pub skipped: u32,
    pub missing_assets: Vec<LayerId>,
    /// Layers dropped because one of their passes failed.
    pub failed: Vec<LayerId>,
}

/// One composited frame. Premultiplied RGBA8 at the viewport size.
#[derive(Clone, Debug)]
pub struct CompositeFrame {
    pub image: Raster,
    pub diagnostics: FrameDiagnostics,
}

/// Merges layer rasters and their animation states into frames.
///
/// Per layer, back to front: opacity, reveal mask, gaussian blur, motion blur, then a
/// source-over blend through the camera transform. All pixel work goes through the injected
/// [`ImageProcessor`]. With a [`LayerCache`] attached, the prepared raster of a settled layer is
/// reused; the final blend still runs every frame.
pub struct FrameCompositor {
    world: Arc<World>,
    rasters: Arc<RasterStore>,
    viewport: Viewport,
    processor: Arc<dyn ImageProcessor>,
    opts: CompositorOptions,
    fps: Fps,
    cache: Option<Arc<LayerCache>>,
}

impl std::fmt::Debug for FrameCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCompositor")
            .field("viewport", &self.viewport)
            .field("processor", &self.processor.name())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl FrameCompositor {
    pub fn new(
        world: Arc<World>,
        rasters: Arc<RasterStore>,
        viewport: Viewport,
        processor: Arc<dyn ImageProcessor>,
        opts: CompositorOptions,
        fps: Fps,
    ) -> LayercastResult<Self> {
        viewport.validate()?;
        opts.validate()?;
        Ok(Self {
            world,
            rasters,
            viewport,
            processor,
            opts,
            fps,
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Arc<LayerCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn processor(&self) -> &dyn ImageProcessor {
        self.processor.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<LayerCache>> {
        self.cache.as_ref()
    }

    /// Fresh canvas: `(0, 0, 0, 0)` everywhere.
    pub fn new_canvas(&self) -> Raster {
        self.processor.new_canvas(
            self.viewport.width,
            self.viewport.height,
            Rgba8Premul::transparent(),
        )
    }

    pub fn compose_frame(&self, frame: &FrameStates) -> LayercastResult<CompositeFrame> {
        self.compose(&frame.layers, &frame.camera)
    }

    /// Composite `states` in slice order, back to front.
    ///
    /// Layer-level failures (bad mask, unusable raster) are logged and recorded in the
    /// diagnostics. A broken camera transform or a backend failure (see
    /// [`LayercastError::is_backend_failure`]) fails the frame.
    pub fn compose(
        &self,
        states: &[LayerAnimState],
        camera: &Camera,
    ) -> LayercastResult<CompositeFrame> {
        let view = ViewTransform::new(*camera, self.viewport, self.world.size())?;
        let mut canvas = self.new_canvas();
        let mut diag = FrameDiagnostics::default();

        for state in states {
            let Some(layer) = self.world.scene().get(&state.layer_id) else {
                tracing::warn!(layer = %state.layer_id, "state for unknown layer");
                diag.failed.push(state.layer_id.clone());
                continue;
            };
            if !state.visible || state.opacity <= 0.0 || state.reveal_progress <= 0.0 {
                diag.skipped += 1;
                continue;
            }
            let Some(source) = self.rasters.get(&layer.id) else {
                tracing::warn!(layer = %layer.id, "layer raster missing; skipped");
                diag.missing_assets.push(layer.id.clone());
                continue;
            };

            match self.draw_layer(&mut canvas, &view, layer, state, source) {
                Ok(Drawn::Composited { cached }) => {
                    diag.composited += 1;
                    if cached {
                        diag.cached += 1;
                    }
                }
                Ok(Drawn::Nothing) => diag.skipped += 1,
                Err(e) if e.is_backend_failure() => {
                    tracing::error!(layer = %layer.id, error = %e, "image backend failed");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(layer = %layer.id, error = %e, "layer dropped from frame");
                    diag.failed.push(layer.id.clone());
                }
            }
        }

        if self.opts.draw_selection_guides {
            self.draw_guides(&mut canvas, &view, states);
        }
        if self.opts.draw_brush_cursor {
            self.draw_cursors(&mut canvas, &view, states);
        }

        Ok(CompositeFrame {
            image: canvas,
            diagnostics: diag,
        })
    }

    fn draw_layer(
        &self,
        canvas: &mut Raster,
        view: &ViewTransform,
        layer: &Layer,
        state: &LayerAnimState,
        source: &Arc<Raster>,
    ) -> LayercastResult<Drawn> {
        if source.width == 0 || source.height == 0 {
            return Ok(Drawn::Nothing);
        }
        let key = self
            .cache
            .as_ref()
            .and_then(|c| CacheKey::for_state(layer, state).map(|k| (c, k)));

        let (prepared, cached) = match key {
            Some((cache, key)) => {
                let (raster, hit) =
                    cache.get_or_populate(&key, || self.prepare_layer(layer, state, source))?;
                (Some(Prepared { raster, pad: 0 }), hit)
            }
            None => (self.prepare_uncached(layer, state, source)?, false),
        };
        let Some(prepared) = prepared else {
            return Ok(Drawn::Nothing);
        };

        let size = layer.size();
        let sx = size.width / f64::from(source.width);
        let sy = size.height / f64::from(source.height);
        let pad = f64::from(prepared.pad);
        let placement = view.affine()
            * Affine::translate(state.position.to_vec2())
            * Affine::scale_non_uniform(sx, sy)
            * Affine::translate(Vec2::new(-pad, -pad));
        self.processor
            .blend(canvas, &prepared.raster, placement, 1.0)?;
        Ok(Drawn::Composited { cached })
    }

    /// Everything up to the blend. `None` when the reveal hides the whole layer.
    fn prepare_uncached(
        &self,
        layer: &Layer,
        state: &LayerAnimState,
        source: &Raster,
    ) -> LayercastResult<Option<Prepared>> {
        let Some(mut img) = self.masked(layer, state, source)? else {
            return Ok(None);
        };
        if let Some(sigma) = layer.effects.gaussian_blur
            && sigma > 0.0
        {
            img = self.processor.gaussian_blur(&img, sigma)?;
        }

        let mut pad = 0;
        if layer.effects.motion_blur {
            let v = self.raster_velocity(layer, state, source);
            if v.hypot() >= MIN_MOTION_BLUR_PX {
                let padded = self.processor.motion_blur(&img, v)?;
                img = padded.raster;
                pad = padded.pad;
            }
        }
        Ok(Some(Prepared {
            raster: Arc::new(img),
            pad,
        }))
    }

    /// Cache population path: only settled, opaque, still layers reach it, so no motion blur.
    fn prepare_layer(
        &self,
        layer: &Layer,
        state: &LayerAnimState,
        source: &Raster,
    ) -> LayercastResult<Raster> {
        let prepared = self
            .prepare_uncached(layer, state, source)?
            .ok_or_else(|| LayercastError::validation("settled layer has an empty reveal"))?;
        Ok(Arc::unwrap_or_clone(prepared.raster))
    }

    fn masked(
        &self,
        layer: &Layer,
        state: &LayerAnimState,
        source: &Raster,
    ) -> LayercastResult<Option<Raster>> {
        let mut img = self.processor.premultiply(source);
        let opacity = (state.opacity * layer.opacity).clamp(0.0, 1.0);
        self.processor.apply_opacity(&mut img, opacity as f32);

        if state.reveal_progress < 1.0
            && let Some(stroke) = &state.brush
        {
            // Brush radius is in layer units; masks work in raster pixels.
            let to_px = f64::from(source.width) / layer.size().width.max(f64::EPSILON);
            let mut params = RevealParams::for_stroke(stroke, self.opts.reveal.softness);
            params.radius *= to_px;
            match mask_for(img.width, img.height, state.reveal_progress, &params) {
                RevealMask::Hidden => return Ok(None),
                RevealMask::Full => {}
                RevealMask::Partial(mask) => self.processor.apply_mask(&mut img, &mask)?,
            }
        }
        Ok(Some(img))
    }

    /// Layer velocity converted to raster pixels per frame.
    fn raster_velocity(&self, layer: &Layer, state: &LayerAnimState, source: &Raster) -> Vec2 {
        let size = layer.size();
        if size.width <= 0.0 || size.height <= 0.0 {
            return Vec2::ZERO;
        }
        let per_frame = state.velocity * self.fps.frame_duration_secs();
        Vec2::new(
            per_frame.x * f64::from(source.width) / size.width,
            per_frame.y * f64::from(source.height) / size.height,
        )
    }

    fn draw_guides(&self, canvas: &mut Raster, view: &ViewTransform, states: &[LayerAnimState]) {
        for state in states.iter().filter(|s| !s.is_static() && s.visible) {
            let Some(layer) = self.world.scene().get(&state.layer_id) else {
                continue;
            };
            let world_rect = layer.bounds.with_origin(state.position);
            let rect = view.affine().transform_rect_bbox(world_rect);
            self.processor.draw_rect(
                canvas,
                rect,
                self.opts.guide_color,
                ShapeStyle::Stroke { width: 1.0 },
            );
        }
    }

    fn draw_cursors(&self, canvas: &mut Raster, view: &ViewTransform, states: &[LayerAnimState]) {
        for state in states.iter().filter(|s| s.is_revealing()) {
            let Some(stroke) = &state.brush else {
                continue;
            };
            self.processor.draw_ellipse(
                canvas,
                view.world_to_viewport(stroke.cursor),
                stroke.radius * view.mean_scale(),
                self.opts.cursor_color,
                ShapeStyle::Stroke {
                    width: self.opts.cursor_stroke_px,
                },
            );
        }
    }
}

struct Prepared {
    raster: Arc<Raster>,
    pad: u32,
}

enum Drawn {
    Composited { cached: bool },
    Nothing,
}

#[cfg(test)]
#[path = "../../tests/unit/composite/compositor.rs"]
mod tests;
