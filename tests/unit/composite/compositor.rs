use super::*;
use crate::animation::state::{ActionPhase, BrushStroke};
use crate::animation::timeline::BrushPath;
use crate::foundation::core::{Point, Rect, Size};
use crate::raster::buffer::AlphaMask;
use crate::raster::cpu::CpuImageProcessor;
use crate::raster::processor::Padded;
use crate::scene::layer::RasterRef;

fn straight(w: u32, h: u32, px: [u8; 4]) -> Arc<Raster> {
    Arc::new(Raster::new(w, h, px.repeat((w * h) as usize), false).unwrap())
}

fn layer(id: &str, x: f64, y: f64, raster: Option<Arc<Raster>>) -> Layer {
    let l = Layer::new(id, id, Rect::new(x, y, x + 4.0, y + 4.0));
    match raster {
        Some(r) => l.with_raster(RasterRef::Memory(r)),
        None => l,
    }
}

fn compositor(layers: Vec<Layer>, opts: CompositorOptions) -> FrameCompositor {
    compositor_on(layers, opts, Arc::new(CpuImageProcessor::new()))
}

fn compositor_on(
    layers: Vec<Layer>,
    opts: CompositorOptions,
    processor: Arc<dyn ImageProcessor>,
) -> FrameCompositor {
    let world = Arc::new(World::new(Size::new(10.0, 10.0), layers).unwrap());
    let rasters = Arc::new(RasterStore::prepare(&world));
    FrameCompositor::new(
        world,
        rasters,
        Viewport::new(10, 10),
        processor,
        opts,
        Fps::new(30, 1).unwrap(),
    )
    .unwrap()
}

/// CPU processor whose blend always fails with the configured error.
struct BrokenBlend(fn() -> LayercastError);

impl ImageProcessor for BrokenBlend {
    fn name(&self) -> &'static str {
        "broken-blend"
    }

    fn new_canvas(&self, width: u32, height: u32, fill: Rgba8Premul) -> Raster {
        CpuImageProcessor::new().new_canvas(width, height, fill)
    }

    fn premultiply(&self, src: &Raster) -> Raster {
        CpuImageProcessor::new().premultiply(src)
    }

    fn apply_opacity(&self, img: &mut Raster, opacity: f32) {
        CpuImageProcessor::new().apply_opacity(img, opacity)
    }

    fn apply_mask(&self, img: &mut Raster, mask: &AlphaMask) -> LayercastResult<()> {
        CpuImageProcessor::new().apply_mask(img, mask)
    }

    fn gaussian_blur(&self, img: &Raster, sigma: f32) -> LayercastResult<Raster> {
        CpuImageProcessor::new().gaussian_blur(img, sigma)
    }

    fn motion_blur(&self, img: &Raster, velocity: Vec2) -> LayercastResult<Padded> {
        CpuImageProcessor::new().motion_blur(img, velocity)
    }

    fn draw_ellipse(
        &self,
        img: &mut Raster,
        center: Point,
        radius: f64,
        color: Rgba8Premul,
        style: ShapeStyle,
    ) {
        CpuImageProcessor::new().draw_ellipse(img, center, radius, color, style)
    }

    fn draw_rect(&self, img: &mut Raster, rect: Rect, color: Rgba8Premul, style: ShapeStyle) {
        CpuImageProcessor::new().draw_rect(img, rect, color, style)
    }

    fn blend(&self, _: &mut Raster, _: &Raster, _: Affine, _: f32) -> LayercastResult<()> {
        Err((self.0)())
    }
}

fn camera() -> Camera {
    Camera::centered_on(Size::new(10.0, 10.0))
}

fn rest(c: &FrameCompositor) -> Vec<LayerAnimState> {
    c.world
        .scene()
        .layers()
        .iter()
        .map(LayerAnimState::at_rest)
        .collect()
}

#[test]
fn fresh_canvas_is_fully_transparent() {
    let c = compositor(Vec::new(), CompositorOptions::default());
    let canvas = c.new_canvas();
    assert!(canvas.data.iter().all(|&b| b == 0));
    let frame = c.compose(&[], &camera()).unwrap();
    assert!(frame.image.is_fully_transparent());
}

#[test]
fn white_layer_stays_visible_on_the_transparent_canvas() {
    let white = layer("w", 2.0, 2.0, Some(straight(4, 4, [255, 255, 255, 255])));
    let c = compositor(vec![white], CompositorOptions::default());
    let frame = c.compose(&rest(&c), &camera()).unwrap();
    assert_eq!(frame.image.pixel(3, 3), [255, 255, 255, 255]);
    assert_eq!(frame.image.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(frame.image.pixel(6, 6), [0, 0, 0, 0]);
    assert_eq!(frame.diagnostics.composited, 1);
}

#[test]
fn later_layers_draw_on_top() {
    let red = layer("red", 0.0, 0.0, Some(straight(4, 4, [255, 0, 0, 255])));
    let blue = layer("blue", 2.0, 2.0, Some(straight(4, 4, [0, 0, 255, 255]))).with_z_index(1);
    let c = compositor(vec![red, blue], CompositorOptions::default());
    let frame = c.compose(&rest(&c), &camera()).unwrap();
    assert_eq!(frame.image.pixel(1, 1), [255, 0, 0, 255]);
    assert_eq!(frame.image.pixel(3, 3), [0, 0, 255, 255]);
}

#[test]
fn missing_raster_is_skipped_with_diagnostics() {
    let ok = layer("ok", 0.0, 0.0, Some(straight(4, 4, [0, 255, 0, 255])));
    let gone = layer("gone", 5.0, 5.0, None).with_z_index(1);
    let c = compositor(vec![ok, gone], CompositorOptions::default());
    let frame = c.compose(&rest(&c), &camera()).unwrap();
    assert_eq!(frame.diagnostics.missing_assets, vec![LayerId::new("gone")]);
    assert_eq!(frame.diagnostics.composited, 1);
    assert_eq!(frame.image.pixel(1, 1), [0, 255, 0, 255]);
    assert_eq!(frame.image.pixel(6, 6), [0, 0, 0, 0]);
}

#[test]
fn opacity_scales_alpha() {
    let l = layer("l", 0.0, 0.0, Some(straight(4, 4, [255, 255, 255, 255])));
    let c = compositor(vec![l], CompositorOptions::default());
    let mut states = rest(&c);
    states[0].opacity = 0.5;
    let frame = c.compose(&states, &camera()).unwrap();
    let a = frame.image.pixel(1, 1)[3];
    assert!((126..=129).contains(&a), "alpha {a}");
}

#[test]
fn invisible_and_unrevealed_layers_are_skipped() {
    let l = layer("l", 0.0, 0.0, Some(straight(4, 4, [255, 255, 255, 255])));
    let c = compositor(vec![l], CompositorOptions::default());
    let mut states = rest(&c);
    states[0].visible = false;
    let frame = c.compose(&states, &camera()).unwrap();
    assert_eq!(frame.diagnostics.skipped, 1);
    assert!(frame.image.is_fully_transparent());

    states[0].visible = true;
    states[0].reveal_progress = 0.0;
    let frame = c.compose(&states, &camera()).unwrap();
    assert!(frame.image.is_fully_transparent());
}

#[test]
fn settled_layers_come_from_the_cache() {
    let l = layer("l", 0.0, 0.0, Some(straight(4, 4, [9, 9, 9, 255])));
    let cache = Arc::new(LayerCache::default());
    let c = compositor(vec![l], CompositorOptions::default()).with_cache(cache.clone());
    let states = rest(&c);
    let first = c.compose(&states, &camera()).unwrap();
    let second = c.compose(&states, &camera()).unwrap();
    assert_eq!(first.diagnostics.cached, 0);
    assert_eq!(second.diagnostics.cached, 1);
    assert_eq!(first.image, second.image);
    assert_eq!(cache.stats().populations, 1);
}

#[test]
fn cached_and_uncached_frames_match() {
    let l = layer("l", 1.0, 3.0, Some(straight(4, 4, [40, 80, 120, 200])));
    let plain = compositor(vec![l.clone()], CompositorOptions::default());
    let cached = compositor(vec![l], CompositorOptions::default())
        .with_cache(Arc::new(LayerCache::default()));
    let states = rest(&plain);
    let a = plain.compose(&states, &camera()).unwrap();
    cached.compose(&states, &camera()).unwrap();
    let b = cached.compose(&states, &camera()).unwrap();
    assert_eq!(a.image, b.image);
}

#[test]
fn camera_pan_moves_the_layer() {
    let l = layer("l", 0.0, 0.0, Some(straight(4, 4, [255, 0, 0, 255])));
    let c = compositor(vec![l], CompositorOptions::default());
    let panned = camera().pan_by(Vec2::new(-2.0, 0.0));
    let frame = c.compose(&rest(&c), &panned).unwrap();
    assert_eq!(frame.image.pixel(1, 1), [0, 0, 0, 0]);
    assert_eq!(frame.image.pixel(5, 1), [255, 0, 0, 255]);
}

#[test]
fn brush_cursor_ring_is_drawn_while_revealing() {
    let l = layer("l", 0.0, 0.0, Some(straight(4, 4, [0, 0, 0, 255])));
    let mut states = vec![LayerAnimState {
        layer_id: LayerId::new("l"),
        position: Point::ZERO,
        opacity: 1.0,
        reveal_progress: 0.5,
        visible: true,
        velocity: Vec2::ZERO,
        brush: Some(BrushStroke {
            path: BrushPath::Straight,
            radius: 2.0,
            cursor: Point::new(7.0, 7.0),
        }),
        phase: ActionPhase::Active,
    }];
    let with_ring = compositor(vec![l.clone()], CompositorOptions::default());
    let without = compositor(
        vec![l],
        CompositorOptions {
            draw_brush_cursor: false,
            ..CompositorOptions::default()
        },
    );
    let a = with_ring.compose(&states, &camera()).unwrap();
    let b = without.compose(&states, &camera()).unwrap();
    assert_ne!(a.image, b.image);

    states[0].reveal_progress = 1.0;
    states[0].phase = ActionPhase::Settled;
    let a = with_ring.compose(&states, &camera()).unwrap();
    let b = without.compose(&states, &camera()).unwrap();
    assert_eq!(a.image, b.image);
}

#[test]
fn compose_is_reproducible() {
    let l = layer("l", 0.5, 1.5, Some(straight(4, 4, [200, 100, 50, 180])));
    let c = compositor(vec![l], CompositorOptions::default());
    let mut states = rest(&c);
    states[0].opacity = 0.7;
    let a = c.compose(&states, &camera()).unwrap();
    let b = c.compose(&states, &camera()).unwrap();
    assert_eq!(a.image.data, b.image.data);
}

#[test]
fn backend_timeout_fails_the_frame() {
    let card = layer("card", 2.0, 2.0, Some(straight(4, 4, [255, 255, 255, 255])));
    let c = compositor_on(
        vec![card],
        CompositorOptions::default(),
        Arc::new(BrokenBlend(|| LayercastError::timeout("blend stalled"))),
    );
    let err = c.compose(&rest(&c), &camera()).unwrap_err();
    assert_eq!(err.kind(), "timeout");
}

#[test]
fn lost_gpu_fails_the_frame() {
    let card = layer("card", 2.0, 2.0, Some(straight(4, 4, [255, 255, 255, 255])));
    let c = compositor_on(
        vec![card],
        CompositorOptions::default(),
        Arc::new(BrokenBlend(|| LayercastError::gpu_unavailable("device lost"))),
    );
    let err = c.compose(&rest(&c), &camera()).unwrap_err();
    assert_eq!(err.kind(), "gpu_unavailable");
}

#[test]
fn layer_level_error_only_drops_that_layer() {
    let card = layer("card", 2.0, 2.0, Some(straight(4, 4, [255, 255, 255, 255])));
    let c = compositor_on(
        vec![card],
        CompositorOptions::default(),
        Arc::new(BrokenBlend(|| LayercastError::validation("bad placement"))),
    );
    let frame = c.compose(&rest(&c), &camera()).unwrap();
    assert_eq!(frame.diagnostics.failed, vec![LayerId::new("card")]);
    assert!(frame.image.is_fully_transparent());
}
