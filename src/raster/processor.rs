use crate::foundation::core::{Affine, Point, Rect, Rgba8Premul, Vec2};
use crate::foundation::error::LayercastResult;
use crate::raster::buffer::{AlphaMask, Raster};

/// Raster result of a motion blur; `pad` pixels were added on every side.
#[derive(Clone, Debug)]
pub struct Padded {
    pub raster: Raster,
    pub pad: u32,
}

/// Stroke or fill for the shape primitives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeStyle {
    Fill,
    Stroke { width: f64 },
}

/// Pixel operations the compositor depends on.
///
/// Implementations must be deterministic for identical inputs so that strategies stay
/// interchangeable. Every raster crossing this boundary is premultiplied, except the input of
/// [`ImageProcessor::premultiply`].
pub trait ImageProcessor: Send + Sync {
    /// Stable name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// New premultiplied canvas filled with `fill`.
    fn new_canvas(&self, width: u32, height: u32, fill: Rgba8Premul) -> Raster;

    /// Bring a layer raster into premultiplied compositing space.
    fn premultiply(&self, src: &Raster) -> Raster;

    /// Multiply every pixel by `opacity`.
    fn apply_opacity(&self, img: &mut Raster, opacity: f32);

    /// Multiply every pixel by the matching mask weight.
    fn apply_mask(&self, img: &mut Raster, mask: &AlphaMask) -> LayercastResult<()>;

    /// Gaussian blur with standard deviation `sigma` (pixels).
    fn gaussian_blur(&self, img: &Raster, sigma: f32) -> LayercastResult<Raster>;

    /// Directional blur along `velocity` (pixels per frame).
    fn motion_blur(&self, img: &Raster, velocity: Vec2) -> LayercastResult<Padded>;

    /// Draw a circle centred at `center`.
    fn draw_ellipse(
        &self,
        img: &mut Raster,
        center: Point,
        radius: f64,
        color: Rgba8Premul,
        style: ShapeStyle,
    );

    /// Draw an axis-aligned rectangle.
    fn draw_rect(&self, img: &mut Raster, rect: Rect, color: Rgba8Premul, style: ShapeStyle);

    /// Source-over `src` onto `dst` through `placement` (src pixel space to dst pixel space).
    ///
    /// Destination pixel centres are mapped through the inverse placement and sampled
    /// nearest-neighbour, so integer translations are exact.
    fn blend(&self, dst: &mut Raster, src: &Raster, placement: Affine, opacity: f32)
    -> LayercastResult<()>;
}
