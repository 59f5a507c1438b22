use crate::foundation::core::{Affine, Point, Rect, Size, Vec2};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::foundation::math::lerp;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

/// Virtual viewpoint over the world: the world point at the viewport centre, plus zoom.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Camera {
    pub position: Point,
    pub zoom: f64,
}

impl Camera {
    /// Zoom is clamped to `[MIN_ZOOM, MAX_ZOOM]`; non-finite zoom becomes 1.
    pub fn new(position: Point, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        Self { position, zoom }
    }

    /// Camera showing the whole world at zoom 1.
    pub fn centered_on(world: Size) -> Self {
        Self::new(Point::new(world.width / 2.0, world.height / 2.0), 1.0)
    }

    pub fn pan_by(self, delta: Vec2) -> Self {
        Self::new(self.position + delta, self.zoom)
    }

    pub fn zoom_to(self, zoom: f64) -> Self {
        Self::new(self.position, zoom)
    }

    /// Interpolate towards `target`; `t` is not clamped so eased overshoot carries through.
    pub fn lerp_to(self, target: Camera, t: f64) -> Self {
        Self::new(
            self.position.lerp(target.position, t),
            lerp(self.zoom, target.zoom, t),
        )
    }

    /// World-space rectangle currently visible through a viewport over `world`.
    pub fn visible_rect(self, world: Size) -> Rect {
        let half_w = world.width / self.zoom / 2.0;
        let half_h = world.height / self.zoom / 2.0;
        Rect::new(
            self.position.x - half_w,
            self.position.y - half_h,
            self.position.x + half_w,
            self.position.y + half_h,
        )
    }
}

/// Fixed output frame size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::FULL_HD
    }
}

impl Viewport {
    pub const HD: Viewport = Viewport::new(1280, 720);
    pub const FULL_HD: Viewport = Viewport::new(1920, 1080);
    pub const QHD: Viewport = Viewport::new(2560, 1440);
    pub const UHD_4K: Viewport = Viewport::new(3840, 2160);
    pub const SQUARE: Viewport = Viewport::new(1080, 1080);
    pub const PORTRAIT: Viewport = Viewport::new(1080, 1920);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Look up a preset by name (`720p`, `1080p`, `1440p`, `4k`, `square`, `portrait`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "720p" | "hd" => Some(Self::HD),
            "1080p" | "full_hd" => Some(Self::FULL_HD),
            "1440p" | "qhd" => Some(Self::QHD),
            "4k" | "2160p" | "uhd" => Some(Self::UHD_4K),
            "square" => Some(Self::SQUARE),
            "portrait" => Some(Self::PORTRAIT),
            _ => None,
        }
    }

    pub fn size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    pub fn center(self) -> Point {
        Point::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }

    pub fn validate(self) -> LayercastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LayercastError::validation("viewport width/height must be > 0"));
        }
        Ok(())
    }
}

/// World→viewport projection:
/// `viewport = (world - camera.position) * zoom * (viewport.size / world_size) + viewport.center`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    forward: Affine,
}

impl ViewTransform {
    pub fn new(camera: Camera, viewport: Viewport, world: Size) -> LayercastResult<Self> {
        if !(world.width > 0.0 && world.height > 0.0) {
            return Err(LayercastError::validation(
                "world reference size must be positive",
            ));
        }
        let sx = camera.zoom * f64::from(viewport.width) / world.width;
        let sy = camera.zoom * f64::from(viewport.height) / world.height;
        let forward = Affine::translate(viewport.center().to_vec2())
            * Affine::scale_non_uniform(sx, sy)
            * Affine::translate(-camera.position.to_vec2());
        Ok(Self { forward })
    }

    pub fn affine(self) -> Affine {
        self.forward
    }

    pub fn world_to_viewport(self, p: Point) -> Point {
        self.forward * p
    }

    /// Average of the horizontal and vertical scale, for sizing round marks.
    pub fn mean_scale(self) -> f64 {
        let [a, _, _, d, _, _] = self.forward.as_coeffs();
        (a.abs() + d.abs()) / 2.0
    }

    /// Map an output pixel back into world space.
    pub fn viewport_to_world(self, p: Point) -> LayercastResult<Point> {
        let det = self.forward.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(LayercastError::validation("view transform is not invertible"));
        }
        Ok(self.forward.inverse() * p)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/camera.rs"]
mod tests;
