use std::f64::consts::PI;

use kurbo::ParamCurve;

use crate::animation::timeline::{Action, ActionType, BrushPath, CameraMove, EntrySide};
use crate::foundation::core::{CubicBez, Point, Size, Vec2};
use crate::foundation::math::lerp;
use crate::scene::camera::Camera;

/// Distance beyond the canvas edge where dragged layers start.
pub const DRAG_ENTRY_MARGIN: f64 = 400.0;
/// Smallest default brush radius, in layer pixels.
pub const MIN_BRUSH_RADIUS: f64 = 40.0;

const ARC_LIFT: f64 = 0.2;
const BRUSH_AMPLITUDE: f64 = 0.35;
const ZIGZAG_PEAKS: f64 = 3.0;
const DIAGONAL_MARGIN: f64 = 0.15;
const VELOCITY_STEP_SECS: f64 = 1e-3;

/// Result of [`evaluate`]: the eased factor and the point it drives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSample {
    /// Eased progress; may leave `[0, 1]` for overshooting curves.
    pub factor: f64,
    /// Drag: layer top-left in world space. Brush: cursor centre in world space.
    /// Background: the resting top-left.
    pub point: Point,
}

/// Evaluate an action at normalized progress `t_normalized` (clamped to `[0, 1]`).
pub fn evaluate(action: &Action, t_normalized: f64) -> MotionSample {
    let factor = action.ease().apply(t_normalized);
    let point = match action.action_type {
        ActionType::DragDrop => {
            let origin = action.origin.unwrap_or(action.target);
            drag_path(origin, action.target).eval(factor)
        }
        ActionType::BrushReveal => {
            let path = action.brush_path.unwrap_or_default();
            let local = brush_cursor(action.size, factor, path, action.brush_radius());
            action.target + local.to_vec2()
        }
        ActionType::Background => action.target,
    };
    MotionSample { factor, point }
}

/// Layer top-left at absolute time `t`.
pub fn position_at(action: &Action, t: f64) -> Point {
    match action.action_type {
        ActionType::DragDrop => evaluate(action, action.normalized(t)).point,
        ActionType::BrushReveal | ActionType::Background => action.target,
    }
}

/// Layer velocity in world units per second, by central difference of [`position_at`].
pub fn velocity_at(action: &Action, t: f64) -> Vec2 {
    if action.action_type != ActionType::DragDrop || action.duration <= 0.0 {
        return Vec2::ZERO;
    }
    let h = VELOCITY_STEP_SECS;
    let a = position_at(action, t - h);
    let b = position_at(action, t + h);
    (b - a) / (2.0 * h)
}

/// Arc from `origin` to `target`. The curve lifts away from the straight line on the
/// left-hand side of travel, so horizontal entries arc upwards.
pub fn drag_path(origin: Point, target: Point) -> CubicBez {
    let d = target - origin;
    let len = d.hypot();
    let lift = if len > 0.0 {
        Vec2::new(d.y, -d.x) / len * (len * ARC_LIFT)
    } else {
        Vec2::ZERO
    };
    let c1 = origin.lerp(target, 1.0 / 3.0) + lift;
    let c2 = origin.lerp(target, 0.75) + lift * 0.25;
    CubicBez::new(origin, c1, c2, target)
}

/// Off-canvas top-left a layer of `size` resting at `target` enters from.
pub fn drag_origin(target: Point, size: Size, world: Size, side: EntrySide) -> Point {
    match side {
        EntrySide::Left => Point::new(-(size.width + DRAG_ENTRY_MARGIN), target.y),
        EntrySide::Right => Point::new(world.width + DRAG_ENTRY_MARGIN, target.y),
        EntrySide::Top => Point::new(target.x, -(size.height + DRAG_ENTRY_MARGIN)),
        EntrySide::Bottom => Point::new(target.x, world.height + DRAG_ENTRY_MARGIN),
    }
}

/// Canvas edge closest to the layer centre. Ties resolve left, right, top, bottom.
pub fn nearest_side(target: Point, size: Size, world: Size) -> EntrySide {
    let c = Point::new(target.x + size.width / 2.0, target.y + size.height / 2.0);
    let candidates = [
        (EntrySide::Left, c.x),
        (EntrySide::Right, world.width - c.x),
        (EntrySide::Top, c.y),
        (EntrySide::Bottom, world.height - c.y),
    ];
    let mut best = candidates[0];
    for cand in &candidates[1..] {
        if cand.1 < best.1 {
            best = *cand;
        }
    }
    best.0
}

pub fn default_brush_radius(size: Size) -> f64 {
    (size.height / 3.0).max(MIN_BRUSH_RADIUS)
}

/// Brush cursor centre in layer-local pixels at progress `p` (clamped to `[0, 1]`).
///
/// The cursor starts one radius left of the layer and finishes one radius past its right
/// edge, so a full pass covers every column.
pub fn brush_cursor(size: Size, p: f64, path: BrushPath, radius: f64) -> Point {
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    let (w, h) = (size.width, size.height);
    let x = -radius + p * (w + 2.0 * radius);
    let mid = h / 2.0;
    let amp = BRUSH_AMPLITUDE * h;
    let y = match path {
        BrushPath::Straight => mid,
        BrushPath::CurveDown => mid + amp * (PI * p).sin(),
        BrushPath::CurveUp => mid - amp * (PI * p).sin(),
        BrushPath::Zigzag => {
            let phase = (p * ZIGZAG_PEAKS).fract();
            let tri = 1.0 - 4.0 * (phase - 0.5).abs();
            mid + amp * tri
        }
        BrushPath::DiagonalDown => lerp(DIAGONAL_MARGIN * h, (1.0 - DIAGONAL_MARGIN) * h, p),
        BrushPath::DiagonalUp => lerp((1.0 - DIAGONAL_MARGIN) * h, DIAGONAL_MARGIN * h, p),
    };
    Point::new(x, y)
}

/// Camera at time `t`: `base` followed by every move that has started.
///
/// `moves` must be sorted and non-overlapping, as [`crate::animation::timeline::Timeline`]
/// guarantees.
pub fn camera_at(base: Camera, moves: &[CameraMove], t: f64) -> Camera {
    let mut cam = base;
    for m in moves {
        if t < m.start {
            break;
        }
        let p = m.window().progress_at(t);
        if p >= 1.0 {
            cam = m.to;
        } else {
            cam = cam.lerp_to(m.to, m.easing.apply(p));
        }
    }
    cam
}

#[cfg(test)]
#[path = "../../tests/unit/animation/motion.rs"]
mod tests;
