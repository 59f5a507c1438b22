use crate::animation::motion::{camera_at, evaluate, velocity_at};
use crate::animation::timeline::{Action, ActionType, BrushPath, Timeline};
use crate::foundation::core::{Point, Vec2};
use crate::foundation::fingerprint::{Fingerprint, StableHasher};
use crate::scene::camera::Camera;
use crate::scene::layer::{Layer, LayerId};
use crate::scene::world::World;

/// Fraction of a drag's duration over which its opacity ramps from 0 to 1.
pub const DRAG_FADE_FRACTION: f64 = 0.1;

/// Where a layer is relative to its governing action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    /// Before the action starts.
    Pending,
    /// Inside `[start, start + duration)`.
    Active,
    /// At or past the end; terminal values.
    Settled,
    /// No governing action.
    Static,
}

/// Brush stroke attached to a brush-revealed layer.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct BrushStroke {
    pub path: BrushPath,
    /// Layer pixels.
    pub radius: f64,
    /// Cursor centre in world space.
    pub cursor: Point,
}

/// Visual state of one layer at one instant. Rebuilt every frame.
///
/// `opacity` and `reveal_progress` are clamped to `[0, 1]`; `position` is not, so overshooting
/// drag easings carry the layer past its target.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct LayerAnimState {
    pub layer_id: LayerId,
    /// World-space top-left.
    pub position: Point,
    pub opacity: f64,
    pub reveal_progress: f64,
    pub visible: bool,
    /// World units per second.
    pub velocity: Vec2,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brush: Option<BrushStroke>,
    pub phase: ActionPhase,
}

impl LayerAnimState {
    /// State of a layer nothing animates: at rest, fully shown when visible.
    pub fn at_rest(layer: &Layer) -> Self {
        Self {
            layer_id: layer.id.clone(),
            position: layer.position(),
            opacity: 1.0,
            reveal_progress: 1.0,
            visible: layer.visible,
            velocity: Vec2::ZERO,
            brush: None,
            phase: ActionPhase::Static,
        }
    }

    /// `true` when nothing about the layer's pixels depends on time.
    pub fn is_static(&self) -> bool {
        matches!(self.phase, ActionPhase::Settled | ActionPhase::Static)
    }

    /// Reveal currently being painted.
    pub fn is_revealing(&self) -> bool {
        self.brush.is_some() && self.reveal_progress > 0.0 && self.reveal_progress < 1.0
    }

    pub(crate) fn hash_into(&self, h: &mut StableHasher) {
        h.write_str(self.layer_id.as_str());
        h.write_f64(self.position.x);
        h.write_f64(self.position.y);
        h.write_f64(self.opacity);
        h.write_f64(self.reveal_progress);
        h.write_bool(self.visible);
        h.write_f64(self.velocity.x);
        h.write_f64(self.velocity.y);
        match self.brush {
            Some(b) => {
                h.write_u8(1);
                h.write_u8(b.path as u8);
                h.write_f64(b.radius);
                h.write_f64(b.cursor.x);
                h.write_f64(b.cursor.y);
            }
            None => h.write_u8(0),
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn stroke(action: &Action, cursor: Point) -> Option<BrushStroke> {
    (action.action_type == ActionType::BrushReveal).then(|| BrushStroke {
        path: action.brush_path.unwrap_or_default(),
        radius: action.brush_radius(),
        cursor,
    })
}

/// Evaluate one action at absolute time `t`. Pure: depends only on its arguments.
pub fn action_state(action: &Action, t: f64) -> LayerAnimState {
    let layer_id = action.layer_id.clone();

    if t.is_nan() || t < action.start {
        let start_cursor = evaluate(action, 0.0).point;
        let (position, opacity, visible) = match action.action_type {
            ActionType::DragDrop => (action.origin.unwrap_or(action.target), 0.0, false),
            ActionType::BrushReveal => (action.target, 1.0, true),
            ActionType::Background => (action.target, 0.0, false),
        };
        return LayerAnimState {
            layer_id,
            position,
            opacity,
            reveal_progress: 0.0,
            visible,
            velocity: Vec2::ZERO,
            brush: stroke(action, start_cursor),
            phase: ActionPhase::Pending,
        };
    }

    if t >= action.end() {
        let end_cursor = evaluate(action, 1.0).point;
        return LayerAnimState {
            layer_id,
            position: action.target,
            opacity: 1.0,
            reveal_progress: 1.0,
            visible: true,
            velocity: Vec2::ZERO,
            brush: stroke(action, end_cursor),
            phase: ActionPhase::Settled,
        };
    }

    let n = action.normalized(t);
    let sample = evaluate(action, n);
    let (position, opacity, reveal_progress) = match action.action_type {
        ActionType::DragDrop => (sample.point, clamp_unit(n / DRAG_FADE_FRACTION), 1.0),
        ActionType::BrushReveal => (action.target, 1.0, clamp_unit(sample.factor)),
        ActionType::Background => (action.target, clamp_unit(sample.factor), 1.0),
    };
    LayerAnimState {
        layer_id,
        position,
        opacity,
        reveal_progress,
        visible: true,
        velocity: velocity_at(action, t),
        brush: stroke(action, sample.point),
        phase: ActionPhase::Active,
    }
}

/// State of `layer_id` at `t`, or `None` when the timeline does not govern it.
pub fn state_at(timeline: &Timeline, layer_id: &LayerId, t: f64) -> Option<LayerAnimState> {
    timeline.action_for(layer_id).map(|a| action_state(a, t))
}

/// Every layer's state plus the camera at one instant.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FrameStates {
    pub time: f64,
    pub camera: Camera,
    /// Scene order, back to front. Group containers are omitted.
    pub layers: Vec<LayerAnimState>,
}

impl FrameStates {
    /// Fingerprint of everything that decides the frame's pixels. Time itself is excluded.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut h = StableHasher::new();
        h.write_f64(self.camera.position.x);
        h.write_f64(self.camera.position.y);
        h.write_f64(self.camera.zoom);
        h.write_u64(self.layers.len() as u64);
        for s in &self.layers {
            s.hash_into(&mut h);
        }
        h.finish()
    }

    pub fn get(&self, id: &LayerId) -> Option<&LayerAnimState> {
        self.layers.iter().find(|s| &s.layer_id == id)
    }
}

/// Evaluate the whole scene at time `t`.
pub fn frame_states(
    world: &World,
    timeline: &Timeline,
    base_camera: Camera,
    t: f64,
) -> FrameStates {
    let layers = world
        .scene()
        .layers()
        .iter()
        .filter(|l| !l.is_group)
        .map(|l| match timeline.action_for(&l.id) {
            Some(a) if l.visible => action_state(a, t),
            _ => LayerAnimState::at_rest(l),
        })
        .collect();
    FrameStates {
        time: t,
        camera: camera_at(base_camera, timeline.camera_moves(), t),
        layers,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/state.rs"]
mod tests;
