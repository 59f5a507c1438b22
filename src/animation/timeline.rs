use std::collections::HashMap;

use crate::animation::ease::Ease;
use crate::animation::motion::default_brush_radius;
use crate::foundation::core::{Fps, Point, Size, TimeRange};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::scene::camera::Camera;
pub use crate::scene::layer::ActionType;
use crate::scene::layer::LayerId;

/// How the planner assigns start times.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencingStrategy {
    /// Fixed delay between consecutive starts; actions overlap.
    #[default]
    Staggered,
    /// Each action starts after the previous one ends (plus hold).
    Sequential,
    /// Everything starts together.
    Parallel,
}

/// Brush cursor path across a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushPath {
    /// Horizontal pass through the vertical centre.
    #[default]
    Straight,
    /// Arc bulging downwards.
    CurveDown,
    /// Arc bulging upwards.
    CurveUp,
    /// Three-peak triangle wave.
    Zigzag,
    /// Top-left to bottom-right.
    DiagonalDown,
    /// Bottom-left to top-right.
    DiagonalUp,
}

/// Canvas edge a dragged layer flies in from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySide {
    Left,
    Right,
    Top,
    Bottom,
}

/// One timed instruction for one layer.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Action {
    pub layer_id: LayerId,
    pub action_type: ActionType,
    /// Seconds from the start of the video.
    pub start: f64,
    /// Seconds; zero means instantaneous.
    pub duration: f64,
    /// Resting top-left corner in world space.
    pub target: Point,
    /// Layer extent, used by paths and masks.
    pub size: Size,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easing: Option<Ease>,
    /// Off-canvas top-left corner a drag starts from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brush_path: Option<BrushPath>,
    /// Brush radius in layer pixels; `None` derives it from the layer height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brush_radius: Option<f64>,
}

/// Easing used when an action carries none.
pub fn default_ease(action_type: ActionType) -> Ease {
    match action_type {
        ActionType::DragDrop => Ease::OutCubic,
        ActionType::BrushReveal => Ease::InOutCubic,
        ActionType::Background => Ease::Linear,
    }
}

impl Action {
    pub fn window(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            duration: self.duration,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Elapsed fraction in `[0, 1]`.
    pub fn normalized(&self, t: f64) -> f64 {
        self.window().progress_at(t)
    }

    pub fn ease(&self) -> Ease {
        self.easing.unwrap_or_else(|| default_ease(self.action_type))
    }

    pub fn brush_radius(&self) -> f64 {
        self.brush_radius.unwrap_or_else(|| default_brush_radius(self.size))
    }

    fn validate(&self) -> LayercastResult<()> {
        TimeRange::new(self.start, self.duration).map_err(|e| {
            LayercastError::validation(format!("action for layer '{}': {e}", self.layer_id))
        })?;
        if self.start < 0.0 {
            return Err(LayercastError::validation(format!(
                "action for layer '{}' starts before 0",
                self.layer_id
            )));
        }
        if let Some(e) = self.easing {
            e.validate()?;
        }
        if let Some(r) = self.brush_radius
            && !(r.is_finite() && r > 0.0)
        {
            return Err(LayercastError::validation(format!(
                "action for layer '{}' has a non-positive brush radius",
                self.layer_id
            )));
        }
        Ok(())
    }
}

/// Planned camera move towards `to`, starting from wherever the camera is at `start`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraMove {
    pub start: f64,
    pub duration: f64,
    pub to: Camera,
    #[serde(default)]
    pub easing: Ease,
}

impl CameraMove {
    pub fn window(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            duration: self.duration,
        }
    }
}

/// Ordered, validated set of actions. Read-only once built.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct Timeline {
    actions: Vec<Action>,
    camera_moves: Vec<CameraMove>,
    tail_hold: f64,
    #[serde(skip)]
    index: HashMap<LayerId, usize>,
}

impl Timeline {
    /// Actions are ordered by start time (stable); each layer may own at most one action.
    pub fn new(mut actions: Vec<Action>, tail_hold: f64) -> LayercastResult<Self> {
        if !tail_hold.is_finite() || tail_hold < 0.0 {
            return Err(LayercastError::validation("tail hold must be finite and >= 0"));
        }
        for a in &actions {
            a.validate()?;
        }
        actions.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut index = HashMap::with_capacity(actions.len());
        for (i, a) in actions.iter().enumerate() {
            if index.insert(a.layer_id.clone(), i).is_some() {
                return Err(LayercastError::validation(format!(
                    "layer '{}' has more than one action",
                    a.layer_id
                )));
            }
        }
        Ok(Self {
            actions,
            camera_moves: Vec::new(),
            tail_hold,
            index,
        })
    }

    /// Attach camera moves; they must not overlap each other.
    pub fn with_camera_moves(mut self, mut moves: Vec<CameraMove>) -> LayercastResult<Self> {
        for m in &moves {
            let w = TimeRange::new(m.start, m.duration)?;
            if w.start < 0.0 {
                return Err(LayercastError::validation("camera move starts before 0"));
            }
            m.easing.validate()?;
        }
        moves.sort_by(|a, b| a.start.total_cmp(&b.start));
        for pair in moves.windows(2) {
            if pair[0].window().overlaps(pair[1].window()) {
                return Err(LayercastError::validation("camera moves overlap"));
            }
        }
        self.camera_moves = moves;
        Ok(self)
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action_for(&self, id: &LayerId) -> Option<&Action> {
        self.index.get(id).map(|&i| &self.actions[i])
    }

    pub fn camera_moves(&self) -> &[CameraMove] {
        &self.camera_moves
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.camera_moves.is_empty()
    }

    pub fn first_start(&self) -> Option<f64> {
        self.actions.first().map(|a| a.start)
    }

    /// Last moment anything moves.
    pub fn animation_end(&self) -> f64 {
        let actions = self.actions.iter().map(Action::end);
        let moves = self.camera_moves.iter().map(|m| m.window().end());
        actions.chain(moves).fold(0.0, f64::max)
    }

    pub fn tail_hold(&self) -> f64 {
        self.tail_hold
    }

    /// Video length in seconds; an empty timeline has zero length.
    pub fn total_duration(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.animation_end() + self.tail_hold
    }

    pub fn total_frames(&self, fps: Fps) -> u64 {
        fps.secs_to_frames_ceil(self.total_duration())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/timeline.rs"]
mod tests;
