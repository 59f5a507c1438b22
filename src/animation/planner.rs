use crate::animation::ease::Ease;
use crate::animation::motion::{drag_origin, nearest_side};
use crate::animation::timeline::{
    Action, ActionType, BrushPath, EntrySide, SequencingStrategy, Timeline,
};
use crate::foundation::core::Size;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::scene::layer::Layer;
use crate::scene::world::World;

/// Brush paths handed out in turn when none is configured.
pub const BRUSH_PATH_ROTATION: [BrushPath; 4] = [
    BrushPath::Straight,
    BrushPath::CurveDown,
    BrushPath::Zigzag,
    BrushPath::CurveUp,
];

/// Naming prefix that forces an action type, e.g. `[D] Logo`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PrefixRule {
    pub prefix: String,
    pub action: ActionType,
}

impl PrefixRule {
    pub fn new(prefix: impl Into<String>, action: ActionType) -> Self {
        Self {
            prefix: prefix.into(),
            action,
        }
    }

    fn matches(&self, name: &str) -> bool {
        name.trim_start()
            .get(..self.prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.prefix))
    }
}

/// Data-driven action classification table.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClassificationRules {
    pub prefixes: Vec<PrefixRule>,
    /// Layers whose short edge is at least this many pixels are brushed in; smaller ones are
    /// dragged.
    pub brush_min_short_edge_px: f64,
    /// Slack when deciding that a layer covers the whole canvas.
    pub full_canvas_tolerance_px: f64,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            prefixes: vec![
                PrefixRule::new("[BG]", ActionType::Background),
                PrefixRule::new("[D]", ActionType::DragDrop),
                PrefixRule::new("[B]", ActionType::BrushReveal),
            ],
            brush_min_short_edge_px: 500.0,
            full_canvas_tolerance_px: 1.0,
        }
    }
}

/// Which rule decided a layer's action.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ClassificationReason {
    Prefix { prefix: String },
    DocumentHint,
    FullCanvas,
    SizeThreshold { short_edge: f64 },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Classification {
    pub action: ActionType,
    pub reason: ClassificationReason,
}

impl ClassificationRules {
    /// Classify in priority order: naming prefix, document hint, full canvas, size threshold.
    pub fn classify(&self, layer: &Layer, canvas: Size) -> LayercastResult<Classification> {
        let size = layer.size();
        if !(size.width.is_finite() && size.height.is_finite())
            || size.width <= 0.0
            || size.height <= 0.0
        {
            return Err(LayercastError::planning(
                layer.id.as_str(),
                format!("unclassifiable size {}x{}", size.width, size.height),
            ));
        }

        let mut rules: Vec<&PrefixRule> = self.prefixes.iter().collect();
        rules.sort_by_key(|r| std::cmp::Reverse(r.prefix.len()));
        if let Some(rule) = rules.into_iter().find(|r| r.matches(&layer.name)) {
            return Ok(Classification {
                action: rule.action,
                reason: ClassificationReason::Prefix {
                    prefix: rule.prefix.clone(),
                },
            });
        }

        if let Some(action) = layer.action_hint {
            return Ok(Classification {
                action,
                reason: ClassificationReason::DocumentHint,
            });
        }

        let tol = self.full_canvas_tolerance_px;
        if size.width + tol >= canvas.width && size.height + tol >= canvas.height {
            return Ok(Classification {
                action: ActionType::Background,
                reason: ClassificationReason::FullCanvas,
            });
        }

        let short_edge = layer.short_edge();
        let action = if short_edge < self.brush_min_short_edge_px {
            ActionType::DragDrop
        } else {
            ActionType::BrushReveal
        };
        Ok(Classification {
            action,
            reason: ClassificationReason::SizeThreshold { short_edge },
        })
    }

    pub fn validate(&self) -> LayercastResult<()> {
        if !self.brush_min_short_edge_px.is_finite() || self.brush_min_short_edge_px < 0.0 {
            return Err(LayercastError::validation(
                "brush_min_short_edge_px must be finite and >= 0",
            ));
        }
        if !self.full_canvas_tolerance_px.is_finite() || self.full_canvas_tolerance_px < 0.0 {
            return Err(LayercastError::validation(
                "full_canvas_tolerance_px must be finite and >= 0",
            ));
        }
        if self.prefixes.iter().any(|r| r.prefix.is_empty()) {
            return Err(LayercastError::validation("classification prefix must be non-empty"));
        }
        Ok(())
    }
}

/// Durations, offsets and easings the planner assigns. All times in seconds.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between consecutive starts under [`SequencingStrategy::Staggered`].
    pub stagger: f64,
    /// Empty time before the first action.
    pub lead_in: f64,
    /// Gap between actions under [`SequencingStrategy::Sequential`].
    pub hold: f64,
    /// Still time after the last action.
    pub tail_hold: f64,
    pub drag_duration: f64,
    pub brush_duration: f64,
    pub background_duration: f64,
    pub drag_easing: Ease,
    pub brush_easing: Ease,
    pub background_easing: Ease,
    /// Fixed brush path; `None` rotates through [`BRUSH_PATH_ROTATION`].
    pub brush_path: Option<BrushPath>,
    /// Fixed drag entry side; `None` picks the nearest canvas edge.
    pub entry_side: Option<EntrySide>,
    pub brush_radius: Option<f64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stagger: 0.5,
            lead_in: 0.0,
            hold: 0.0,
            tail_hold: 1.0,
            drag_duration: 2.0,
            brush_duration: 3.0,
            background_duration: 1.0,
            drag_easing: Ease::out_back(),
            brush_easing: Ease::InOutCubic,
            background_easing: Ease::Linear,
            brush_path: None,
            entry_side: None,
            brush_radius: None,
        }
    }
}

impl TimingConfig {
    pub fn duration_for(&self, action: ActionType) -> f64 {
        match action {
            ActionType::DragDrop => self.drag_duration,
            ActionType::BrushReveal => self.brush_duration,
            ActionType::Background => self.background_duration,
        }
    }

    pub fn easing_for(&self, action: ActionType) -> Ease {
        match action {
            ActionType::DragDrop => self.drag_easing,
            ActionType::BrushReveal => self.brush_easing,
            ActionType::Background => self.background_easing,
        }
    }

    pub fn validate(&self) -> LayercastResult<()> {
        let fields = [
            ("stagger", self.stagger),
            ("lead_in", self.lead_in),
            ("hold", self.hold),
            ("tail_hold", self.tail_hold),
            ("drag_duration", self.drag_duration),
            ("brush_duration", self.brush_duration),
            ("background_duration", self.background_duration),
        ];
        for (name, v) in fields {
            if !v.is_finite() || v < 0.0 {
                return Err(LayercastError::validation(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        self.drag_easing.validate()?;
        self.brush_easing.validate()?;
        self.background_easing.validate()?;
        if let Some(r) = self.brush_radius
            && !(r.is_finite() && r > 0.0)
        {
            return Err(LayercastError::validation("brush_radius must be > 0"));
        }
        Ok(())
    }

    /// Start time for each duration, in order.
    fn schedule(&self, durations: &[f64], strategy: SequencingStrategy) -> Vec<f64> {
        let mut cursor = self.lead_in;
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| match strategy {
                SequencingStrategy::Staggered => self.lead_in + i as f64 * self.stagger,
                SequencingStrategy::Parallel => self.lead_in,
                SequencingStrategy::Sequential => {
                    let start = cursor;
                    cursor = start + d + self.hold;
                    start
                }
            })
            .collect()
    }
}

/// Everything the planner needs besides the layers.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub strategy: SequencingStrategy,
    pub rules: ClassificationRules,
    pub timing: TimingConfig,
}

impl PlannerConfig {
    pub fn plan(&self, world: &World) -> LayercastResult<Timeline> {
        plan(
            world.scene().layers(),
            world.size(),
            self.strategy,
            &self.rules,
            &self.timing,
        )
    }

    pub fn validate(&self) -> LayercastResult<()> {
        self.rules.validate()?;
        self.timing.validate()
    }
}

/// Build the timeline for `layers`, which must be in scene (back-to-front) order.
///
/// Hidden layers and group containers take no part. Identical input always produces an
/// identical timeline.
#[tracing::instrument(skip_all, fields(layers = layers.len(), strategy = ?strategy))]
pub fn plan(
    layers: &[Layer],
    canvas: Size,
    strategy: SequencingStrategy,
    rules: &ClassificationRules,
    timing: &TimingConfig,
) -> LayercastResult<Timeline> {
    rules.validate()?;
    timing.validate()?;

    let mut classified = Vec::new();
    for layer in layers.iter().filter(|l| l.is_animated()) {
        let class = rules.classify(layer, canvas)?;
        if layer.raster.is_none() {
            return Err(LayercastError::planning(
                layer.id.as_str(),
                "layer has no raster data",
            ));
        }
        tracing::debug!(
            layer = %layer.id,
            action = class.action.as_str(),
            reason = ?class.reason,
            "classified"
        );
        classified.push((layer, class.action));
    }

    let durations: Vec<f64> = classified
        .iter()
        .map(|(_, a)| timing.duration_for(*a))
        .collect();
    let starts = timing.schedule(&durations, strategy);

    let mut brush_count = 0usize;
    let mut actions = Vec::with_capacity(classified.len());
    for ((layer, action_type), (start, duration)) in
        classified.into_iter().zip(starts.into_iter().zip(durations))
    {
        let target = layer.position();
        let size = layer.size();
        let mut action = Action {
            layer_id: layer.id.clone(),
            action_type,
            start,
            duration,
            target,
            size,
            easing: Some(timing.easing_for(action_type)),
            origin: None,
            brush_path: None,
            brush_radius: None,
        };
        match action_type {
            ActionType::DragDrop => {
                let side = timing
                    .entry_side
                    .unwrap_or_else(|| nearest_side(target, size, canvas));
                action.origin = Some(drag_origin(target, size, canvas, side));
            }
            ActionType::BrushReveal => {
                let path = timing
                    .brush_path
                    .unwrap_or(BRUSH_PATH_ROTATION[brush_count % BRUSH_PATH_ROTATION.len()]);
                brush_count += 1;
                action.brush_path = Some(path);
                action.brush_radius = timing.brush_radius;
            }
            ActionType::Background => {}
        }
        actions.push(action);
    }

    let timeline = Timeline::new(actions, timing.tail_hold)?;
    tracing::info!(
        actions = timeline.len(),
        duration = timeline.total_duration(),
        "timeline planned"
    );
    Ok(timeline)
}

/// Length in seconds of a plan over layers of the given action types, tail hold included.
pub fn estimate_duration(
    actions: &[ActionType],
    strategy: SequencingStrategy,
    timing: &TimingConfig,
) -> f64 {
    if actions.is_empty() {
        return 0.0;
    }
    let durations: Vec<f64> = actions.iter().map(|a| timing.duration_for(*a)).collect();
    let starts = timing.schedule(&durations, strategy);
    let end = starts
        .iter()
        .zip(&durations)
        .map(|(s, d)| s + d)
        .fold(0.0, f64::max);
    end + timing.tail_hold
}

#[cfg(test)]
#[path = "../../tests/unit/animation/planner.rs"]
mod tests;
