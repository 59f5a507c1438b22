use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::animation::planner::PlannerConfig;
use crate::animation::timeline::{CameraMove, Timeline};
use crate::composite::compositor::CompositorOptions;
use crate::foundation::core::Fps;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::pipeline::orchestrator::RenderOpts;
use crate::pipeline::strategy::{
    OptimizedOpts, RenderInputs, RenderStrategy, StrategyKind, create_strategy,
};
use crate::raster::gpu::DEFAULT_GPU_TIMEOUT;
use crate::scene::assets::RasterStore;
use crate::scene::camera::{Camera, Viewport};
use crate::scene::world::World;

/// Initial camera plus scheduled moves. No camera means "whole world at zoom 1".
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub initial: Option<Camera>,
    pub moves: Vec<CameraMove>,
}

/// Everything about a render except the document itself.
///
/// Every section is optional in JSON; missing fields take their defaults:
///
/// ```json
/// { "fps": { "num": 30, "den": 1 },
///   "viewport": "1080p",
///   "strategy": "optimized",
///   "planner": { "strategy": "staggered", "timing": { "stagger": 0.4 } },
///   "render": { "lead_in": "reuse", "encoder_timeout_secs": 20 } }
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub fps: Fps,
    /// Preset name or `{ "width", "height" }`; `None` renders at the document size.
    #[serde(with = "viewport_spec")]
    pub viewport: Option<Viewport>,
    pub strategy: StrategyKind,
    pub planner: PlannerConfig,
    pub compositor: CompositorOptions,
    pub render: RenderOpts,
    /// Used by the `optimized` strategy only.
    pub optimized: OptimizedOpts,
    pub gpu_timeout_secs: f64,
    pub camera: CameraConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            viewport: None,
            strategy: StrategyKind::default(),
            planner: PlannerConfig::default(),
            compositor: CompositorOptions::default(),
            render: RenderOpts::default(),
            optimized: OptimizedOpts::default(),
            gpu_timeout_secs: DEFAULT_GPU_TIMEOUT.as_secs_f64(),
            camera: CameraConfig::default(),
        }
    }
}

impl JobConfig {
    /// Parse and validate.
    pub fn from_json_str(s: &str) -> LayercastResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| LayercastError::validation(format!("parse job config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> LayercastResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            LayercastError::validation(format!("open job config '{}': {e}", path.display()))
        })?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            LayercastError::validation(format!("parse job config '{}': {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> LayercastResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if let Some(v) = self.viewport {
            v.validate()?;
        }
        self.planner.validate()?;
        self.compositor.validate()?;
        self.render.validate()?;
        if self.optimized.workers == Some(0) {
            return Err(LayercastError::validation("optimized.workers must be >= 1"));
        }
        if self.optimized.chunk_size == 0 {
            return Err(LayercastError::validation("optimized.chunk_size must be >= 1"));
        }
        if !(self.gpu_timeout_secs.is_finite() && self.gpu_timeout_secs > 0.0) {
            return Err(LayercastError::validation(
                "gpu_timeout_secs must be finite and > 0",
            ));
        }
        // Overlap and window checks live with the timeline.
        Timeline::default().with_camera_moves(self.camera.moves.clone())?;
        Ok(())
    }

    pub fn gpu_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.gpu_timeout_secs)
    }

    /// Plan `world` and bundle it with this configuration's render settings.
    #[tracing::instrument(skip_all, fields(layers = world.scene().len()))]
    pub fn prepare(&self, world: World) -> LayercastResult<RenderInputs> {
        let timeline = self
            .planner
            .plan(&world)?
            .with_camera_moves(self.camera.moves.clone())?;
        tracing::info!(
            actions = timeline.len(),
            duration = timeline.total_duration(),
            "timeline planned"
        );
        let rasters = RasterStore::prepare(&world);
        let world = Arc::new(world);
        let mut inputs = RenderInputs::new(
            Arc::clone(&world),
            Arc::new(rasters),
            Arc::new(timeline),
            self.fps,
        )
        .with_compositor_options(self.compositor.clone());
        if let Some(v) = self.viewport {
            inputs = inputs.with_viewport(v);
        }
        if let Some(c) = self.camera.initial {
            inputs = inputs.with_camera(c);
        }
        Ok(inputs)
    }

    pub fn create_strategy(&self) -> LayercastResult<Arc<dyn RenderStrategy>> {
        create_strategy(self.strategy, &self.optimized, self.gpu_timeout())
    }
}

mod viewport_spec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::scene::camera::Viewport;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Spec {
        Preset(String),
        Size(Viewport),
    }

    pub fn serialize<S: Serializer>(v: &Option<Viewport>, s: S) -> Result<S::Ok, S::Error> {
        v.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Viewport>, D::Error> {
        match Option::<Spec>::deserialize(d)? {
            None => Ok(None),
            Some(Spec::Size(v)) => Ok(Some(v)),
            Some(Spec::Preset(name)) => Viewport::preset(&name)
                .map(Some)
                .ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown viewport preset '{name}'"))
                }),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/job.rs"]
mod tests;
