use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;

use crate::animation::state::{ActionPhase, FrameStates, frame_states};
use crate::animation::timeline::Timeline;
use crate::composite::cache::{CacheStats, LayerCache};
use crate::composite::compositor::{
    CompositeFrame, CompositorOptions, FrameCompositor, FrameDiagnostics,
};
use crate::composite::overlay::{UiOverlay, apply_overlay, output_size};
use crate::foundation::core::{FrameIndex, Fps};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::foundation::fingerprint::Fingerprint;
use crate::pipeline::cancel::CancellationToken;
use crate::raster::buffer::Raster;
use crate::raster::cpu::CpuImageProcessor;
use crate::raster::gpu::GpuImageProcessor;
use crate::raster::processor::ImageProcessor;
use crate::scene::assets::RasterStore;
use crate::scene::camera::{Camera, Viewport};
use crate::scene::world::World;

/// Everything a strategy needs to turn a frame index into pixels. Cheap to clone.
#[derive(Clone)]
pub struct RenderInputs {
    pub world: Arc<World>,
    pub rasters: Arc<RasterStore>,
    pub timeline: Arc<Timeline>,
    /// Camera before any planned camera move.
    pub camera: Camera,
    pub viewport: Viewport,
    pub fps: Fps,
    pub compositor: CompositorOptions,
    pub overlay: Option<Arc<dyn UiOverlay>>,
}

impl std::fmt::Debug for RenderInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderInputs")
            .field("layers", &self.world.scene().len())
            .field("actions", &self.timeline.len())
            .field("camera", &self.camera)
            .field("viewport", &self.viewport)
            .field("fps", &self.fps)
            .field("overlay", &self.overlay.is_some())
            .finish()
    }
}

impl RenderInputs {
    /// Camera centred on the world; viewport matching the world size.
    pub fn new(
        world: Arc<World>,
        rasters: Arc<RasterStore>,
        timeline: Arc<Timeline>,
        fps: Fps,
    ) -> Self {
        let size = world.size();
        Self {
            camera: Camera::centered_on(size),
            viewport: Viewport::new(size.width.round() as u32, size.height.round() as u32),
            world,
            rasters,
            timeline,
            fps,
            compositor: CompositorOptions::default(),
            overlay: None,
        }
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_compositor_options(mut self, opts: CompositorOptions) -> Self {
        self.compositor = opts;
        self
    }

    pub fn with_overlay(mut self, overlay: Arc<dyn UiOverlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn total_frames(&self) -> u64 {
        self.timeline.total_frames(self.fps)
    }

    pub fn time_of(&self, frame: FrameIndex) -> f64 {
        self.fps.frames_to_secs(frame.0)
    }

    pub fn states_at(&self, t: f64) -> FrameStates {
        frame_states(&self.world, &self.timeline, self.camera, t)
    }

    /// Frame size after the overlay is applied.
    pub fn output_size(&self) -> LayercastResult<Viewport> {
        output_size(self.viewport, self.overlay.as_deref())
    }

    /// Frames before any action or camera move starts. Nothing changes over this window.
    pub fn lead_in_frames(&self) -> u64 {
        let first_move = self.timeline.camera_moves().first().map(|m| m.start);
        let start = match (self.timeline.first_start(), first_move) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return 0,
        };
        self.fps.secs_to_frames_ceil(start).min(self.total_frames())
    }

    pub fn compositor(
        &self,
        processor: Arc<dyn ImageProcessor>,
    ) -> LayercastResult<FrameCompositor> {
        FrameCompositor::new(
            Arc::clone(&self.world),
            Arc::clone(&self.rasters),
            self.viewport,
            processor,
            self.compositor.clone(),
            self.fps,
        )
    }
}

/// One finished frame, overlay included.
#[derive(Clone, Debug)]
pub struct RenderedFrame {
    pub index: FrameIndex,
    pub image: Arc<Raster>,
    pub diagnostics: FrameDiagnostics,
    /// Reused from an identical earlier frame instead of being composited.
    pub elided: bool,
}

/// Compose and overlay the scene at `t`.
pub fn render_still(
    compositor: &FrameCompositor,
    inputs: &RenderInputs,
    t: f64,
) -> LayercastResult<CompositeFrame> {
    let states = inputs.states_at(t);
    let frame = compositor.compose_frame(&states)?;
    finish_frame(compositor, inputs, frame, FrameIndex(0))
}

fn finish_frame(
    compositor: &FrameCompositor,
    inputs: &RenderInputs,
    mut frame: CompositeFrame,
    index: FrameIndex,
) -> LayercastResult<CompositeFrame> {
    if let Some(overlay) = inputs.overlay.as_deref() {
        frame.image = apply_overlay(compositor.processor(), frame.image, overlay, index)?;
    }
    Ok(frame)
}

fn render_states(
    compositor: &FrameCompositor,
    inputs: &RenderInputs,
    index: FrameIndex,
    states: &FrameStates,
) -> LayercastResult<RenderedFrame> {
    let frame = compositor
        .compose_frame(states)
        .and_then(|f| finish_frame(compositor, inputs, f, index))
        .map_err(|e| match e {
            LayercastError::Validation(reason) => LayercastError::render(index.0, reason),
            other => other,
        })?;
    Ok(RenderedFrame {
        index,
        image: Arc::new(frame.image),
        diagnostics: frame.diagnostics,
        elided: false,
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Cpu,
    Optimized,
    Gpu,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Optimized => "optimized",
            Self::Gpu => "gpu",
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = LayercastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "optimized" => Ok(Self::Optimized),
            "gpu" => Ok(Self::Gpu),
            other => Err(LayercastError::validation(format!(
                "unknown strategy '{other}' (expected cpu, optimized or gpu)"
            ))),
        }
    }
}

/// Interchangeable execution backend for the frame loop.
///
/// Every strategy produces the same pixels for the same inputs; they differ only in how the
/// work is scheduled. Frames come back in the order their indices were given.
pub trait RenderStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn processor(&self) -> Arc<dyn ImageProcessor>;

    /// Preferred number of frames per `render_chunk` call.
    fn chunk_size(&self) -> usize {
        1
    }

    /// Render `frames` in order. Stops at the first frame found cancelled, returning the
    /// frames finished before it.
    fn render_chunk(
        &self,
        inputs: &RenderInputs,
        frames: &[FrameIndex],
        cancel: &CancellationToken,
    ) -> LayercastResult<Vec<RenderedFrame>>;

    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

fn render_sequential(
    compositor: &FrameCompositor,
    inputs: &RenderInputs,
    frames: &[FrameIndex],
    cancel: &CancellationToken,
) -> LayercastResult<Vec<RenderedFrame>> {
    let mut out = Vec::with_capacity(frames.len());
    for &index in frames {
        if cancel.is_cancelled() {
            break;
        }
        let states = inputs.states_at(inputs.time_of(index));
        out.push(render_states(compositor, inputs, index, &states)?);
    }
    Ok(out)
}

/// Reference strategy: one frame at a time on the calling thread.
#[derive(Debug, Default)]
pub struct CpuStrategy {
    processor: Arc<CpuImageProcessor>,
}

impl CpuStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderStrategy for CpuStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Cpu
    }

    fn processor(&self) -> Arc<dyn ImageProcessor> {
        self.processor.clone()
    }

    fn render_chunk(
        &self,
        inputs: &RenderInputs,
        frames: &[FrameIndex],
        cancel: &CancellationToken,
    ) -> LayercastResult<Vec<RenderedFrame>> {
        let compositor = inputs.compositor(self.processor())?;
        render_sequential(&compositor, inputs, frames, cancel)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OptimizedOpts {
    /// Worker threads; `None` uses rayon's default.
    pub workers: Option<usize>,
    pub chunk_size: usize,
    pub cache_max_bytes: usize,
    /// Reuse a frame whose full state fingerprint matches an earlier one in the chunk.
    pub static_frame_elision: bool,
}

impl Default for OptimizedOpts {
    fn default() -> Self {
        Self {
            workers: None,
            chunk_size: 32,
            cache_max_bytes: crate::composite::cache::DEFAULT_CACHE_MAX_BYTES,
            static_frame_elision: true,
        }
    }
}

/// Parallel CPU strategy: frames of a chunk render on a rayon pool, settled layers come from a
/// shared [`LayerCache`], and repeated frames are composited once.
pub struct OptimizedStrategy {
    processor: Arc<dyn ImageProcessor>,
    pool: rayon::ThreadPool,
    cache: Arc<LayerCache>,
    opts: OptimizedOpts,
}

impl std::fmt::Debug for OptimizedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizedStrategy")
            .field("threads", &self.pool.current_num_threads())
            .field("opts", &self.opts)
            .finish()
    }
}

impl OptimizedStrategy {
    pub fn new(opts: OptimizedOpts) -> LayercastResult<Self> {
        Self::with_processor(opts, Arc::new(CpuImageProcessor::new()))
    }

    /// Same scheduling over a caller-supplied processor.
    pub fn with_processor(
        opts: OptimizedOpts,
        processor: Arc<dyn ImageProcessor>,
    ) -> LayercastResult<Self> {
        Ok(Self {
            pool: build_thread_pool(opts.workers)?,
            cache: Arc::new(LayerCache::new(opts.cache_max_bytes)),
            processor,
            opts,
        })
    }

    pub fn cache(&self) -> &Arc<LayerCache> {
        &self.cache
    }

    /// Drop cache entries of layers animating at the start of this window.
    fn invalidate_active(&self, first: &FrameStates) {
        for s in first.layers.iter().filter(|s| s.phase == ActionPhase::Active) {
            let dropped = self.cache.invalidate_layer(&s.layer_id);
            if dropped > 0 {
                tracing::debug!(layer = %s.layer_id, dropped, "cache entries invalidated");
            }
        }
    }
}

impl RenderStrategy for OptimizedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Optimized
    }

    fn processor(&self) -> Arc<dyn ImageProcessor> {
        Arc::clone(&self.processor)
    }

    fn chunk_size(&self) -> usize {
        self.opts.chunk_size.max(1)
    }

    fn render_chunk(
        &self,
        inputs: &RenderInputs,
        frames: &[FrameIndex],
        cancel: &CancellationToken,
    ) -> LayercastResult<Vec<RenderedFrame>> {
        let compositor = inputs
            .compositor(self.processor())?
            .with_cache(Arc::clone(&self.cache));

        let states: Vec<FrameStates> = frames
            .iter()
            .map(|&f| inputs.states_at(inputs.time_of(f)))
            .collect();
        if let Some(first) = states.first() {
            self.invalidate_active(first);
        }

        let mut unique = Vec::<usize>::with_capacity(states.len());
        let mut frame_to_unique = Vec::<usize>::with_capacity(states.len());
        if self.opts.static_frame_elision {
            let mut first_seen = HashMap::<Fingerprint, usize>::new();
            for (i, s) in states.iter().enumerate() {
                let slot = *first_seen.entry(s.fingerprint()).or_insert_with(|| {
                    unique.push(i);
                    unique.len() - 1
                });
                frame_to_unique.push(slot);
            }
        } else {
            unique.extend(0..states.len());
            frame_to_unique.extend(0..states.len());
        }

        let rendered: Vec<LayercastResult<Option<RenderedFrame>>> = self.pool.install(|| {
            unique
                .par_iter()
                .map(|&i| {
                    if cancel.is_cancelled() {
                        return Ok(None);
                    }
                    render_states(&compositor, inputs, frames[i], &states[i]).map(Some)
                })
                .collect()
        });
        let mut done = Vec::with_capacity(rendered.len());
        for r in rendered {
            done.push(r?);
        }

        let mut out = Vec::with_capacity(frames.len());
        for (i, &u) in frame_to_unique.iter().enumerate() {
            let Some(src) = done[u].as_ref() else {
                break;
            };
            let elided = unique[u] != i;
            out.push(RenderedFrame {
                index: frames[i],
                image: Arc::clone(&src.image),
                diagnostics: src.diagnostics.clone(),
                elided,
            });
            if cancel.is_cancelled() {
                break;
            }
        }
        Ok(out)
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }
}

/// Sequential strategy whose blends run on the GPU.
pub struct GpuStrategy {
    processor: Arc<GpuImageProcessor>,
}

impl std::fmt::Debug for GpuStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuStrategy")
            .field("adapter", &self.processor.adapter_name())
            .finish()
    }
}

impl GpuStrategy {
    /// Fails with [`LayercastError::GpuUnavailable`] when no adapter can be opened and with
    /// [`LayercastError::Timeout`] when device setup stalls.
    pub fn new(timeout: Duration) -> LayercastResult<Self> {
        let processor = GpuImageProcessor::new(timeout)?;
        tracing::info!(adapter = processor.adapter_name(), "gpu strategy ready");
        Ok(Self {
            processor: Arc::new(processor),
        })
    }
}

impl RenderStrategy for GpuStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Gpu
    }

    fn processor(&self) -> Arc<dyn ImageProcessor> {
        self.processor.clone()
    }

    fn render_chunk(
        &self,
        inputs: &RenderInputs,
        frames: &[FrameIndex],
        cancel: &CancellationToken,
    ) -> LayercastResult<Vec<RenderedFrame>> {
        let compositor = inputs.compositor(self.processor())?;
        render_sequential(&compositor, inputs, frames, cancel)
    }
}

/// Build the strategy for `kind`. GPU initialisation failure is returned, not downgraded.
pub fn create_strategy(
    kind: StrategyKind,
    optimized: &OptimizedOpts,
    gpu_timeout: Duration,
) -> LayercastResult<Arc<dyn RenderStrategy>> {
    Ok(match kind {
        StrategyKind::Cpu => Arc::new(CpuStrategy::new()),
        StrategyKind::Optimized => Arc::new(OptimizedStrategy::new(optimized.clone())?),
        StrategyKind::Gpu => Arc::new(GpuStrategy::new(gpu_timeout)?),
    })
}

fn build_thread_pool(threads: Option<usize>) -> LayercastResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(LayercastError::validation(
            "render workers must be >= 1 when set",
        ));
    }
    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("layercast-render-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| LayercastError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/strategy.rs"]
mod tests;
