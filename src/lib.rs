//! Layercast turns a layered design document into a short "being designed" video.
//!
//! A job runs in four stages:
//!
//! - Plan: classify layers and lay out a [`Timeline`] of drag-in, brush-reveal and background
//!   actions.
//! - Animate: evaluate per-layer state at any instant as a pure function of the timeline.
//! - Composite: draw every layer through opacity, reveal mask and blur passes onto a canvas.
//! - Encode: stream frames in order to a [`VideoEncoder`] from a [`RenderJob`].
#![forbid(unsafe_code)]

pub mod animation;
pub mod composite;
pub mod config;
pub mod encode;
pub mod foundation;
pub mod pipeline;
pub mod raster;
pub mod reveal;
pub mod scene;

pub use crate::foundation::core::{
    Affine, FrameIndex, FrameRange, Fps, Point, Rect, Rgba8Premul, Size, TimeRange, Vec2,
};
pub use crate::foundation::error::{LayercastError, LayercastResult};

pub use crate::animation::ease::Ease;
pub use crate::animation::planner::{PlannerConfig, TimingConfig};
pub use crate::animation::state::{FrameStates, LayerAnimState, frame_states, state_at};
pub use crate::animation::timeline::{Action, CameraMove, SequencingStrategy, Timeline};
pub use crate::composite::compositor::{CompositeFrame, CompositorOptions, FrameCompositor};
pub use crate::config::job::JobConfig;
pub use crate::encode::encoder::{EncodeConfig, EncoderSession, InMemoryEncoder, VideoEncoder};
pub use crate::encode::ffmpeg::FfmpegEncoder;
pub use crate::pipeline::cancel::CancellationToken;
pub use crate::pipeline::orchestrator::{
    LeadInPolicy, RenderJob, RenderOpts, RenderReport, RenderStats,
};
pub use crate::pipeline::progress::{ProgressEvent, ProgressSink, TracingProgress};
pub use crate::pipeline::state::JobState;
pub use crate::pipeline::strategy::{
    CpuStrategy, GpuStrategy, OptimizedOpts, OptimizedStrategy, RenderInputs, RenderStrategy,
    StrategyKind, create_strategy, render_still,
};
pub use crate::raster::buffer::Raster;
pub use crate::scene::camera::{Camera, Viewport};
pub use crate::scene::layer::{ActionType, Layer, LayerId};
pub use crate::scene::world::{DocumentSource, ManifestDocumentSource, World};
