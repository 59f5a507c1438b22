use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::composite::cache::CacheStats;
use crate::encode::encoder::{EncodeConfig, VideoEncoder};
use crate::encode::worker::EncoderWorker;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::progress::{NullProgress, ProgressEvent, ProgressSink};
use crate::pipeline::state::{JobLifecycle, JobState};
use crate::pipeline::strategy::{RenderInputs, RenderStrategy, RenderedFrame};
use crate::scene::layer::LayerId;

/// What to do with frames before anything starts to move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadInPolicy {
    /// Composite the first lead-in frame and repeat it.
    #[default]
    Reuse,
    /// Composite every frame as usual.
    Render,
    /// Do not write lead-in frames at all; the video starts at the first action.
    Skip,
}

/// Knobs of the frame loop that are not strategy specific.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderOpts {
    /// Frames queued between the render loop and the encoder thread.
    pub channel_capacity: usize,
    pub encoder_timeout_secs: f64,
    pub lead_in: LeadInPolicy,
    /// Straight-alpha colour frames are flattened over before encoding.
    pub bg_rgba: [u8; 4],
    pub overwrite: bool,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            channel_capacity: 8,
            encoder_timeout_secs: 30.0,
            lead_in: LeadInPolicy::Reuse,
            bg_rgba: [0, 0, 0, 255],
            overwrite: true,
        }
    }
}

impl RenderOpts {
    pub fn validate(&self) -> LayercastResult<()> {
        if !(self.encoder_timeout_secs.is_finite() && self.encoder_timeout_secs > 0.0) {
            return Err(LayercastError::validation(
                "encoder_timeout_secs must be finite and > 0",
            ));
        }
        Ok(())
    }

    pub fn encoder_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.encoder_timeout_secs)
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct RenderStats {
    pub frames_total: u64,
    /// Frames composited from scratch.
    pub frames_rendered: u64,
    /// Frames reused from an identical earlier frame.
    pub frames_elided: u64,
    /// Lead-in frames that needed no composite work.
    pub frames_skipped: u64,
    pub missing_assets: Vec<LayerId>,
    pub failed_layers: Vec<LayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
    pub elapsed_secs: f64,
}

/// Outcome of a job that did not fail.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RenderReport {
    /// `Completed` or `Cancelled`.
    pub state: JobState,
    pub frames_written: u64,
    pub total_frames: u64,
    /// Set only for a completed job.
    pub output_path: Option<PathBuf>,
    pub stats: RenderStats,
}

/// One render: drives a strategy over every frame and streams the results to an encoder.
///
/// Frames reach the encoder in strictly increasing index order whatever order the strategy
/// computes them in. Cancellation is checked between frames; a cancelled or failed job aborts
/// the encoder, so no partial file is ever presented as complete.
pub struct RenderJob {
    inputs: RenderInputs,
    strategy: Arc<dyn RenderStrategy>,
    encoder: Arc<dyn VideoEncoder>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    opts: RenderOpts,
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("inputs", &self.inputs)
            .field("strategy", &self.strategy.kind())
            .field("encoder", &self.encoder.name())
            .field("opts", &self.opts)
            .finish()
    }
}

struct Run<'a> {
    lifecycle: JobLifecycle,
    progress: &'a dyn ProgressSink,
    total: u64,
    current: u64,
    written: u64,
}

impl Run<'_> {
    fn advance(&mut self, next: JobState, message: impl Into<String>) -> LayercastResult<()> {
        self.lifecycle.advance(next)?;
        self.progress.report(&ProgressEvent {
            state: next,
            current_frame: self.current,
            total_frames: self.total,
            message: message.into(),
        });
        Ok(())
    }
}

impl RenderJob {
    pub fn new(
        inputs: RenderInputs,
        strategy: Arc<dyn RenderStrategy>,
        encoder: Arc<dyn VideoEncoder>,
    ) -> Self {
        Self {
            inputs,
            strategy,
            encoder,
            progress: Arc::new(NullProgress),
            cancel: CancellationToken::new(),
            opts: RenderOpts::default(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_opts(mut self, opts: RenderOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Render every frame to `out_path`.
    ///
    /// Returns `Ok` for completed and cancelled jobs (see [`RenderReport::state`]); every other
    /// outcome is an error, after the job has moved to [`JobState::Error`].
    #[tracing::instrument(
        skip_all,
        fields(strategy = self.strategy.kind().as_str(), out = %out_path.display())
    )]
    pub fn run(&self, out_path: PathBuf) -> LayercastResult<RenderReport> {
        let progress = Arc::clone(&self.progress);
        let mut run = Run {
            lifecycle: JobLifecycle::new(),
            progress: progress.as_ref(),
            total: self.inputs.total_frames(),
            current: 0,
            written: 0,
        };
        let started = Instant::now();
        let mut stats = RenderStats {
            frames_total: run.total,
            ..RenderStats::default()
        };

        let mut worker = None;
        let result = self.drive(&mut run, &mut stats, &mut worker, out_path);
        stats.cache = self.strategy.cache_stats();
        stats.elapsed_secs = started.elapsed().as_secs_f64();

        match result {
            Ok(Some(path)) => {
                run.advance(JobState::Completed, format!("wrote {}", path.display()))?;
                tracing::info!(
                    frames = run.written,
                    rendered = stats.frames_rendered,
                    elided = stats.frames_elided,
                    skipped = stats.frames_skipped,
                    secs = stats.elapsed_secs,
                    "render completed"
                );
                Ok(RenderReport {
                    state: JobState::Completed,
                    frames_written: run.written,
                    total_frames: run.total,
                    output_path: Some(path),
                    stats,
                })
            }
            Ok(None) => {
                if let Some(w) = worker.take() {
                    w.abort();
                }
                run.advance(JobState::Cancelled, "cancelled")?;
                tracing::info!(frames = run.written, "render cancelled");
                Ok(RenderReport {
                    state: JobState::Cancelled,
                    frames_written: run.written,
                    total_frames: run.total,
                    output_path: None,
                    stats,
                })
            }
            Err(e) => {
                if let Some(w) = worker.take() {
                    w.abort();
                }
                // Best effort: the job is failing either way.
                let _ = run.advance(JobState::Error, format!("{}: {e}", e.kind()));
                Err(e)
            }
        }
    }

    /// `Ok(None)` means cancelled.
    fn drive(
        &self,
        run: &mut Run<'_>,
        stats: &mut RenderStats,
        worker_slot: &mut Option<EncoderWorker>,
        out_path: PathBuf,
    ) -> LayercastResult<Option<PathBuf>> {
        run.advance(JobState::Initializing, "initializing")?;
        self.opts.validate()?;
        let size = self.inputs.output_size()?;
        let mut cfg = EncodeConfig::new(out_path, size.width, size.height, self.inputs.fps);
        cfg.bg_rgba = self.opts.bg_rgba;
        cfg.overwrite = self.opts.overwrite;
        let session = self.encoder.open(&cfg)?;
        let worker = worker_slot.insert(EncoderWorker::spawn(
            session,
            self.opts.channel_capacity,
            self.opts.encoder_timeout(),
        )?);
        tracing::info!(
            frames = run.total,
            width = size.width,
            height = size.height,
            strategy = self.strategy.kind().as_str(),
            encoder = self.encoder.name(),
            "render started"
        );
        run.advance(JobState::RenderingLoop, "rendering")?;

        let lead_in = match self.opts.lead_in {
            LeadInPolicy::Render => 0,
            LeadInPolicy::Reuse | LeadInPolicy::Skip => self.inputs.lead_in_frames(),
        };
        let mut blank: Option<Arc<crate::raster::buffer::Raster>> = None;
        let mut missing = BTreeSet::new();
        let mut failed = BTreeSet::new();

        let chunk = self.strategy.chunk_size().max(1) as u64;
        let mut next = 0u64;
        while next < run.total {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }

            if next < lead_in {
                let index = FrameIndex(next);
                run.current = next;
                run.advance(JobState::Skipping, format!("lead-in frame {next}"))?;
                stats.frames_skipped += 1;
                if self.opts.lead_in == LeadInPolicy::Reuse {
                    let image = match &blank {
                        Some(img) => Arc::clone(img),
                        None => {
                            let Some(first) = self.render_chunk(&[index])?.pop() else {
                                return Ok(None);
                            };
                            collect(&first, &mut missing, &mut failed);
                            blank.insert(first.image).clone()
                        }
                    };
                    worker.submit(index, image)?;
                    run.written += 1;
                }
                run.current = next + 1;
                run.advance(JobState::RenderingLoop, "rendering")?;
                next += 1;
                continue;
            }

            let end = (next + chunk).min(run.total);
            let indices: Vec<FrameIndex> = (next..end).map(FrameIndex).collect();
            run.advance(
                JobState::ProcessingFrame,
                format!("frames {next}..{end}"),
            )?;
            let frames = self.render_chunk(&indices)?;
            tracing::debug!(from = next, to = end, produced = frames.len(), "chunk rendered");

            let expected = indices.len();
            let produced = frames.len();
            let mut expected_index = next;
            for (i, frame) in frames.into_iter().enumerate() {
                if frame.index.0 != expected_index {
                    return Err(LayercastError::render(
                        frame.index.0,
                        format!(
                            "strategy returned frame {} where {expected_index} was due",
                            frame.index.0
                        ),
                    ));
                }
                if i > 0 {
                    run.advance(JobState::RenderingLoop, "rendering")?;
                    run.advance(JobState::ProcessingFrame, format!("frame {expected_index}"))?;
                }
                run.advance(JobState::Saving, format!("frame {expected_index}"))?;
                if frame.elided {
                    stats.frames_elided += 1;
                } else {
                    stats.frames_rendered += 1;
                }
                collect(&frame, &mut missing, &mut failed);
                worker.submit(frame.index, frame.image)?;
                run.written += 1;
                run.current = expected_index + 1;
                expected_index += 1;

                if self.cancel.is_cancelled() {
                    return Ok(None);
                }
            }
            if produced == 0 {
                // Nothing came back: the chunk saw the cancellation first.
                return if self.cancel.is_cancelled() {
                    Ok(None)
                } else {
                    Err(LayercastError::render(next, "strategy produced no frames"))
                };
            }
            run.advance(JobState::RenderingLoop, "rendering")?;
            if produced < expected {
                if self.cancel.is_cancelled() {
                    return Ok(None);
                }
                return Err(LayercastError::render(
                    expected_index,
                    "strategy stopped before the end of the chunk",
                ));
            }
            next = end;
        }

        stats.missing_assets = missing.into_iter().collect();
        stats.failed_layers = failed.into_iter().collect();
        for id in &stats.missing_assets {
            tracing::warn!(layer = %id, "layer rendered without its raster");
        }

        let worker = worker_slot
            .take()
            .ok_or_else(|| LayercastError::render(run.current, "encoder worker missing"))?;
        worker.finish().map(Some)
    }

    fn render_chunk(&self, indices: &[FrameIndex]) -> LayercastResult<Vec<RenderedFrame>> {
        self.strategy
            .render_chunk(&self.inputs, indices, &self.cancel)
    }
}

fn collect(frame: &RenderedFrame, missing: &mut BTreeSet<LayerId>, failed: &mut BTreeSet<LayerId>) {
    missing.extend(frame.diagnostics.missing_assets.iter().cloned());
    failed.extend(frame.diagnostics.failed.iter().cloned());
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/orchestrator.rs"]
mod tests;
