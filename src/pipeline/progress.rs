use crossbeam_channel::{Sender, TrySendError};

use crate::pipeline::state::JobState;

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ProgressEvent {
    pub state: JobState,
    pub current_frame: u64,
    pub total_frames: u64,
    pub message: String,
}

impl ProgressEvent {
    /// Completed fraction in `[0, 1]`; 0 when the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.current_frame as f64 / self.total_frames as f64).clamp(0.0, 1.0)
    }
}

/// Progress port. Called from the render loop, so implementations must return promptly.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Logs state changes at `info` and per-frame progress at `debug`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: &ProgressEvent) {
        match event.state {
            JobState::ProcessingFrame | JobState::Saving | JobState::Skipping => {
                tracing::debug!(
                    state = %event.state,
                    frame = event.current_frame,
                    total = event.total_frames,
                    "{}",
                    event.message
                );
            }
            JobState::Error => tracing::error!(
                frame = event.current_frame,
                total = event.total_frames,
                "{}",
                event.message
            ),
            _ => tracing::info!(
                state = %event.state,
                frame = event.current_frame,
                total = event.total_frames,
                "{}",
                event.message
            ),
        }
    }
}

/// Adapts a closure.
pub struct FnProgress<F>(pub F);

impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        (self.0)(event)
    }
}

/// Forwards events to a channel without blocking; events that do not fit are dropped.
#[derive(Clone, Debug)]
pub struct ChannelProgress {
    tx: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: &ProgressEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!(
                    frame = event.current_frame,
                    "progress channel full; event dropped"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/progress.rs"]
mod tests;
