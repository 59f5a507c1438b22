use crate::foundation::error::{LayercastError, LayercastResult};

/// Lifecycle of one render job.
///
/// ```text
/// Idle -> Initializing -> RenderingLoop -> Completed
/// RenderingLoop -> ProcessingFrame -> Saving -> RenderingLoop
/// RenderingLoop -> Skipping -> RenderingLoop
/// any non-terminal -> Error | Cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Initializing,
    RenderingLoop,
    /// Lead-in frame that needs no composite work.
    Skipping,
    ProcessingFrame,
    Saving,
    Completed,
    Cancelled,
    Error,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Error | Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Initializing, RenderingLoop)
                | (RenderingLoop, ProcessingFrame)
                | (RenderingLoop, Skipping)
                | (RenderingLoop, Completed)
                | (Skipping, RenderingLoop)
                | (ProcessingFrame, Saving)
                | (Saving, RenderingLoop)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::RenderingLoop => "rendering_loop",
            Self::Skipping => "skipping",
            Self::ProcessingFrame => "processing_frame",
            Self::Saving => "saving",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus the transition check.
#[derive(Clone, Debug)]
pub struct JobLifecycle {
    state: JobState,
}

impl Default for JobLifecycle {
    fn default() -> Self {
        Self {
            state: JobState::Idle,
        }
    }
}

impl JobLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn advance(&mut self, next: JobState) -> LayercastResult<JobState> {
        if !self.state.can_transition_to(next) {
            return Err(LayercastError::validation(format!(
                "invalid job transition {} -> {}",
                self.state, next
            )));
        }
        let prev = self.state;
        self.state = next;
        Ok(prev)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/state.rs"]
mod tests;
