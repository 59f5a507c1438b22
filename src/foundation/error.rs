pub type LayercastResult<T> = Result<T, LayercastError>;

#[derive(thiserror::Error, Debug)]
pub enum LayercastError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("planning error for layer '{layer_id}': {reason}")]
    Planning { layer_id: String, reason: String },

    #[error("gpu unavailable: {0}")]
    GpuUnavailable(String),

    #[error("encoder error (frame {frame:?}): {reason}")]
    Encoder { frame: Option<u64>, reason: String },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("render error at frame {frame}: {reason}")]
    Render { frame: u64, reason: String },

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LayercastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn planning(layer_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Planning {
            layer_id: layer_id.into(),
            reason: reason.into(),
        }
    }

    pub fn gpu_unavailable(msg: impl Into<String>) -> Self {
        Self::GpuUnavailable(msg.into())
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            frame: None,
            reason: msg.into(),
        }
    }

    pub fn encoder_at(frame: u64, msg: impl Into<String>) -> Self {
        Self::Encoder {
            frame: Some(frame),
            reason: msg.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn render(frame: u64, msg: impl Into<String>) -> Self {
        Self::Render {
            frame,
            reason: msg.into(),
        }
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Failure of the pixel backend itself: a hung call, a lost GPU or a broken render.
    ///
    /// These abort the render. Other errors stay local to the layer that raised them.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::GpuUnavailable(_) | Self::Render { .. }
        )
    }

    /// Short stable name of the failure category, used in progress messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Planning { .. } => "planning",
            Self::GpuUnavailable(_) => "gpu_unavailable",
            Self::Encoder { .. } => "encoder",
            Self::Timeout(_) => "timeout",
            Self::Render { .. } => "render",
            Self::Serde(_) => "serde",
            Self::Other(_) => "other",
        }
    }
}

impl From<serde_json::Error> for LayercastError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
