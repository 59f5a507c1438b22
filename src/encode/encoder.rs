use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::foundation::core::{FrameIndex, Fps};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::buffer::Raster;

#[derive(Clone, Debug, PartialEq)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub out_path: PathBuf,
    pub overwrite: bool,
    /// Straight-alpha colour transparent pixels are flattened over.
    pub bg_rgba: [u8; 4],
}

impl EncodeConfig {
    pub fn new(out_path: impl Into<PathBuf>, width: u32, height: u32, fps: Fps) -> Self {
        Self {
            width,
            height,
            fps,
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
        }
    }

    pub fn validate(&self) -> LayercastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LayercastError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(LayercastError::validation("encode fps must be non-zero"));
        }
        Ok(())
    }
}

/// Video sink port: opens one session per render.
pub trait VideoEncoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self, cfg: &EncodeConfig) -> LayercastResult<Box<dyn EncoderSession>>;
}

/// One open output.
///
/// Frames arrive in strictly increasing index order. `close` with nothing written fails with
/// an encoder error and leaves no file behind; `abort` discards the partial output.
pub trait EncoderSession: Send {
    fn write_frame(&mut self, index: FrameIndex, frame: &Raster) -> LayercastResult<()>;

    fn frames_written(&self) -> u64;

    fn close(self: Box<Self>) -> LayercastResult<PathBuf>;

    fn abort(self: Box<Self>);
}

/// Reject a frame that does not come strictly after `last`.
pub(crate) fn check_order(last: Option<FrameIndex>, index: FrameIndex) -> LayercastResult<()> {
    match last {
        Some(prev) if index <= prev => Err(LayercastError::encoder_at(
            index.0,
            format!("frame {} arrived after frame {}", index.0, prev.0),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn check_size(
    cfg: &EncodeConfig,
    index: FrameIndex,
    frame: &Raster,
) -> LayercastResult<()> {
    if frame.width != cfg.width || frame.height != cfg.height {
        return Err(LayercastError::encoder_at(
            index.0,
            format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            ),
        ));
    }
    Ok(())
}

/// What an [`InMemoryEncoder`] has received so far.
#[derive(Clone, Debug, Default)]
pub struct EncodedVideo {
    pub config: Option<EncodeConfig>,
    pub frames: Vec<(FrameIndex, Raster)>,
    pub sessions_opened: u32,
    /// Set only by a successful `close`.
    pub completed: bool,
    pub aborted: bool,
}

impl EncodedVideo {
    pub fn indices(&self) -> Vec<u64> {
        self.frames.iter().map(|(i, _)| i.0).collect()
    }
}

/// Encoder that keeps every frame in memory. Clones share one recording.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEncoder {
    record: Arc<Mutex<EncodedVideo>>,
    write_delay: Option<Duration>,
    fail_at: Option<FrameIndex>,
}

impl InMemoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every write, to emulate a slow or stuck sink.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Fail when this frame is written.
    pub fn failing_at(mut self, frame: FrameIndex) -> Self {
        self.fail_at = Some(frame);
        self
    }

    pub fn snapshot(&self) -> EncodedVideo {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VideoEncoder for InMemoryEncoder {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self, cfg: &EncodeConfig) -> LayercastResult<Box<dyn EncoderSession>> {
        cfg.validate()?;
        {
            let mut rec = self.record.lock().unwrap_or_else(PoisonError::into_inner);
            *rec = EncodedVideo {
                config: Some(cfg.clone()),
                sessions_opened: rec.sessions_opened + 1,
                ..EncodedVideo::default()
            };
        }
        Ok(Box::new(InMemorySession {
            cfg: cfg.clone(),
            encoder: self.clone(),
            last: None,
            written: 0,
        }))
    }
}

struct InMemorySession {
    cfg: EncodeConfig,
    encoder: InMemoryEncoder,
    last: Option<FrameIndex>,
    written: u64,
}

impl EncoderSession for InMemorySession {
    fn write_frame(&mut self, index: FrameIndex, frame: &Raster) -> LayercastResult<()> {
        check_order(self.last, index)?;
        check_size(&self.cfg, index, frame)?;
        if let Some(delay) = self.encoder.write_delay {
            std::thread::sleep(delay);
        }
        if self.encoder.fail_at == Some(index) {
            return Err(LayercastError::encoder_at(index.0, "injected write failure"));
        }
        self.encoder
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frames
            .push((index, frame.clone()));
        self.last = Some(index);
        self.written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn close(self: Box<Self>) -> LayercastResult<PathBuf> {
        if self.written == 0 {
            return Err(LayercastError::encoder("no frames were written"));
        }
        self.encoder
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .completed = true;
        Ok(self.cfg.out_path)
    }

    fn abort(self: Box<Self>) {
        self.encoder
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .aborted = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
