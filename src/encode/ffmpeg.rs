use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::Context as _;

use crate::encode::encoder::{EncodeConfig, EncoderSession, VideoEncoder, check_order, check_size};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::foundation::math::mul_div255_u16;
use crate::raster::buffer::Raster;

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> LayercastResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// H.264 MP4 through the system `ffmpeg` binary, fed raw RGBA over stdin.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegEncoder;

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn open(&self, cfg: &EncodeConfig) -> LayercastResult<Box<dyn EncoderSession>> {
        cfg.validate()?;
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            // yuv420p output needs even dimensions.
            return Err(LayercastError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        ensure_parent_dir(&cfg.out_path)?;
        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(LayercastError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(LayercastError::encoder(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if cfg.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            LayercastError::encoder(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LayercastError::encoder("failed to open ffmpeg stdin"))?;
        tracing::debug!(
            path = %cfg.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            "ffmpeg started"
        );

        Ok(Box::new(FfmpegSession {
            scratch: vec![0u8; cfg.width as usize * cfg.height as usize * 4],
            cfg: cfg.clone(),
            child,
            stdin: Some(stdin),
            last: None,
            written: 0,
        }))
    }
}

struct FfmpegSession {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
    last: Option<FrameIndex>,
    written: u64,
}

fn discard_output(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial output");
    }
}

impl EncoderSession for FfmpegSession {
    fn write_frame(&mut self, index: FrameIndex, frame: &Raster) -> LayercastResult<()> {
        check_order(self.last, index)?;
        check_size(&self.cfg, index, frame)?;
        flatten_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.cfg.bg_rgba,
        )?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(LayercastError::encoder_at(
                index.0,
                "ffmpeg encoder is already finalized",
            ));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            LayercastError::encoder_at(
                index.0,
                format!("failed to write frame to ffmpeg stdin: {e}"),
            )
        })?;
        self.last = Some(index);
        self.written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn close(self: Box<Self>) -> LayercastResult<PathBuf> {
        let FfmpegSession {
            cfg,
            child,
            stdin,
            written,
            ..
        } = *self;
        drop(stdin);
        let output = child
            .wait_with_output()
            .map_err(|e| LayercastError::encoder(format!("failed to wait for ffmpeg: {e}")))?;
        if written == 0 {
            discard_output(&cfg.out_path);
            return Err(LayercastError::encoder("no frames were written"));
        }
        if !output.status.success() {
            discard_output(&cfg.out_path);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LayercastError::encoder(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(cfg.out_path)
    }

    fn abort(mut self: Box<Self>) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
        let _ = self.child.wait();
        discard_output(&self.cfg.out_path);
    }
}

/// Flatten RGBA8 over `bg_rgba`, producing opaque pixels.
pub fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> LayercastResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(LayercastError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }
    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            let fg = if src_is_premul {
                u16::from(s[c])
            } else {
                mul_div255_u16(u16::from(s[c]), a)
            };
            d[c] = (fg + mul_div255_u16(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
