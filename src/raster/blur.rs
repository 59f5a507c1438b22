use crate::foundation::core::Vec2;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::buffer::rgba_len;

/// Longest motion-blur streak in pixels.
pub const MAX_MOTION_KERNEL_PX: u32 = 50;

/// Gaussian radius covering three standard deviations.
pub fn radius_for_sigma(sigma: f32) -> u32 {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0;
    }
    (sigma * 3.0).ceil() as u32
}

/// Separable Gaussian blur over premultiplied RGBA8 with clamped edges.
pub fn gaussian_blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    sigma: f32,
) -> LayercastResult<Vec<u8>> {
    let expected_len = rgba_len(width, height)?;
    if src.len() != expected_len {
        return Err(LayercastError::validation(
            "gaussian_blur expects src matching width*height*4",
        ));
    }
    let radius = radius_for_sigma(sigma);
    if radius == 0 || width == 0 || height == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    horizontal_pass(src, &mut tmp, width, height, &kernel);
    vertical_pass(&tmp, &mut out, width, height, &kernel);
    Ok(out)
}

/// Kernel length for a streak of `speed_px` pixels per frame.
pub fn motion_kernel_len(speed_px: f64) -> u32 {
    if !speed_px.is_finite() || speed_px <= 0.0 {
        return 0;
    }
    ((speed_px * 0.5).round() as u32).min(MAX_MOTION_KERNEL_PX)
}

/// Directional box blur along `velocity`.
///
/// The output is padded by `pad` pixels on every side so the streak is not clipped; callers shift
/// the placement by `-pad`. Samples outside the source are transparent.
pub fn motion_blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    velocity: Vec2,
) -> LayercastResult<(Vec<u8>, u32, u32, u32)> {
    let expected_len = rgba_len(width, height)?;
    if src.len() != expected_len {
        return Err(LayercastError::validation(
            "motion_blur expects src matching width*height*4",
        ));
    }
    let speed = velocity.hypot();
    let k = motion_kernel_len(speed);
    if k <= 1 {
        return Ok((src.to_vec(), width, height, 0));
    }

    let pad = k / 2 + 2;
    let out_w = width + 2 * pad;
    let out_h = height + 2 * pad;
    let mut out = vec![0u8; rgba_len(out_w, out_h)?];
    let dir = velocity / speed;
    let taps: Vec<(i64, i64)> = (0..k)
        .map(|i| {
            let t = f64::from(i) - f64::from(k - 1) / 2.0;
            ((dir.x * t).round() as i64, (dir.y * t).round() as i64)
        })
        .collect();

    let (w, h) = (i64::from(width), i64::from(height));
    for oy in 0..out_h {
        for ox in 0..out_w {
            let cx = i64::from(ox) - i64::from(pad);
            let cy = i64::from(oy) - i64::from(pad);
            let mut acc = [0u32; 4];
            for &(dx, dy) in &taps {
                let sx = cx + dx;
                let sy = cy + dy;
                if sx < 0 || sy < 0 || sx >= w || sy >= h {
                    continue;
                }
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u32::from(src[idx + c]);
                }
            }
            let out_idx = ((oy as usize) * (out_w as usize) + (ox as usize)) * 4;
            for c in 0..4 {
                out[out_idx + c] = ((acc[c] + k / 2) / k).min(255) as u8;
            }
        }
    }
    Ok((out, out_w, out_h, pad))
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> LayercastResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(LayercastError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Rounding drift goes to the centre tap so weights sum to exactly 1.0 in Q16.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/raster/blur.rs"]
mod tests;
