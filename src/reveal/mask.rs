use crate::animation::motion::brush_cursor;
use crate::animation::state::BrushStroke;
use crate::animation::timeline::BrushPath;
use crate::foundation::core::Size;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::foundation::math::{smoothstep, unit_to_u8};
use crate::raster::buffer::AlphaMask;

/// Default soft-edge width in pixels.
pub const DEFAULT_SOFTNESS_PX: f64 = 15.0;

/// Swept brush footprint relative to the layer's longer edge.
const SWEEP_LONG_EDGE_FACTOR: f64 = 0.55;
/// Band paths stay within `[0.15h, 0.85h]`; this reach covers the full height from any of them.
const SWEEP_HEIGHT_FACTOR: f64 = 0.85;
/// Path samples per pixel of horizontal travel.
const SAMPLES_PER_PX: f64 = 2.0;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Width of the soft edge in pixels; 0 gives a hard edge.
    pub softness: f64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            softness: DEFAULT_SOFTNESS_PX,
        }
    }
}

impl RevealConfig {
    pub fn validate(&self) -> LayercastResult<()> {
        if !self.softness.is_finite() || self.softness < 0.0 {
            return Err(LayercastError::validation("reveal softness must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Shape parameters of one reveal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevealParams {
    pub path: BrushPath,
    /// Brush cursor radius in layer pixels.
    pub radius: f64,
    pub softness: f64,
}

impl RevealParams {
    pub fn new(path: BrushPath, radius: f64, softness: f64) -> Self {
        Self {
            path,
            radius,
            softness: softness.max(0.0),
        }
    }

    pub fn for_stroke(stroke: &BrushStroke, softness: f64) -> Self {
        Self::new(stroke.path, stroke.radius, softness)
    }

    /// Radius of the disc swept along band paths.
    pub fn sweep_radius(&self, size: Size) -> f64 {
        let long = size.width.max(size.height);
        self.radius
            .max(SWEEP_LONG_EDGE_FACTOR * long)
            .max(SWEEP_HEIGHT_FACTOR * size.height)
    }
}

/// Visibility of a layer under a reveal.
#[derive(Clone, Debug, PartialEq)]
pub enum RevealMask {
    /// Nothing shown yet.
    Hidden,
    /// Fully shown; the layer can be drawn unmasked.
    Full,
    Partial(AlphaMask),
}

impl RevealMask {
    /// Number of pixels with non-zero weight.
    pub fn visible_count(&self, width: u32, height: u32) -> u64 {
        match self {
            Self::Hidden => 0,
            Self::Full => u64::from(width) * u64::from(height),
            Self::Partial(m) => m.data.iter().filter(|&&v| v > 0).count() as u64,
        }
    }
}

/// Mask for a `width x height` layer at reveal `progress`.
///
/// `progress <= 0` is [`RevealMask::Hidden`] and `progress >= 1` is [`RevealMask::Full`].
/// In between, the revealed area only grows with progress.
pub fn mask_for(width: u32, height: u32, progress: f64, params: &RevealParams) -> RevealMask {
    if progress.is_nan() || progress <= 0.0 {
        return RevealMask::Hidden;
    }
    if progress >= 1.0 {
        return RevealMask::Full;
    }
    let data = match params.path {
        BrushPath::Straight => column_sweep(width, height, progress, params.softness),
        _ => band_sweep(width, height, progress, params),
    };
    RevealMask::Partial(AlphaMask {
        width,
        height,
        data,
    })
}

/// Weight in `[0, 1]` of a straight sweep at column centre `x`.
pub fn column_weight(width: f64, progress: f64, softness: f64, x: f64) -> f64 {
    let front = progress * (width + 2.0 * softness) - softness;
    1.0 - smoothstep(front - softness, front + softness, x)
}

fn column_sweep(width: u32, height: u32, progress: f64, softness: f64) -> Vec<u8> {
    let row: Vec<u8> = (0..width)
        .map(|x| {
            unit_to_u8(column_weight(
                f64::from(width),
                progress,
                softness,
                f64::from(x) + 0.5,
            ))
        })
        .collect();
    let mut data = Vec::with_capacity(row.len() * height as usize);
    for _ in 0..height {
        data.extend_from_slice(&row);
    }
    data
}

/// Union of discs swept along the brush path, evaluated per column as vertical chords.
fn band_sweep(width: u32, height: u32, progress: f64, params: &RevealParams) -> Vec<u8> {
    let size = Size::new(f64::from(width), f64::from(height));
    let r = params.sweep_radius(size);
    let soft = params.softness;
    let travel = size.width + 2.0 * r;
    let steps = (travel * SAMPLES_PER_PX).ceil().max(1.0);

    // Centres share the cursor's vertical path but travel from -r to w + r.
    let mut centres = Vec::new();
    let mut i = 0.0;
    loop {
        let s = (i / steps).min(progress);
        let y = brush_cursor(size, s, params.path, params.radius).y;
        centres.push((-r + s * travel, y));
        if s >= progress {
            break;
        }
        i += 1.0;
    }

    let w = width as usize;
    let mut data = vec![0u8; w * height as usize];
    let mut chords: Vec<(f64, f64)> = Vec::new();
    for x in 0..width {
        let xc = f64::from(x) + 0.5;
        chords.clear();
        for &(cx, cy) in &centres {
            let dx = (cx - xc).abs();
            if dx < r {
                let half = (r * r - dx * dx).sqrt();
                chords.push((cy - half, cy + half));
            }
        }
        if chords.is_empty() {
            continue;
        }
        let merged = merge_intervals(&mut chords);
        for y in 0..height {
            let yc = f64::from(y) + 0.5;
            let weight = 1.0 - smoothstep(-soft, soft, signed_distance(&merged, yc));
            data[y as usize * w + x as usize] = unit_to_u8(weight);
        }
    }
    data
}

fn merge_intervals(chords: &mut [(f64, f64)]) -> Vec<(f64, f64)> {
    chords.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut out: Vec<(f64, f64)> = Vec::new();
    for &(lo, hi) in chords.iter() {
        match out.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => out.push((lo, hi)),
        }
    }
    out
}

/// Negative inside the union (depth to the nearest edge), positive outside (gap to it).
fn signed_distance(intervals: &[(f64, f64)], y: f64) -> f64 {
    let mut outside = f64::INFINITY;
    for &(lo, hi) in intervals {
        if y >= lo && y <= hi {
            return -(y - lo).min(hi - y);
        }
        outside = outside.min(if y < lo { lo - y } else { y - hi });
    }
    outside
}

#[cfg(test)]
#[path = "../../tests/unit/reveal/mask.rs"]
mod tests;
