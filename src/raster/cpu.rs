use crate::foundation::core::{Affine, Point, Rect, Rgba8Premul, Vec2};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::blend::{opacity_u8, over_q, scale_px};
use crate::raster::blur::{gaussian_blur_rgba8_premul, motion_blur_rgba8_premul};
use crate::raster::buffer::{AlphaMask, Raster};
use crate::raster::processor::{ImageProcessor, Padded, ShapeStyle};

/// Reference CPU implementation of [`ImageProcessor`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuImageProcessor;

impl CpuImageProcessor {
    pub fn new() -> Self {
        Self
    }
}

fn require_premul(img: &Raster, what: &str) -> LayercastResult<()> {
    if !img.premultiplied {
        return Err(LayercastError::validation(format!(
            "{what} expects a premultiplied raster"
        )));
    }
    Ok(())
}

/// Pixel window `[x0, x1) x [y0, y1)` of `bounds` clipped to a `w x h` image.
pub(crate) fn clip_to_image(bounds: Rect, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = bounds.x0.floor().max(0.0);
    let y0 = bounds.y0.floor().max(0.0);
    let x1 = bounds.x1.ceil().min(f64::from(w));
    let y1 = bounds.y1.ceil().min(f64::from(h));
    if !(x0 < x1 && y0 < y1) {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

fn put_over(img: &mut Raster, x: u32, y: u32, color: [u8; 4], coverage: f64) {
    let op = opacity_u8(coverage as f32);
    if op == 0 {
        return;
    }
    let i = ((y as usize) * (img.width as usize) + (x as usize)) * 4;
    let d = [img.data[i], img.data[i + 1], img.data[i + 2], img.data[i + 3]];
    img.data[i..i + 4].copy_from_slice(&over_q(d, color, op));
}

impl ImageProcessor for CpuImageProcessor {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn new_canvas(&self, width: u32, height: u32, fill: Rgba8Premul) -> Raster {
        Raster::filled(width, height, fill)
    }

    fn premultiply(&self, src: &Raster) -> Raster {
        if src.premultiplied {
            return src.clone();
        }
        let mut data = Vec::with_capacity(src.data.len());
        for px in src.data.chunks_exact(4) {
            data.extend_from_slice(
                &Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3]).to_array(),
            );
        }
        Raster {
            width: src.width,
            height: src.height,
            data,
            premultiplied: true,
        }
    }

    fn apply_opacity(&self, img: &mut Raster, opacity: f32) {
        let op = opacity_u8(opacity);
        if op == 255 {
            return;
        }
        for px in img.data.chunks_exact_mut(4) {
            scale_px(px, op);
        }
    }

    fn apply_mask(&self, img: &mut Raster, mask: &AlphaMask) -> LayercastResult<()> {
        require_premul(img, "apply_mask")?;
        if mask.width != img.width || mask.height != img.height {
            return Err(LayercastError::validation(format!(
                "mask {}x{} does not match raster {}x{}",
                mask.width, mask.height, img.width, img.height
            )));
        }
        for (px, &m) in img.data.chunks_exact_mut(4).zip(mask.data.iter()) {
            scale_px(px, u16::from(m));
        }
        Ok(())
    }

    fn gaussian_blur(&self, img: &Raster, sigma: f32) -> LayercastResult<Raster> {
        require_premul(img, "gaussian_blur")?;
        let data = gaussian_blur_rgba8_premul(&img.data, img.width, img.height, sigma)?;
        Raster::new(img.width, img.height, data, true)
    }

    fn motion_blur(&self, img: &Raster, velocity: Vec2) -> LayercastResult<Padded> {
        require_premul(img, "motion_blur")?;
        let (data, w, h, pad) =
            motion_blur_rgba8_premul(&img.data, img.width, img.height, velocity)?;
        Ok(Padded {
            raster: Raster::new(w, h, data, true)?,
            pad,
        })
    }

    fn draw_ellipse(
        &self,
        img: &mut Raster,
        center: Point,
        radius: f64,
        color: Rgba8Premul,
        style: ShapeStyle,
    ) {
        if !(radius.is_finite() && radius > 0.0) {
            return;
        }
        let reach = match style {
            ShapeStyle::Fill => radius + 1.0,
            ShapeStyle::Stroke { width } => radius + width / 2.0 + 1.0,
        };
        let bounds = Rect::new(
            center.x - reach,
            center.y - reach,
            center.x + reach,
            center.y + reach,
        );
        let Some((x0, y0, x1, y1)) = clip_to_image(bounds, img.width, img.height) else {
            return;
        };
        let color = color.to_array();
        for y in y0..y1 {
            for x in x0..x1 {
                let d = (Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5) - center).hypot();
                // One pixel of linear falloff for anti-aliasing.
                let coverage = match style {
                    ShapeStyle::Fill => (radius + 0.5 - d).clamp(0.0, 1.0),
                    ShapeStyle::Stroke { width } => {
                        (width / 2.0 + 0.5 - (d - radius).abs()).clamp(0.0, 1.0)
                    }
                };
                if coverage > 0.0 {
                    put_over(img, x, y, color, coverage);
                }
            }
        }
    }

    fn draw_rect(&self, img: &mut Raster, rect: Rect, color: Rgba8Premul, style: ShapeStyle) {
        let rect = rect.abs();
        let (outer, inner) = match style {
            ShapeStyle::Fill => (rect, None),
            ShapeStyle::Stroke { width } => {
                let hw = width.max(0.0) / 2.0;
                let inner = rect.inset(-hw);
                let inner = (inner.width() > 0.0 && inner.height() > 0.0).then_some(inner);
                (rect.inset(hw), inner)
            }
        };
        let Some((x0, y0, x1, y1)) = clip_to_image(outer, img.width, img.height) else {
            return;
        };
        let color = color.to_array();
        for y in y0..y1 {
            for x in x0..x1 {
                let c = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if !outer.contains(c) || inner.is_some_and(|r| r.contains(c)) {
                    continue;
                }
                put_over(img, x, y, color, 1.0);
            }
        }
    }

    fn blend(
        &self,
        dst: &mut Raster,
        src: &Raster,
        placement: Affine,
        opacity: f32,
    ) -> LayercastResult<()> {
        require_premul(dst, "blend destination")?;
        require_premul(src, "blend source")?;
        let op = opacity_u8(opacity);
        if op == 0 || src.width == 0 || src.height == 0 {
            return Ok(());
        }
        let det = placement.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Ok(());
        }

        let src_rect = Rect::new(0.0, 0.0, f64::from(src.width), f64::from(src.height));
        let Some((x0, y0, x1, y1)) =
            clip_to_image(placement.transform_rect_bbox(src_rect), dst.width, dst.height)
        else {
            return Ok(());
        };

        let [a, b, c, d, e, f] = placement.inverse().as_coeffs();
        let (sw, sh) = (i64::from(src.width), i64::from(src.height));
        let dw = dst.width as usize;
        for y in y0..y1 {
            let py = f64::from(y) + 0.5;
            for x in x0..x1 {
                let px = f64::from(x) + 0.5;
                let sx = (a * px + c * py + e).floor();
                let sy = (b * px + d * py + f).floor();
                if sx < 0.0 || sy < 0.0 {
                    continue;
                }
                let (sx, sy) = (sx as i64, sy as i64);
                if sx >= sw || sy >= sh {
                    continue;
                }
                let si = ((sy * sw + sx) as usize) * 4;
                let s = [src.data[si], src.data[si + 1], src.data[si + 2], src.data[si + 3]];
                if s[3] == 0 {
                    continue;
                }
                let di = ((y as usize) * dw + (x as usize)) * 4;
                let dpx = [dst.data[di], dst.data[di + 1], dst.data[di + 2], dst.data[di + 3]];
                dst.data[di..di + 4].copy_from_slice(&over_q(dpx, s, op));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/cpu.rs"]
mod tests;
