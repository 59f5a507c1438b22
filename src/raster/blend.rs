use crate::foundation::math::mul_div255_u8;

pub type PremulRgba8 = [u8; 4];

/// Quantize a float opacity exactly the way every compositing path does.
pub(crate) fn opacity_u8(opacity: f32) -> u16 {
    if !opacity.is_finite() {
        return 0;
    }
    ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16
}

/// Premultiplied source-over with an 8-bit opacity.
pub fn over_q(dst: PremulRgba8, src: PremulRgba8, op: u16) -> PremulRgba8 {
    if op == 0 || src[3] == 0 {
        return dst;
    }

    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    over_q(dst, src, opacity_u8(opacity))
}

/// Scale every channel of a premultiplied pixel by an 8-bit weight.
pub(crate) fn scale_px(px: &mut [u8], w: u16) {
    if w == 255 {
        return;
    }
    for c in px.iter_mut() {
        *c = mul_div255(u16::from(*c), w);
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    mul_div255_u8(x, y)
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
#[path = "../../tests/unit/raster/blend.rs"]
mod tests;
