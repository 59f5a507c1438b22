use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{LayercastError, LayercastResult};

/// RGBA8 pixel buffer, row-major, tightly packed.
///
/// Layer sources arrive as straight alpha; everything inside the compositor is premultiplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub data: Vec<u8>,
    /// `true` when `data` is premultiplied RGBA8.
    pub premultiplied: bool,
}

pub(crate) fn rgba_len(width: u32, height: u32) -> LayercastResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| LayercastError::validation("raster buffer size overflow"))
}

impl Raster {
    /// Wrap an existing buffer, checking its length.
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        premultiplied: bool,
    ) -> LayercastResult<Self> {
        if data.len() != rgba_len(width, height)? {
            return Err(LayercastError::validation(format!(
                "raster data length {} does not match {width}x{height}x4",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            premultiplied,
        })
    }

    /// Fully transparent premultiplied raster.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgba8Premul::transparent())
    }

    /// Premultiplied raster filled with one colour.
    pub fn filled(width: u32, height: u32, px: Rgba8Premul) -> Self {
        let px = px.to_array();
        Self {
            width,
            height,
            data: px.repeat((width as usize) * (height as usize)),
            premultiplied: true,
        }
    }

    /// Straight-alpha raster from a decoded image.
    pub fn from_straight_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
            premultiplied: false,
        }
    }

    /// Convert into a straight-alpha image suitable for PNG output.
    pub fn to_straight_image(&self) -> LayercastResult<image::RgbaImage> {
        let mut data = self.data.clone();
        if self.premultiplied {
            for px in data.chunks_exact_mut(4) {
                let a = u32::from(px[3]);
                if a == 0 {
                    px[0] = 0;
                    px[1] = 0;
                    px[2] = 0;
                    continue;
                }
                for c in &mut px[..3] {
                    *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
        image::RgbaImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| LayercastError::validation("raster buffer does not match its size"))
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.data.chunks_exact(4).all(|px| px[3] == 0)
    }
}

/// Single-channel coverage mask, 0 = hidden, 255 = fully shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlphaMask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl AlphaMask {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> LayercastResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| LayercastError::validation("mask size overflow"))?;
        if data.len() != expected {
            return Err(LayercastError::validation(format!(
                "mask data length {} does not match {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y as usize) * (self.width as usize) + (x as usize)]
    }

    /// Sum of all weights; a cheap "how much is revealed" measure.
    pub fn coverage_sum(&self) -> u64 {
        self.data.iter().map(|&v| u64::from(v)).sum()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/buffer.rs"]
mod tests;
