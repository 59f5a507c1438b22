//! Pixel buffers and the image-processing port used by the compositor.

/// Premultiplied source-over arithmetic.
pub mod blend;
/// Gaussian and motion blur kernels.
pub mod blur;
/// `Raster` and `AlphaMask` buffers.
pub mod buffer;
/// Reference CPU processor.
pub mod cpu;
/// Compute-shader processor (feature `gpu`).
pub mod gpu;
/// The `ImageProcessor` port.
pub mod processor;
