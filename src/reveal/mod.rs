//! Brush-reveal masks as pure weight functions over the layer's pixel grid.

pub mod mask;
