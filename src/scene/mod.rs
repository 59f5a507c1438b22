//! World / camera / viewport / layer model and the document port.

/// Front-loaded raster decoding.
pub mod assets;
/// Camera, viewport and the world→viewport transform.
pub mod camera;
/// Layers and their action vocabulary.
pub mod layer;
/// World, scene ordering and document loading.
pub mod world;
