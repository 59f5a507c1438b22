//! Frame composition: per-layer passes, the shared layer cache and UI chrome placement.

pub mod cache;
pub mod compositor;
pub mod overlay;
