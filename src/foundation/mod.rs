pub mod core;
pub mod error;
pub mod fingerprint;
pub(crate) mod math;
