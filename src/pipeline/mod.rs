//! Render jobs: strategies that turn frame indices into images, and the loop that streams
//! them to an encoder.

pub mod cancel;
pub mod orchestrator;
pub mod progress;
pub mod state;
pub mod strategy;
