//! Video output: the encoder port, its ffmpeg and in-memory implementations, and the
//! single-writer thread that keeps frame hand-off bounded in time.

pub mod encoder;
pub mod ffmpeg;
pub mod worker;
