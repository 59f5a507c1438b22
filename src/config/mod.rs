//! JSON job configuration.

pub mod job;
