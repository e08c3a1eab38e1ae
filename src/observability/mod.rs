//! Log subscriber setup.
//!
//! Everything else in the crate only emits `tracing` events; this module
//! decides where they go and in which format.

mod tracing_init;

pub use tracing_init::*;
