//! # Time
//!
//! Fixed-rate simulation driven by a variable-rate render callback, with
//! render-time interpolation between the last two simulated states.

mod fixed_step;
mod interpolation;

pub use fixed_step::{FixedClock, LoopMetrics, SimulationLoop};
pub use interpolation::{interpolate_sample, lerp3, slerp};
