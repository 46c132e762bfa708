//! Per-module measurements
//!
//! Each analyzer works on one module's slice index, the module centre from
//! geometric calibration and (where it matters) the phantom rotation.

pub mod contrast;
pub mod resolution;
pub mod uniformity;

pub use contrast::ContrastAnalyzer;
pub use resolution::{OptimalSlices, ResolutionAnalyzer};
pub use uniformity::UniformityAnalyzer;
