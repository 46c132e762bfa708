//! Core type definitions for phantom analysis
//!
//! This module provides the fundamental types used throughout the catphan library:
//! - [`Slice`] and [`ImageStack`]: calibrated CT slices in stack order
//! - [`PixelSpacing`]: in-plane pixel size in mm
//! - [`Point`] and [`CircularRoi`]: image-space geometry
//! - [`PhantomModule`] and [`ModuleSliceIndex`]: functional regions and their slices
//! - [`PhantomConfig`]: phantom geometry passed into the analyzers
//! - result records for each analysis

mod config;
mod geometry;
mod module;
mod pixel_spacing;
mod results;
mod slice;

pub use config::{
    ContrastConfig, LinePairGroup, LocatorConfig, Material, PhantomConfig, ResolutionConfig,
    ScalingConfig, ThicknessConfig, UniformityConfig,
};
pub use geometry::{normalize_angle_deg, CircularRoi, Point};
pub use module::{ModuleSliceIndex, PhantomModule};
pub use pixel_spacing::PixelSpacing;
pub use results::{
    ContrastResult, MaterialMeasurement, MeasurementResult, ModuleCenters, MtfPoint,
    MtfThresholds, PhantomReport, RegionMeasurement, ResolutionResult, RoiStatistics,
    SpatialScaling, UniformityResult,
};
pub use slice::{ImageStack, Slice};
