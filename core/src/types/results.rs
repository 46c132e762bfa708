use crate::types::{ModuleSliceIndex, Point};

/// Statistics over the pixels selected by an ROI or mask
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct RoiStatistics {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// HU measurement of one contrast insert
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialMeasurement {
    /// 1-based ROI number in configuration order
    pub index: usize,
    pub label: String,
    pub mean: f64,
    pub std: f64,
    /// ROI center used for sampling
    pub center: Point,
}

/// Measured in-plane geometric scaling
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct SpatialScaling {
    /// Measured separation along the (rotated) x axis in mm
    pub x_distance_mm: f64,
    /// Measured separation along the (rotated) y axis in mm
    pub y_distance_mm: f64,
    /// Measured / nominal separation along x
    pub x_scale: f64,
    /// Measured / nominal separation along y
    pub y_scale: f64,
    /// Profile end points used for the x measurement
    pub x_points: [Point; 2],
    /// Profile end points used for the y measurement
    pub y_points: [Point; 2],
}

/// Result of the contrast/linearity region
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct ContrastResult {
    pub materials: Vec<MaterialMeasurement>,
    pub low_contrast_visibility: f64,
    pub scaling: SpatialScaling,
    pub slice_thickness_mm: f64,
}

/// HU measurement of one uniformity region
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionMeasurement {
    pub label: String,
    pub mean: f64,
    pub std: f64,
    pub center: Point,
}

/// Result of the uniformity region
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct UniformityResult {
    pub regions: Vec<RegionMeasurement>,
    /// Spread of region means relative to the centre region, in percent
    pub uniformity_percent: f64,
}

/// One sample of the MTF curve
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct MtfPoint {
    /// Spatial frequency in lp/mm
    pub frequency: f64,
    /// Modulation relative to the lowest-frequency group
    pub mtf: f64,
    /// Raw modulation depth of the group
    pub modulation: f64,
    /// Whether the group's bars were resolved
    pub resolved: bool,
}

/// Frequencies where the relative MTF first falls through fixed levels
///
/// `None` means the curve never dropped below that level within the
/// measured frequency range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct MtfThresholds {
    pub mtf80: Option<f64>,
    pub mtf50: Option<f64>,
    pub mtf30: Option<f64>,
    pub mtf10: Option<f64>,
}

/// Result of the resolution region
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolutionResult {
    pub curve: Vec<MtfPoint>,
    pub thresholds: MtfThresholds,
    /// Signed offset of the averaged window from the nominal slice
    pub slice_offset: i64,
}

/// Region-specific measurement record
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(tag = "module", rename_all = "lowercase"))]
pub enum MeasurementResult {
    Contrast(ContrastResult),
    Uniformity(UniformityResult),
    Resolution(ResolutionResult),
}

/// Module centres found during calibration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleCenters {
    pub resolution: Point,
    pub contrast: Point,
    pub uniformity: Point,
}

/// Geometric calibration plus all three measurements for one stack
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct PhantomReport {
    pub modules: ModuleSliceIndex,
    pub centers: ModuleCenters,
    /// Phantom rotation in degrees, normalized to (-180, 180]
    pub rotation_deg: f64,
    pub contrast: ContrastResult,
    pub uniformity: UniformityResult,
    pub resolution: ResolutionResult,
}

impl PhantomReport {
    /// The three measurements as tagged records, in analysis order
    pub fn measurements(&self) -> Vec<MeasurementResult> {
        vec![
            MeasurementResult::Contrast(self.contrast.clone()),
            MeasurementResult::Uniformity(self.uniformity.clone()),
            MeasurementResult::Resolution(self.resolution.clone()),
        ]
    }
}
