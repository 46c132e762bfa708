use crate::error::{CatphanError, Result};

/// Contrast insert: label plus nominal polar angle on the insert ring
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    pub label: String,
    /// Nominal angle in degrees before rotation correction
    pub angle_deg: f64,
}

impl Material {
    pub fn new(label: impl Into<String>, angle_deg: f64) -> Self {
        Self {
            label: label.into(),
            angle_deg,
        }
    }
}

/// Settings for locating the line-pair module and deriving the others
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct LocatorConfig {
    /// Nominal index of the line-pair slice
    ///
    /// If None, the whole stack is scanned and ties break toward the middle.
    pub expected_slice: Option<usize>,

    /// Slices searched on each side of `expected_slice` before a full scan
    pub search_window: usize,

    /// Absolute profile derivative (HU) counted as an edge
    pub edge_threshold: f64,

    /// A slice is a candidate only if its edge count exceeds this
    pub min_edge_count: usize,

    /// Radius of the probe chords in mm
    pub probe_radius_mm: f64,

    /// Boundary angles of the probe chords in degrees
    pub probe_angles_deg: Vec<f64>,

    pub samples_per_chord: usize,

    /// Body threshold (HU) for centre detection
    pub center_threshold: f64,

    /// Contrast module offset from the line-pair slice along the slice
    /// location axis, mm
    pub contrast_offset_mm: f64,

    /// Uniformity module offset from the line-pair slice along the slice
    /// location axis, mm
    pub uniformity_offset_mm: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            expected_slice: None,
            search_window: 2,
            edge_threshold: 35.0,
            min_edge_count: 18,
            probe_radius_mm: 48.0,
            probe_angles_deg: vec![
                10.0, 38.0, 62.0, 85.0, 103.0, 121.0, 140.0, 157.0, 173.0, 186.0,
            ],
            samples_per_chord: 50,
            center_threshold: -500.0,
            contrast_offset_mm: 30.0,
            uniformity_offset_mm: -80.0,
        }
    }
}

impl LocatorConfig {
    /// Builder: nominal line-pair slice
    pub fn with_expected_slice(mut self, index: usize) -> Self {
        self.expected_slice = Some(index);
        self
    }

    /// Builder: derivative edge threshold and minimum edge count
    pub fn with_thresholds(mut self, edge_threshold: f64, min_edge_count: usize) -> Self {
        self.edge_threshold = edge_threshold;
        self.min_edge_count = min_edge_count;
        self
    }

    /// Builder: module offsets in mm
    pub fn with_offsets(mut self, contrast_mm: f64, uniformity_mm: f64) -> Self {
        self.contrast_offset_mm = contrast_mm;
        self.uniformity_offset_mm = uniformity_mm;
        self
    }
}

/// Edge-to-edge scaling profile settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct ScalingConfig {
    /// Profile extends this far on each side of the centre
    pub half_length_mm: f64,
    pub num_points: usize,
    /// Minimum absolute derivative (HU per sample) of an insert edge
    pub edge_threshold: f64,
    /// Threshold retried when `edge_threshold` finds fewer than four edges
    pub fallback_edge_threshold: f64,
    /// Nominal separation between the measured inserts in mm
    pub nominal_distance_mm: f64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            half_length_mm: 70.0,
            num_points: 300,
            edge_threshold: 40.0,
            fallback_edge_threshold: 30.0,
            nominal_distance_mm: 117.0,
        }
    }
}

/// Wire-ramp slice thickness window, relative to the phantom centre
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct ThicknessConfig {
    pub x_start_mm: f64,
    pub x_end_mm: f64,
    /// Window spans centre ± this along y
    pub half_height_mm: f64,
    pub ramp_angle_deg: f64,
}

impl Default for ThicknessConfig {
    fn default() -> Self {
        Self {
            x_start_mm: 35.0,
            x_end_mm: 40.0,
            half_height_mm: 15.0,
            ramp_angle_deg: 23.0,
        }
    }
}

/// Contrast/linearity module geometry
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct ContrastConfig {
    pub materials: Vec<Material>,
    /// Radius of the insert ring in mm
    pub ring_radius_mm: f64,
    pub roi_radius_mm: f64,
    /// Labels of the two low-contrast inserts used for visibility
    pub lcv_reference: (String, String),
    pub lcv_constant: f64,
    /// Radius of the fiducial search circle in mm
    pub fiducial_radius_mm: f64,
    pub scaling: ScalingConfig,
    pub thickness: ThicknessConfig,
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            materials: vec![
                Material::new("Delrin", 0.0),
                Material::new("none", 30.0),
                Material::new("Acrylic", 60.0),
                Material::new("Air", 90.0),
                Material::new("Polystyrene", 120.0),
                Material::new("LDPE", 180.0),
                Material::new("PMP", -120.0),
                Material::new("Teflon", -60.0),
                Material::new("Air2", -90.0),
            ],
            ring_radius_mm: 58.5,
            roi_radius_mm: 3.5,
            lcv_reference: ("Polystyrene".to_string(), "LDPE".to_string()),
            lcv_constant: 3.25,
            fiducial_radius_mm: 58.5,
            scaling: ScalingConfig::default(),
            thickness: ThicknessConfig::default(),
        }
    }
}

impl ContrastConfig {
    /// Builder: replace the material list
    pub fn with_materials(mut self, materials: Vec<Material>) -> Self {
        self.materials = materials;
        self
    }

    /// Builder: low-contrast visibility reference pair
    pub fn with_lcv_reference(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.lcv_reference = (a.into(), b.into());
        self
    }
}

/// Uniformity module geometry
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct UniformityConfig {
    /// Labels of the centre, north, south, east and west regions, in that
    /// order
    pub region_labels: [String; 5],
    /// Edge of the square each circular ROI is inscribed in, mm
    pub roi_box_size_mm: f64,
    /// Distance of the peripheral ROIs from the centre, mm
    pub roi_offset_mm: f64,
    /// Added to the centre mean in the deviation denominator
    pub normalization_offset: f64,
}

impl UniformityConfig {
    /// Builder: region labels in sampling order
    pub fn with_region_labels(mut self, labels: [&str; 5]) -> Self {
        self.region_labels = labels.map(String::from);
        self
    }
}

impl Default for UniformityConfig {
    fn default() -> Self {
        Self {
            region_labels: ["centre", "north", "south", "east", "west"].map(String::from),
            roi_box_size_mm: 15.0,
            roi_offset_mm: 50.0,
            normalization_offset: 1024.0,
        }
    }
}

/// One line-pair group of the resolution module
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct LinePairGroup {
    /// Spatial frequency in lp/mm
    pub frequency: f64,
    pub start_angle_deg: f64,
    pub end_angle_deg: f64,
    pub radius_mm: f64,
    /// Number of bars in the group
    pub bars: usize,
}

/// Resolution module geometry and MTF settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct ResolutionConfig {
    pub groups: Vec<LinePairGroup>,
    pub samples_per_group: usize,
    /// First derivative threshold tried when resolving bars, HU
    pub edge_threshold_start: f64,
    /// Last derivative threshold tried before a group is unresolved, HU
    pub edge_threshold_min: f64,
    /// Added to profile values before computing modulation
    pub modulation_offset: f64,
    /// Slices searched on each side of the nominal line-pair slice
    pub search_range: usize,
    /// Radius of the semicircular trace used to score slice windows, mm
    pub trace_radius_mm: f64,
    pub trace_samples: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        let boundaries = [
            10.0, 40.0, 62.0, 85.0, 103.0, 121.0, 140.0, 157.0, 173.0, 186.0,
        ];
        let bars = [2, 3, 4, 4, 4, 5, 5, 5, 5];
        let groups = bars
            .iter()
            .enumerate()
            .map(|(i, &bars)| LinePairGroup {
                frequency: (i + 1) as f64 / 10.0,
                start_angle_deg: boundaries[i],
                end_angle_deg: boundaries[i + 1],
                radius_mm: 48.0,
                bars,
            })
            .collect();

        Self {
            groups,
            samples_per_group: 50,
            edge_threshold_start: 50.0,
            edge_threshold_min: 10.0,
            modulation_offset: 1024.0,
            search_range: 2,
            trace_radius_mm: 47.0,
            trace_samples: 500,
        }
    }
}

impl ResolutionConfig {
    /// Builder: replace the line-pair groups
    pub fn with_groups(mut self, groups: Vec<LinePairGroup>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_search_range(mut self, range: usize) -> Self {
        self.search_range = range;
        self
    }
}

/// Complete phantom geometry passed into the analyzers
///
/// # Example
///
/// ```
/// use catphan_core::PhantomConfig;
///
/// let config = PhantomConfig::catphan_500();
/// assert_eq!(config.contrast.materials.len(), 9);
/// assert_eq!(config.resolution.groups.len(), 9);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct PhantomConfig {
    pub locator: LocatorConfig,
    pub contrast: ContrastConfig,
    pub uniformity: UniformityConfig,
    pub resolution: ResolutionConfig,
}

impl PhantomConfig {
    /// CatPhan 500 preset
    pub fn catphan_500() -> Self {
        Self::default()
    }

    /// Builder: nominal line-pair slice
    pub fn with_expected_slice(mut self, index: usize) -> Self {
        self.locator.expected_slice = Some(index);
        self
    }

    /// Checks the values the analyses divide by or iterate over
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, v: f64) -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(CatphanError::InvalidValue(format!(
                    "{} must be positive, got {}",
                    name, v
                )))
            }
        }

        let l = &self.locator;
        positive("locator.probe_radius_mm", l.probe_radius_mm)?;
        if l.probe_angles_deg.len() < 2 || l.samples_per_chord < 2 {
            return Err(CatphanError::InvalidValue(
                "locator needs at least two probe angles and two samples per chord".to_string(),
            ));
        }

        let c = &self.contrast;
        if c.materials.is_empty() {
            return Err(CatphanError::InvalidValue(
                "contrast.materials is empty".to_string(),
            ));
        }
        positive("contrast.ring_radius_mm", c.ring_radius_mm)?;
        positive("contrast.roi_radius_mm", c.roi_radius_mm)?;
        positive("contrast.fiducial_radius_mm", c.fiducial_radius_mm)?;
        positive("contrast.scaling.half_length_mm", c.scaling.half_length_mm)?;
        positive("contrast.scaling.edge_threshold", c.scaling.edge_threshold)?;
        positive(
            "contrast.scaling.fallback_edge_threshold",
            c.scaling.fallback_edge_threshold,
        )?;
        positive(
            "contrast.scaling.nominal_distance_mm",
            c.scaling.nominal_distance_mm,
        )?;
        if c.scaling.num_points < 2 {
            return Err(CatphanError::InvalidValue(
                "contrast.scaling.num_points must be at least 2".to_string(),
            ));
        }
        if c.thickness.x_end_mm <= c.thickness.x_start_mm {
            return Err(CatphanError::InvalidValue(
                "contrast.thickness window is empty".to_string(),
            ));
        }

        positive("uniformity.roi_box_size_mm", self.uniformity.roi_box_size_mm)?;

        let r = &self.resolution;
        if r.groups.is_empty() {
            return Err(CatphanError::InvalidValue(
                "resolution.groups is empty".to_string(),
            ));
        }
        for g in &r.groups {
            positive("resolution group frequency", g.frequency)?;
            positive("resolution group radius_mm", g.radius_mm)?;
            if g.bars == 0 {
                return Err(CatphanError::InvalidValue(format!(
                    "group at {} lp/mm has no bars",
                    g.frequency
                )));
            }
        }
        if r.samples_per_group < 3 || r.trace_samples < 2 {
            return Err(CatphanError::InvalidValue(
                "resolution sample counts are too small".to_string(),
            ));
        }
        positive("resolution.trace_radius_mm", r.trace_radius_mm)?;
        positive("resolution.edge_threshold_start", r.edge_threshold_start)?;
        positive("resolution.edge_threshold_min", r.edge_threshold_min)?;
        if r.edge_threshold_min > r.edge_threshold_start {
            return Err(CatphanError::InvalidValue(
                "resolution edge threshold schedule is inverted".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catphan_500_preset() {
        let config = PhantomConfig::catphan_500();
        assert!(config.validate().is_ok());

        let groups = &config.resolution.groups;
        assert_eq!(groups[0].frequency, 0.1);
        assert_eq!(groups[1].start_angle_deg, 40.0);
        assert_eq!(groups[8].end_angle_deg, 186.0);
        let bars: Vec<usize> = groups.iter().map(|g| g.bars).collect();
        assert_eq!(bars, vec![2, 3, 4, 4, 4, 5, 5, 5, 5]);

        // Slice location probe keeps the uncorrected boundary
        assert_eq!(config.locator.probe_angles_deg[1], 38.0);
    }

    #[test]
    fn test_builders() {
        let config = PhantomConfig::catphan_500().with_expected_slice(60);
        assert_eq!(config.locator.expected_slice, Some(60));

        let contrast = ContrastConfig::default()
            .with_materials(vec![Material::new("Water", 0.0)])
            .with_lcv_reference("Water", "Water");
        assert_eq!(contrast.materials.len(), 1);
        assert_eq!(contrast.lcv_reference.0, "Water");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PhantomConfig::catphan_500();
        config.contrast.roi_radius_mm = 0.0;
        assert!(matches!(
            config.validate(),
            Err(CatphanError::InvalidValue(_))
        ));

        let mut config = PhantomConfig::catphan_500();
        config.resolution.groups.clear();
        assert!(config.validate().is_err());

        let mut config = PhantomConfig::catphan_500();
        config.resolution.edge_threshold_min = 60.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_thresholds() {
        for start in [f64::NAN, f64::INFINITY] {
            let mut config = PhantomConfig::catphan_500();
            config.resolution.edge_threshold_start = start;
            assert!(matches!(
                config.validate(),
                Err(CatphanError::InvalidValue(_))
            ));
        }

        let mut config = PhantomConfig::catphan_500();
        config.resolution.edge_threshold_min = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = PhantomConfig::catphan_500();
        config.contrast.scaling.fallback_edge_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_partial_json_overrides_preset() {
        let config: PhantomConfig =
            serde_json::from_str(r#"{"locator": {"expected_slice": 42}}"#).unwrap();
        assert_eq!(config.locator.expected_slice, Some(42));
        assert_eq!(config.locator.edge_threshold, 35.0);
        assert_eq!(config.contrast.materials.len(), 9);
    }
}
