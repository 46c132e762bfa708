use crate::error::{CatphanError, Result};
use crate::geometry::{calculate_slice_thickness, polar_point_mm};
use crate::sampling::{average_slices, extract_profile, roi_statistics, window_indices};
use crate::signal::edge_positions;
use crate::types::{
    CircularRoi, ContrastConfig, ContrastResult, ImageStack, Material, MaterialMeasurement,
    PixelSpacing, Point, ScalingConfig, SpatialScaling, ThicknessConfig,
};
use log::{debug, info};
use ndarray::Array2;

/// Derivative peaks closer than this (in samples) belong to one edge
const EDGE_MIN_SEPARATION: f64 = 2.0;

/// Contrast/linearity (CTP404) measurements
///
/// Every step is a pure function; [`ContrastAnalyzer::analyze`] threads
/// them together for one module.
pub struct ContrastAnalyzer;

impl ContrastAnalyzer {
    /// Three-slice average centred on `slice_index`, clamped to the stack
    ///
    /// # Errors
    ///
    /// Returns `InsufficientSlices` if `slice_index` is outside the stack.
    pub fn prepare_image(stack: &ImageStack, slice_index: usize) -> Result<Array2<f64>> {
        if slice_index >= stack.len() {
            return Err(CatphanError::InsufficientSlices(format!(
                "slice {} outside stack of {}",
                slice_index,
                stack.len()
            )));
        }
        average_slices(stack, &window_indices(slice_index, 1, stack.len()))
    }

    /// Samples one circular ROI per material on the insert ring
    ///
    /// ROI centres sit at `ring_radius_mm` from `center`, at each
    /// material's nominal angle plus `rotation_deg`. Results keep the
    /// material order, numbered from 1.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoi` if an ROI leaves the image.
    pub fn analyze_contrast(
        image: &Array2<f64>,
        spacing: PixelSpacing,
        center: Point,
        rotation_deg: f64,
        materials: &[Material],
        ring_radius_mm: f64,
        roi_radius_mm: f64,
    ) -> Result<Vec<MaterialMeasurement>> {
        let radius_px = spacing.mm_to_px(roi_radius_mm);
        materials
            .iter()
            .enumerate()
            .map(|(i, material)| {
                let roi_center = polar_point_mm(
                    center,
                    spacing,
                    ring_radius_mm,
                    material.angle_deg + rotation_deg,
                );
                let stats = roi_statistics(image, &CircularRoi::new(roi_center, radius_px))?;
                Ok(MaterialMeasurement {
                    index: i + 1,
                    label: material.label.clone(),
                    mean: stats.mean,
                    std: stats.std,
                    center: roi_center,
                })
            })
            .collect()
    }

    /// Low-contrast visibility in percent
    ///
    /// `LCV = constant · (σa + σb) / |μa − μb|` over the two reference
    /// inserts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if a reference label is missing or the two
    /// reference means are equal.
    pub fn calculate_low_contrast_visibility(
        measurements: &[MaterialMeasurement],
        reference: (&str, &str),
        constant: f64,
    ) -> Result<f64> {
        let find = |label: &str| {
            measurements
                .iter()
                .find(|m| m.label == label)
                .ok_or_else(|| {
                    CatphanError::InvalidValue(format!("no contrast ROI labelled '{}'", label))
                })
        };
        let a = find(reference.0)?;
        let b = find(reference.1)?;

        let difference = (a.mean - b.mean).abs();
        if difference < f64::EPSILON {
            return Err(CatphanError::InvalidValue(format!(
                "'{}' and '{}' have identical means",
                a.label, b.label
            )));
        }
        Ok(constant * (a.std + b.std) / difference)
    }

    /// Measures the in-plane scale along the rotated x and y axes
    ///
    /// Each axis is profiled through the centre over
    /// `±half_length_mm`. The outermost insert edges give two distances
    /// (first to second-last edge, second to last edge); their mean is
    /// compared to the nominal separation. A profile with fewer than four
    /// edges is retried once at `fallback_edge_threshold`.
    ///
    /// # Errors
    ///
    /// Returns `FeatureNotResolved` if a profile still has fewer than four
    /// edges.
    pub fn calculate_spatial_scaling(
        image: &Array2<f64>,
        spacing: PixelSpacing,
        center: Point,
        rotation_deg: f64,
        config: &ScalingConfig,
    ) -> Result<SpatialScaling> {
        let (x_distance_mm, x_points) =
            axis_distance(image, spacing, center, rotation_deg, config)?;
        let (y_distance_mm, y_points) =
            axis_distance(image, spacing, center, rotation_deg + 90.0, config)?;

        Ok(SpatialScaling {
            x_distance_mm,
            y_distance_mm,
            x_scale: x_distance_mm / config.nominal_distance_mm,
            y_scale: y_distance_mm / config.nominal_distance_mm,
            x_points,
            y_points,
        })
    }

    /// Slice thickness from the wire ramp of this module
    pub fn measure_slice_thickness(
        image: &Array2<f64>,
        spacing: PixelSpacing,
        center: Point,
        config: &ThicknessConfig,
    ) -> Result<f64> {
        calculate_slice_thickness(image, spacing, center, config)
    }

    /// Runs every contrast measurement on one module
    ///
    /// ROI statistics and scaling use the three-slice average; slice
    /// thickness uses the single slice at `slice_index`.
    pub fn analyze(
        stack: &ImageStack,
        slice_index: usize,
        center: Point,
        rotation_deg: f64,
        config: &ContrastConfig,
    ) -> Result<ContrastResult> {
        let image = Self::prepare_image(stack, slice_index)?;
        let spacing = stack.pixel_spacing();

        let materials = Self::analyze_contrast(
            &image,
            spacing,
            center,
            rotation_deg,
            &config.materials,
            config.ring_radius_mm,
            config.roi_radius_mm,
        )?;
        for m in &materials {
            debug!("{} {}: {:.1} ± {:.1} HU", m.index, m.label, m.mean, m.std);
        }

        let low_contrast_visibility = Self::calculate_low_contrast_visibility(
            &materials,
            (&config.lcv_reference.0, &config.lcv_reference.1),
            config.lcv_constant,
        )?;
        let scaling =
            Self::calculate_spatial_scaling(&image, spacing, center, rotation_deg, &config.scaling)?;

        let single = stack
            .get(slice_index)
            .map(|s| s.calibrated())
            .ok_or_else(|| {
                CatphanError::InsufficientSlices(format!("slice {} out of range", slice_index))
            })?;
        let slice_thickness_mm =
            Self::measure_slice_thickness(&single, spacing, center, &config.thickness)?;

        info!(
            "Contrast: LCV {:.3}%, scale {:.3} x {:.3}, thickness {:.2} mm",
            low_contrast_visibility, scaling.x_scale, scaling.y_scale, slice_thickness_mm
        );
        Ok(ContrastResult {
            materials,
            low_contrast_visibility,
            scaling,
            slice_thickness_mm,
        })
    }
}

/// Edge-to-edge distance along one profile through the centre
fn axis_distance(
    image: &Array2<f64>,
    spacing: PixelSpacing,
    center: Point,
    angle_deg: f64,
    config: &ScalingConfig,
) -> Result<(f64, [Point; 2])> {
    let start = polar_point_mm(center, spacing, config.half_length_mm, angle_deg + 180.0);
    let end = polar_point_mm(center, spacing, config.half_length_mm, angle_deg);
    let profile = extract_profile(image, start, end, config.num_points)?;

    let mut edges = edge_positions(&profile, config.edge_threshold, EDGE_MIN_SEPARATION);
    if edges.len() < 4 {
        debug!(
            "Scaling profile at {:.1}° has {} edges at {} HU, retrying at {} HU",
            angle_deg,
            edges.len(),
            config.edge_threshold,
            config.fallback_edge_threshold
        );
        edges = edge_positions(&profile, config.fallback_edge_threshold, EDGE_MIN_SEPARATION);
    }
    if edges.len() < 4 {
        return Err(CatphanError::FeatureNotResolved(format!(
            "scaling profile at {:.1}° has {} edges, need 4",
            angle_deg,
            edges.len()
        )));
    }
    let n = edges.len();
    let leading = edges[n - 2] - edges[0];
    let trailing = edges[n - 1] - edges[1];
    let step_mm = 2.0 * config.half_length_mm / (config.num_points - 1) as f64;

    Ok((0.5 * (leading + trailing) * step_mm, [start, end]))
}
