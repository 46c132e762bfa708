use super::contrast::ContrastAnalyzer;
use crate::error::Result;
use crate::sampling::roi_statistics;
use crate::types::{
    CircularRoi, ImageStack, PixelSpacing, Point, RegionMeasurement, UniformityConfig,
    UniformityResult,
};
use log::info;
use ndarray::Array2;

/// Uniformity (CTP486) measurements
pub struct UniformityAnalyzer;

impl UniformityAnalyzer {
    /// Three-slice average centred on `slice_index`, clamped to the stack
    pub fn prepare_image(stack: &ImageStack, slice_index: usize) -> Result<Array2<f64>> {
        ContrastAnalyzer::prepare_image(stack, slice_index)
    }

    /// Samples the centre region and four regions offset along the image
    /// axes
    ///
    /// `labels` name the regions in sampling order: centre, north, south,
    /// east, west.
    ///
    /// North is toward decreasing row index (up in the displayed image),
    /// south toward increasing row index, east toward increasing column
    /// and west toward decreasing column. Each region is the circle
    /// inscribed in a `roi_box_size_mm` square.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoi` if a region leaves the image.
    pub fn analyze_uniformity(
        image: &Array2<f64>,
        spacing: PixelSpacing,
        center: Point,
        roi_box_size_mm: f64,
        roi_offset_mm: f64,
        labels: &[String; 5],
    ) -> Result<Vec<RegionMeasurement>> {
        let radius_px = spacing.mm_to_px(roi_box_size_mm / 2.0);
        let dx = roi_offset_mm / spacing.dx();
        let dy = roi_offset_mm / spacing.dy();
        let centers = [
            center,
            Point::new(center.x, center.y - dy),
            Point::new(center.x, center.y + dy),
            Point::new(center.x + dx, center.y),
            Point::new(center.x - dx, center.y),
        ];

        labels
            .iter()
            .zip(centers)
            .map(|(label, c)| {
                let stats = roi_statistics(image, &CircularRoi::new(c, radius_px))?;
                Ok(RegionMeasurement {
                    label: label.clone(),
                    mean: stats.mean,
                    std: stats.std,
                    center: c,
                })
            })
            .collect()
    }

    /// Spread of the region means relative to the offset centre mean, in
    /// percent
    ///
    /// `deviation = (max − min) / (centre + normalization_offset) · 100`.
    /// The first region is the centre. Returns 0 for an empty list.
    pub fn uniformity_deviation(regions: &[RegionMeasurement], normalization_offset: f64) -> f64 {
        let Some(centre) = regions.first() else {
            return 0.0;
        };
        let max = regions.iter().map(|r| r.mean).fold(f64::NEG_INFINITY, f64::max);
        let min = regions.iter().map(|r| r.mean).fold(f64::INFINITY, f64::min);
        (max - min) / (centre.mean + normalization_offset) * 100.0
    }

    /// Runs the uniformity measurement on one module
    pub fn analyze(
        stack: &ImageStack,
        slice_index: usize,
        center: Point,
        config: &UniformityConfig,
    ) -> Result<UniformityResult> {
        let image = Self::prepare_image(stack, slice_index)?;
        let regions = Self::analyze_uniformity(
            &image,
            stack.pixel_spacing(),
            center,
            config.roi_box_size_mm,
            config.roi_offset_mm,
            &config.region_labels,
        )?;
        let uniformity_percent = Self::uniformity_deviation(&regions, config.normalization_offset);
        info!("Uniformity: {:.2}%", uniformity_percent);
        Ok(UniformityResult {
            regions,
            uniformity_percent,
        })
    }
}
