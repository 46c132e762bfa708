use crate::error::{CatphanError, Result};
use crate::signal::full_width_half_max;
use crate::types::{PixelSpacing, Point, ThicknessConfig};
use log::debug;
use ndarray::{s, Array2, Axis};

/// Slice thickness from the wire-ramp profile, in mm
///
/// The window `[x_start_mm, x_end_mm]` right of `center` by
/// `±half_height_mm` must contain the ramp. The column with the largest
/// summed intensity is profiled along y, and its full width at half
/// maximum is projected through the ramp angle:
/// `thickness = FWHM_px · dy · tan(ramp_angle)`.
///
/// # Errors
///
/// - `InvalidRoi` if the window falls outside the image
/// - `FeatureNotResolved` if the profile has no half-maximum crossing on
///   both sides of its peak
pub fn calculate_slice_thickness(
    image: &Array2<f64>,
    spacing: PixelSpacing,
    center: Point,
    config: &ThicknessConfig,
) -> Result<f64> {
    let (h, w) = image.dim();
    let col_lo = (center.x + config.x_start_mm / spacing.dx()).round();
    let col_hi = (center.x + config.x_end_mm / spacing.dx()).round();
    let row_lo = (center.y - config.half_height_mm / spacing.dy()).round();
    let row_hi = (center.y + config.half_height_mm / spacing.dy()).round();

    let in_bounds = col_lo.is_finite()
        && row_lo.is_finite()
        && col_lo >= 0.0
        && row_lo >= 0.0
        && col_hi < w as f64
        && row_hi < h as f64
        && col_hi >= col_lo
        && row_hi > row_lo;
    if !in_bounds {
        return Err(CatphanError::InvalidRoi(format!(
            "thickness window columns {}..={} rows {}..={} outside {}x{} image",
            col_lo, col_hi, row_lo, row_hi, w, h
        )));
    }
    let (col_lo, col_hi) = (col_lo as usize, col_hi as usize);
    let (row_lo, row_hi) = (row_lo as usize, row_hi as usize);

    let window = image.slice(s![row_lo..=row_hi, col_lo..=col_hi]);
    let column_sums = window.sum_axis(Axis(0));
    let (best_col, _) = column_sums
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| CatphanError::InvalidRoi("thickness window is empty".to_string()))?;

    let profile: Vec<f64> = window.column(best_col).to_vec();
    let fwhm_px = full_width_half_max(&profile).ok_or_else(|| {
        CatphanError::FeatureNotResolved(
            "wire ramp profile has no half-maximum crossings".to_string(),
        )
    })?;

    let thickness = fwhm_px * spacing.dy() * config.ramp_angle_deg.to_radians().tan();
    debug!(
        "Ramp FWHM {:.2} px in column {}, slice thickness {:.2} mm",
        fwhm_px,
        col_lo + best_col,
        thickness
    );
    Ok(thickness)
}
