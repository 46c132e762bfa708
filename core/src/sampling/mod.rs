//! Stateless sampling primitives over calibrated images
//!
//! Images are `Array2<f64>` indexed `[row, column]`; positions are
//! [`Point`]s with `x` = column and `y` = row.
//!
//! Out-of-range policy:
//! - [`extract_profile`] and [`bilinear`] clamp coordinates to the image.
//! - [`roi_statistics`] rejects ROIs that are not fully inside the image.
//! - [`average_slices`] rejects empty or out-of-range index sets.

use crate::error::{CatphanError, Result};
use crate::types::{CircularRoi, ImageStack, Point, RoiStatistics};
use log::debug;
use ndarray::Array2;

/// Bilinear interpolation at a sub-pixel position
///
/// Coordinates outside the image are clamped to the nearest valid pixel.
pub fn bilinear(image: &Array2<f64>, x: f64, y: f64) -> f64 {
    let (h, w) = image.dim();
    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = image[[y0, x0]];
    let p10 = image[[y0, x1]];
    let p01 = image[[y1, x0]];
    let p11 = image[[y1, x1]];
    (1.0 - fx) * (1.0 - fy) * p00 + fx * (1.0 - fy) * p10 + (1.0 - fx) * fy * p01 + fx * fy * p11
}

/// Bilinear interpolation, or `None` if the point is outside the image
pub fn bilinear_checked(image: &Array2<f64>, point: Point) -> Option<f64> {
    let (h, w) = image.dim();
    if !point.is_inside(h, w) {
        return None;
    }
    Some(bilinear(image, point.x, point.y))
}

/// Boolean mask of the pixels within `radius` of `center` (inclusive)
///
/// # Errors
///
/// Returns `InvalidRoi` if `radius` is not positive or not finite.
pub fn create_circular_mask(
    height: usize,
    width: usize,
    center: Point,
    radius: f64,
) -> Result<Array2<bool>> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(CatphanError::InvalidRoi(format!(
            "radius must be positive, got {}",
            radius
        )));
    }
    let r2 = radius * radius;
    Ok(Array2::from_shape_fn((height, width), |(row, col)| {
        let dx = col as f64 - center.x;
        let dy = row as f64 - center.y;
        dx * dx + dy * dy <= r2
    }))
}

/// Samples `num_points` equally spaced values from `start` to `end`
///
/// Both end points are included. Positions outside the image are clamped
/// to the nearest valid coordinate before interpolation.
///
/// # Errors
///
/// Returns `InvalidRoi` if `num_points` is zero or an end point is not
/// finite.
pub fn extract_profile(
    image: &Array2<f64>,
    start: Point,
    end: Point,
    num_points: usize,
) -> Result<Vec<f64>> {
    if num_points == 0 {
        return Err(CatphanError::InvalidRoi(
            "profile needs at least one point".to_string(),
        ));
    }
    if !start.is_finite() || !end.is_finite() {
        return Err(CatphanError::InvalidRoi(
            "profile end points are not finite".to_string(),
        ));
    }
    if num_points == 1 {
        return Ok(vec![bilinear(image, start.x, start.y)]);
    }

    let step = 1.0 / (num_points - 1) as f64;
    Ok((0..num_points)
        .map(|i| {
            let t = i as f64 * step;
            let x = start.x + t * (end.x - start.x);
            let y = start.y + t * (end.y - start.y);
            bilinear(image, x, y)
        })
        .collect())
}

/// Pixelwise mean of the calibrated values of the selected slices
///
/// Indices are treated as a set: order and repetition do not change the
/// result.
///
/// # Errors
///
/// Returns `InsufficientSlices` if `indices` is empty or any index is out
/// of range.
pub fn average_slices(stack: &ImageStack, indices: &[usize]) -> Result<Array2<f64>> {
    let mut unique = indices.to_vec();
    unique.sort_unstable();
    unique.dedup();

    if unique.is_empty() {
        return Err(CatphanError::InsufficientSlices(
            "no slices selected for averaging".to_string(),
        ));
    }
    if let Some(&bad) = unique.iter().find(|&&i| i >= stack.len()) {
        return Err(CatphanError::InsufficientSlices(format!(
            "slice index {} out of range for stack of {}",
            bad,
            stack.len()
        )));
    }

    let mut sum = Array2::<f64>::zeros(stack.dim());
    for &i in &unique {
        if let Some(slice) = stack.get(i) {
            sum += &slice.calibrated();
        }
    }
    debug!("Averaged slices {:?}", unique);
    Ok(sum / unique.len() as f64)
}

/// Indices of a window of `2 * half_width + 1` slices around `center`,
/// clamped to the stack
pub fn window_indices(center: usize, half_width: usize, len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let lo = center.saturating_sub(half_width);
    let hi = (center + half_width).min(len - 1);
    (lo..=hi).collect()
}

/// Statistics over the masked pixels
///
/// # Errors
///
/// Returns `InvalidRoi` if the mask shape differs from the image, and
/// `EmptyMask` if the mask selects no pixel.
pub fn calculate_roi_statistics(image: &Array2<f64>, mask: &Array2<bool>) -> Result<RoiStatistics> {
    if image.dim() != mask.dim() {
        return Err(CatphanError::InvalidRoi(format!(
            "mask is {:?}, image is {:?}",
            mask.dim(),
            image.dim()
        )));
    }
    let values = image
        .iter()
        .zip(mask.iter())
        .filter(|(_, &m)| m)
        .map(|(&v, _)| v);
    statistics(values).ok_or_else(|| CatphanError::EmptyMask("mask selects no pixels".to_string()))
}

/// Statistics over a circular ROI
///
/// Only the ROI's bounding box is visited.
///
/// # Errors
///
/// Returns `InvalidRoi` if the ROI is not fully inside the image, and
/// `EmptyMask` if it covers no pixel centre.
pub fn roi_statistics(image: &Array2<f64>, roi: &CircularRoi) -> Result<RoiStatistics> {
    let (h, w) = image.dim();
    roi.validate(h, w)?;

    let c = roi.center;
    let r2 = roi.radius * roi.radius;
    let row_lo = (c.y - roi.radius).ceil().max(0.0) as usize;
    let row_hi = ((c.y + roi.radius).floor() as usize).min(h - 1);
    let col_lo = (c.x - roi.radius).ceil().max(0.0) as usize;
    let col_hi = ((c.x + roi.radius).floor() as usize).min(w - 1);

    let values = (row_lo..=row_hi).flat_map(|row| {
        (col_lo..=col_hi).filter_map(move |col| {
            let dx = col as f64 - c.x;
            let dy = row as f64 - c.y;
            (dx * dx + dy * dy <= r2).then(|| image[[row, col]])
        })
    });
    statistics(values).ok_or_else(|| {
        CatphanError::EmptyMask(format!("ROI at {} covers no pixel centre", c))
    })
}

fn statistics(values: impl Iterator<Item = f64>) -> Option<RoiStatistics> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        count += 1;
        sum += v;
        sum_sq += v * v;
        min = min.min(v);
        max = max.max(v);
    }
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let var = (sum_sq / count as f64 - mean * mean).max(0.0);
    Some(RoiStatistics {
        mean,
        std: var.sqrt(),
        min,
        max,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PixelSpacing, Slice};
    use rstest::rstest;
    use std::f64::consts::PI;

    fn ramp_image() -> Array2<f64> {
        // value = 10 * row + col
        Array2::from_shape_fn((8, 8), |(r, c)| 10.0 * r as f64 + c as f64)
    }

    #[rstest]
    #[case(5.0)]
    #[case(12.5)]
    #[case(30.0)]
    fn test_mask_area_within_discretization_tolerance(#[case] radius: f64) {
        let mask = create_circular_mask(100, 100, Point::new(50.0, 50.0), radius).unwrap();
        let count = mask.iter().filter(|&&m| m).count() as f64;
        let expected = PI * radius * radius;
        assert!(
            (count - expected).abs() <= 2.0 * PI * radius,
            "count {} expected {}",
            count,
            expected
        );
    }

    #[test]
    fn test_mask_boundary_is_inclusive() {
        let mask = create_circular_mask(5, 5, Point::new(2.0, 2.0), 1.0).unwrap();
        assert!(mask[[2, 3]]);
        assert!(mask[[1, 2]]);
        assert!(!mask[[1, 1]]);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 5);
    }

    #[test]
    fn test_mask_rejects_bad_radius() {
        assert!(matches!(
            create_circular_mask(5, 5, Point::new(2.0, 2.0), 0.0),
            Err(CatphanError::InvalidRoi(_))
        ));
        assert!(matches!(
            create_circular_mask(5, 5, Point::new(2.0, 2.0), -1.0),
            Err(CatphanError::InvalidRoi(_))
        ));
    }

    #[test]
    fn test_bilinear_interpolates_and_clamps() {
        let img = ramp_image();
        assert!((bilinear(&img, 2.5, 3.5) - 37.5).abs() < 1e-12);
        assert_eq!(bilinear(&img, -4.0, -1.0), 0.0);
        assert_eq!(bilinear(&img, 20.0, 20.0), 77.0);
        assert!(bilinear_checked(&img, Point::new(8.5, 1.0)).is_none());
    }

    #[test]
    fn test_extract_profile_endpoints_and_clamp() {
        let img = ramp_image();
        let p = extract_profile(&img, Point::new(0.0, 2.0), Point::new(7.0, 2.0), 8).unwrap();
        assert_eq!(p.len(), 8);
        for (i, v) in p.iter().enumerate() {
            assert!((v - (20.0 + i as f64)).abs() < 1e-12);
        }

        // Segment leaving the image reads the clamped edge column
        let p = extract_profile(&img, Point::new(7.0, 0.0), Point::new(11.0, 0.0), 5).unwrap();
        assert!(p.iter().all(|&v| v == 7.0));

        assert!(matches!(
            extract_profile(&img, Point::new(0.0, 0.0), Point::new(1.0, 1.0), 0),
            Err(CatphanError::InvalidRoi(_))
        ));
    }

    fn stack_of(values: &[f64]) -> ImageStack {
        let slices = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                Slice::new(
                    Array2::from_elem((4, 4), v),
                    PixelSpacing::isotropic(0.5),
                    -(i as f64) * 2.5,
                )
                .with_rescale(1.0, -1024.0)
            })
            .collect();
        ImageStack::new(slices).unwrap()
    }

    #[test]
    fn test_average_slices_is_order_independent() {
        let stack = stack_of(&[1000.0, 1010.0, 1020.0, 1030.0, 1040.0, 1050.0]);
        let a = average_slices(&stack, &[2, 5, 1]).unwrap();
        let b = average_slices(&stack, &[1, 2, 5]).unwrap();
        assert_eq!(a, b);
        // (1010 + 1020 + 1050) / 3 - 1024
        assert!((a[[0, 0]] - 2.666_666_666_666_666_5).abs() < 1e-9);
    }

    #[test]
    fn test_average_slices_rejects_bad_indices() {
        let stack = stack_of(&[0.0, 0.0]);
        assert!(matches!(
            average_slices(&stack, &[]),
            Err(CatphanError::InsufficientSlices(_))
        ));
        assert!(matches!(
            average_slices(&stack, &[0, 2]),
            Err(CatphanError::InsufficientSlices(_))
        ));
    }

    #[rstest]
    #[case(0, 1, 10, vec![0, 1])]
    #[case(5, 1, 10, vec![4, 5, 6])]
    #[case(9, 1, 10, vec![8, 9])]
    #[case(3, 0, 10, vec![3])]
    fn test_window_indices(
        #[case] center: usize,
        #[case] half: usize,
        #[case] len: usize,
        #[case] expected: Vec<usize>,
    ) {
        assert_eq!(window_indices(center, half, len), expected);
    }

    #[test]
    fn test_roi_statistics_matches_mask_statistics() {
        let img = ramp_image();
        let roi = CircularRoi::new(Point::new(3.5, 3.5), 2.0);
        let mask = create_circular_mask(8, 8, roi.center, roi.radius).unwrap();
        let a = roi_statistics(&img, &roi).unwrap();
        let b = calculate_roi_statistics(&img, &mask).unwrap();
        assert_eq!(a.count, b.count);
        assert!((a.mean - b.mean).abs() < 1e-9);
        assert!((a.std - b.std).abs() < 1e-9);
        assert_eq!(a.min, b.min);
        assert_eq!(a.max, b.max);
    }

    #[test]
    fn test_statistics_population_std() {
        let img = Array2::from_shape_vec((1, 4), vec![1.0, 3.0, 1.0, 3.0]).unwrap();
        let mask = Array2::from_elem((1, 4), true);
        let s = calculate_roi_statistics(&img, &mask).unwrap();
        assert_eq!(s.mean, 2.0);
        assert!((s.std - 1.0).abs() < 1e-12);
        assert_eq!((s.min, s.max, s.count), (1.0, 3.0, 4));
    }

    #[test]
    fn test_empty_mask_and_shape_mismatch() {
        let img = ramp_image();
        let mask = Array2::from_elem((8, 8), false);
        assert!(matches!(
            calculate_roi_statistics(&img, &mask),
            Err(CatphanError::EmptyMask(_))
        ));
        let mask = Array2::from_elem((4, 4), true);
        assert!(matches!(
            calculate_roi_statistics(&img, &mask),
            Err(CatphanError::InvalidRoi(_))
        ));
    }

    #[test]
    fn test_roi_partially_outside_is_rejected() {
        let img = ramp_image();
        let roi = CircularRoi::new(Point::new(1.0, 4.0), 2.0);
        assert!(matches!(
            roi_statistics(&img, &roi),
            Err(CatphanError::InvalidRoi(_))
        ));
    }
}
