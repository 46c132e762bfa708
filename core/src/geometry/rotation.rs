use super::polar_point_mm;
use crate::error::{CatphanError, Result};
use crate::sampling::bilinear_checked;
use crate::signal::median;
use crate::types::{normalize_angle_deg, PixelSpacing, Point};
use log::debug;
use ndarray::Array2;

/// Angular samples taken around the fiducial circle (0.25° steps)
pub const CIRCLE_SAMPLES: usize = 1440;

/// Lowest deviation from the ring background (HU) accepted as a marker
const MIN_MARKER_CONTRAST: f64 = 100.0;

/// Markers must sit this close to diametrically opposite, in degrees
const PAIR_TOLERANCE_DEG: f64 = 20.0;

/// Phantom rotation and the fiducial positions it was derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationEstimate {
    /// Deviation of the marker axis from vertical, in (-180, 180]
    pub angle_deg: f64,
    pub top: Point,
    pub bottom: Point,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    angle_deg: f64,
    strength: f64,
}

/// Measures the phantom rotation from its two opposing fiducial markers
///
/// # Algorithm
///
/// 1. Sample a circle of `search_radius_mm` around `center`
/// 2. Score each sample by its absolute deviation from the circle median;
///    the noise floor is the larger of 100 HU and five median absolute
///    deviations
/// 3. Each circular run above the floor is a candidate; its angle is the
///    score-weighted centroid of the run's upper half
/// 4. Choose the strongest pair of candidates lying 180° ± 20° apart
/// 5. Top marker = the one nearest -90° (up); the rotation is the angle of
///    the bottom-to-top axis from vertical, clockwise positive in image
///    coordinates
///
/// # Errors
///
/// - `InvalidRoi` if the search circle leaves the image or the radius is
///   not positive
/// - `FiducialNotFound` if fewer than two distinct markers or no opposing
///   pair rise above the noise floor
pub fn find_rotation(
    image: &Array2<f64>,
    spacing: PixelSpacing,
    center: Point,
    search_radius_mm: f64,
) -> Result<RotationEstimate> {
    if !search_radius_mm.is_finite() || search_radius_mm <= 0.0 {
        return Err(CatphanError::InvalidRoi(format!(
            "fiducial search radius must be positive, got {}",
            search_radius_mm
        )));
    }

    let step = 360.0 / CIRCLE_SAMPLES as f64;
    let angles: Vec<f64> = (0..CIRCLE_SAMPLES)
        .map(|i| -180.0 + i as f64 * step)
        .collect();
    let values = angles
        .iter()
        .map(|&a| {
            let p = polar_point_mm(center, spacing, search_radius_mm, a);
            bilinear_checked(image, p).ok_or_else(|| {
                CatphanError::InvalidRoi(format!(
                    "fiducial search circle of {} mm around {} leaves the image",
                    search_radius_mm, center
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let background = median(&values).unwrap_or(0.0);
    let scores: Vec<f64> = values.iter().map(|v| (v - background).abs()).collect();
    let mad = median(&scores).unwrap_or(0.0);
    let floor = MIN_MARKER_CONTRAST.max(5.0 * mad);

    let candidates = circular_runs(&scores, floor)
        .into_iter()
        .map(|(start, len)| run_candidate(&scores, &angles, start, len, step))
        .collect::<Vec<_>>();
    debug!(
        "Fiducial search: background {:.1} HU, floor {:.1} HU, {} candidates",
        background,
        floor,
        candidates.len()
    );
    if candidates.len() < 2 {
        return Err(CatphanError::FiducialNotFound(format!(
            "{} candidate(s) above {:.0} HU on the {} mm circle",
            candidates.len(),
            floor,
            search_radius_mm
        )));
    }

    let mut best: Option<(Candidate, Candidate, f64)> = None;
    for (i, a) in candidates.iter().enumerate() {
        for b in candidates.iter().skip(i + 1) {
            let separation = normalize_angle_deg(a.angle_deg - b.angle_deg).abs();
            if (separation - 180.0).abs() > PAIR_TOLERANCE_DEG {
                continue;
            }
            let strength = a.strength + b.strength;
            if best.map_or(true, |(_, _, s)| strength > s) {
                best = Some((*a, *b, strength));
            }
        }
    }
    let (a, b, _) = best.ok_or_else(|| {
        CatphanError::FiducialNotFound(format!(
            "no opposing marker pair among {} candidates",
            candidates.len()
        ))
    })?;

    let from_up = |c: &Candidate| normalize_angle_deg(c.angle_deg + 90.0).abs();
    let (top_c, bottom_c) = if from_up(&a) <= from_up(&b) {
        (a, b)
    } else {
        (b, a)
    };
    let top = polar_point_mm(center, spacing, search_radius_mm, top_c.angle_deg);
    let bottom = polar_point_mm(center, spacing, search_radius_mm, bottom_c.angle_deg);

    let dx_mm = (top.x - bottom.x) * spacing.dx();
    let dy_mm = (bottom.y - top.y) * spacing.dy();
    let angle_deg = normalize_angle_deg(dx_mm.atan2(dy_mm).to_degrees());

    debug!(
        "Fiducials at {:.2}° and {:.2}°, rotation {:.2}°",
        top_c.angle_deg, bottom_c.angle_deg, angle_deg
    );
    Ok(RotationEstimate {
        angle_deg,
        top,
        bottom,
    })
}

/// (start, length) of each run of samples above `floor`, treating the
/// sequence as circular
fn circular_runs(scores: &[f64], floor: f64) -> Vec<(usize, usize)> {
    let n = scores.len();
    let above: Vec<bool> = scores.iter().map(|&s| s > floor).collect();
    if n == 0 || above.iter().all(|&a| a) {
        return Vec::new();
    }

    let mut runs = Vec::new();
    for start in 0..n {
        let prev = (start + n - 1) % n;
        if above[start] && !above[prev] {
            let mut len = 0;
            while above[(start + len) % n] {
                len += 1;
            }
            runs.push((start, len));
        }
    }
    runs
}

fn run_candidate(scores: &[f64], angles: &[f64], start: usize, len: usize, step: f64) -> Candidate {
    let n = scores.len();
    let peak = (0..len)
        .map(|k| scores[(start + k) % n])
        .fold(f64::NEG_INFINITY, f64::max);

    let (mut weight, mut moment) = (0.0, 0.0);
    for k in 0..len {
        let s = scores[(start + k) % n];
        if s >= 0.5 * peak {
            weight += s;
            moment += s * k as f64;
        }
    }
    let offset = if weight > 0.0 { moment / weight } else { 0.0 };

    Candidate {
        angle_deg: normalize_angle_deg(angles[start] + offset * step),
        strength: peak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SyntheticPhantom;
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(2.5)]
    #[case(-4.0)]
    #[case(11.0)]
    fn test_recovers_known_rotation(#[case] theta: f64) {
        let phantom = SyntheticPhantom::default().with_rotation(theta);
        let img = phantom.contrast_image();
        let est = find_rotation(&img, phantom.spacing, phantom.center, 58.5).unwrap();
        assert!(
            (est.angle_deg - theta).abs() < 0.5,
            "expected {}, got {}",
            theta,
            est.angle_deg
        );
        assert!(est.top.y < est.bottom.y);
    }

    #[test]
    fn test_only_one_marker_fails() {
        let phantom = SyntheticPhantom::default();
        let mut img = Array2::from_elem(phantom.dim(), 0.0);
        phantom.paint_disc(&mut img, phantom.polar(58.5, -90.0), 3.5, -1000.0);
        assert!(matches!(
            find_rotation(&img, phantom.spacing, phantom.center, 58.5),
            Err(CatphanError::FiducialNotFound(_))
        ));
    }

    #[test]
    fn test_flat_ring_fails() {
        let phantom = SyntheticPhantom::default();
        let img = Array2::from_elem(phantom.dim(), 0.0);
        assert!(matches!(
            find_rotation(&img, phantom.spacing, phantom.center, 58.5),
            Err(CatphanError::FiducialNotFound(_))
        ));
    }

    #[test]
    fn test_circle_outside_image() {
        let phantom = SyntheticPhantom::default();
        let img = phantom.contrast_image();
        assert!(matches!(
            find_rotation(&img, phantom.spacing, phantom.center, 500.0),
            Err(CatphanError::InvalidRoi(_))
        ));
    }

    #[test]
    fn test_circular_runs_wrap() {
        let scores = [5.0, 0.0, 0.0, 5.0, 0.0, 5.0];
        assert_eq!(circular_runs(&scores, 1.0), vec![(3, 1), (5, 2)]);
        assert!(circular_runs(&[5.0, 5.0], 1.0).is_empty());
    }
}
