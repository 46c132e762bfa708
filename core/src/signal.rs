//! 1-D helpers shared by the profile-based measurements

/// First difference: `out[i] = values[i + 1] - values[i]`
pub fn derivative(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Indices of local maxima whose value is at least `min_height`
///
/// End points are never peaks. A flat-topped peak reports the middle of
/// its plateau.
pub fn find_local_peaks(values: &[f64], min_height: f64) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if values[i] > values[i - 1] {
            let mut j = i;
            while j + 1 < n && values[j + 1] == values[i] {
                j += 1;
            }
            if j + 1 < n && values[j + 1] < values[i] && values[i] >= min_height {
                peaks.push((i + j) / 2);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    peaks
}

/// Sub-sample position of a peak from a parabola through its neighbours
pub fn refine_peak(values: &[f64], idx: usize) -> f64 {
    if idx == 0 || idx + 1 >= values.len() {
        return idx as f64;
    }
    let y0 = values[idx - 1];
    let y1 = values[idx];
    let y2 = values[idx + 1];
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < 1e-12 {
        return idx as f64;
    }
    let offs = 0.5 * (y0 - y2) / denom;
    idx as f64 + offs.clamp(-0.5, 0.5)
}

/// Sub-sample positions of edges in a profile, in ascending order
///
/// An edge is a local peak of `|derivative|` of at least `threshold`.
/// Peaks closer than `min_separation` samples to a stronger one are
/// dropped. Positions are expressed in profile sample units: a derivative
/// peak at `i` lies between samples `i` and `i + 1`.
pub fn edge_positions(profile: &[f64], threshold: f64, min_separation: f64) -> Vec<f64> {
    let magnitude: Vec<f64> = derivative(profile).iter().map(|d| d.abs()).collect();
    let mut peaks = find_local_peaks(&magnitude, threshold);
    peaks.sort_by(|&a, &b| magnitude[b].total_cmp(&magnitude[a]));

    let mut kept: Vec<f64> = Vec::with_capacity(peaks.len());
    for idx in peaks {
        let pos = refine_peak(&magnitude, idx) + 0.5;
        if kept.iter().all(|&k| (k - pos).abs() >= min_separation) {
            kept.push(pos);
        }
    }
    kept.sort_by(|a, b| a.total_cmp(b));
    kept
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Width of the highest peak at half its height above the profile minimum
///
/// Crossings are linearly interpolated between samples. Returns `None`
/// when the profile does not fall below the half level on both sides of
/// the peak.
pub fn full_width_half_max(profile: &[f64]) -> Option<f64> {
    let (peak_idx, &peak) = profile
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let floor = profile.iter().copied().fold(f64::INFINITY, f64::min);
    if peak <= floor || !peak.is_finite() {
        return None;
    }
    let half = 0.5 * (peak + floor);

    let left = (0..peak_idx).rev().find(|&i| profile[i] < half).map(|i| {
        let (a, b) = (profile[i], profile[i + 1]);
        i as f64 + (half - a) / (b - a)
    })?;
    let right = (peak_idx + 1..profile.len())
        .find(|&i| profile[i] < half)
        .map(|i| {
            let (a, b) = (profile[i - 1], profile[i]);
            (i - 1) as f64 + (a - half) / (a - b)
        })?;

    Some(right - left)
}

/// First crossing of `level` scanning from low to high abscissa
///
/// Looks for the first `i` with `y[i] >= level > y[i + 1]` and
/// interpolates linearly between the two samples.
pub fn first_falling_crossing(x: &[f64], y: &[f64], level: f64) -> Option<f64> {
    x.windows(2).zip(y.windows(2)).find_map(|(xw, yw)| {
        if yw[0] >= level && level > yw[1] {
            let t = (yw[0] - level) / (yw[0] - yw[1]);
            Some(xw[0] + t * (xw[1] - xw[0]))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_derivative() {
        assert_eq!(derivative(&[1.0, 3.0, 2.0]), vec![2.0, -1.0]);
        assert!(derivative(&[1.0]).is_empty());
    }

    #[test]
    fn test_find_local_peaks() {
        let v = [0.0, 5.0, 0.0, 2.0, 2.0, 2.0, 0.0, 9.0];
        assert_eq!(find_local_peaks(&v, 0.0), vec![1, 4]);
        assert_eq!(find_local_peaks(&v, 3.0), vec![1]);
        // Rising edge into the last sample is not a peak
        assert!(find_local_peaks(&[0.0, 1.0, 2.0], 0.0).is_empty());
    }

    #[test]
    fn test_refine_peak_symmetric_and_skewed() {
        assert_eq!(refine_peak(&[1.0, 3.0, 1.0], 1), 1.0);
        let shifted = refine_peak(&[1.0, 3.0, 2.0], 1);
        assert!(shifted > 1.0 && shifted < 1.5);
    }

    #[test]
    fn test_edge_positions_of_a_box() {
        // Steps between samples 2|3 and 6|7
        let profile = [0.0, 0.0, 0.0, 100.0, 100.0, 100.0, 100.0, 0.0, 0.0];
        let edges = edge_positions(&profile, 40.0, 2.0);
        assert_eq!(edges, vec![2.5, 6.5]);
        assert!(edge_positions(&profile, 150.0, 2.0).is_empty());
    }

    #[test]
    fn test_edge_positions_suppresses_close_duplicates() {
        // One blurred step with a notch produces two derivative peaks
        let profile = [0.0, 0.0, 60.0, 100.0, 160.0, 160.0, 160.0];
        let edges = edge_positions(&profile, 40.0, 2.0);
        assert_eq!(edges.len(), 1);
        assert!(edges[0] > 1.0 && edges[0] < 4.5);
    }

    #[rstest]
    #[case(&[3.0, 1.0, 2.0], 2.0)]
    #[case(&[4.0, 1.0, 2.0, 3.0], 2.5)]
    fn test_median(#[case] values: &[f64], #[case] expected: f64) {
        assert_eq!(median(values), Some(expected));
    }

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 3.0]), Some(2.0));
        assert_eq!(std_dev(&[1.0, 3.0]), Some(1.0));
    }

    #[test]
    fn test_fwhm_of_triangle() {
        // Peak 10 over floor 0: half level 5 is crossed at 2.25 and 6.5
        let profile = [0.0, 0.0, 4.0, 8.0, 10.0, 8.0, 6.0, 4.0, 0.0];
        let width = full_width_half_max(&profile).unwrap();
        assert!((width - 4.25).abs() < 1e-9, "width {}", width);
    }

    #[test]
    fn test_fwhm_requires_both_crossings() {
        assert!(full_width_half_max(&[10.0, 8.0, 0.0]).is_none());
        assert!(full_width_half_max(&[1.0, 1.0, 1.0]).is_none());
    }

    #[test]
    fn test_first_falling_crossing_scans_low_to_high() {
        let x = [0.1, 0.2, 0.3, 0.4];
        let y = [1.0, 0.4, 0.6, 0.2];
        let f = first_falling_crossing(&x, &y, 0.5).unwrap();
        assert!((f - (0.1 + 0.1 * 5.0 / 6.0)).abs() < 1e-12);
        assert_eq!(first_falling_crossing(&x, &y, 0.1), None);
    }
}
