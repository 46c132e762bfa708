use crate::error::{CatphanError, Result};
use crate::geometry::polar_point_mm;
use crate::sampling::{average_slices, bilinear, extract_profile, window_indices};
use crate::signal::{derivative, find_local_peaks, first_falling_crossing, mean, std_dev};
use crate::types::{
    ImageStack, MtfPoint, MtfThresholds, PixelSpacing, Point, ResolutionConfig, ResolutionResult,
};
use log::{debug, info, warn};
use ndarray::Array2;

/// Relative tolerance below which two window scores count as equal
const SCORE_TOLERANCE: f64 = 1e-9;

/// Averaged line-pair image chosen by [`ResolutionAnalyzer::select_optimal_slices`]
#[derive(Debug, Clone)]
pub struct OptimalSlices {
    pub image: Array2<f64>,
    /// (slice index, mean along the trace) for every slice considered
    pub slice_means: Vec<(usize, f64)>,
    /// Centre of the chosen window minus the nominal index
    pub offset: i64,
}

/// Resolution (CTP528) measurements
pub struct ResolutionAnalyzer;

impl ResolutionAnalyzer {
    /// Picks the sharpest three-slice window near the nominal slice
    ///
    /// Window centres range over `nominal_index ± search_range` (clamped
    /// to the stack). Each window is averaged and scored by the standard
    /// deviation of a semicircular trace through the line-pair ring; the
    /// highest score wins, ties going to the centre nearest
    /// `nominal_index`.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientSlices` if `nominal_index` is outside the
    /// stack.
    pub fn select_optimal_slices(
        stack: &ImageStack,
        nominal_index: usize,
        search_range: usize,
        center: Point,
        config: &ResolutionConfig,
    ) -> Result<OptimalSlices> {
        let len = stack.len();
        if nominal_index >= len {
            return Err(CatphanError::InsufficientSlices(format!(
                "nominal line-pair slice {} outside stack of {}",
                nominal_index, len
            )));
        }
        let spacing = stack.pixel_spacing();
        let candidates = window_indices(nominal_index, search_range, len);

        let considered = window_indices(nominal_index, search_range + 1, len);
        let slice_means = considered
            .iter()
            .filter_map(|&i| {
                let image = stack.get(i)?.calibrated();
                let trace = semicircle_trace(&image, spacing, center, config);
                Some((i, mean(&trace).unwrap_or(0.0)))
            })
            .collect::<Vec<_>>();

        let mut best: Option<(usize, f64, Array2<f64>)> = None;
        for &k in &candidates {
            let image = average_slices(stack, &window_indices(k, 1, len))?;
            let trace = semicircle_trace(&image, spacing, center, config);
            let score = std_dev(&trace).unwrap_or(0.0);
            debug!("Line-pair window at {}: trace std {:.2}", k, score);

            let better = match &best {
                None => true,
                Some((best_k, best_score, _)) => {
                    let tol = SCORE_TOLERANCE * best_score.abs().max(1.0);
                    score > best_score + tol
                        || ((score - best_score).abs() <= tol
                            && k.abs_diff(nominal_index) < best_k.abs_diff(nominal_index))
                }
            };
            if better {
                best = Some((k, score, image));
            }
        }

        let (k, _, image) = best.ok_or_else(|| {
            CatphanError::InsufficientSlices("no candidate line-pair windows".to_string())
        })?;
        Ok(OptimalSlices {
            image,
            slice_means,
            offset: k as i64 - nominal_index as i64,
        })
    }

    /// Modulation depth of one line-pair profile
    ///
    /// Rising and falling edges are derivative peaks; the threshold starts
    /// at `edge_threshold_start` and drops by 1 HU until at least `bars`
    /// edges of each polarity are found. Between consecutive edges the
    /// profile maximum is taken after a rising edge (bar) and the minimum
    /// after a falling edge (gap). Values are shifted by
    /// `modulation_offset` before `(max − min) / (max + min)`.
    ///
    /// Returns `None` if the bars cannot be resolved down to
    /// `edge_threshold_min`.
    pub fn group_modulation(profile: &[f64], bars: usize, config: &ResolutionConfig) -> Option<f64> {
        let shifted: Vec<f64> = profile.iter().map(|v| v + config.modulation_offset).collect();
        let d = derivative(&shifted);
        let negated: Vec<f64> = d.iter().map(|v| -v).collect();

        let mut threshold = config.edge_threshold_start;
        let (rising, falling) = loop {
            let rising = find_local_peaks(&d, threshold);
            let falling = find_local_peaks(&negated, threshold);
            if rising.len() >= bars && falling.len() >= bars {
                break (rising, falling);
            }
            if threshold <= config.edge_threshold_min {
                return None;
            }
            threshold -= 1.0;
        };

        let mut edges: Vec<(usize, bool)> = rising
            .iter()
            .map(|&i| (i, true))
            .chain(falling.iter().map(|&i| (i, false)))
            .collect();
        edges.sort_unstable();

        let mut maxima = Vec::new();
        let mut minima = Vec::new();
        for pair in edges.windows(2) {
            let ((left, is_rising), (right, _)) = (pair[0], pair[1]);
            let segment = &shifted[left + 1..=right];
            if is_rising {
                maxima.push(segment.iter().copied().fold(f64::NEG_INFINITY, f64::max));
            } else {
                minima.push(segment.iter().copied().fold(f64::INFINITY, f64::min));
            }
        }

        let peak = mean(&maxima)?;
        let valley = mean(&minima)?;
        let total = peak + valley;
        if total.abs() < f64::EPSILON {
            return None;
        }
        Some((peak - valley) / total)
    }

    /// Relative MTF over the configured line-pair groups
    ///
    /// Each group is profiled along the chord between its start and end
    /// angles (plus `rotation_deg`) at its radius. Unresolved groups get
    /// modulation 0. Modulations are normalized by the lowest-frequency
    /// group.
    ///
    /// # Errors
    ///
    /// Returns `FeatureNotResolved` if the lowest-frequency group has no
    /// positive modulation.
    pub fn calculate_mtf(
        image: &Array2<f64>,
        spacing: PixelSpacing,
        center: Point,
        rotation_deg: f64,
        config: &ResolutionConfig,
    ) -> Result<Vec<MtfPoint>> {
        let mut points = Vec::with_capacity(config.groups.len());
        for group in &config.groups {
            let start = polar_point_mm(
                center,
                spacing,
                group.radius_mm,
                group.start_angle_deg + rotation_deg,
            );
            let end = polar_point_mm(center, spacing, group.radius_mm, group.end_angle_deg + rotation_deg);
            let profile = extract_profile(image, start, end, config.samples_per_group)?;

            let (modulation, resolved) = match Self::group_modulation(&profile, group.bars, config) {
                Some(m) => (m, true),
                None => {
                    warn!(
                        "Cannot resolve {} bars at {} lp/mm, modulation set to 0",
                        group.bars, group.frequency
                    );
                    (0.0, false)
                }
            };
            points.push(MtfPoint {
                frequency: group.frequency,
                mtf: 0.0,
                modulation,
                resolved,
            });
        }
        points.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));

        let reference = points.first().map(|p| p.modulation).unwrap_or(0.0);
        if reference <= 0.0 {
            return Err(CatphanError::FeatureNotResolved(
                "lowest-frequency line-pair group has no modulation".to_string(),
            ));
        }
        for p in &mut points {
            p.mtf = p.modulation / reference;
        }
        Ok(points)
    }

    /// Frequencies where the relative MTF falls through 80/50/30/10 %
    ///
    /// Scans from low to high frequency and interpolates linearly at the
    /// first sample pair straddling each level, so a non-monotonic curve
    /// reports its first crossing.
    pub fn mtf_thresholds(curve: &[MtfPoint]) -> MtfThresholds {
        let f: Vec<f64> = curve.iter().map(|p| p.frequency).collect();
        let m: Vec<f64> = curve.iter().map(|p| p.mtf).collect();
        MtfThresholds {
            mtf80: first_falling_crossing(&f, &m, 0.8),
            mtf50: first_falling_crossing(&f, &m, 0.5),
            mtf30: first_falling_crossing(&f, &m, 0.3),
            mtf10: first_falling_crossing(&f, &m, 0.1),
        }
    }

    /// Runs the resolution measurement on one module
    pub fn analyze(
        stack: &ImageStack,
        nominal_index: usize,
        center: Point,
        rotation_deg: f64,
        config: &ResolutionConfig,
    ) -> Result<ResolutionResult> {
        let optimal =
            Self::select_optimal_slices(stack, nominal_index, config.search_range, center, config)?;
        let curve = Self::calculate_mtf(
            &optimal.image,
            stack.pixel_spacing(),
            center,
            rotation_deg,
            config,
        )?;
        let thresholds = Self::mtf_thresholds(&curve);
        info!(
            "Resolution: window offset {}, MTF50 {:?} lp/mm, MTF10 {:?} lp/mm",
            optimal.offset, thresholds.mtf50, thresholds.mtf10
        );
        Ok(ResolutionResult {
            curve,
            thresholds,
            slice_offset: optimal.offset,
        })
    }
}

/// Values along a semicircle (0° to 180°) at the trace radius
fn semicircle_trace(
    image: &Array2<f64>,
    spacing: PixelSpacing,
    center: Point,
    config: &ResolutionConfig,
) -> Vec<f64> {
    let n = config.trace_samples.max(2);
    (0..n)
        .map(|i| {
            let angle = 180.0 * i as f64 / (n - 1) as f64;
            let p = polar_point_mm(center, spacing, config.trace_radius_mm, angle);
            bilinear(image, p.x, p.y)
        })
        .collect()
}
