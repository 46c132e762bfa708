use super::{find_center, polar_point_mm};
use crate::error::{CatphanError, Result};
use crate::sampling::extract_profile;
use crate::signal::derivative;
use crate::types::{ImageStack, LocatorConfig, ModuleSliceIndex};
use log::{debug, info};

/// Counts strong derivative samples along the line-pair probe chords
///
/// A slice without a detectable phantom body scores zero.
fn line_pair_score(stack: &ImageStack, index: usize, edge_threshold: f64, config: &LocatorConfig) -> Result<usize> {
    let slice = stack.get(index).ok_or_else(|| {
        CatphanError::InsufficientSlices(format!("slice {} out of range", index))
    })?;
    let image = slice.calibrated();
    let center = match find_center(&image, config.center_threshold) {
        Ok(estimate) => estimate.center,
        Err(e) => {
            debug!("Slice {}: {}", index, e);
            return Ok(0);
        }
    };

    let spacing = slice.pixel_spacing();
    let mut count = 0;
    for pair in config.probe_angles_deg.windows(2) {
        let start = polar_point_mm(center, spacing, config.probe_radius_mm, pair[0]);
        let end = polar_point_mm(center, spacing, config.probe_radius_mm, pair[1]);
        let profile = extract_profile(&image, start, end, config.samples_per_chord)?;
        count += derivative(&profile)
            .iter()
            .filter(|d| d.abs() > edge_threshold)
            .count();
    }
    Ok(count)
}

/// Best eligible candidate: highest score, then nearest `reference`, then
/// lowest index
fn best_candidate(scores: &[(usize, usize)], min_edge_count: usize, reference: usize) -> Option<usize> {
    scores
        .iter()
        .filter(|&&(_, score)| score > min_edge_count)
        .min_by_key(|&&(index, score)| (std::cmp::Reverse(score), index.abs_diff(reference), index))
        .map(|&(index, _)| index)
}

/// Finds the slice showing the line-pair (CTP528) module
///
/// # Algorithm
///
/// 1. For each candidate slice, find the phantom centre and profile the
///    chords between consecutive probe angles at the probe radius
/// 2. Score = number of derivative samples with `|d| > edge_threshold`
/// 3. A slice is eligible only if its score exceeds `min_edge_count`
/// 4. Candidates are the slices within `search_window` of
///    `expected_index`; if none is eligible the whole stack is scanned.
///    Without an expected index the whole stack is scanned and ties break
///    toward the middle slice.
///
/// # Errors
///
/// - `InsufficientSlices` if `expected_index` is outside the stack
/// - `ModuleNotLocated` if no slice is eligible
pub fn find_slice_ctp528(
    stack: &ImageStack,
    expected_index: Option<usize>,
    edge_threshold: f64,
    min_edge_count: usize,
    config: &LocatorConfig,
) -> Result<usize> {
    let len = stack.len();
    if let Some(expected) = expected_index {
        if expected >= len {
            return Err(CatphanError::InsufficientSlices(format!(
                "expected line-pair slice {} outside stack of {}",
                expected, len
            )));
        }
        let lo = expected.saturating_sub(config.search_window);
        let hi = (expected + config.search_window).min(len - 1);
        let scores = (lo..=hi)
            .map(|i| Ok((i, line_pair_score(stack, i, edge_threshold, config)?)))
            .collect::<Result<Vec<_>>>()?;
        debug!("Line-pair scores near slice {}: {:?}", expected, scores);
        if let Some(found) = best_candidate(&scores, min_edge_count, expected) {
            return Ok(found);
        }
        debug!("No line-pair slice near {}, scanning whole stack", expected);
    }

    let reference = expected_index.unwrap_or(len / 2);
    let scores = (0..len)
        .map(|i| Ok((i, line_pair_score(stack, i, edge_threshold, config)?)))
        .collect::<Result<Vec<_>>>()?;
    best_candidate(&scores, min_edge_count, reference).ok_or_else(|| {
        let max = scores.iter().map(|&(_, s)| s).max().unwrap_or(0);
        CatphanError::ModuleNotLocated(format!(
            "no slice has more than {} line-pair edges (best {})",
            min_edge_count, max
        ))
    })
}

/// Locates all three modules
///
/// The line-pair slice is found first. The contrast and uniformity slices
/// follow from their physical offsets along the slice axis: an offset of
/// `d` mm targets the slice at location `loc(resolution) + d`, whichever
/// way the stack is ordered. Offsets are converted with the stack's slice
/// spacing, rounded and clamped to the stack.
///
/// # Errors
///
/// Propagates [`find_slice_ctp528`] failures. Returns `InvalidStack` if
/// the slice spacing is not positive, and `ModuleNotLocated` if two
/// modules land on the same slice after clamping.
pub fn locate_all_modules(stack: &ImageStack, config: &LocatorConfig) -> Result<ModuleSliceIndex> {
    let resolution = find_slice_ctp528(
        stack,
        config.expected_slice,
        config.edge_threshold,
        config.min_edge_count,
        config,
    )?;

    let spacing = stack.slice_spacing();
    if !spacing.is_finite() || spacing <= 0.0 {
        return Err(CatphanError::InvalidStack(format!(
            "cannot convert module offsets with slice spacing {}",
            spacing
        )));
    }

    let last = stack.len() as i64 - 1;
    let direction = stack.location_direction();
    let offset_index = |offset_mm: f64| -> usize {
        let delta = (direction * offset_mm / spacing).round() as i64;
        (resolution as i64 + delta).clamp(0, last) as usize
    };
    let modules = ModuleSliceIndex {
        resolution,
        contrast: offset_index(config.contrast_offset_mm),
        uniformity: offset_index(config.uniformity_offset_mm),
    };

    if !modules.is_distinct() {
        return Err(CatphanError::ModuleNotLocated(format!(
            "modules collapse onto the same slice {:?} ({} slices at {:.2} mm)",
            modules,
            stack.len(),
            spacing
        )));
    }
    info!(
        "Modules located: resolution {}, contrast {}, uniformity {}",
        modules.resolution, modules.contrast, modules.uniformity
    );
    Ok(modules)
}
