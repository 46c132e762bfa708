use crate::error::{CatphanError, Result};
use crate::types::Point;
use log::debug;
use ndarray::Array2;
use std::collections::VecDeque;

/// Smallest connected region accepted as a phantom body, in pixels
pub const MIN_REGION_PIXELS: usize = 64;

/// Phantom body centroid and its outline
#[derive(Debug, Clone, PartialEq)]
pub struct CenterEstimate {
    /// Sub-pixel centroid of the filled body region
    pub center: Point,
    /// Outline pixels ordered by angle around `center`
    pub boundary: Vec<Point>,
    /// Number of pixels in the filled region
    pub area: usize,
}

/// Finds the phantom centre by segmenting the body
///
/// # Algorithm
///
/// 1. Threshold the calibrated image (`value > threshold`)
/// 2. Keep the largest 4-connected region
/// 3. Fill interior holes (air inserts) by flooding the background from
///    the image border
/// 4. Centroid of the filled region; outline = region pixels with a
///    4-neighbour outside the region
///
/// # Errors
///
/// Returns `NoPhantomDetected` if no pixel exceeds `threshold` or the
/// largest region is smaller than [`MIN_REGION_PIXELS`].
pub fn find_center(image: &Array2<f64>, threshold: f64) -> Result<CenterEstimate> {
    let (h, w) = image.dim();
    let above = image.mapv(|v| v > threshold);
    if !above.iter().any(|&b| b) {
        return Err(CatphanError::NoPhantomDetected(format!(
            "no pixel above {} HU",
            threshold
        )));
    }

    let region = largest_component(&above);
    let size = region.iter().filter(|&&b| b).count();
    if size < MIN_REGION_PIXELS {
        return Err(CatphanError::NoPhantomDetected(format!(
            "largest region above {} HU has only {} pixels",
            threshold, size
        )));
    }
    let region = fill_holes(&region);

    let mut area = 0usize;
    let (mut sx, mut sy) = (0.0, 0.0);
    for ((row, col), &inside) in region.indexed_iter() {
        if inside {
            area += 1;
            sx += col as f64;
            sy += row as f64;
        }
    }
    let center = Point::new(sx / area as f64, sy / area as f64);

    let is_in = |r: isize, c: isize| -> bool {
        r >= 0 && c >= 0 && (r as usize) < h && (c as usize) < w && region[[r as usize, c as usize]]
    };
    let mut boundary: Vec<Point> = region
        .indexed_iter()
        .filter(|&(_, &inside)| inside)
        .filter(|&((row, col), _)| {
            let (r, c) = (row as isize, col as isize);
            !is_in(r - 1, c) || !is_in(r + 1, c) || !is_in(r, c - 1) || !is_in(r, c + 1)
        })
        .map(|((row, col), _)| Point::new(col as f64, row as f64))
        .collect();
    boundary.sort_by(|a, b| {
        let ta = (a.y - center.y).atan2(a.x - center.x);
        let tb = (b.y - center.y).atan2(b.x - center.x);
        ta.total_cmp(&tb)
    });

    debug!(
        "Phantom centre {} from {} px region, {} outline px",
        center,
        area,
        boundary.len()
    );
    Ok(CenterEstimate {
        center,
        boundary,
        area,
    })
}

fn neighbours(row: usize, col: usize, h: usize, w: usize) -> impl Iterator<Item = (usize, usize)> {
    let mut out = Vec::with_capacity(4);
    if row > 0 {
        out.push((row - 1, col));
    }
    if row + 1 < h {
        out.push((row + 1, col));
    }
    if col > 0 {
        out.push((row, col - 1));
    }
    if col + 1 < w {
        out.push((row, col + 1));
    }
    out.into_iter()
}

/// Mask of the largest 4-connected `true` region
fn largest_component(mask: &Array2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    let mut labels = Array2::<u32>::zeros((h, w));
    let mut best_label = 0u32;
    let mut best_size = 0usize;
    let mut next_label = 0u32;
    let mut queue = VecDeque::new();

    for ((row, col), &set) in mask.indexed_iter() {
        if !set || labels[[row, col]] != 0 {
            continue;
        }
        next_label += 1;
        labels[[row, col]] = next_label;
        queue.push_back((row, col));
        let mut size = 0usize;
        while let Some((r, c)) = queue.pop_front() {
            size += 1;
            for (nr, nc) in neighbours(r, c, h, w) {
                if mask[[nr, nc]] && labels[[nr, nc]] == 0 {
                    labels[[nr, nc]] = next_label;
                    queue.push_back((nr, nc));
                }
            }
        }
        if size > best_size {
            best_size = size;
            best_label = next_label;
        }
    }

    labels.mapv(|l| l != 0 && l == best_label)
}

/// Region plus every pixel not reachable from the border through
/// non-region pixels
fn fill_holes(region: &Array2<bool>) -> Array2<bool> {
    let (h, w) = region.dim();
    let mut outside = Array2::from_elem((h, w), false);
    let mut queue = VecDeque::new();

    for row in 0..h {
        for col in 0..w {
            let on_border = row == 0 || col == 0 || row + 1 == h || col + 1 == w;
            if on_border && !region[[row, col]] {
                outside[[row, col]] = true;
                queue.push_back((row, col));
            }
        }
    }
    while let Some((r, c)) = queue.pop_front() {
        for (nr, nc) in neighbours(r, c, h, w) {
            if !region[[nr, nc]] && !outside[[nr, nc]] {
                outside[[nr, nc]] = true;
                queue.push_back((nr, nc));
            }
        }
    }

    outside.mapv(|o| !o)
}
