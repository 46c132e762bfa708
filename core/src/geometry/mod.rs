//! Geometric calibration: phantom centre, rotation, module slices and
//! slice thickness

pub mod center;
pub mod locate;
pub mod rotation;
pub mod thickness;

pub use center::{find_center, CenterEstimate, MIN_REGION_PIXELS};
pub use locate::{find_slice_ctp528, locate_all_modules};
pub use rotation::{find_rotation, RotationEstimate};
pub use thickness::calculate_slice_thickness;

use crate::types::{PixelSpacing, Point};

/// Image position at a physical radius and angle from `center`
///
/// Angles follow image axes (0° = +x, 90° = +y, i.e. down). Each axis is
/// scaled by its own pixel spacing.
pub fn polar_point_mm(center: Point, spacing: PixelSpacing, radius_mm: f64, angle_deg: f64) -> Point {
    let t = angle_deg.to_radians();
    Point::new(
        center.x + radius_mm * t.cos() / spacing.dx(),
        center.y + radius_mm * t.sin() / spacing.dy(),
    )
}
