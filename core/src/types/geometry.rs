use crate::error::{CatphanError, Result};
use std::fmt;

/// Sub-pixel position in image coordinates
///
/// `x` is the column and `y` the row; `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Strictly inside an image of `height` rows and `width` columns
    pub fn is_inside(&self, height: usize, width: usize) -> bool {
        self.is_finite()
            && self.x >= 0.0
            && self.y >= 0.0
            && self.x <= (width as f64 - 1.0)
            && self.y <= (height as f64 - 1.0)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Normalizes an angle in degrees to (-180, 180]
pub fn normalize_angle_deg(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Circular region of interest in pixel units
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct CircularRoi {
    pub center: Point,
    pub radius: f64,
}

impl CircularRoi {
    pub fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Checks radius and bounds
    ///
    /// ROIs must lie entirely inside the image: a partially covered ROI
    /// would bias its statistics, so it is rejected instead of truncated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoi` for a non-positive/non-finite radius, a
    /// non-finite center, or any part of the disc outside the image.
    pub fn validate(&self, height: usize, width: usize) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(CatphanError::InvalidRoi(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        if !self.center.is_finite() {
            return Err(CatphanError::InvalidRoi(
                "ROI center is not finite".to_string(),
            ));
        }
        let c = self.center;
        let r = self.radius;
        if c.x - r < 0.0
            || c.y - r < 0.0
            || c.x + r > width as f64 - 1.0
            || c.y + r > height as f64 - 1.0
        {
            return Err(CatphanError::InvalidRoi(format!(
                "ROI at {} with radius {:.1} px extends outside {}x{} image",
                c, r, width, height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(180.0, 180.0)]
    #[case(-180.0, 180.0)]
    #[case(270.0, -90.0)]
    #[case(-190.0, 170.0)]
    #[case(725.0, 5.0)]
    fn test_normalize_angle(#[case] input: f64, #[case] expected: f64) {
        assert!((normalize_angle_deg(input) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_roi_validation() {
        assert!(CircularRoi::new(Point::new(10.0, 10.0), 3.0)
            .validate(32, 32)
            .is_ok());
        assert!(matches!(
            CircularRoi::new(Point::new(10.0, 10.0), 0.0).validate(32, 32),
            Err(CatphanError::InvalidRoi(_))
        ));
        assert!(matches!(
            CircularRoi::new(Point::new(2.0, 10.0), 3.0).validate(32, 32),
            Err(CatphanError::InvalidRoi(_))
        ));
        assert!(matches!(
            CircularRoi::new(Point::new(f64::NAN, 10.0), 3.0).validate(32, 32),
            Err(CatphanError::InvalidRoi(_))
        ));
    }
}
