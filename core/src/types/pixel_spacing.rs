use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Pixel spacing in millimeters (row, column)
///
/// Follows the DICOM PixelSpacing order: `row` is the distance between
/// adjacent rows (the y step), `col` the distance between adjacent
/// columns (the x step).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct PixelSpacing {
    pub row: f64,
    pub col: f64,
}

impl PixelSpacing {
    /// Creates a new PixelSpacing
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    /// Same spacing along both axes
    pub fn isotropic(mm: f64) -> Self {
        Self { row: mm, col: mm }
    }

    /// Spacing along x (between columns)
    pub fn dx(&self) -> f64 {
        self.col
    }

    /// Spacing along y (between rows)
    pub fn dy(&self) -> f64 {
        self.row
    }

    /// Both components finite and strictly positive
    pub fn is_valid(&self) -> bool {
        self.row.is_finite() && self.col.is_finite() && self.row > 0.0 && self.col > 0.0
    }

    /// Converts a radial physical distance to pixels using the mean spacing
    pub fn mm_to_px(&self, mm: f64) -> f64 {
        mm / (0.5 * (self.row + self.col))
    }

    /// Parses pixel spacing from string
    ///
    /// Accepts formats like:
    /// - "0.488281\\0.488281"
    /// - "0.5 0.5"
    /// - "[0.5, 0.5]"
    /// - Exponential notation: "4.88e-1 4.88e-1"
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed
    pub fn parse(s: &str) -> Result<Self, String> {
        static REGEX: OnceLock<Regex> = OnceLock::new();
        let re = REGEX.get_or_init(|| {
            Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("Failed to compile regex")
        });

        let mut numbers = re.find_iter(s).map(|m| m.as_str());
        let row_str = numbers
            .next()
            .ok_or_else(|| format!("Failed to parse PixelSpacing from '{}'", s))?;
        let col_str = numbers
            .next()
            .ok_or_else(|| format!("Failed to parse PixelSpacing from '{}'", s))?;

        let row: f64 = row_str
            .parse()
            .map_err(|e| format!("Failed to parse row value: {}", e))?;
        let col: f64 = col_str
            .parse()
            .map_err(|e| format!("Failed to parse col value: {}", e))?;

        let spacing = PixelSpacing { row, col };
        if !spacing.is_valid() {
            return Err(format!("PixelSpacing must be positive, got '{}'", s));
        }
        Ok(spacing)
    }
}

impl fmt::Display for PixelSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} mm", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0.488281\\0.488281", 0.488281, 0.488281)]
    #[case("0.5 0.6", 0.5, 0.6)]
    #[case("[0.5, 0.5]", 0.5, 0.5)]
    #[case("4.5e-1\\4.5e-1", 0.45, 0.45)]
    fn test_parse_formats(#[case] input: &str, #[case] row: f64, #[case] col: f64) {
        let ps = PixelSpacing::parse(input).unwrap();
        assert_eq!(ps.row, row);
        assert_eq!(ps.col, col);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(PixelSpacing::parse("invalid").is_err());
        assert!(PixelSpacing::parse("").is_err());
        assert!(PixelSpacing::parse("0.5").is_err());
        assert!(PixelSpacing::parse("0\\0.5").is_err());
    }

    #[test]
    fn test_axis_accessors() {
        let ps = PixelSpacing::new(0.4, 0.6);
        assert_eq!(ps.dy(), 0.4);
        assert_eq!(ps.dx(), 0.6);
        assert!((ps.mm_to_px(5.0) - 10.0).abs() < 1e-12);
    }
}
