use crate::error::{CatphanError, Result};
use crate::types::PixelSpacing;
use ndarray::Array2;

/// One CT slice: stored pixel values plus the attributes needed to
/// calibrate and place them
///
/// Calibrated value = raw × slope + intercept (Hounsfield units).
#[derive(Debug, Clone)]
pub struct Slice {
    raw: Array2<f64>,
    rescale_slope: f64,
    rescale_intercept: f64,
    pixel_spacing: PixelSpacing,
    slice_location: f64,
    slice_thickness: f64,
}

impl Slice {
    /// Creates a slice with identity rescale
    ///
    /// `raw` is indexed `[row, column]`.
    pub fn new(raw: Array2<f64>, pixel_spacing: PixelSpacing, slice_location: f64) -> Self {
        Self {
            raw,
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
            pixel_spacing,
            slice_location,
            slice_thickness: 0.0,
        }
    }

    /// Builder: rescale slope and intercept
    pub fn with_rescale(mut self, slope: f64, intercept: f64) -> Self {
        self.rescale_slope = slope;
        self.rescale_intercept = intercept;
        self
    }

    /// Builder: nominal slice thickness in mm
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.slice_thickness = thickness;
        self
    }

    pub fn raw(&self) -> &Array2<f64> {
        &self.raw
    }

    /// Calibrated (HU) copy of the pixel data
    pub fn calibrated(&self) -> Array2<f64> {
        let (slope, intercept) = (self.rescale_slope, self.rescale_intercept);
        self.raw.mapv(|v| v * slope + intercept)
    }

    pub fn rescale_slope(&self) -> f64 {
        self.rescale_slope
    }

    pub fn rescale_intercept(&self) -> f64 {
        self.rescale_intercept
    }

    pub fn pixel_spacing(&self) -> PixelSpacing {
        self.pixel_spacing
    }

    pub fn slice_location(&self) -> f64 {
        self.slice_location
    }

    pub fn slice_thickness(&self) -> f64 {
        self.slice_thickness
    }

    /// (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        self.raw.dim()
    }
}

/// Ordered sequence of slices sorted by slice location
///
/// Construction validates the ordering precondition: slice locations must
/// be strictly monotonic (either direction), and every slice must share
/// the same dimensions and a valid pixel spacing.
#[derive(Debug, Clone)]
pub struct ImageStack {
    slices: Vec<Slice>,
}

impl ImageStack {
    /// Creates a stack from already-ordered slices
    ///
    /// # Errors
    ///
    /// Returns `InvalidStack` if the stack is empty, the dimensions differ,
    /// a pixel spacing is invalid, or the slice locations are not strictly
    /// monotonic.
    pub fn new(slices: Vec<Slice>) -> Result<Self> {
        let first = slices
            .first()
            .ok_or_else(|| CatphanError::InvalidStack("stack contains no slices".to_string()))?;
        let dim = first.dim();
        if dim.0 == 0 || dim.1 == 0 {
            return Err(CatphanError::InvalidStack(
                "slices have no pixels".to_string(),
            ));
        }

        for (i, slice) in slices.iter().enumerate() {
            if slice.dim() != dim {
                return Err(CatphanError::InvalidStack(format!(
                    "slice {} is {:?}, expected {:?}",
                    i,
                    slice.dim(),
                    dim
                )));
            }
            if !slice.pixel_spacing().is_valid() {
                return Err(CatphanError::InvalidStack(format!(
                    "slice {} has invalid pixel spacing {}",
                    i,
                    slice.pixel_spacing()
                )));
            }
        }

        if slices.len() > 1 {
            let direction = (slices[1].slice_location - slices[0].slice_location).signum();
            let monotonic = direction != 0.0
                && slices.windows(2).all(|w| {
                    let step = w[1].slice_location - w[0].slice_location;
                    step.is_finite() && step.signum() == direction && step != 0.0
                });
            if !monotonic {
                return Err(CatphanError::InvalidStack(
                    "slice locations are not strictly monotonic".to_string(),
                ));
            }
        }

        Ok(Self { slices })
    }

    /// Sorts slices by descending slice location, then validates
    pub fn from_unsorted(mut slices: Vec<Slice>) -> Result<Self> {
        slices.sort_by(|a, b| b.slice_location.total_cmp(&a.slice_location));
        Self::new(slices)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Slice> {
        self.slices.get(index)
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// (rows, columns) shared by every slice
    pub fn dim(&self) -> (usize, usize) {
        self.slices[0].dim()
    }

    /// Pixel spacing of the first slice
    pub fn pixel_spacing(&self) -> PixelSpacing {
        self.slices[0].pixel_spacing()
    }

    /// Sign of the slice location step along the stack
    ///
    /// 1.0 when locations increase with index, -1.0 when they decrease.
    /// A single-slice stack counts as increasing.
    pub fn location_direction(&self) -> f64 {
        match self.slices.as_slice() {
            [first, second, ..] if second.slice_location < first.slice_location => -1.0,
            _ => 1.0,
        }
    }

    /// Mean absolute distance between adjacent slices in mm
    ///
    /// Falls back to the nominal slice thickness for a single-slice stack.
    pub fn slice_spacing(&self) -> f64 {
        if self.slices.len() < 2 {
            return self.slices[0].slice_thickness();
        }
        let first = self.slices[0].slice_location;
        let last = self.slices[self.slices.len() - 1].slice_location;
        (last - first).abs() / (self.slices.len() - 1) as f64
    }
}
