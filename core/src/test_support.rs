//! Synthetic phantom images for unit and end-to-end tests

use crate::geometry::polar_point_mm;
use crate::types::{ImageStack, PhantomConfig, PixelSpacing, Point, Slice};
use ndarray::Array2;

const BACKGROUND_HU: f64 = -1000.0;
const BODY_HU: f64 = 0.0;
const BAR_HU: f64 = 1000.0;
const RAMP_HU: f64 = 600.0;
const INSERT_RADIUS_MM: f64 = 6.0;
/// Bars extend this far on each side of their chord
const BAR_HALF_HEIGHT_MM: f64 = 3.0;

/// Content of one synthetic slice
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SliceContent {
    Body,
    Contrast,
    Uniformity,
    /// Line-pair bars scaled by the given contrast factor
    LinePairs(f64),
}

/// Cylindrical phantom drawn on a pixel grid
#[derive(Debug, Clone)]
pub(crate) struct SyntheticPhantom {
    pub spacing: PixelSpacing,
    pub center: Point,
    pub rows: usize,
    pub cols: usize,
    pub rotation_deg: f64,
    pub body_radius_mm: f64,
    pub ramp_thickness_mm: f64,
    /// Slice locations increase with stack index
    pub ascending: bool,
    pub config: PhantomConfig,
}

impl Default for SyntheticPhantom {
    /// 0.5 mm pixels, whole phantom in view
    fn default() -> Self {
        Self {
            spacing: PixelSpacing::isotropic(0.5),
            center: Point::new(221.3, 218.6),
            rows: 440,
            cols: 440,
            rotation_deg: 0.0,
            body_radius_mm: 100.0,
            ramp_thickness_mm: 2.5,
            ascending: false,
            config: PhantomConfig::catphan_500(),
        }
    }
}

impl SyntheticPhantom {
    /// 1 mm pixels; small enough for long stacks
    pub fn coarse() -> Self {
        Self {
            spacing: PixelSpacing::isotropic(1.0),
            center: Point::new(120.4, 118.7),
            rows: 240,
            cols: 240,
            ..Self::default()
        }
    }

    /// 0.1 mm pixels covering the line-pair ring only
    pub fn fine() -> Self {
        Self {
            spacing: PixelSpacing::isotropic(0.1),
            center: Point::new(550.2, 549.6),
            rows: 1100,
            cols: 1100,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation_deg: f64) -> Self {
        self.rotation_deg = rotation_deg;
        self
    }

    pub fn with_ascending_locations(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Position at `radius_mm` and nominal `angle_deg`, rotated with the
    /// phantom
    pub fn polar(&self, radius_mm: f64, angle_deg: f64) -> Point {
        polar_point_mm(self.center, self.spacing, radius_mm, angle_deg + self.rotation_deg)
    }

    /// Sets every pixel within `radius_mm` of `center` to `value`
    pub fn paint_disc(&self, image: &mut Array2<f64>, center: Point, radius_mm: f64, value: f64) {
        let (dx, dy) = (self.spacing.dx(), self.spacing.dy());
        for ((row, col), v) in image.indexed_iter_mut() {
            let x = (col as f64 - center.x) * dx;
            let y = (row as f64 - center.y) * dy;
            if x * x + y * y <= radius_mm * radius_mm {
                *v = value;
            }
        }
    }

    /// Nominal HU of each configured material, in configuration order
    pub fn material_hu(&self) -> Vec<f64> {
        self.config
            .contrast
            .materials
            .iter()
            .map(|m| material_hu(&m.label))
            .collect()
    }

    /// Uniform body on an air background
    pub fn body_image(&self) -> Array2<f64> {
        let mut img = Array2::from_elem(self.dim(), BACKGROUND_HU);
        self.paint_disc(&mut img, self.center, self.body_radius_mm, BODY_HU);
        img
    }

    pub fn uniformity_image(&self) -> Array2<f64> {
        self.body_image()
    }

    /// Body with the contrast inserts and a wire ramp
    ///
    /// The ramp is an axis-aligned bar 36 to 38.5 mm right of centre whose
    /// length along y encodes `ramp_thickness_mm`.
    pub fn contrast_image(&self) -> Array2<f64> {
        let mut img = self.body_image();
        let contrast = &self.config.contrast;
        for material in &contrast.materials {
            let hu = material_hu(&material.label);
            if hu == BODY_HU {
                continue;
            }
            let c = self.polar(contrast.ring_radius_mm, material.angle_deg);
            self.paint_disc(&mut img, c, INSERT_RADIUS_MM, hu);
        }

        let ramp = &contrast.thickness;
        let half_length = 0.5 * self.ramp_thickness_mm / ramp.ramp_angle_deg.to_radians().tan();
        let (dx, dy) = (self.spacing.dx(), self.spacing.dy());
        for ((row, col), v) in img.indexed_iter_mut() {
            let x = (col as f64 - self.center.x) * dx;
            let y = (row as f64 - self.center.y) * dy;
            if (36.0..=38.5).contains(&x) && y.abs() <= half_length {
                *v = RAMP_HU;
            }
        }
        img
    }

    /// Body with every line-pair group drawn as bars across its chord
    pub fn line_pair_image(&self, contrast: f64) -> Array2<f64> {
        let mut img = self.body_image();
        let (dx, dy) = (self.spacing.dx(), self.spacing.dy());

        for group in &self.config.resolution.groups {
            let p0 = self.polar(group.radius_mm, group.start_angle_deg);
            let p1 = self.polar(group.radius_mm, group.end_angle_deg);
            let mid = Point::new(0.5 * (p0.x + p1.x), 0.5 * (p0.y + p1.y));
            let (ux, uy) = ((p1.x - p0.x) * dx, (p1.y - p0.y) * dy);
            let chord = (ux * ux + uy * uy).sqrt();
            let (ux, uy) = (ux / chord, uy / chord);

            let width = 1.0 / (2.0 * group.frequency);
            let length = (2 * group.bars - 1) as f64 * width;

            for ((row, col), v) in img.indexed_iter_mut() {
                let x = (col as f64 - mid.x) * dx;
                let y = (row as f64 - mid.y) * dy;
                let along = x * ux + y * uy + 0.5 * length;
                let across = -x * uy + y * ux;
                if across.abs() > BAR_HALF_HEIGHT_MM || !(0.0..length).contains(&along) {
                    continue;
                }
                if ((along / width).floor() as i64) % 2 == 0 {
                    *v = BODY_HU + contrast * BAR_HU;
                }
            }
        }
        img
    }

    /// Stack of `n` slices, `slice_spacing_mm` apart, stored as raw values
    /// with a -1024 intercept
    ///
    /// Locations descend from 0 unless `ascending` is set.
    pub fn stack_from(
        &self,
        n: usize,
        slice_spacing_mm: f64,
        content: impl Fn(usize) -> SliceContent,
    ) -> ImageStack {
        let body = self.body_image();
        let contrast = self.contrast_image();
        let step = if self.ascending { slice_spacing_mm } else { -slice_spacing_mm };
        let slices = (0..n)
            .map(|i| {
                let hu = match content(i) {
                    SliceContent::Body | SliceContent::Uniformity => body.clone(),
                    SliceContent::Contrast => contrast.clone(),
                    SliceContent::LinePairs(w) => self.line_pair_image(w),
                };
                Slice::new(hu.mapv(|v| v + 1024.0), self.spacing, i as f64 * step)
                    .with_rescale(1.0, -1024.0)
                    .with_thickness(slice_spacing_mm)
            })
            .collect();
        ImageStack::new(slices).expect("synthetic stack is valid")
    }

    /// Line pairs on one slice, contrast inserts and uniformity body on
    /// three slices around their indices
    pub fn stack(
        &self,
        n: usize,
        slice_spacing_mm: f64,
        resolution: usize,
        contrast: Option<usize>,
        uniformity: Option<usize>,
    ) -> ImageStack {
        let near = |i: usize, target: Option<usize>| target.map_or(false, |t| i.abs_diff(t) <= 1);
        self.stack_from(n, slice_spacing_mm, |i| {
            if i == resolution {
                SliceContent::LinePairs(1.0)
            } else if near(i, contrast) {
                SliceContent::Contrast
            } else if near(i, uniformity) {
                SliceContent::Uniformity
            } else {
                SliceContent::Body
            }
        })
    }

    pub fn uniform_stack(&self, n: usize, slice_spacing_mm: f64) -> ImageStack {
        self.stack_from(n, slice_spacing_mm, |_| SliceContent::Body)
    }
}

fn material_hu(label: &str) -> f64 {
    match label {
        "Delrin" => 340.0,
        "Acrylic" => 120.0,
        "Air" | "Air2" => -1000.0,
        "Polystyrene" => -35.0,
        "LDPE" => -100.0,
        "PMP" => -200.0,
        "Teflon" => 990.0,
        _ => BODY_HU,
    }
}
