use crate::analysis::{ContrastAnalyzer, ResolutionAnalyzer, UniformityAnalyzer};
use crate::error::{CatphanError, Result};
use crate::geometry::{find_center, find_rotation, locate_all_modules};
use crate::sampling::{average_slices, window_indices};
use crate::types::{ImageStack, ModuleCenters, PhantomConfig, PhantomModule, PhantomReport, Point};
use log::{debug, info};

/// Full CatPhan analysis of one CT series
///
/// Runs geometric calibration and then the contrast, uniformity and
/// resolution measurements. The analyzer holds only configuration, so one
/// instance can serve many stacks, including from several threads.
///
/// # Example
///
/// ```no_run
/// use catphan_core::{loader, PhantomAnalyzer, PhantomConfig};
///
/// let series = loader::load_series("/data/catphan/2024-05-01")?;
/// let analyzer = PhantomAnalyzer::new(PhantomConfig::catphan_500().with_expected_slice(40));
/// let report = analyzer.analyze(&series.stack)?;
/// println!("MTF50: {:?} lp/mm", report.resolution.thresholds.mtf50);
/// # Ok::<(), catphan_core::CatphanError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PhantomAnalyzer {
    config: PhantomConfig,
}

impl PhantomAnalyzer {
    pub fn new(config: PhantomConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhantomConfig {
        &self.config
    }

    /// Analyzes a sorted, validated stack
    ///
    /// # Algorithm
    ///
    /// 1. Locate the line-pair slice and derive the other module slices
    /// 2. Find the phantom centre of each module on its three-slice average
    /// 3. Measure the rotation from the fiducials on the single contrast
    ///    slice
    /// 4. Run the contrast, uniformity and resolution analyses
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for an inconsistent configuration and
    /// otherwise the first failure of any stage, unmodified. No partial
    /// report is produced.
    pub fn analyze(&self, stack: &ImageStack) -> Result<PhantomReport> {
        self.config.validate()?;
        let config = &self.config;

        let modules = locate_all_modules(stack, &config.locator)?;

        let centers = ModuleCenters {
            resolution: self.module_center(stack, modules.resolution, PhantomModule::Resolution)?,
            contrast: self.module_center(stack, modules.contrast, PhantomModule::Contrast)?,
            uniformity: self.module_center(stack, modules.uniformity, PhantomModule::Uniformity)?,
        };

        let contrast_slice = stack
            .get(modules.contrast)
            .map(|s| s.calibrated())
            .ok_or_else(|| {
                CatphanError::InsufficientSlices(format!(
                    "contrast slice {} outside stack of {}",
                    modules.contrast,
                    stack.len()
                ))
            })?;
        let rotation = find_rotation(
            &contrast_slice,
            stack.pixel_spacing(),
            centers.contrast,
            config.contrast.fiducial_radius_mm,
        )?;
        info!("Phantom rotation: {:.2}°", rotation.angle_deg);

        let contrast = ContrastAnalyzer::analyze(
            stack,
            modules.contrast,
            centers.contrast,
            rotation.angle_deg,
            &config.contrast,
        )?;
        let uniformity = UniformityAnalyzer::analyze(
            stack,
            modules.uniformity,
            centers.uniformity,
            &config.uniformity,
        )?;
        let resolution = ResolutionAnalyzer::analyze(
            stack,
            modules.resolution,
            centers.resolution,
            rotation.angle_deg,
            &config.resolution,
        )?;

        Ok(PhantomReport {
            modules,
            centers,
            rotation_deg: rotation.angle_deg,
            contrast,
            uniformity,
            resolution,
        })
    }

    fn module_center(
        &self,
        stack: &ImageStack,
        index: usize,
        module: PhantomModule,
    ) -> Result<Point> {
        let image = average_slices(stack, &window_indices(index, 1, stack.len()))?;
        let estimate = find_center(&image, self.config.locator.center_threshold)?;
        debug!(
            "{} centre at ({:.2}, {:.2}), {} px",
            module, estimate.center.x, estimate.center.y, estimate.area
        );
        Ok(estimate.center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SyntheticPhantom;
    use crate::types::ModuleSliceIndex;
    use rstest::rstest;

    fn analyzer() -> PhantomAnalyzer {
        PhantomAnalyzer::new(PhantomConfig::catphan_500().with_expected_slice(40))
    }

    #[rstest]
    #[case::descending(false, 28, 72)]
    #[case::ascending(true, 52, 8)]
    fn test_full_analysis_of_synthetic_series(
        #[case] ascending: bool,
        #[case] contrast: usize,
        #[case] uniformity: usize,
    ) {
        let phantom = SyntheticPhantom::coarse().with_ascending_locations(ascending);
        let stack = phantom.stack(80, 2.5, 40, Some(contrast), Some(uniformity));

        let report = analyzer().analyze(&stack).unwrap();

        assert_eq!(
            report.modules,
            ModuleSliceIndex {
                resolution: 40,
                contrast,
                uniformity
            }
        );
        for c in [
            report.centers.resolution,
            report.centers.contrast,
            report.centers.uniformity,
        ] {
            assert!(c.distance(&phantom.center) < 0.5, "centre {:?}", c);
        }
        assert!(report.rotation_deg.abs() < 1.0, "rotation {}", report.rotation_deg);

        let delrin = &report.contrast.materials[0];
        assert_eq!(delrin.label, "Delrin");
        assert!((delrin.mean - 340.0).abs() < 5.0, "Delrin {}", delrin.mean);
        // Noise-free inserts have no spread
        assert_eq!(report.contrast.low_contrast_visibility, 0.0);
        assert!((report.contrast.slice_thickness_mm - phantom.ramp_thickness_mm).abs() < 1.0);

        assert_eq!(report.uniformity.regions.len(), 5);
        assert!(report.uniformity.uniformity_percent.abs() < 1e-9);

        assert_eq!(report.resolution.slice_offset, 0);
        assert_eq!(report.resolution.curve[0].mtf, 1.0);
        assert_eq!(report.measurements().len(), 3);
    }

    #[test]
    fn test_missing_line_pairs_fails_without_partial_report() {
        let phantom = SyntheticPhantom::coarse();
        let stack = phantom.uniform_stack(40, 2.5);
        let err = PhantomAnalyzer::default().analyze(&stack).unwrap_err();
        assert!(matches!(err, CatphanError::ModuleNotLocated(_)));
    }

    #[test]
    fn test_invalid_config_is_rejected_first() {
        let phantom = SyntheticPhantom::coarse();
        let stack = phantom.uniform_stack(4, 2.5);
        let mut config = PhantomConfig::catphan_500();
        config.contrast.roi_radius_mm = -1.0;
        let err = PhantomAnalyzer::new(config).analyze(&stack).unwrap_err();
        assert!(matches!(err, CatphanError::InvalidValue(_)));
    }

    #[test]
    fn test_concurrent_analyses_agree() {
        let phantom = SyntheticPhantom::coarse();
        let stack = phantom.stack(80, 2.5, 40, Some(28), Some(72));
        let analyzer = analyzer();

        let (a, b) = std::thread::scope(|s| {
            let first = s.spawn(|| analyzer.analyze(&stack));
            let second = s.spawn(|| analyzer.analyze(&stack));
            (first.join().unwrap(), second.join().unwrap())
        });
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
