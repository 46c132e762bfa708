use crate::loader::SeriesInfo;
use crate::types::{PhantomModule, PhantomReport};
use std::fmt;

/// Text report formatter for a phantom analysis
pub struct TextReport<'a> {
    report: &'a PhantomReport,
    info: Option<&'a SeriesInfo>,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(report: &'a PhantomReport) -> Self {
        Self { report, info: None }
    }

    /// Builder: acquisition details printed in the header
    pub fn with_info(mut self, info: &'a SeriesInfo) -> Self {
        self.info = Some(info);
        self
    }
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("unknown")
}

fn or_dash(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3} lp/mm", v))
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;

        writeln!(f, "CatPhan Analysis")?;
        writeln!(f, "================")?;
        if let Some(info) = self.info {
            writeln!(f, "Station:        {}", or_unknown(&info.station_name))?;
            writeln!(f, "Manufacturer:   {}", or_unknown(&info.manufacturer))?;
            writeln!(
                f,
                "Study:          {} {}",
                or_unknown(&info.study_date),
                info.study_time.as_deref().unwrap_or("")
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Geometry")?;
        writeln!(f, "--------")?;
        for (module, center) in [
            (PhantomModule::Resolution, r.centers.resolution),
            (PhantomModule::Contrast, r.centers.contrast),
            (PhantomModule::Uniformity, r.centers.uniformity),
        ] {
            writeln!(
                f,
                "{}:         slice {:>3}, centre ({:.2}, {:.2}) px",
                module.catalogue_name(),
                r.modules.get(module),
                center.x,
                center.y
            )?;
        }
        writeln!(f, "Rotation:       {:.2}°", r.rotation_deg)?;
        writeln!(f)?;

        let c = &r.contrast;
        writeln!(f, "Contrast ({})", PhantomModule::Contrast.catalogue_name())?;
        writeln!(f, "-----------------")?;
        for m in &c.materials {
            writeln!(
                f,
                "{:>2} {:<12} {:>8.1} ± {:.1} HU",
                m.index, m.label, m.mean, m.std
            )?;
        }
        writeln!(f, "Low-contrast visibility: {:.3}", c.low_contrast_visibility)?;
        writeln!(
            f,
            "Scaling:        x {:.3} ({:.2} mm), y {:.3} ({:.2} mm)",
            c.scaling.x_scale, c.scaling.x_distance_mm, c.scaling.y_scale, c.scaling.y_distance_mm
        )?;
        writeln!(f, "Slice thickness: {:.2} mm", c.slice_thickness_mm)?;
        writeln!(f)?;

        let u = &r.uniformity;
        writeln!(f, "Uniformity ({})", PhantomModule::Uniformity.catalogue_name())?;
        writeln!(f, "-------------------")?;
        for region in &u.regions {
            writeln!(
                f,
                "{:<8} {:>8.1} ± {:.1} HU",
                region.label, region.mean, region.std
            )?;
        }
        writeln!(f, "Uniformity:     {:.2}%", u.uniformity_percent)?;
        writeln!(f)?;

        let res = &r.resolution;
        writeln!(f, "Resolution ({})", PhantomModule::Resolution.catalogue_name())?;
        writeln!(f, "-------------------")?;
        writeln!(f, "Slice offset:   {:+}", res.slice_offset)?;
        for p in &res.curve {
            let note = if p.resolved { "" } else { " (not resolved)" };
            writeln!(f, "{:.1} lp/mm     MTF {:.3}{}", p.frequency, p.mtf, note)?;
        }
        writeln!(f, "MTF80:          {}", or_dash(res.thresholds.mtf80))?;
        writeln!(f, "MTF50:          {}", or_dash(res.thresholds.mtf50))?;
        writeln!(f, "MTF30:          {}", or_dash(res.thresholds.mtf30))?;
        writeln!(f, "MTF10:          {}", or_dash(res.thresholds.mtf10))?;

        Ok(())
    }
}
