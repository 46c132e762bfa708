pub mod report;

use crate::error::{CatphanError, Result};
use crate::types::PhantomConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for catphan
#[derive(Parser, Debug)]
#[command(name = "catphan")]
#[command(about = "CatPhan CT phantom image-quality analysis")]
#[command(version)]
pub struct Cli {
    /// Directory containing one CT series of the phantom
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Expected index of the line-pair slice in the sorted stack
    #[arg(short, long, value_name = "INDEX")]
    pub expected_slice: Option<usize>,

    /// JSON file overriding the CatPhan 500 geometry (requires the `json` feature)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
}

impl Cli {
    /// Phantom configuration from the preset, the optional config file and
    /// the expected-slice override, in that order of precedence
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the config file cannot be read and
    /// `InvalidValue` if it cannot be parsed or this build lacks JSON
    /// support.
    pub fn phantom_config(&self) -> Result<PhantomConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => PhantomConfig::catphan_500(),
        };
        if let Some(index) = self.expected_slice {
            config = config.with_expected_slice(index);
        }
        Ok(config)
    }
}

#[cfg(feature = "json")]
fn read_config(path: &std::path::Path) -> Result<PhantomConfig> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        CatphanError::InvalidValue(format!("config {}: {}", path.display(), e))
    })
}

#[cfg(not(feature = "json"))]
fn read_config(path: &std::path::Path) -> Result<PhantomConfig> {
    Err(CatphanError::InvalidValue(format!(
        "cannot read {}: configuration files require the 'json' feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["catphan", "/data/series"]).unwrap();
        assert_eq!(cli.directory, PathBuf::from("/data/series"));
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.expected_slice, None);
        assert!(!cli.verbose);
        assert_eq!(cli.phantom_config().unwrap(), PhantomConfig::catphan_500());
    }

    #[test]
    fn test_expected_slice_overrides_preset() {
        let cli = Cli::try_parse_from(["catphan", "dir", "--format", "json", "-e", "42"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        let config = cli.phantom_config().unwrap();
        assert_eq!(config.locator.expected_slice, Some(42));
    }

    #[test]
    fn test_directory_is_required() {
        assert!(Cli::try_parse_from(["catphan"]).is_err());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_config_file_overrides_preset() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"uniformity": {{"roi_offset_mm": 45.0}}}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["catphan", "dir", "--config", &path, "-e", "7"]).unwrap();
        let config = cli.phantom_config().unwrap();
        assert_eq!(config.uniformity.roi_offset_mm, 45.0);
        assert_eq!(config.uniformity.roi_box_size_mm, 15.0);
        assert_eq!(config.locator.expected_slice, Some(7));
    }

    #[cfg(not(feature = "json"))]
    #[test]
    fn test_config_file_needs_json_feature() {
        let cli = Cli::try_parse_from(["catphan", "dir", "--config", "phantom.json"]).unwrap();
        let err = cli.phantom_config().unwrap_err();
        assert!(matches!(err, CatphanError::InvalidValue(_)));
    }
}
