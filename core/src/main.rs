use catphan_core::cli::{Cli, OutputFormat};
use catphan_core::loader::{self, LoadedSeries};
use catphan_core::{PhantomAnalyzer, PhantomReport, TextReport};
use clap::Parser;
use log::{error, info};
use std::process;

fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    if !cli.directory.is_dir() {
        eprintln!("Error: {} is not a directory", cli.directory.display());
        process::exit(1);
    }

    let config = match cli.phantom_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    info!("Processing directory: {}", cli.directory.display());
    let series = match loader::load_series(&cli.directory) {
        Ok(series) => series,
        Err(e) => {
            error!("Failed to load series: {}", e);
            eprintln!("Error: Failed to load series: {}", e);
            process::exit(1);
        }
    };

    let report = match PhantomAnalyzer::new(config).analyze(&series.stack) {
        Ok(report) => report,
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("Error: Analysis failed: {}", e);
            process::exit(2);
        }
    };

    output_report(&report, &series, cli.format);
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn output_report(report: &PhantomReport, series: &LoadedSeries, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{}", TextReport::new(report).with_info(&series.info));
        }
        OutputFormat::Json => {
            #[cfg(feature = "json")]
            {
                match output_json(report, series) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize to JSON: {}", e);
                        eprintln!("Error: Failed to serialize to JSON: {}", e);
                        process::exit(1);
                    }
                }
            }
            #[cfg(not(feature = "json"))]
            {
                let _ = (report, series);
                eprintln!("Error: JSON output requires the 'json' feature");
                eprintln!("Rebuild with: cargo build --features json");
                process::exit(1);
            }
        }
    }
}

#[cfg(feature = "json")]
fn output_json(report: &PhantomReport, series: &LoadedSeries) -> Result<String, serde_json::Error> {
    use catphan_core::loader::SeriesInfo;
    use serde::Serialize;

    #[derive(Serialize)]
    struct ReportJson<'a> {
        series: &'a SeriesInfo,
        slices: usize,
        #[serde(flatten)]
        report: &'a PhantomReport,
    }

    serde_json::to_string_pretty(&ReportJson {
        series: &series.info,
        slices: series.stack.len(),
        report,
    })
}
