//! Compare command handler.
//!
//! Loads two image files, runs the hybrid engine, optionally writes the
//! diff image, and reports the result.

use super::CommandOutcome;
use crate::commands::{CompareArgs, OutputFormat};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use pixelgate::annotate::DiffRegion;
use pixelgate::{
    load_image, parse_ignore_regions, save_png, ComparisonStrategy, HybridDecisionEngine,
    HybridResult, RgbaImage,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Machine-readable comparison report
#[derive(Debug, Serialize)]
pub struct CompareReport {
    /// Final decision
    pub matches: bool,
    /// Deciding strategy
    pub strategy: ComparisonStrategy,
    /// Fraction of differing pixels
    pub diff_ratio: f64,
    /// Tolerance applied
    pub tolerance: f64,
    /// Differing pixel count
    pub diff_pixel_count: usize,
    /// Total pixel count
    pub total_pixels: usize,
    /// Whether the actual image was rescaled
    pub was_scaled: bool,
    /// Baseline width over actual width
    pub scale_factor: f64,
    /// Model similarity, if the model decided
    pub similarity: Option<f64>,
    /// Model error, if the model failed
    pub model_error: Option<String>,
    /// Highlighted regions
    pub regions: Vec<DiffRegion>,
    /// Where the diff image was written
    pub diff_image: Option<PathBuf>,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

impl CompareReport {
    /// Build a report from a hybrid result
    #[must_use]
    pub fn new(result: &HybridResult, diff_image: Option<PathBuf>) -> Self {
        let cmp = &result.comparison;
        Self {
            matches: result.matches,
            strategy: result.strategy,
            diff_ratio: cmp.diff_ratio,
            tolerance: cmp.tolerance,
            diff_pixel_count: cmp.diff_pixel_count,
            total_pixels: cmp.total_pixels,
            was_scaled: cmp.was_scaled,
            scale_factor: cmp.scale_factor,
            similarity: result.similarity(),
            model_error: result.model_error().map(ToString::to_string),
            regions: cmp.regions.clone(),
            diff_image,
            elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn read_input(path: &Path, role: &str) -> CliResult<RgbaImage> {
    if !path.is_file() {
        return Err(CliError::invalid_argument(format!(
            "{role} image not found: {}",
            path.display()
        )));
    }
    Ok(load_image(path)?)
}

/// Execute the compare command
pub fn execute_compare(config: &CliConfig, args: &CompareArgs) -> CliResult<CommandOutcome> {
    let mut engine_config = config.engine.clone();
    if args.no_model {
        engine_config.model_enabled = false;
    }
    let tolerance = args.tolerance.unwrap_or(engine_config.tolerance);
    let regions = args
        .ignore
        .as_deref()
        .map(parse_ignore_regions)
        .unwrap_or_default();

    let baseline = read_input(&args.baseline, "baseline")?;
    let actual = read_input(&args.actual, "actual")?;

    let engine = HybridDecisionEngine::from_config(&engine_config)?;
    let result = engine.compare(&baseline, &actual, tolerance, &regions)?;

    let diff_image = match &args.diff_out {
        Some(path) => {
            save_png(path, &result.comparison.diff_image)?;
            Some(path.clone())
        }
        None => None,
    };

    match args.format {
        OutputFormat::Json => {
            let report = CompareReport::new(&result, diff_image);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
            reporter.comparison(&result);
            if let Some(path) = &diff_image {
                reporter.detail("diff image", &path.display().to_string());
            }
        }
    }

    Ok(if result.matches {
        CommandOutcome::Clean
    } else {
        CommandOutcome::Regression
    })
}
