//! Hybrid decision engine.
//!
//! Routes each comparison through the pixel comparator first and escalates
//! to the similarity model only when the diff ratio lands in the gray band:
//!
//! ```text
//! diff <= tolerance                       -> ClearPass  (match)
//! diff >  gray_upper                      -> ClearFail  (mismatch)
//! gray_lower < diff <= gray_upper, model  -> AiFallback (model decides)
//! otherwise                               -> PixelOnly  (pixel result)
//! ```

use crate::comparator::{validate_tolerance, ComparisonResult, PixelComparator};
use crate::config::EngineConfig;
use crate::region::IgnoreRegion;
use crate::result::PixelgateResult;
use crate::similarity::{ModelComparison, SimilarityAdapter};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which rule produced the final decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStrategy {
    /// Diff within tolerance
    ClearPass,
    /// Diff above the gray band
    ClearFail,
    /// Diff in the gray band, decided by the similarity model
    AiFallback,
    /// Pixel result used as-is (model unavailable, failed, or not needed)
    PixelOnly,
}

impl ComparisonStrategy {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ClearPass => "clear_pass",
            Self::ClearFail => "clear_fail",
            Self::AiFallback => "ai_fallback",
            Self::PixelOnly => "pixel_only",
        }
    }
}

impl fmt::Display for ComparisonStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a hybrid comparison
#[derive(Debug, Clone)]
pub struct HybridResult {
    /// Underlying pixel comparison
    pub comparison: ComparisonResult,
    /// Rule that decided the outcome
    pub strategy: ComparisonStrategy,
    /// Model result, if the model was consulted
    pub model: Option<ModelComparison>,
    /// Final decision
    pub matches: bool,
    /// Wall time spent in the comparison
    pub elapsed: Duration,
}

impl HybridResult {
    /// Fraction of differing pixels
    #[must_use]
    pub const fn diff_ratio(&self) -> f64 {
        self.comparison.diff_ratio
    }

    /// Model similarity, if the model produced one
    #[must_use]
    pub fn similarity(&self) -> Option<f64> {
        self.model
            .as_ref()
            .filter(|m| m.is_ok())
            .map(|m| m.similarity)
    }

    /// Model error recorded during a fallback, if any
    #[must_use]
    pub fn model_error(&self) -> Option<&str> {
        self.model.as_ref().and_then(|m| m.error.as_deref())
    }
}

/// Pixel-first comparison with similarity-model escalation
#[derive(Debug, Clone)]
pub struct HybridDecisionEngine {
    comparator: PixelComparator,
    adapter: Arc<SimilarityAdapter>,
    gray_zone_lower: f64,
    gray_zone_upper: f64,
    model_threshold: f64,
}

impl HybridDecisionEngine {
    /// Create an engine sharing `adapter`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation
    pub fn new(config: &EngineConfig, adapter: Arc<SimilarityAdapter>) -> PixelgateResult<Self> {
        config.validate()?;
        Ok(Self {
            comparator: PixelComparator::new(
                config.comparator.noise_threshold,
                config.comparator.highlight,
            ),
            adapter,
            gray_zone_lower: config.gray_zone_lower,
            gray_zone_upper: config.gray_zone_upper,
            model_threshold: config.model_threshold,
        })
    }

    /// Create an engine with its own adapter built from `config`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation
    pub fn from_config(config: &EngineConfig) -> PixelgateResult<Self> {
        let adapter = Arc::new(SimilarityAdapter::from_config(&config.model_config()));
        Self::new(config, adapter)
    }

    /// Shared similarity adapter
    #[must_use]
    pub fn adapter(&self) -> &Arc<SimilarityAdapter> {
        &self.adapter
    }

    /// Pixel comparator in use
    #[must_use]
    pub const fn comparator(&self) -> &PixelComparator {
        &self.comparator
    }

    /// Compare a capture against a baseline
    ///
    /// # Errors
    ///
    /// Returns error for zero-sized images or an out-of-range tolerance.
    /// Model problems never surface here; they degrade to `PixelOnly`.
    pub fn compare(
        &self,
        baseline: &RgbaImage,
        actual: &RgbaImage,
        tolerance: f64,
        ignore_regions: &[IgnoreRegion],
    ) -> PixelgateResult<HybridResult> {
        let start = Instant::now();
        validate_tolerance(tolerance)?;
        let pair = self.comparator.prepare(baseline, actual, ignore_regions)?;
        let comparison = self.comparator.compare_prepared(&pair, tolerance);
        let diff = comparison.diff_ratio;

        let (strategy, model, matches) = if diff <= tolerance {
            (ComparisonStrategy::ClearPass, None, true)
        } else if diff > self.gray_zone_upper {
            (ComparisonStrategy::ClearFail, None, false)
        } else if diff > self.gray_zone_lower && self.adapter.available() {
            let model = self
                .adapter
                .compare(&pair.baseline, &pair.actual, self.model_threshold);
            match &model.error {
                None => {
                    let matches = model.matches;
                    (ComparisonStrategy::AiFallback, Some(model), matches)
                }
                Some(error) => {
                    tracing::warn!(%error, diff_ratio = diff, "model comparison failed, using pixel result");
                    (ComparisonStrategy::PixelOnly, Some(model), comparison.matches)
                }
            }
        } else {
            (ComparisonStrategy::PixelOnly, None, comparison.matches)
        };

        let elapsed = start.elapsed();
        tracing::debug!(
            %strategy,
            diff_ratio = diff,
            tolerance,
            matches,
            similarity = model.as_ref().map(|m| m.similarity),
            elapsed_ms = elapsed.as_millis() as u64,
            "hybrid comparison complete"
        );

        Ok(HybridResult {
            comparison,
            strategy,
            model,
            matches,
            elapsed,
        })
    }
}
