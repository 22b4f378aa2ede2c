//! Engine configuration.
//!
//! One immutable value object carries every recognized option with an
//! explicit default. Files may be YAML or JSON; unspecified fields fall back
//! to their defaults. Invariants are checked once, by [`EngineConfig::validate`],
//! before any comparison runs.

use crate::comparator::{DiffHighlight, DEFAULT_NOISE_THRESHOLD};
use crate::result::{PixelgateError, PixelgateResult};
use crate::similarity::DEFAULT_THUMBNAIL_SIZE;
use crate::store::sanitize_token;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do when a capture does not match (or has no baseline)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchBehavior {
    /// Report a failure
    #[default]
    Fail,
    /// Report a warning
    Warn,
    /// Record the mismatch but report it as ignored
    Ignore,
    /// Use the configured default behavior
    Default,
}

impl MismatchBehavior {
    /// Parse a policy name, falling back to `Default` for unknown names
    #[must_use]
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(policy = name, "unrecognized mismatch policy, using default");
            Self::Default
        })
    }

    /// Replace `Default` with the configured fallback
    #[must_use]
    pub const fn resolve(self, fallback: Self) -> Self {
        match self {
            Self::Default => fallback,
            other => other,
        }
    }
}

impl fmt::Display for MismatchBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fail => "fail",
            Self::Warn => "warn",
            Self::Ignore => "ignore",
            Self::Default => "default",
        })
    }
}

impl FromStr for MismatchBehavior {
    type Err = PixelgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" | "failure" => Ok(Self::Fail),
            "warn" | "warning" => Ok(Self::Warn),
            "ignore" | "ignored" => Ok(Self::Ignore),
            "default" => Ok(Self::Default),
            other => Err(PixelgateError::invalid_argument(format!(
                "unknown mismatch policy '{other}'"
            ))),
        }
    }
}

/// Where the similarity model comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    /// Built-in thumbnail embedding
    Builtin {
        /// Thumbnail side length
        input_size: u32,
    },
    /// Projection weights loaded from a JSON file
    Weights {
        /// Path to the weights file
        path: PathBuf,
    },
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Builtin {
            input_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

/// Similarity model settings. The match threshold is an engine setting
/// ([`EngineConfig::model_threshold`]) passed per comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Whether the model may be consulted at all
    pub enabled: bool,
    /// Model source
    pub source: ModelSource,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: ModelSource::default(),
        }
    }
}

/// Pixel comparator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Difference magnitude (0-255) a pixel must exceed to count
    pub noise_threshold: u8,
    /// Diff image highlight mode
    pub highlight: DiffHighlight,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            highlight: DiffHighlight::SingleRegion,
        }
    }
}

/// Baseline store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for baselines and artifacts
    pub root: PathBuf,
    /// Browser or rendering channel the baselines belong to
    pub channel: String,
    /// Locale the baselines belong to
    pub locale: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("baselines"),
            channel: "default".to_string(),
            locale: "default".to_string(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run visual validation at all; `false` yields `Skipped` verdicts
    pub enabled: bool,
    /// Maximum diff ratio for a clear pass (0.0-1.0)
    pub tolerance: f64,
    /// Lower bound of the model escalation band
    pub gray_zone_lower: f64,
    /// Upper bound of the model escalation band
    pub gray_zone_upper: f64,
    /// Minimum similarity for a model match
    pub model_threshold: f64,
    /// Default mismatch policy
    pub mismatch_policy: MismatchBehavior,
    /// Create missing baselines instead of routing through the policy
    pub auto_create_baseline: bool,
    /// Allow the similarity model to be consulted
    pub model_enabled: bool,
    /// Similarity model source
    pub model_source: ModelSource,
    /// Pixel comparator settings
    pub comparator: ComparatorConfig,
    /// Baseline store settings
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: 0.01,
            gray_zone_lower: 0.05,
            gray_zone_upper: 0.20,
            model_threshold: 0.95,
            mismatch_policy: MismatchBehavior::Fail,
            auto_create_baseline: true,
            model_enabled: true,
            model_source: ModelSource::default(),
            comparator: ComparatorConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

fn check_unit(name: &str, value: f64) -> PixelgateResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PixelgateError::config(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

impl EngineConfig {
    /// Check invariants
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first violated invariant
    pub fn validate(&self) -> PixelgateResult<()> {
        check_unit("tolerance", self.tolerance)?;
        check_unit("gray_zone_lower", self.gray_zone_lower)?;
        check_unit("gray_zone_upper", self.gray_zone_upper)?;
        check_unit("model_threshold", self.model_threshold)?;

        if self.gray_zone_upper < self.gray_zone_lower {
            return Err(PixelgateError::config(format!(
                "gray_zone_upper ({}) is below gray_zone_lower ({})",
                self.gray_zone_upper, self.gray_zone_lower
            )));
        }
        if self.mismatch_policy == MismatchBehavior::Default {
            return Err(PixelgateError::config(
                "mismatch_policy must be fail, warn, or ignore",
            ));
        }
        if let DiffHighlight::Clustered { min_pixels: 0 } = self.comparator.highlight {
            return Err(PixelgateError::config("clustered highlight needs min_pixels >= 1"));
        }
        if let ModelSource::Builtin { input_size: 0 } = self.model_source {
            return Err(PixelgateError::config("builtin model input_size must be positive"));
        }
        for (name, value) in [("channel", &self.store.channel), ("locale", &self.store.locale)] {
            sanitize_token(value)
                .map_err(|_| PixelgateError::config(format!("store {name} '{value}' is empty after sanitizing")))?;
        }
        Ok(())
    }

    /// Similarity model settings derived from this configuration
    #[must_use]
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            enabled: self.model_enabled,
            source: self.model_source.clone(),
        }
    }

    /// Parse and validate YAML
    ///
    /// # Errors
    ///
    /// Returns error on malformed YAML or invalid values
    pub fn from_yaml_str(yaml: &str) -> PixelgateResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON
    ///
    /// # Errors
    ///
    /// Returns error on malformed JSON or invalid values
    pub fn from_json_str(json: &str) -> PixelgateResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml`, or `.yml` file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or is invalid
    pub fn load(path: &Path) -> PixelgateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// Render as YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> PixelgateResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}
