//! Validation verdicts and reporting records.

use crate::hybrid::{ComparisonStrategy, HybridResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome status of one validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Capture matches the baseline
    Success,
    /// Capture differs and the policy says fail
    Failure,
    /// Capture differs and the policy says warn
    Warning,
    /// Validation disabled; nothing was captured
    Skipped,
    /// Capture differs and the policy says ignore
    Ignored,
    /// No baseline existed; the capture became the baseline
    BaselineCreated,
    /// Validation could not be carried out
    Error,
}

impl ValidationStatus {
    /// Whether a calling test should fail
    #[must_use]
    pub const fn is_failing(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Whether this status is a clean outcome
    #[must_use]
    pub const fn is_non_failing(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::BaselineCreated | Self::Skipped | Self::Ignored
        )
    }

    /// Upper-case label for reports
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Warning => "WARNING",
            Self::Skipped => "SKIPPED",
            Self::Ignored => "IGNORED",
            Self::BaselineCreated => "BASELINE_CREATED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How far a capture strayed from its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// No counted difference
    None,
    /// Within tolerance
    Minor,
    /// Above tolerance, at or below the gray band
    Moderate,
    /// Inside the gray band
    Major,
    /// Above the gray band
    Critical,
}

impl Severity {
    /// Grade a diff ratio against tolerance and the gray band
    #[must_use]
    pub fn classify(diff_ratio: f64, tolerance: f64, gray_lower: f64, gray_upper: f64) -> Self {
        if diff_ratio <= 0.0 {
            Self::None
        } else if diff_ratio <= tolerance {
            Self::Minor
        } else if diff_ratio > gray_upper {
            Self::Critical
        } else if diff_ratio > gray_lower {
            Self::Major
        } else {
            Self::Moderate
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Result of one validation, serializable for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Outcome status
    pub status: ValidationStatus,
    /// Baseline key, `<Class>/<stem>`
    pub baseline_id: String,
    /// Human-readable explanation
    pub message: String,
    /// Fraction of differing pixels, if a comparison ran
    pub diff_ratio: Option<f64>,
    /// Tolerance applied
    pub tolerance: f64,
    /// Deciding strategy, if a comparison ran
    pub strategy: Option<ComparisonStrategy>,
    /// Severity grade
    pub severity: Severity,
    /// Model similarity, if the model decided
    pub similarity: Option<f64>,
    /// Wall time of the whole validation
    pub elapsed_ms: u64,
    /// Saved capture
    pub actual_path: Option<PathBuf>,
    /// Saved diff image
    pub diff_path: Option<PathBuf>,
    /// Baseline file
    pub baseline_path: Option<PathBuf>,
}

/// Outcome of [`crate::Validator::validate`]
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Serializable record
    pub record: ValidationRecord,
    /// Full hybrid comparison, if one ran
    pub comparison: Option<HybridResult>,
}

impl Verdict {
    pub(crate) fn new(status: ValidationStatus, baseline_id: String, tolerance: f64) -> Self {
        Self {
            record: ValidationRecord {
                status,
                baseline_id,
                message: String::new(),
                diff_ratio: None,
                tolerance,
                strategy: None,
                severity: Severity::None,
                similarity: None,
                elapsed_ms: 0,
                actual_path: None,
                diff_path: None,
                baseline_path: None,
            },
            comparison: None,
        }
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.record.message = message.into();
        self
    }

    pub(crate) fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.record.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub(crate) fn with_comparison(mut self, result: HybridResult, severity: Severity) -> Self {
        self.record.diff_ratio = Some(result.diff_ratio());
        self.record.strategy = Some(result.strategy);
        self.record.similarity = result.similarity();
        self.record.severity = severity;
        self.comparison = Some(result);
        self
    }

    /// Outcome status
    #[must_use]
    pub const fn status(&self) -> ValidationStatus {
        self.record.status
    }

    /// Human-readable explanation
    #[must_use]
    pub fn message(&self) -> &str {
        &self.record.message
    }

    /// Whether a calling test should fail
    #[must_use]
    pub const fn is_failing(&self) -> bool {
        self.record.status.is_failing()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.record.status, self.record.baseline_id, self.record.message)
    }
}
