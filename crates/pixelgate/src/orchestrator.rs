//! Validation orchestrator.
//!
//! Ties capture, storage, comparison, and policy into a single verdict. The
//! orchestrator never returns an error: every fault is folded into an
//! [`ValidationStatus::Error`] verdict carrying the cause.

use crate::annotate::{self, OVERLAY_ALPHA, OVERLAY_COLOR};
use crate::config::{EngineConfig, MismatchBehavior};
use crate::hybrid::HybridDecisionEngine;
use crate::region::{parse_ignore_regions, IgnoreRegion};
use crate::result::{PixelgateError, PixelgateResult};
use crate::similarity::SimilarityAdapter;
use crate::store::{load_image, BaselineIdentity, BaselineStore, BaselineUpdate};
use crate::verdict::{Severity, ValidationStatus, Verdict};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Source of the image under test
pub trait CaptureProvider {
    /// Produce the current capture
    ///
    /// # Errors
    ///
    /// Returns error if the capture cannot be produced
    fn capture(&self) -> PixelgateResult<RgbaImage>;
}

impl<F> CaptureProvider for F
where
    F: Fn() -> PixelgateResult<RgbaImage>,
{
    fn capture(&self) -> PixelgateResult<RgbaImage> {
        self()
    }
}

/// Capture read from an image file
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    /// Capture from `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CaptureProvider for FileCapture {
    fn capture(&self) -> PixelgateResult<RgbaImage> {
        load_image(&self.path).map_err(|e| PixelgateError::capture(e.to_string()))
    }
}

/// Capture of an image already in memory
#[derive(Debug, Clone)]
pub struct StaticCapture(pub RgbaImage);

impl CaptureProvider for StaticCapture {
    fn capture(&self) -> PixelgateResult<RgbaImage> {
        Ok(self.0.clone())
    }
}

/// One validation to perform
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    /// Which baseline to check against
    pub identity: BaselineIdentity,
    /// Tolerance override; the configured tolerance when `None`
    pub tolerance: Option<f64>,
    /// Mismatch policy; `Default` defers to configuration
    pub policy: MismatchBehavior,
    /// Areas excluded from comparison
    pub ignore_regions: Vec<IgnoreRegion>,
}

impl ValidationRequest {
    /// Request with configured defaults
    #[must_use]
    pub fn new(identity: BaselineIdentity) -> Self {
        Self {
            identity,
            tolerance: None,
            policy: MismatchBehavior::Default,
            ignore_regions: Vec::new(),
        }
    }

    /// Override the tolerance
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Set the mismatch policy
    #[must_use]
    pub const fn with_policy(mut self, policy: MismatchBehavior) -> Self {
        self.policy = policy;
        self
    }

    /// Set the ignore regions
    #[must_use]
    pub fn with_ignore_regions(mut self, regions: Vec<IgnoreRegion>) -> Self {
        self.ignore_regions = regions;
        self
    }

    /// Add regions from the `x,y,w,h;...` encoding
    #[must_use]
    pub fn with_ignore_spec(mut self, encoded: &str) -> Self {
        self.ignore_regions.extend(parse_ignore_regions(encoded));
        self
    }
}

/// Runs validations against a baseline store
#[derive(Debug, Clone)]
pub struct Validator {
    config: EngineConfig,
    store: BaselineStore,
    engine: HybridDecisionEngine,
}

impl Validator {
    /// Build a validator from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(config: EngineConfig) -> PixelgateResult<Self> {
        let adapter = Arc::new(SimilarityAdapter::from_config(&config.model_config()));
        Self::with_adapter(config, adapter)
    }

    /// Build a validator sharing an existing similarity adapter
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn with_adapter(config: EngineConfig, adapter: Arc<SimilarityAdapter>) -> PixelgateResult<Self> {
        let engine = HybridDecisionEngine::new(&config, adapter)?;
        let store = BaselineStore::from_config(&config.store)?;
        Ok(Self {
            config,
            store,
            engine,
        })
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying store
    #[must_use]
    pub const fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Underlying engine
    #[must_use]
    pub const fn engine(&self) -> &HybridDecisionEngine {
        &self.engine
    }

    /// Validate a capture against its baseline
    pub fn validate(&self, capture: &dyn CaptureProvider, request: &ValidationRequest) -> Verdict {
        let start = Instant::now();
        let tolerance = request.tolerance.unwrap_or(self.config.tolerance);
        let key = request.identity.to_string();

        let verdict = if self.config.enabled {
            self.run(capture, request, tolerance).unwrap_or_else(|e| {
                tracing::error!(key = %key, error = %e, "validation error");
                Verdict::new(ValidationStatus::Error, key.clone(), tolerance)
                    .with_message(format!("validation of {key} failed: {e}"))
            })
        } else {
            tracing::debug!(key = %key, "validation disabled, skipping");
            Verdict::new(ValidationStatus::Skipped, key, tolerance).with_message("visual validation disabled")
        };

        verdict.with_elapsed(start.elapsed())
    }

    fn run(
        &self,
        capture: &dyn CaptureProvider,
        request: &ValidationRequest,
        tolerance: f64,
    ) -> PixelgateResult<Verdict> {
        let id = &request.identity;
        let key = id.key()?;
        let policy = request.policy.resolve(self.config.mismatch_policy);

        let actual = capture.capture()?;
        let actual_path = self.store.save_actual(id, &actual)?;

        if !self.store.exists(id)? {
            return self.missing_baseline(id, key, &actual, actual_path, policy, tolerance);
        }

        let baseline_path = self.store.baseline_path(id)?;
        let baseline = self.store.load_baseline(id)?;
        let result = self
            .engine
            .compare(&baseline, &actual, tolerance, &request.ignore_regions)?;
        let severity = Severity::classify(
            result.diff_ratio(),
            tolerance,
            self.config.gray_zone_lower,
            self.config.gray_zone_upper,
        );
        let percent = result.comparison.diff_percent();
        let strategy = result.strategy;

        let mut verdict = if result.matches {
            Verdict::new(ValidationStatus::Success, key.clone(), tolerance).with_message(format!(
                "{key} matches baseline ({percent:.2}% different, tolerance {:.2}%, {strategy})",
                tolerance * 100.0
            ))
        } else {
            let diff_path = self.store.save_diff(id, &result.comparison.diff_image)?;
            let mismatch = format!(
                "{key} differs from baseline by {percent:.2}% (tolerance {:.2}%, {strategy})",
                tolerance * 100.0
            );
            let mut verdict = policy_verdict(policy, key, tolerance, &mismatch);
            verdict.record.diff_path = Some(diff_path);
            verdict
        };

        verdict.record.actual_path = Some(actual_path);
        verdict.record.baseline_path = Some(baseline_path);
        Ok(verdict.with_comparison(result, severity))
    }

    fn missing_baseline(
        &self,
        id: &BaselineIdentity,
        key: String,
        actual: &RgbaImage,
        actual_path: PathBuf,
        policy: MismatchBehavior,
        tolerance: f64,
    ) -> PixelgateResult<Verdict> {
        let mut verdict = if self.config.auto_create_baseline {
            let path = self.store.save_baseline(id, actual)?;
            let mut verdict = Verdict::new(ValidationStatus::BaselineCreated, key.clone(), tolerance)
                .with_message(format!("created baseline for {key}"));
            verdict.record.baseline_path = Some(path);
            verdict
        } else {
            // Nothing to compare against, so the whole capture counts as changed
            let mut marked = actual.clone();
            let everything = vec![true; (marked.width() as usize) * (marked.height() as usize)];
            annotate::overlay(&mut marked, &everything, OVERLAY_COLOR, OVERLAY_ALPHA);
            let diff_path = self.store.save_diff(id, &marked)?;
            let reason = format!(
                "no baseline for {key}: 100.00% different (tolerance {:.2}%)",
                tolerance * 100.0
            );
            let mut verdict = policy_verdict(policy, key, tolerance, &reason);
            verdict.record.diff_ratio = Some(1.0);
            verdict.record.severity = Severity::Critical;
            verdict.record.diff_path = Some(diff_path);
            verdict
        };
        verdict.record.actual_path = Some(actual_path);
        Ok(verdict)
    }

    /// Promote the latest capture for `identity` to its baseline,
    /// archiving the previous baseline
    ///
    /// # Errors
    ///
    /// Returns error if no capture exists or the store write fails
    pub fn approve(&self, identity: &BaselineIdentity) -> PixelgateResult<BaselineUpdate> {
        let actual = self.store.load_actual(identity)?;
        let update = self.store.update_baseline(identity, &actual)?;
        tracing::info!(key = %identity, "approved capture as baseline");
        Ok(update)
    }
}

/// Map a mismatch (or missing baseline) onto a status
fn policy_verdict(policy: MismatchBehavior, key: String, tolerance: f64, reason: &str) -> Verdict {
    match policy {
        MismatchBehavior::Fail | MismatchBehavior::Default => {
            Verdict::new(ValidationStatus::Failure, key, tolerance).with_message(reason)
        }
        MismatchBehavior::Warn => {
            tracing::warn!(key = %key, "{reason}");
            Verdict::new(ValidationStatus::Warning, key, tolerance).with_message(reason)
        }
        MismatchBehavior::Ignore => {
            tracing::debug!(key = %key, "ignoring mismatch: {reason}");
            Verdict::new(ValidationStatus::Ignored, key, tolerance)
                .with_message(format!("{reason} (ignored)"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use image::Rgba;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(root: &Path) -> EngineConfig {
        EngineConfig {
            model_enabled: false,
            store: StoreConfig {
                root: root.to_path_buf(),
                ..StoreConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn solid(color: [u8; 4]) -> StaticCapture {
        StaticCapture(RgbaImage::from_pixel(20, 20, Rgba(color)))
    }

    fn request() -> ValidationRequest {
        ValidationRequest::new(BaselineIdentity::new("LoginTest", "home"))
    }

    #[test]
    fn test_first_run_creates_baseline() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        let verdict = validator.validate(&solid([255, 255, 255, 255]), &request());
        assert_eq!(verdict.status(), ValidationStatus::BaselineCreated);
        assert!(verdict.record.baseline_path.as_ref().unwrap().is_file());
        assert!(verdict.record.actual_path.as_ref().unwrap().is_file());
    }

    #[test]
    fn test_repeat_run_succeeds() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        validator.validate(&solid([255, 255, 255, 255]), &request());
        let verdict = validator.validate(&solid([255, 255, 255, 255]), &request());
        assert_eq!(verdict.status(), ValidationStatus::Success);
        assert_eq!(verdict.record.diff_ratio, Some(0.0));
        assert_eq!(verdict.record.severity, Severity::None);
        assert!(verdict.record.diff_path.is_none());
    }

    #[test]
    fn test_mismatch_policies() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        validator.validate(&solid([255, 255, 255, 255]), &request());

        let black = solid([0, 0, 0, 255]);
        let fail = validator.validate(&black, &request());
        assert_eq!(fail.status(), ValidationStatus::Failure);
        assert!(fail.message().contains("100.00%"));
        assert!(fail.message().contains("1.00%"));
        assert!(fail.record.diff_path.as_ref().unwrap().is_file());
        assert_eq!(fail.record.severity, Severity::Critical);

        let warn = validator.validate(&black, &request().with_policy(MismatchBehavior::Warn));
        assert_eq!(warn.status(), ValidationStatus::Warning);

        let ignore = validator.validate(&black, &request().with_policy(MismatchBehavior::Ignore));
        assert_eq!(ignore.status(), ValidationStatus::Ignored);
        assert!(ignore.record.diff_path.is_some());
    }

    #[test]
    fn test_default_policy_uses_configuration() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            mismatch_policy: MismatchBehavior::Warn,
            ..config(dir.path())
        };
        let validator = Validator::new(config).unwrap();
        validator.validate(&solid([255, 255, 255, 255]), &request());
        let verdict = validator.validate(&solid([0, 0, 0, 255]), &request());
        assert_eq!(verdict.status(), ValidationStatus::Warning);
    }

    #[test]
    fn test_missing_baseline_without_auto_create() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            auto_create_baseline: false,
            ..config(dir.path())
        };
        let validator = Validator::new(config).unwrap();
        let verdict = validator.validate(&solid([1, 2, 3, 255]), &request());
        assert_eq!(verdict.status(), ValidationStatus::Failure);
        assert_eq!(
            verdict.message(),
            "no baseline for LoginTest/home: 100.00% different (tolerance 1.00%)"
        );
        assert_eq!(verdict.record.diff_ratio, Some(1.0));
        assert_eq!(verdict.record.severity, Severity::Critical);
        assert!(verdict.record.diff_path.as_ref().unwrap().is_file());
        assert!(!validator.store().exists(&request().identity).unwrap());

        let ignored = validator.validate(
            &solid([1, 2, 3, 255]),
            &request().with_policy(MismatchBehavior::Ignore),
        );
        assert_eq!(ignored.status(), ValidationStatus::Ignored);
    }

    #[test]
    fn test_disabled_skips_capture() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            enabled: false,
            ..config(dir.path())
        };
        let validator = Validator::new(config).unwrap();
        let capture = || -> PixelgateResult<RgbaImage> { panic!("capture must not run") };
        let verdict = validator.validate(&capture, &request());
        assert_eq!(verdict.status(), ValidationStatus::Skipped);
    }

    #[test]
    fn test_capture_error_becomes_error_verdict() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        let capture = || -> PixelgateResult<RgbaImage> { Err(PixelgateError::capture("screen locked")) };
        let verdict = validator.validate(&capture, &request());
        assert_eq!(verdict.status(), ValidationStatus::Error);
        assert!(verdict.message().contains("screen locked"));
    }

    #[test]
    fn test_bad_identity_becomes_error_verdict() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        let request = ValidationRequest::new(BaselineIdentity::new("???", "step"));
        let verdict = validator.validate(&solid([0, 0, 0, 255]), &request);
        assert_eq!(verdict.status(), ValidationStatus::Error);
    }

    #[test]
    fn test_invalid_tolerance_becomes_error_verdict() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        validator.validate(&solid([0, 0, 0, 255]), &request());
        let verdict = validator.validate(&solid([0, 0, 0, 255]), &request().with_tolerance(1.5));
        assert_eq!(verdict.status(), ValidationStatus::Error);
    }

    #[test]
    fn test_corrupt_baseline_becomes_error_verdict() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        let path = validator.store().baseline_path(&request().identity).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"garbage").unwrap();
        let verdict = validator.validate(&solid([0, 0, 0, 255]), &request());
        assert_eq!(verdict.status(), ValidationStatus::Error);
    }

    #[test]
    fn test_ignore_regions_mask_change() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        validator.validate(&solid([255, 255, 255, 255]), &request());

        let mut changed = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        for y in 0..10 {
            for x in 0..10 {
                changed.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let capture = StaticCapture(changed);
        assert_eq!(
            validator.validate(&capture, &request()).status(),
            ValidationStatus::Failure
        );
        let masked = request().with_ignore_spec("0,0,10,10");
        assert_eq!(validator.validate(&capture, &masked).status(), ValidationStatus::Success);
    }

    #[test]
    fn test_approve_promotes_capture() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        let id = request().identity;
        validator.validate(&solid([255, 255, 255, 255]), &request());
        validator.validate(&solid([0, 0, 0, 255]), &request());

        let update = validator.approve(&id).unwrap();
        assert!(update.backup.is_some());
        assert_eq!(
            validator.validate(&solid([0, 0, 0, 255]), &request()).status(),
            ValidationStatus::Success
        );
    }

    #[test]
    fn test_approve_without_capture_fails() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(config(dir.path())).unwrap();
        assert!(validator.approve(&request().identity).is_err());
    }

    #[test]
    fn test_file_capture() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shot.png");
        RgbaImage::from_pixel(3, 3, Rgba([9, 9, 9, 255])).save(&path).unwrap();
        assert_eq!(FileCapture::new(&path).capture().unwrap().dimensions(), (3, 3));
        assert!(matches!(
            FileCapture::new(dir.path().join("missing.png")).capture(),
            Err(PixelgateError::Capture { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            tolerance: -0.5,
            ..EngineConfig::default()
        };
        assert!(Validator::new(config).is_err());
    }
}
