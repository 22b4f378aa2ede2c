//! Pixelgate: hybrid visual regression verdicts
//!
//! Compares screenshots against stored baselines and turns each comparison
//! into a test verdict. Pixel differencing decides the clear cases; an image
//! embedding model breaks ties when the difference falls in a gray band.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      PIXELGATE Architecture                       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌──────────────────┐        │
//! │   │  Capture   │───►│ Validator  │───►│ Hybrid Decision  │        │
//! │   │  Provider  │    │            │    │ Engine           │        │
//! │   └────────────┘    └─────┬──────┘    └───┬──────────┬───┘        │
//! │                           │               │          │            │
//! │                     ┌─────▼──────┐  ┌─────▼────┐ ┌───▼────────┐   │
//! │                     │ Baseline   │  │  Pixel   │ │ Similarity │   │
//! │                     │ Store      │  │Comparator│ │ Adapter    │   │
//! │                     └────────────┘  └──────────┘ └────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pixelgate::prelude::*;
//!
//! let validator = Validator::new(EngineConfig::default())?;
//! let request = ValidationRequest::new(BaselineIdentity::new("LoginTest", "home"));
//! let verdict = validator.validate(&FileCapture::new("home.png"), &request);
//! assert!(!verdict.is_failing(), "{verdict}");
//! # Ok::<(), PixelgateError>(())
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

/// Diff image annotation: overlays, markers, and highlight regions
#[allow(clippy::suboptimal_flops)]
pub mod annotate;
mod comparator;
mod config;
mod hybrid;
mod orchestrator;
mod region;
mod result;
mod similarity;
mod store;
mod verdict;

pub use comparator::{
    diff_magnitude, validate_tolerance, ComparisonResult, DiffHighlight, PixelComparator,
    PreparedPair, DEFAULT_NOISE_THRESHOLD,
};
pub use config::{
    ComparatorConfig, EngineConfig, MismatchBehavior, ModelConfig, ModelSource, StoreConfig,
};
pub use hybrid::{ComparisonStrategy, HybridDecisionEngine, HybridResult};
pub use orchestrator::{
    CaptureProvider, FileCapture, StaticCapture, ValidationRequest, Validator,
};
pub use region::{format_ignore_regions, parse_ignore_regions, IgnoreRegion};
pub use result::{PixelgateError, PixelgateResult};
pub use similarity::{
    cosine_similarity, BuiltinLoader, ModelComparison, ModelLoader, ProjectionModel,
    ProjectionWeights, SimilarityAdapter, SimilarityModel, ThumbnailModel, WeightsFileLoader,
    DEFAULT_THUMBNAIL_SIZE,
};
pub use store::{
    encode_png, load_image, sanitize_token, save_png, BaselineIdentity, BaselineStore,
    BaselineUpdate, CleanupReport,
};
pub use verdict::{Severity, ValidationRecord, ValidationStatus, Verdict};

pub use image::{Rgba, RgbaImage};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::annotate::DiffRegion;
    pub use super::comparator::*;
    pub use super::config::*;
    pub use super::hybrid::*;
    pub use super::orchestrator::*;
    pub use super::region::*;
    pub use super::result::*;
    pub use super::similarity::*;
    pub use super::store::*;
    pub use super::verdict::*;
}
