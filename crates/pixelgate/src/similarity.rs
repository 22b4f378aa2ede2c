//! Similarity model adapter.
//!
//! Wraps an image embedding model behind a single question: how similar are
//! these two images, on a scale of 0 to 1? The embedding itself is opaque;
//! this module only normalizes inputs and computes cosine similarity.
//!
//! The model handle is loaded lazily, exactly once, behind a [`OnceLock`].
//! A failed load is cached so later calls do not retry it; the adapter then
//! reports itself unavailable and every comparison returns an error-bearing
//! [`ModelComparison`] instead of failing.

use crate::config::{ModelConfig, ModelSource};
use crate::result::{PixelgateError, PixelgateResult};
use image::imageops::FilterType;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Default side length of the built-in thumbnail embedding
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 16;

/// An image embedding function
pub trait SimilarityModel: Send + Sync + fmt::Debug {
    /// Short model name for logs and reports
    fn name(&self) -> &str;

    /// Side length of the square input the model expects
    fn input_size(&self) -> u32;

    /// Embed an image already resized to `input_size() x input_size()`
    fn embed(&self, image: &RgbaImage) -> PixelgateResult<Vec<f32>>;
}

/// Produces a model handle; called at most once per adapter lifetime
pub trait ModelLoader: Send + Sync + fmt::Debug {
    /// Load the model
    fn load(&self) -> PixelgateResult<Arc<dyn SimilarityModel>>;
}

/// Outcome of a model comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    /// Whether `similarity >= threshold`
    pub matches: bool,
    /// Cosine similarity of the embeddings, clamped to `[0, 1]`
    pub similarity: f64,
    /// Why the comparison could not be made, if it could not
    pub error: Option<String>,
}

impl ModelComparison {
    /// Comparison that could not be made
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            matches: false,
            similarity: 0.0,
            error: Some(message.into()),
        }
    }

    /// Check if the comparison produced a usable similarity
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Lazily-loaded, shareable similarity model
#[derive(Debug)]
pub struct SimilarityAdapter {
    loader: Option<Box<dyn ModelLoader>>,
    handle: OnceLock<Result<Arc<dyn SimilarityModel>, String>>,
}

impl SimilarityAdapter {
    /// Create an adapter that loads its model with `loader` on first use
    #[must_use]
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Some(Box::new(loader)),
            handle: OnceLock::new(),
        }
    }

    /// Create an adapter that is never available
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            loader: None,
            handle: OnceLock::new(),
        }
    }

    /// Create an adapter from configuration
    #[must_use]
    pub fn from_config(config: &ModelConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        match &config.source {
            ModelSource::Builtin { input_size } => Self::new(BuiltinLoader {
                input_size: *input_size,
            }),
            ModelSource::Weights { path } => Self::new(WeightsFileLoader::new(path.clone())),
        }
    }

    fn model(&self) -> Result<&Arc<dyn SimilarityModel>, &str> {
        let Some(loader) = self.loader.as_ref() else {
            return Err("similarity model disabled");
        };
        self.handle
            .get_or_init(|| match loader.load() {
                Ok(model) => {
                    tracing::info!(model = model.name(), "similarity model loaded");
                    Ok(model)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "similarity model failed to load, disabling");
                    Err(e.to_string())
                }
            })
            .as_ref()
            .map_err(String::as_str)
    }

    /// Whether the model is loaded (loading it on first call)
    pub fn available(&self) -> bool {
        self.model().is_ok()
    }

    /// Name of the loaded model, if available
    pub fn model_name(&self) -> Option<String> {
        self.model().ok().map(|m| m.name().to_string())
    }

    /// Compare two images by embedding similarity. Never fails; errors are
    /// reported in [`ModelComparison::error`].
    pub fn compare(&self, baseline: &RgbaImage, actual: &RgbaImage, threshold: f64) -> ModelComparison {
        if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
            return ModelComparison::unavailable(format!(
                "model threshold must be within [0, 1], got {threshold}"
            ));
        }
        let model = match self.model() {
            Ok(model) => model,
            Err(message) => return ModelComparison::unavailable(message),
        };

        match similarity(model.as_ref(), baseline, actual) {
            Ok(similarity) => {
                tracing::debug!(model = model.name(), similarity, threshold, "model comparison");
                ModelComparison {
                    matches: similarity >= threshold,
                    similarity,
                    error: None,
                }
            }
            Err(e) => ModelComparison::unavailable(e.to_string()),
        }
    }

    /// Forget the loaded (or failed) model so the next call loads again
    pub fn reset(&mut self) {
        self.handle.take();
    }
}

fn similarity(model: &dyn SimilarityModel, a: &RgbaImage, b: &RgbaImage) -> PixelgateResult<f64> {
    if a.width() == 0 || a.height() == 0 || b.width() == 0 || b.height() == 0 {
        return Err(PixelgateError::invalid_input("cannot embed a zero-sized image"));
    }
    let size = model.input_size();
    let a = image::imageops::resize(a, size, size, FilterType::Triangle);
    let b = image::imageops::resize(b, size, size, FilterType::Triangle);
    let ea = model.embed(&a)?;
    let eb = model.embed(&b)?;
    if ea.len() != eb.len() || ea.is_empty() {
        return Err(PixelgateError::ModelUnavailable {
            message: format!("embedding length mismatch: {} vs {}", ea.len(), eb.len()),
        });
    }
    Ok(f64::from(cosine_similarity(&ea, &eb)).clamp(0.0, 1.0))
}

/// Cosine similarity of two equal-length vectors.
///
/// Two zero vectors are identical embeddings and score 1.0; a zero vector
/// against a non-zero one scores 0.0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    match (norm_a == 0.0, norm_b == 0.0) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => dot / (norm_a * norm_b),
    }
}

/// Below this squared norm a centred thumbnail counts as flat
const FLAT_EPSILON: f64 = 1e-6;

fn rgb_features(image: &RgbaImage) -> Vec<f32> {
    image
        .pixels()
        .flat_map(|p| [p[0], p[1], p[2]])
        .map(|v| f32::from(v) / 255.0)
        .collect()
}

/// Scale `values` to unit length in place; leaves flat vectors at zero
fn normalize(values: &mut [f64]) {
    let norm_sq: f64 = values.iter().map(|v| v * v).sum();
    if norm_sq < FLAT_EPSILON {
        values.iter_mut().for_each(|v| *v = 0.0);
    } else {
        let norm = norm_sq.sqrt();
        values.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Layout block: each channel centred on its own mean, then unit length.
/// Flat images have no layout and yield zeros.
fn layout_features(image: &RgbaImage, means: [f64; 3]) -> Vec<f64> {
    let mut layout: Vec<f64> = image
        .pixels()
        .flat_map(|p| [0, 1, 2].map(|c| f64::from(p[c]) / 255.0 - means[c]))
        .collect();
    normalize(&mut layout);
    layout
}

/// Tone block: per-channel mean and its complement, unit length. Never
/// zero, so flat images of different colours stay apart.
fn tone_features(means: [f64; 3]) -> [f64; 6] {
    let mut tone = [
        means[0],
        means[1],
        means[2],
        1.0 - means[0],
        1.0 - means[1],
        1.0 - means[2],
    ];
    normalize(&mut tone);
    tone
}

fn channel_means(image: &RgbaImage) -> [f64; 3] {
    let mut sums = [0.0f64; 3];
    for p in image.pixels() {
        for (c, sum) in sums.iter_mut().enumerate() {
            *sum += f64::from(p[c]) / 255.0;
        }
    }
    let count = f64::from(image.width()) * f64::from(image.height());
    if count == 0.0 {
        return sums;
    }
    sums.map(|sum| sum / count)
}

/// Built-in embedding over a downsampled thumbnail.
///
/// The vector holds two unit-length blocks of equal weight: a layout block
/// (mean-centred RGB, so cosine over it is the Pearson correlation of the
/// thumbnails) and a tone block (average colour). A flat baseline against a
/// capture with any real structure therefore scores at most `1/sqrt(2)`,
/// while uniform noise that keeps the layout scores close to 1.
#[derive(Debug, Clone)]
pub struct ThumbnailModel {
    size: u32,
}

impl ThumbnailModel {
    /// Create a thumbnail model with the given side length
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }
}

impl SimilarityModel for ThumbnailModel {
    fn name(&self) -> &str {
        "thumbnail"
    }

    fn input_size(&self) -> u32 {
        self.size
    }

    fn embed(&self, image: &RgbaImage) -> PixelgateResult<Vec<f32>> {
        let means = channel_means(image);
        Ok(layout_features(image, means)
            .into_iter()
            .chain(tone_features(means))
            .map(|v| v as f32)
            .collect())
    }
}

/// Serialized weights for [`ProjectionModel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionWeights {
    /// Side length of the square input
    pub input_size: u32,
    /// One row per output dimension, each `input_size * input_size * 3` long
    pub weights: Vec<Vec<f32>>,
    /// Optional per-dimension bias
    #[serde(default)]
    pub bias: Vec<f32>,
}

/// Linear projection of RGB features followed by ReLU
#[derive(Debug, Clone)]
pub struct ProjectionModel {
    weights: ProjectionWeights,
}

impl ProjectionModel {
    /// Validate and wrap a set of weights
    ///
    /// # Errors
    ///
    /// Returns error if the weight matrix does not fit the input size
    pub fn new(weights: ProjectionWeights) -> PixelgateResult<Self> {
        let expected = (weights.input_size as usize).pow(2) * 3;
        if weights.input_size == 0 || weights.weights.is_empty() {
            return Err(PixelgateError::ModelUnavailable {
                message: "projection weights are empty".to_string(),
            });
        }
        if let Some((row, len)) = weights
            .weights
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, len)| *len != expected)
        {
            return Err(PixelgateError::ModelUnavailable {
                message: format!("weight row {row} has {len} entries, expected {expected}"),
            });
        }
        if !weights.bias.is_empty() && weights.bias.len() != weights.weights.len() {
            return Err(PixelgateError::ModelUnavailable {
                message: format!(
                    "bias has {} entries, expected {}",
                    weights.bias.len(),
                    weights.weights.len()
                ),
            });
        }
        Ok(Self { weights })
    }
}

impl SimilarityModel for ProjectionModel {
    fn name(&self) -> &str {
        "projection"
    }

    fn input_size(&self) -> u32 {
        self.weights.input_size
    }

    fn embed(&self, image: &RgbaImage) -> PixelgateResult<Vec<f32>> {
        let features = rgb_features(image);
        Ok(self
            .weights
            .weights
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let bias = self.weights.bias.get(i).copied().unwrap_or(0.0);
                let sum: f32 = row.iter().zip(&features).map(|(w, x)| w * x).sum();
                (sum + bias).max(0.0)
            })
            .collect())
    }
}

/// Loads the built-in [`ThumbnailModel`]
#[derive(Debug, Clone, Copy)]
pub struct BuiltinLoader {
    /// Thumbnail side length
    pub input_size: u32,
}

impl Default for BuiltinLoader {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

impl ModelLoader for BuiltinLoader {
    fn load(&self) -> PixelgateResult<Arc<dyn SimilarityModel>> {
        Ok(Arc::new(ThumbnailModel::new(self.input_size)))
    }
}

/// Loads a [`ProjectionModel`] from a JSON weights file
#[derive(Debug, Clone)]
pub struct WeightsFileLoader {
    path: PathBuf,
}

impl WeightsFileLoader {
    /// Create a loader for the given weights file
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModelLoader for WeightsFileLoader {
    fn load(&self) -> PixelgateResult<Arc<dyn SimilarityModel>> {
        let data = std::fs::read(&self.path).map_err(|e| PixelgateError::ModelUnavailable {
            message: format!("cannot read weights {}: {e}", self.path.display()),
        })?;
        let weights: ProjectionWeights = serde_json::from_slice(&data)?;
        Ok(Arc::new(ProjectionModel::new(weights)?))
    }
}
