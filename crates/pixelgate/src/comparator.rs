//! Deterministic pixel comparison.
//!
//! The comparator normalizes resolution, masks ignore regions, counts pixels
//! whose difference magnitude exceeds a noise threshold, and renders an
//! annotated diff image. It performs no I/O and keeps no state between calls.

use crate::annotate::{self, DiffRegion, OVERLAY_ALPHA, OVERLAY_COLOR};
use crate::region::IgnoreRegion;
use crate::result::{PixelgateError, PixelgateResult};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Difference magnitude (0-255) a pixel must exceed to count as changed
pub const DEFAULT_NOISE_THRESHOLD: u8 = 50;

/// Tint applied to ignored areas on the diff image
const IGNORED_TINT: Rgba<u8> = Rgba([128, 128, 128, 255]);

/// How differing pixels are grouped for annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DiffHighlight {
    /// One bounding box around every differing pixel
    #[default]
    SingleRegion,
    /// One marker per 8-connected cluster with at least `min_pixels` pixels
    Clustered {
        /// Clusters smaller than this are treated as noise
        min_pixels: usize,
    },
}

/// Result of comparing a capture against its baseline
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    /// Whether `diff_ratio <= tolerance`
    pub matches: bool,
    /// Fraction of pixels that differ (0.0-1.0)
    pub diff_ratio: f64,
    /// Tolerance the verdict was computed against
    pub tolerance: f64,
    /// Number of pixels counted as different
    pub diff_pixel_count: usize,
    /// Total number of pixels compared
    pub total_pixels: usize,
    /// Largest difference magnitude seen (0-255)
    pub max_magnitude: u8,
    /// Annotated diff image, in baseline dimensions
    pub diff_image: RgbaImage,
    /// Highlighted areas drawn on the diff image
    pub regions: Vec<DiffRegion>,
    /// Baseline (width, height)
    pub baseline_dimensions: (u32, u32),
    /// Capture (width, height) before any scaling
    pub actual_dimensions: (u32, u32),
    /// Whether the capture was rescaled to baseline dimensions
    pub was_scaled: bool,
    /// `baseline.width / actual.width`, 1.0 when not scaled
    pub scale_factor: f64,
}

impl ComparisonResult {
    /// Check if no pixel crossed the noise threshold
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.diff_pixel_count == 0
    }

    /// Difference as a percentage (0.0-100.0)
    #[must_use]
    pub fn diff_percent(&self) -> f64 {
        self.diff_ratio * 100.0
    }

    /// Check if the difference is within another tolerance
    #[must_use]
    pub fn within_tolerance(&self, tolerance: f64) -> bool {
        self.diff_ratio <= tolerance
    }
}

/// Images normalized and masked, ready for differencing.
///
/// Shared by the pixel comparison and the similarity model so both see the
/// same resolution and the same ignored areas.
#[derive(Debug, Clone)]
pub struct PreparedPair {
    /// Baseline with ignore regions zeroed
    pub baseline: RgbaImage,
    /// Capture at baseline resolution with ignore regions zeroed
    pub actual: RgbaImage,
    /// Capture at baseline resolution, unmasked (diff image background)
    pub display: RgbaImage,
    /// Ignore regions clipped to the image as `(x0, y0, x1, y1)`
    pub masked: Vec<(u32, u32, u32, u32)>,
    /// Capture (width, height) before scaling
    pub actual_dimensions: (u32, u32),
    /// Whether the capture was rescaled
    pub was_scaled: bool,
    /// `baseline.width / actual.width`
    pub scale_factor: f64,
}

/// Pixel comparator
#[derive(Debug, Clone, Copy)]
pub struct PixelComparator {
    noise_threshold: u8,
    highlight: DiffHighlight,
}

impl Default for PixelComparator {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_THRESHOLD, DiffHighlight::SingleRegion)
    }
}

impl PixelComparator {
    /// Create a comparator
    #[must_use]
    pub const fn new(noise_threshold: u8, highlight: DiffHighlight) -> Self {
        Self {
            noise_threshold,
            highlight,
        }
    }

    /// Noise threshold in use
    #[must_use]
    pub const fn noise_threshold(&self) -> u8 {
        self.noise_threshold
    }

    /// Highlight mode in use
    #[must_use]
    pub const fn highlight(&self) -> DiffHighlight {
        self.highlight
    }

    /// Compare a capture against a baseline
    ///
    /// # Errors
    ///
    /// Returns error if either image is zero-sized or the tolerance is not
    /// a finite value in `[0, 1]`
    pub fn compare(
        &self,
        baseline: &RgbaImage,
        actual: &RgbaImage,
        tolerance: f64,
        ignore_regions: &[IgnoreRegion],
    ) -> PixelgateResult<ComparisonResult> {
        validate_tolerance(tolerance)?;
        let pair = self.prepare(baseline, actual, ignore_regions)?;
        Ok(self.compare_prepared(&pair, tolerance))
    }

    /// Compare two encoded images (any format the `image` crate decodes)
    ///
    /// # Errors
    ///
    /// Returns error if either image cannot be decoded, or as [`Self::compare`]
    pub fn compare_encoded(
        &self,
        baseline: &[u8],
        actual: &[u8],
        tolerance: f64,
        ignore_regions: &[IgnoreRegion],
    ) -> PixelgateResult<ComparisonResult> {
        let baseline = decode(baseline, "baseline")?;
        let actual = decode(actual, "actual")?;
        self.compare(&baseline, &actual, tolerance, ignore_regions)
    }

    /// Normalize resolution and apply ignore regions
    ///
    /// # Errors
    ///
    /// Returns error if either image is zero-sized
    pub fn prepare(
        &self,
        baseline: &RgbaImage,
        actual: &RgbaImage,
        ignore_regions: &[IgnoreRegion],
    ) -> PixelgateResult<PreparedPair> {
        let (width, height) = baseline.dimensions();
        let (act_width, act_height) = actual.dimensions();

        if width == 0 || height == 0 {
            return Err(PixelgateError::invalid_input(format!(
                "baseline image is zero-sized ({width}x{height})"
            )));
        }
        if act_width == 0 || act_height == 0 {
            return Err(PixelgateError::invalid_input(format!(
                "actual image is zero-sized ({act_width}x{act_height})"
            )));
        }

        let was_scaled = (width, height) != (act_width, act_height);
        let (display, scale_factor) = if was_scaled {
            let factor = f64::from(width) / f64::from(act_width);
            tracing::debug!(
                from = %format!("{act_width}x{act_height}"),
                to = %format!("{width}x{height}"),
                factor,
                "resolution mismatch, rescaling capture"
            );
            (
                image::imageops::resize(actual, width, height, FilterType::CatmullRom),
                factor,
            )
        } else {
            (actual.clone(), 1.0)
        };

        let masked: Vec<_> = ignore_regions
            .iter()
            .filter_map(|region| region.clip(width, height))
            .collect();

        let mut masked_baseline = baseline.clone();
        let mut masked_actual = display.clone();
        for &(x0, y0, x1, y1) in &masked {
            for y in y0..y1 {
                for x in x0..x1 {
                    masked_baseline.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                    masked_actual.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                }
            }
        }

        Ok(PreparedPair {
            baseline: masked_baseline,
            actual: masked_actual,
            display,
            masked,
            actual_dimensions: (act_width, act_height),
            was_scaled,
            scale_factor,
        })
    }

    /// Difference a prepared pair and render the diff image
    #[must_use]
    pub fn compare_prepared(&self, pair: &PreparedPair, tolerance: f64) -> ComparisonResult {
        let (width, height) = pair.baseline.dimensions();
        let total_pixels = (width as usize) * (height as usize);

        let mut mask = vec![false; total_pixels];
        let mut diff_pixel_count = 0usize;
        let mut max_magnitude = 0u8;

        for (idx, (expected, actual)) in pair.baseline.pixels().zip(pair.actual.pixels()).enumerate() {
            let magnitude = diff_magnitude(*expected, *actual);
            max_magnitude = max_magnitude.max(magnitude);
            if magnitude > self.noise_threshold {
                mask[idx] = true;
                diff_pixel_count += 1;
            }
        }

        let diff_ratio = diff_pixel_count as f64 / total_pixels as f64;
        let matches = diff_ratio <= tolerance;

        let regions = match self.highlight {
            DiffHighlight::SingleRegion => annotate::bounding_region(&mask, width)
                .into_iter()
                .collect(),
            DiffHighlight::Clustered { min_pixels } => {
                annotate::connected_regions(&mask, width, height, min_pixels.max(1))
            }
        };

        let mut diff_image = pair.display.clone();
        for &(x0, y0, x1, y1) in &pair.masked {
            annotate::tint_rect(&mut diff_image, (x0, y0, x1, y1), IGNORED_TINT, 0.3);
        }
        annotate::overlay(&mut diff_image, &mask, OVERLAY_COLOR, OVERLAY_ALPHA);
        for region in &regions {
            annotate::draw_marker(&mut diff_image, region);
        }

        tracing::debug!(
            diff_pixel_count,
            total_pixels,
            diff_ratio,
            tolerance,
            matches,
            regions = regions.len(),
            "pixel comparison complete"
        );

        ComparisonResult {
            matches,
            diff_ratio,
            tolerance,
            diff_pixel_count,
            total_pixels,
            max_magnitude,
            diff_image,
            regions,
            baseline_dimensions: (width, height),
            actual_dimensions: pair.actual_dimensions,
            was_scaled: pair.was_scaled,
            scale_factor: pair.scale_factor,
        }
    }
}

/// Reject tolerances outside `[0, 1]`
///
/// # Errors
///
/// Returns `InvalidArgument` for NaN, infinite, negative, or >1 values
pub fn validate_tolerance(tolerance: f64) -> PixelgateResult<()> {
    if tolerance.is_finite() && (0.0..=1.0).contains(&tolerance) {
        Ok(())
    } else {
        Err(PixelgateError::invalid_argument(format!(
            "tolerance must be within [0, 1], got {tolerance}"
        )))
    }
}

/// Luma-weighted magnitude of the per-channel absolute difference
#[must_use]
pub fn diff_magnitude(a: Rgba<u8>, b: Rgba<u8>) -> u8 {
    let Rgba([r1, g1, b1, _]) = a;
    let Rgba([r2, g2, b2, _]) = b;

    let dr = f32::from(r1.abs_diff(r2));
    let dg = f32::from(g1.abs_diff(g2));
    let db = f32::from(b1.abs_diff(b2));

    (0.299 * dr + 0.587 * dg + 0.114 * db).round().min(255.0) as u8
}

fn decode(bytes: &[u8], which: &str) -> PixelgateResult<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| PixelgateError::invalid_input(format!("failed to decode {which} image: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageEncoder;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(width, height, color)
    }

    fn encode(img: &RgbaImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::Rgba8,
            )
            .unwrap();
        buffer
    }

    #[test]
    fn test_identical_images() {
        let img = solid(10, 10, Rgba([128, 64, 32, 255]));
        let result = PixelComparator::default().compare(&img, &img, 0.0, &[]).unwrap();
        assert!(result.matches);
        assert!(result.is_identical());
        assert_eq!(result.diff_ratio, 0.0);
        assert!(result.regions.is_empty());
        assert!(!result.was_scaled);
        assert_eq!(result.scale_factor, 1.0);
    }

    #[test]
    fn test_single_red_pixel_within_one_percent() {
        let baseline = solid(100, 100, WHITE);
        let mut actual = baseline.clone();
        actual.put_pixel(40, 60, RED);

        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.01, &[])
            .unwrap();
        assert!(result.matches);
        assert_eq!(result.diff_pixel_count, 1);
        assert_eq!(result.total_pixels, 10_000);
        assert!((result.diff_ratio - 0.0001).abs() < 1e-12);
        assert_eq!(result.regions.len(), 1);
    }

    #[test]
    fn test_single_red_pixel_fails_zero_tolerance() {
        let baseline = solid(100, 100, WHITE);
        let mut actual = baseline.clone();
        actual.put_pixel(0, 0, RED);

        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.0, &[])
            .unwrap();
        assert!(!result.matches);
    }

    #[test]
    fn test_white_vs_black_full_difference() {
        let result = PixelComparator::default()
            .compare(&solid(20, 20, WHITE), &solid(20, 20, BLACK), 0.01, &[])
            .unwrap();
        assert!(!result.matches);
        assert_eq!(result.diff_ratio, 1.0);
        assert_eq!(result.max_magnitude, 255);
        assert!((result.diff_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_noise_below_threshold_ignored() {
        let baseline = solid(10, 10, Rgba([100, 100, 100, 255]));
        let actual = solid(10, 10, Rgba([140, 140, 140, 255]));
        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.0, &[])
            .unwrap();
        assert!(result.matches);
        assert_eq!(result.max_magnitude, 40);
    }

    #[test]
    fn test_magnitude_exactly_at_threshold_not_counted() {
        let baseline = solid(4, 4, Rgba([0, 0, 0, 255]));
        let actual = solid(4, 4, Rgba([50, 50, 50, 255]));
        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.0, &[])
            .unwrap();
        assert_eq!(result.diff_pixel_count, 0);
    }

    #[test]
    fn test_alpha_channel_ignored() {
        let baseline = solid(4, 4, Rgba([10, 20, 30, 255]));
        let actual = solid(4, 4, Rgba([10, 20, 30, 0]));
        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.0, &[])
            .unwrap();
        assert!(result.is_identical());
    }

    #[test]
    fn test_ignore_region_masks_all_differences() {
        let baseline = solid(50, 50, WHITE);
        let mut actual = baseline.clone();
        for y in 10..20 {
            for x in 30..40 {
                actual.put_pixel(x, y, BLACK);
            }
        }
        let regions = [IgnoreRegion::new(30, 10, 10, 10)];
        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.0, &regions)
            .unwrap();
        assert!(result.matches);
        assert_eq!(result.diff_pixel_count, 0);
    }

    #[test]
    fn test_ignore_region_outside_image_is_harmless() {
        let img = solid(10, 10, WHITE);
        let regions = [IgnoreRegion::new(500, 500, 10, 10)];
        let result = PixelComparator::default()
            .compare(&img, &img, 0.0, &regions)
            .unwrap();
        assert!(result.matches);
    }

    #[test]
    fn test_resolution_mismatch_scales_solid_color() {
        let baseline = solid(100, 80, Rgba([30, 144, 255, 255]));
        let actual = solid(50, 40, Rgba([30, 144, 255, 255]));
        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.01, &[])
            .unwrap();
        assert!(result.matches);
        assert!(result.was_scaled);
        assert!((result.scale_factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(result.actual_dimensions, (50, 40));
        assert_eq!(result.baseline_dimensions, (100, 80));
        assert_eq!(result.diff_image.dimensions(), (100, 80));
    }

    #[test]
    fn test_downscale_factor() {
        let baseline = solid(50, 50, WHITE);
        let actual = solid(200, 200, WHITE);
        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.01, &[])
            .unwrap();
        assert!(result.was_scaled);
        assert!((result.scale_factor - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_sized_images_rejected() {
        let empty = RgbaImage::new(0, 0);
        let img = solid(4, 4, WHITE);
        let comparator = PixelComparator::default();
        assert!(matches!(
            comparator.compare(&empty, &img, 0.1, &[]),
            Err(PixelgateError::InvalidInput { .. })
        ));
        assert!(matches!(
            comparator.compare(&img, &RgbaImage::new(4, 0), 0.1, &[]),
            Err(PixelgateError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let img = solid(4, 4, WHITE);
        let comparator = PixelComparator::default();
        for bad in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                comparator.compare(&img, &img, bad, &[]),
                Err(PixelgateError::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn test_diff_image_marks_differences() {
        let baseline = solid(60, 60, WHITE);
        let mut actual = baseline.clone();
        actual.put_pixel(30, 30, BLACK);
        let result = PixelComparator::default()
            .compare(&baseline, &actual, 0.0, &[])
            .unwrap();
        assert_ne!(*result.diff_image.get_pixel(30, 30), BLACK);
        assert_ne!(result.diff_image, actual);
    }

    #[test]
    fn test_clustered_highlight_separates_defects() {
        let baseline = solid(100, 100, WHITE);
        let mut actual = baseline.clone();
        for (x, y) in [(5, 5), (6, 5), (5, 6), (90, 90), (91, 91), (50, 2)] {
            actual.put_pixel(x, y, BLACK);
        }

        let single = PixelComparator::default()
            .compare(&baseline, &actual, 0.0, &[])
            .unwrap();
        assert_eq!(single.regions.len(), 1);

        let clustered = PixelComparator::new(
            DEFAULT_NOISE_THRESHOLD,
            DiffHighlight::Clustered { min_pixels: 2 },
        )
        .compare(&baseline, &actual, 0.0, &[])
        .unwrap();
        assert_eq!(clustered.regions.len(), 2);
        assert_eq!(clustered.diff_pixel_count, single.diff_pixel_count);
    }

    #[test]
    fn test_compare_encoded() {
        let img = solid(8, 8, RED);
        let bytes = encode(&img);
        let result = PixelComparator::default()
            .compare_encoded(&bytes, &bytes, 0.0, &[])
            .unwrap();
        assert!(result.matches);
    }

    #[test]
    fn test_compare_encoded_invalid_data() {
        let result = PixelComparator::default().compare_encoded(&[0, 1, 2, 3], &[0, 1, 2], 0.1, &[]);
        assert!(matches!(result, Err(PixelgateError::InvalidInput { .. })));
    }

    #[test]
    fn test_diff_magnitude() {
        assert_eq!(diff_magnitude(WHITE, WHITE), 0);
        assert_eq!(diff_magnitude(WHITE, BLACK), 255);
        // red vs white differs in green and blue only
        assert_eq!(diff_magnitude(WHITE, RED), 179);
    }

    #[test]
    fn test_within_tolerance() {
        let result = PixelComparator::default()
            .compare(&solid(10, 10, WHITE), &solid(10, 10, WHITE), 0.0, &[])
            .unwrap();
        assert!(result.within_tolerance(0.0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn noisy(width: u32, height: u32, seed: u64) -> RgbaImage {
            let mut state = seed | 1;
            RgbaImage::from_fn(width, height, |_, _| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let v = state.to_le_bytes();
                Rgba([v[0], v[1], v[2], 255])
            })
        }

        proptest! {
            #[test]
            fn prop_identity_always_matches(
                width in 1u32..32,
                height in 1u32..32,
                seed in any::<u64>(),
                tolerance in 0.0f64..=1.0
            ) {
                let img = noisy(width, height, seed);
                let result = PixelComparator::default().compare(&img, &img, tolerance, &[]).unwrap();
                prop_assert_eq!(result.diff_ratio, 0.0);
                prop_assert!(result.matches);
            }

            #[test]
            fn prop_match_monotonic_in_tolerance(
                seed_a in any::<u64>(),
                seed_b in any::<u64>(),
                t1 in 0.0f64..=1.0,
                t2 in 0.0f64..=1.0
            ) {
                let (low, high) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
                let a = noisy(16, 16, seed_a);
                let b = noisy(16, 16, seed_b);
                let comparator = PixelComparator::default();
                let strict = comparator.compare(&a, &b, low, &[]).unwrap();
                let lenient = comparator.compare(&a, &b, high, &[]).unwrap();
                prop_assert!(!strict.matches || lenient.matches);
            }

            #[test]
            fn prop_mask_covering_all_changes_matches(
                x in 0u32..20,
                y in 0u32..20,
                w in 1u32..12,
                h in 1u32..12,
                seed in any::<u64>()
            ) {
                let baseline = solid(32, 32, WHITE);
                let mut actual = baseline.clone();
                let patch = noisy(w, h, seed);
                for (px, py, pixel) in patch.enumerate_pixels() {
                    if x + px < 32 && y + py < 32 {
                        actual.put_pixel(x + px, y + py, *pixel);
                    }
                }
                let regions = [IgnoreRegion::new(x, y, w, h)];
                let result = PixelComparator::default()
                    .compare(&baseline, &actual, 0.0, &regions)
                    .unwrap();
                prop_assert!(result.matches);
            }
        }
    }
}
