//! Ignore regions: rectangles excluded from pixel differencing.
//!
//! Regions are expressed in baseline pixel coordinates and are never
//! persisted with an image. The textual encoding is a semicolon separated
//! list of `x,y,w,h` quadruples, e.g. `"10,20,30,40;50,60,70,80"`.

use crate::result::PixelgateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Axis-aligned rectangle excluded from comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IgnoreRegion {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width of the region
    pub width: u32,
    /// Height of the region
    pub height: u32,
}

impl IgnoreRegion {
    /// Create a new ignore region
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check if a point is within this region
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && py >= self.y
            && (px - self.x) < self.width
            && (py - self.y) < self.height
    }

    /// Intersect with an image of the given size.
    ///
    /// Returns `(x0, y0, x1, y1)` with exclusive upper bounds, or `None`
    /// when the region lies entirely outside the image.
    #[must_use]
    pub fn clip(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let x1 = self.x.saturating_add(self.width).min(image_width);
        let y1 = self.y.saturating_add(self.height).min(image_height);
        if x1 <= self.x || y1 <= self.y {
            return None;
        }
        Some((self.x, self.y, x1, y1))
    }
}

impl fmt::Display for IgnoreRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for IgnoreRegion {
    type Err = PixelgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(PixelgateError::invalid_argument(format!(
                "ignore region '{s}' must have 4 components (x,y,w,h), found {}",
                parts.len()
            )));
        }

        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse::<u32>().map_err(|e| {
                PixelgateError::invalid_argument(format!(
                    "ignore region '{s}' has invalid component '{part}': {e}"
                ))
            })?;
        }

        let [x, y, width, height] = values;
        if width == 0 || height == 0 {
            return Err(PixelgateError::invalid_argument(format!(
                "ignore region '{s}' has zero area"
            )));
        }
        Ok(Self::new(x, y, width, height))
    }
}

/// Parse a semicolon separated list of ignore regions.
///
/// Malformed entries are skipped with a warning; empty segments are ignored.
#[must_use]
pub fn parse_ignore_regions(encoded: &str) -> Vec<IgnoreRegion> {
    encoded
        .split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| match segment.parse::<IgnoreRegion>() {
            Ok(region) => Some(region),
            Err(e) => {
                tracing::warn!(segment, error = %e, "skipping malformed ignore region");
                None
            }
        })
        .collect()
}

/// Encode regions back to the `x,y,w,h;...` form
#[must_use]
pub fn format_ignore_regions(regions: &[IgnoreRegion]) -> String {
    regions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_inside_and_edges() {
        let region = IgnoreRegion::new(10, 10, 5, 5);
        assert!(region.contains(10, 10));
        assert!(region.contains(14, 14));
        assert!(!region.contains(15, 14));
        assert!(!region.contains(9, 12));
    }

    #[test]
    fn test_contains_near_u32_max() {
        let region = IgnoreRegion::new(u32::MAX - 2, 0, 10, 1);
        assert!(region.contains(u32::MAX - 1, 0));
    }

    #[test]
    fn test_clip() {
        let region = IgnoreRegion::new(90, 90, 20, 20);
        assert_eq!(region.clip(100, 100), Some((90, 90, 100, 100)));
        assert_eq!(IgnoreRegion::new(100, 0, 5, 5).clip(100, 100), None);
    }

    #[test]
    fn test_parse_list() {
        let regions = parse_ignore_regions("10,20,30,40;50,60,70,80");
        assert_eq!(
            regions,
            vec![
                IgnoreRegion::new(10, 20, 30, 40),
                IgnoreRegion::new(50, 60, 70, 80)
            ]
        );
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let regions = parse_ignore_regions("1,2,3,4; bogus ;5,6,7;-1,0,2,2;8,9,10,11;;0,0,0,5");
        assert_eq!(
            regions,
            vec![IgnoreRegion::new(1, 2, 3, 4), IgnoreRegion::new(8, 9, 10, 11)]
        );
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        let regions = parse_ignore_regions(" 1, 2, 3, 4 ");
        assert_eq!(regions, vec![IgnoreRegion::new(1, 2, 3, 4)]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_ignore_regions("").is_empty());
    }

    #[test]
    fn test_format_round_trip() {
        let encoded = "10,20,30,40;50,60,70,80";
        assert_eq!(format_ignore_regions(&parse_ignore_regions(encoded)), encoded);
    }
}
