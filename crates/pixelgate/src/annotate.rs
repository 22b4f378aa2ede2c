//! Diff image annotation.
//!
//! Draws the translucent overlay on differing pixels and a circular marker
//! with a pixel-count label around each highlighted region. Also locates
//! the regions themselves, either as one bounding box over every differing
//! pixel or as 8-connected clusters.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Overlay color for differing pixels
pub const OVERLAY_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Overlay opacity (0.0-1.0)
pub const OVERLAY_ALPHA: f32 = 0.5;
/// Marker ring color
pub const MARKER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Gap between the region's bounding box and the marker ring
pub const MARKER_PADDING: f64 = 8.0;
/// Ring thickness in pixels
pub const MARKER_THICKNESS: f64 = 2.0;

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;
const LABEL_SCALE: u32 = 2;

/// A highlighted area of the diff image (inclusive bounds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRegion {
    /// Left edge
    pub x0: u32,
    /// Top edge
    pub y0: u32,
    /// Right edge (inclusive)
    pub x1: u32,
    /// Bottom edge (inclusive)
    pub y1: u32,
    /// Number of differing pixels attributed to this region
    pub pixel_count: usize,
}

impl DiffRegion {
    /// Width of the bounding box
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    /// Height of the bounding box
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }

    fn include(&mut self, x: u32, y: u32) {
        self.x0 = self.x0.min(x);
        self.y0 = self.y0.min(y);
        self.x1 = self.x1.max(x);
        self.y1 = self.y1.max(y);
        self.pixel_count += 1;
    }

    const fn seed(x: u32, y: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x,
            y1: y,
            pixel_count: 1,
        }
    }
}

/// Bounding box over every set pixel of a row-major mask
#[must_use]
pub fn bounding_region(mask: &[bool], width: u32) -> Option<DiffRegion> {
    let mut region: Option<DiffRegion> = None;
    for (idx, _) in mask.iter().enumerate().filter(|(_, set)| **set) {
        let (x, y) = ((idx as u32) % width, (idx as u32) / width);
        match region.as_mut() {
            Some(r) => r.include(x, y),
            None => region = Some(DiffRegion::seed(x, y)),
        }
    }
    region
}

/// 8-connected clusters of set pixels, dropping clusters below `min_pixels`.
///
/// Regions are returned in scan order of their first pixel.
#[must_use]
pub fn connected_regions(mask: &[bool], width: u32, height: u32, min_pixels: usize) -> Vec<DiffRegion> {
    let mut visited = vec![false; mask.len()];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut region = DiffRegion::seed((start as u32) % width, (start as u32) / width);
        region.pixel_count = 0;

        while let Some(idx) = stack.pop() {
            let (x, y) = ((idx as u32) % width, (idx as u32) / width);
            region.include(x, y);

            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let n = (ny * width + nx) as usize;
                    if mask[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        if region.pixel_count >= min_pixels {
            regions.push(region);
        }
    }

    regions
}

/// Blend `color` over every masked pixel
pub fn overlay(img: &mut RgbaImage, mask: &[bool], color: Rgba<u8>, alpha: f32) {
    for (pixel, _) in img.pixels_mut().zip(mask).filter(|(_, set)| **set) {
        *pixel = blend(*pixel, color, alpha);
    }
}

/// Blend `color` over the rectangle `(x0, y0, x1, y1)` (exclusive upper bounds)
pub fn tint_rect(img: &mut RgbaImage, bounds: (u32, u32, u32, u32), color: Rgba<u8>, alpha: f32) {
    let (x0, y0, x1, y1) = bounds;
    let (w, h) = img.dimensions();
    for y in y0..y1.min(h) {
        for x in x0..x1.min(w) {
            let blended = blend(*img.get_pixel(x, y), color, alpha);
            img.put_pixel(x, y, blended);
        }
    }
}

/// Draw a padded circle and a pixel-count label around a region
pub fn draw_marker(img: &mut RgbaImage, region: &DiffRegion) {
    let cx = f64::from(region.x0 + region.x1) / 2.0;
    let cy = f64::from(region.y0 + region.y1) / 2.0;
    let half_w = f64::from(region.width()) / 2.0;
    let half_h = f64::from(region.height()) / 2.0;
    let radius = half_w.hypot(half_h) + MARKER_PADDING;

    draw_ring(img, cx, cy, radius, MARKER_THICKNESS, MARKER_COLOR);

    let label = format!("{}px", region.pixel_count);
    let label_w = label_width(&label);
    let label_h = GLYPH_HEIGHT * LABEL_SCALE + 2;
    let (img_w, img_h) = img.dimensions();

    let left = (cx - radius).max(0.0) as u32;
    let top = cy - radius - f64::from(label_h) - 2.0;
    let ly = if top >= 0.0 {
        top as u32
    } else {
        ((cy + radius + 2.0) as u32).min(img_h.saturating_sub(label_h))
    };
    let lx = left.min(img_w.saturating_sub(label_w));

    draw_label(img, lx, ly, &label);
}

/// Draw a circle outline of the given thickness, clipped to the image
pub fn draw_ring(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, thickness: f64, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    let reach = radius + thickness;
    let x_start = (cx - reach).floor().max(0.0) as u32;
    let y_start = (cy - reach).floor().max(0.0) as u32;
    let x_end = ((cx + reach).ceil().max(0.0) as u32).min(w.saturating_sub(1));
    let y_end = ((cy + reach).ceil().max(0.0) as u32).min(h.saturating_sub(1));
    if x_start >= w || y_start >= h {
        return;
    }

    for y in y_start..=y_end {
        for x in x_start..=x_end {
            let dist = (f64::from(x) - cx).hypot(f64::from(y) - cy);
            if (dist - radius).abs() <= thickness / 2.0 {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Draw text (digits, `p`, `x`) on a solid backing box
pub fn draw_label(img: &mut RgbaImage, x: u32, y: u32, text: &str) {
    let width = label_width(text);
    let height = GLYPH_HEIGHT * LABEL_SCALE + 2;
    fill_rect(img, x, y, width, height, MARKER_COLOR);

    let mut pen_x = x + 1;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0b100 >> col) != 0 {
                        fill_rect(
                            img,
                            pen_x + col * LABEL_SCALE,
                            y + 1 + row as u32 * LABEL_SCALE,
                            LABEL_SCALE,
                            LABEL_SCALE,
                            Rgba([255, 255, 255, 255]),
                        );
                    }
                }
            }
        }
        pen_x += (GLYPH_WIDTH + 1) * LABEL_SCALE;
    }
}

fn label_width(text: &str) -> u32 {
    text.chars().count() as u32 * (GLYPH_WIDTH + 1) * LABEL_SCALE + 1
}

fn fill_rect(img: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let (img_w, img_h) = img.dimensions();
    for py in y..y.saturating_add(height).min(img_h) {
        for px in x..x.saturating_add(width).min(img_w) {
            img.put_pixel(px, py, color);
        }
    }
}

fn blend(base: Rgba<u8>, top: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let mix = |a: u8, b: u8| (f32::from(a) * (1.0 - alpha) + f32::from(b) * alpha).round() as u8;
    let Rgba([r1, g1, b1, a1]) = base;
    let Rgba([r2, g2, b2, _]) = top;
    Rgba([mix(r1, r2), mix(g1, g2), mix(b1, b2), a1.max(128)])
}

/// 3x5 bitmap rows, most significant bit leftmost
const fn glyph(ch: char) -> Option<[u8; 5]> {
    Some(match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'p' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'x' => [0b000, 0b101, 0b010, 0b101, 0b000],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(width: u32, height: u32, points: &[(u32, u32)]) -> Vec<bool> {
        let mut mask = vec![false; (width * height) as usize];
        for &(x, y) in points {
            mask[(y * width + x) as usize] = true;
        }
        mask
    }

    #[test]
    fn test_bounding_region_empty() {
        assert!(bounding_region(&[false; 16], 4).is_none());
    }

    #[test]
    fn test_bounding_region_spans_all_points() {
        let mask = mask_from(10, 10, &[(1, 2), (8, 3), (4, 9)]);
        let region = bounding_region(&mask, 10).unwrap();
        assert_eq!((region.x0, region.y0, region.x1, region.y1), (1, 2, 8, 9));
        assert_eq!(region.pixel_count, 3);
        assert_eq!(region.width(), 8);
        assert_eq!(region.height(), 8);
    }

    #[test]
    fn test_connected_regions_separates_clusters() {
        let mask = mask_from(
            20,
            20,
            &[(1, 1), (2, 2), (3, 3), (15, 15), (16, 15), (15, 16), (10, 0)],
        );
        let regions = connected_regions(&mask, 20, 20, 2);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].pixel_count, 3);
        assert_eq!((regions[0].x0, regions[0].y0, regions[0].x1, regions[0].y1), (1, 1, 3, 3));
        assert_eq!(regions[1].pixel_count, 3);
        assert_eq!((regions[1].x0, regions[1].y0), (15, 15));
    }

    #[test]
    fn test_connected_regions_keeps_singletons_when_min_is_one() {
        let mask = mask_from(5, 5, &[(0, 0), (4, 4)]);
        assert_eq!(connected_regions(&mask, 5, 5, 1).len(), 2);
    }

    #[test]
    fn test_overlay_blends_only_masked_pixels() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 255, 255]));
        overlay(&mut img, &[true, false], OVERLAY_COLOR, 0.5);
        assert_eq!(*img.get_pixel(0, 0), Rgba([128, 0, 128, 255]));
        assert_eq!(*img.get_pixel(1, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_draw_marker_paints_ring_and_label() {
        let mut img = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let region = DiffRegion {
            x0: 45,
            y0: 45,
            x1: 55,
            y1: 55,
            pixel_count: 121,
        };
        draw_marker(&mut img, &region);
        let red = img.pixels().filter(|p| **p == MARKER_COLOR).count();
        assert!(red > 0);
        // Center of the region stays untouched
        assert_eq!(*img.get_pixel(50, 50), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_draw_marker_near_border_does_not_panic() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        let region = DiffRegion {
            x0: 0,
            y0: 0,
            x1: 7,
            y1: 7,
            pixel_count: 64,
        };
        draw_marker(&mut img, &region);
    }

    #[test]
    fn test_glyph_coverage() {
        for ch in "0123456789px".chars() {
            assert!(glyph(ch).is_some(), "missing glyph for {ch}");
        }
        assert!(glyph('?').is_none());
    }
}
