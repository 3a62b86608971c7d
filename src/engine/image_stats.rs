//! Pixel statistics used by the local engines.
//!
//! Everything here is derived from the decoded frame alone, so it is
//! available offline and cannot fail once an image has been decoded.

use crate::models::BoundingBox;
use image::{DynamicImage, GenericImageView, RgbaImage};
use std::fmt;

/// Longest side frames are reduced to before statistics are taken.
const MAX_STATS_DIMENSION: u32 = 320;

/// Brightness step between neighbouring pixels that counts as an edge.
const EDGE_THRESHOLD: f64 = 30.0;

/// Pixels with lower alpha are ignored by the color profile.
const MIN_ALPHA: u8 = 128;

/// Percentage of opaque pixels falling into each coarse color bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorProfile {
    /// Saturated red.
    pub red: f64,
    /// Saturated green.
    pub green: f64,
    /// Saturated blue.
    pub blue: f64,
    /// Bright, unsaturated.
    pub white: f64,
    /// Dark.
    pub black: f64,
    /// Everything else.
    pub gray: f64,
}

impl ColorProfile {
    /// Returns `(name, percentage)` pairs, highest share first.
    ///
    /// Ties keep the declaration order red, green, blue, white, black, gray.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&'static str, f64)> {
        let mut entries = vec![
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("white", self.white),
            ("black", self.black),
            ("gray", self.gray),
        ];
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        entries
    }

    /// Returns the `n` most common bucket names.
    #[must_use]
    pub fn dominant(&self, n: usize) -> Vec<&'static str> {
        self.ranked().into_iter().take(n).map(|(name, _)| name).collect()
    }
}

/// Coarse product category guessed from image statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCategory {
    /// High contrast with many edges.
    Electronics,
    /// Rough brightness texture.
    Textured,
    /// Mostly white or gray.
    Household,
    /// Strong red share.
    Food,
    /// Strong blue or green share.
    PersonalCare,
    /// Mostly black.
    Device,
    /// Nothing stood out.
    Generic,
}

impl ItemCategory {
    /// Human-readable category name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Electronics => "electronics or packaged item",
            Self::Textured => "textured item (fabric, paper or similar)",
            Self::Household => "household item",
            Self::Food => "food or beverage item",
            Self::PersonalCare => "personal care or health item",
            Self::Device => "electronic device",
            Self::Generic => "product or item",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary statistics of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageStats {
    /// Color bucket shares.
    pub colors: ColorProfile,
    /// Horizontal edge pixels per hundred pixels.
    pub edge_density: f64,
    /// Standard deviation of brightness.
    pub roughness: f64,
    /// Brightness range as a percentage of full scale.
    pub contrast: f64,
}

impl ImageStats {
    /// Computes statistics for a frame, downscaling large frames first.
    #[must_use]
    pub fn from_image(image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        let rgba = if width.max(height) > MAX_STATS_DIMENSION {
            image
                .thumbnail(MAX_STATS_DIMENSION, MAX_STATS_DIMENSION)
                .to_rgba8()
        } else {
            image.to_rgba8()
        };
        Self::from_rgba(&rgba)
    }

    /// Computes statistics over an RGBA buffer.
    #[must_use]
    pub fn from_rgba(pixels: &RgbaImage) -> Self {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Self::default();
        }
        Self {
            colors: color_profile(pixels),
            edge_density: edge_density(pixels),
            roughness: roughness(pixels),
            contrast: contrast(pixels),
        }
    }

    /// Guesses a coarse category; the first matching rule wins.
    #[must_use]
    pub fn estimate_category(&self) -> ItemCategory {
        let c = &self.colors;
        if self.contrast > 60.0 && self.edge_density > 15.0 {
            ItemCategory::Electronics
        } else if self.roughness > 40.0 {
            ItemCategory::Textured
        } else if c.white + c.gray > 50.0 {
            ItemCategory::Household
        } else if c.red > 20.0 {
            ItemCategory::Food
        } else if c.blue + c.green > 25.0 {
            ItemCategory::PersonalCare
        } else if c.black > 30.0 {
            ItemCategory::Device
        } else {
            ItemCategory::Generic
        }
    }

    /// Surface wording derived from roughness.
    #[must_use]
    pub fn texture_word(&self) -> &'static str {
        if self.roughness > 40.0 { "textured" } else { "smooth" }
    }

    /// Edge wording derived from contrast.
    #[must_use]
    pub fn definition_word(&self) -> &'static str {
        if self.contrast > 60.0 {
            "sharp, well-defined"
        } else {
            "subtle"
        }
    }
}

fn brightness(p: &image::Rgba<u8>) -> f64 {
    (f64::from(p[0]) + f64::from(p[1]) + f64::from(p[2])) / 3.0
}

fn color_profile(pixels: &RgbaImage) -> ColorProfile {
    let mut counts = [0_u64; 6];
    let mut samples = 0_u64;
    for p in pixels.pixels() {
        if p[3] < MIN_ALPHA {
            continue;
        }
        samples += 1;
        let (r, g, b) = (p[0], p[1], p[2]);
        let bucket = if r > 200 && g < 100 && b < 100 {
            0
        } else if r < 100 && g > 200 && b < 100 {
            1
        } else if r < 100 && g < 100 && b > 200 {
            2
        } else if r > 200 && g > 200 && b > 200 {
            3
        } else if r < 50 && g < 50 && b < 50 {
            4
        } else {
            5
        };
        counts[bucket] += 1;
    }
    if samples == 0 {
        return ColorProfile::default();
    }
    #[allow(clippy::cast_precision_loss)]
    let pct = |n: u64| n as f64 / samples as f64 * 100.0;
    ColorProfile {
        red: pct(counts[0]),
        green: pct(counts[1]),
        blue: pct(counts[2]),
        white: pct(counts[3]),
        black: pct(counts[4]),
        gray: pct(counts[5]),
    }
}

fn edge_density(pixels: &RgbaImage) -> f64 {
    let (width, height) = pixels.dimensions();
    let mut edges = 0_u64;
    for y in 0..height.saturating_sub(1) {
        for x in 0..width.saturating_sub(1) {
            let a = brightness(pixels.get_pixel(x, y));
            let b = brightness(pixels.get_pixel(x + 1, y));
            if (a - b).abs() > EDGE_THRESHOLD {
                edges += 1;
            }
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let density = edges as f64 / (f64::from(width) * f64::from(height)) * 100.0;
    density
}

fn roughness(pixels: &RgbaImage) -> f64 {
    let (mut sum, mut sum_sq, mut count) = (0.0, 0.0, 0.0);
    for p in pixels.pixels() {
        let v = brightness(p);
        sum += v;
        sum_sq += v * v;
        count += 1.0;
    }
    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0).sqrt()
}

fn contrast(pixels: &RgbaImage) -> f64 {
    let (min, max) = pixels
        .pixels()
        .map(brightness)
        .fold((255.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    ((max - min).max(0.0) / 255.0) * 100.0
}

/// Names a single RGB value with a small color vocabulary.
#[must_use]
pub const fn color_name(r: u8, g: u8, b: u8) -> &'static str {
    if r > 200 && g < 100 && b < 100 {
        "red"
    } else if r < 100 && g > 200 && b < 100 {
        "green"
    } else if r < 100 && g < 100 && b > 200 {
        "blue"
    } else if r > 200 && g > 200 && b < 100 {
        "yellow"
    } else if r > 200 && g < 100 && b > 200 {
        "purple"
    } else if r < 100 && g > 200 && b > 200 {
        "cyan"
    } else if r > 150 && g > 100 && b < 50 {
        "orange"
    } else if r > 200 && g > 200 && b > 200 {
        "white"
    } else if r < 50 && g < 50 && b < 50 {
        "black"
    } else if r > 100 && g > 50 && b < 50 {
        "brown"
    } else {
        "gray"
    }
}

/// Returns up to three dominant color names inside a region of the frame.
///
/// Every tenth pixel is sampled. Returns an empty list if the region lies
/// outside the frame.
#[must_use]
pub fn region_colors(image: &DynamicImage, region: &BoundingBox) -> Vec<&'static str> {
    let Some(clamped) = region.clamp_to(image.width(), image.height()) else {
        return Vec::new();
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (x, y, w, h) = (
        clamped.x as u32,
        clamped.y as u32,
        (clamped.width as u32).max(1),
        (clamped.height as u32).max(1),
    );
    let w = w.min(image.width().saturating_sub(x));
    let h = h.min(image.height().saturating_sub(y));
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let region = image.crop_imm(x, y, w, h).to_rgba8();
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for p in region.pixels().step_by(10) {
        let name = color_name(p[0], p[1], p[2]);
        match counts.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(3).map(|(name, _)| name).collect()
}

/// Horizontal position of an object in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalPosition {
    /// Left third.
    Left,
    /// Middle third.
    Center,
    /// Right third.
    Right,
}

impl HorizontalPosition {
    /// Classifies a box by its horizontal center relative to the frame width.
    #[must_use]
    pub fn of(bbox: &BoundingBox, image_width: u32) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let width = image_width.max(1) as f32;
        let center = bbox.center_x();
        if center < width / 3.0 {
            Self::Left
        } else if center > width * 2.0 / 3.0 {
            Self::Right
        } else {
            Self::Center
        }
    }

    /// Short label (`left`, `center`, `right`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    /// Spoken phrase (`on the left`, `in the center`, `on the right`).
    #[must_use]
    pub const fn phrase(&self) -> &'static str {
        match self {
            Self::Left => "on the left",
            Self::Center => "in the center",
            Self::Right => "on the right",
        }
    }
}

/// Rough distance class of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    /// Takes up a large part of the frame.
    Near,
    /// Small in the frame.
    Far,
}

impl Proximity {
    /// Boxes at least this fraction of the frame width count as near.
    pub const NEAR_WIDTH_FRACTION: f32 = 0.33;

    /// Classifies a box by its width relative to the frame width.
    #[must_use]
    pub fn of(bbox: &BoundingBox, image_width: u32) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let width = image_width.max(1) as f32;
        if bbox.width / width >= Self::NEAR_WIDTH_FRACTION {
            Self::Near
        } else {
            Self::Far
        }
    }

    /// Spoken phrase.
    #[must_use]
    pub const fn phrase(&self) -> &'static str {
        match self {
            Self::Near => "near you",
            Self::Far => "farther away",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_solid_red_profile() {
        let stats = ImageStats::from_rgba(&solid(10, 10, [230, 20, 20, 255]));
        assert!((stats.colors.red - 100.0).abs() < 1e-9);
        assert!(stats.edge_density.abs() < 1e-9);
        assert!(stats.roughness.abs() < 1e-9);
        assert!(stats.contrast.abs() < 1e-9);
        assert_eq!(stats.estimate_category(), ItemCategory::Food);
        assert_eq!(stats.colors.dominant(1), vec!["red"]);
    }

    #[test]
    fn test_transparent_pixels_ignored() {
        let stats = ImageStats::from_rgba(&solid(4, 4, [230, 20, 20, 0]));
        assert!(stats.colors.red.abs() < 1e-9);
    }

    #[test]
    fn test_stripes_are_high_contrast_electronics() {
        let img = RgbaImage::from_fn(20, 20, |x, _| {
            if x % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let stats = ImageStats::from_rgba(&img);
        assert!((stats.contrast - 100.0).abs() < 1e-9);
        assert!(stats.edge_density > 15.0);
        assert_eq!(stats.estimate_category(), ItemCategory::Electronics);
    }

    #[test]
    fn test_white_is_household() {
        let stats = ImageStats::from_rgba(&solid(8, 8, [240, 240, 240, 255]));
        assert_eq!(stats.estimate_category(), ItemCategory::Household);
    }

    #[test]
    fn test_empty_buffer_is_default() {
        assert_eq!(ImageStats::from_rgba(&RgbaImage::new(0, 0)), ImageStats::default());
    }

    #[test]
    fn test_color_names() {
        assert_eq!(color_name(250, 250, 10), "yellow");
        assert_eq!(color_name(10, 10, 10), "black");
        assert_eq!(color_name(128, 128, 128), "gray");
    }

    #[test]
    fn test_region_colors() {
        let mut img = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        for x in 0..50 {
            for y in 0..100 {
                img.put_pixel(x, y, Rgba([10, 10, 240, 255]));
            }
        }
        let image = DynamicImage::ImageRgba8(img);
        let colors = region_colors(&image, &BoundingBox::new(0.0, 0.0, 40.0, 100.0));
        assert_eq!(colors, vec!["blue"]);
        assert!(region_colors(&image, &BoundingBox::new(500.0, 0.0, 5.0, 5.0)).is_empty());
    }

    #[test]
    fn test_horizontal_position_thirds() {
        let at = |x: f32| HorizontalPosition::of(&BoundingBox::new(x, 0.0, 10.0, 10.0), 900);
        assert_eq!(at(100.0), HorizontalPosition::Left);
        assert_eq!(at(440.0), HorizontalPosition::Center);
        assert_eq!(at(800.0), HorizontalPosition::Right);
    }

    #[test]
    fn test_proximity_by_width() {
        let near = BoundingBox::new(0.0, 0.0, 400.0, 10.0);
        let far = BoundingBox::new(0.0, 0.0, 40.0, 10.0);
        assert_eq!(Proximity::of(&near, 1000), Proximity::Near);
        assert_eq!(Proximity::of(&far, 1000), Proximity::Far);
    }
}
