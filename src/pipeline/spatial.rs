//! Spatial plausibility check.

use crate::models::BoundingBox;

/// Rejects boxes too small to be worth verifying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialValidator {
    min_area_ratio: f64,
}

impl SpatialValidator {
    /// Creates a validator with the minimum box-to-frame area ratio.
    #[must_use]
    pub const fn new(min_area_ratio: f64) -> Self {
        Self { min_area_ratio }
    }

    /// Returns the box area as a fraction of the frame area.
    ///
    /// Empty frames yield 0.
    #[must_use]
    pub fn area_ratio(bbox: &BoundingBox, image_width: u32, image_height: u32) -> f64 {
        let frame = f64::from(image_width) * f64::from(image_height);
        if frame <= 0.0 {
            return 0.0;
        }
        bbox.area() / frame
    }

    /// Returns true if the box covers at least the minimum share of the frame.
    #[must_use]
    pub fn is_plausible(&self, bbox: &BoundingBox, image_width: u32, image_height: u32) -> bool {
        Self::area_ratio(bbox, image_width, image_height) >= self.min_area_ratio
    }

    /// Minimum area ratio.
    #[must_use]
    pub const fn min_area_ratio(&self) -> f64 {
        self.min_area_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(190.0, 100.0, false ; "1.9 percent dropped")]
    #[test_case(200.0, 100.0, true ; "exactly 2 percent kept")]
    #[test_case(500.0, 500.0, true ; "quarter of frame kept")]
    #[test_case(0.0, 100.0, false ; "degenerate box dropped")]
    fn test_plausibility(width: f32, height: f32, expected: bool) {
        let validator = SpatialValidator::new(0.02);
        let bbox = BoundingBox::new(10.0, 10.0, width, height);
        assert_eq!(validator.is_plausible(&bbox, 1000, 1000), expected);
    }

    #[test]
    fn test_empty_frame() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(SpatialValidator::area_ratio(&bbox, 0, 100).abs() < f64::EPSILON);
        assert!(!SpatialValidator::new(0.02).is_plausible(&bbox, 0, 100));
    }
}
