//! Region cropping for the semantic verifier.

use crate::models::BoundingBox;
use image::DynamicImage;
use image::imageops::FilterType;

/// Crops padded detection regions and resizes them to the verifier input size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionCropper {
    padding: f32,
    size: u32,
}

impl RegionCropper {
    /// Creates a cropper with the per-side padding ratio and output side length.
    #[must_use]
    pub const fn new(padding: f32, size: u32) -> Self {
        Self { padding, size }
    }

    /// Returns the padded crop region before clamping.
    #[must_use]
    pub fn crop_region(&self, bbox: &BoundingBox) -> BoundingBox {
        bbox.padded(self.padding)
    }

    /// Crops the padded region, clamped to the frame, and resizes it to a square.
    ///
    /// Returns `None` if the region lies entirely outside the frame.
    #[must_use]
    pub fn crop(&self, image: &DynamicImage, bbox: &BoundingBox) -> Option<DynamicImage> {
        let (width, height) = (image.width(), image.height());
        let region = self.crop_region(bbox).clamp_to(width, height)?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x, y) = (region.x.floor() as u32, region.y.floor() as u32);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (right, bottom) = (
            ((region.x + region.width).ceil() as u32).min(width),
            ((region.y + region.height).ceil() as u32).min(height),
        );
        if right <= x || bottom <= y {
            return None;
        }

        let cropped = image.crop_imm(x, y, right - x, bottom - y);
        Some(cropped.resize_exact(self.size, self.size, FilterType::Triangle))
    }

    /// Output side length.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frame(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    #[test]
    fn test_padding_before_clamp() {
        let cropper = RegionCropper::new(0.15, 224);
        let region = cropper.crop_region(&BoundingBox::new(100.0, 100.0, 100.0, 100.0));
        assert!((region.x - 85.0).abs() < 1e-4);
        assert!((region.y - 85.0).abs() < 1e-4);
        assert!((region.width - 130.0).abs() < 1e-4);
        assert!((region.height - 130.0).abs() < 1e-4);
    }

    #[test]
    fn test_output_is_square() {
        let cropper = RegionCropper::new(0.15, 224);
        let crop = cropper
            .crop(&frame(1000, 1000), &BoundingBox::new(100.0, 100.0, 100.0, 100.0))
            .unwrap();
        assert_eq!((crop.width(), crop.height()), (224, 224));
    }

    #[test]
    fn test_edge_box_is_clamped() {
        let cropper = RegionCropper::new(0.15, 224);
        let crop = cropper
            .crop(&frame(200, 100), &BoundingBox::new(150.0, 50.0, 60.0, 60.0))
            .unwrap();
        assert_eq!((crop.width(), crop.height()), (224, 224));
    }

    #[test]
    fn test_outside_frame() {
        let cropper = RegionCropper::new(0.15, 224);
        assert!(
            cropper
                .crop(&frame(100, 100), &BoundingBox::new(500.0, 500.0, 10.0, 10.0))
                .is_none()
        );
    }
}
