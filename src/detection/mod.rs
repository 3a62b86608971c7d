//! Object detection capability.
//!
//! A detector turns a frame into labelled bounding boxes. Results are
//! expected sorted by score, highest first, and bounded by
//! [`DetectionOptions`].

mod huggingface;

pub use huggingface::HfObjectDetector;

use crate::engine::EngineResult;
use crate::models::DetectedObject;
use async_trait::async_trait;
use image::DynamicImage;

/// Bounds applied to a detector call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionOptions {
    /// Minimum raw detection score.
    pub min_score: f32,
    /// Maximum number of detections returned.
    pub max_results: usize,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            min_score: 0.4,
            max_results: 5,
        }
    }
}

impl DetectionOptions {
    /// Filters, sorts and truncates raw detections.
    ///
    /// Used by adapters whose backend ignores thresholds.
    #[must_use]
    pub fn apply(&self, mut detections: Vec<DetectedObject>) -> Vec<DetectedObject> {
        detections.retain(|d| d.score >= self.min_score);
        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        detections.truncate(self.max_results);
        detections
    }
}

/// Trait for object detectors.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Model identifier.
    fn model(&self) -> &str;

    /// Base URL of the remote service, or `None` for in-process detectors.
    fn endpoint(&self) -> Option<&str> {
        None
    }

    /// Detects objects in a frame.
    ///
    /// Implementations return at most `options.max_results` detections, all
    /// scoring at least `options.min_score`, highest score first.
    ///
    /// # Errors
    ///
    /// Returns a classified [`crate::EngineError`] if the backend fails.
    async fn detect(
        &self,
        image: &DynamicImage,
        options: &DetectionOptions,
    ) -> EngineResult<Vec<DetectedObject>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    fn det(label: &str, score: f32) -> DetectedObject {
        DetectedObject::new(label, score, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_default_options() {
        let options = DetectionOptions::default();
        assert!((options.min_score - 0.4).abs() < f32::EPSILON);
        assert_eq!(options.max_results, 5);
    }

    #[test]
    fn test_apply_filters_sorts_and_truncates() {
        let options = DetectionOptions {
            min_score: 0.4,
            max_results: 2,
        };
        let out = options.apply(vec![
            det("a", 0.5),
            det("b", 0.3),
            det("c", 0.9),
            det("d", 0.7),
        ]);
        let labels: Vec<&str> = out.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["c", "d"]);
    }
}
