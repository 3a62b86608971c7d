//! Zero-shot semantic verification.

use crate::embedding::{ZeroShotClassifier, score_for};
use crate::engine::EngineResult;
use image::DynamicImage;
use std::sync::Arc;

/// Scores a crop against its own label, the target label and distractors.
pub struct SemanticVerifier {
    classifier: Arc<dyn ZeroShotClassifier>,
    distractors: Vec<String>,
}

impl SemanticVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(classifier: Arc<dyn ZeroShotClassifier>, distractors: Vec<String>) -> Self {
        Self {
            classifier,
            distractors,
        }
    }

    /// Builds the candidate label set: own label, target if different, then distractors.
    #[must_use]
    pub fn candidate_labels(&self, label: &str, target: Option<&str>) -> Vec<String> {
        let mut candidates = vec![label.to_string()];
        if let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) {
            if !target.eq_ignore_ascii_case(label) {
                candidates.push(target.to_string());
            }
        }
        for distractor in &self.distractors {
            if !candidates.iter().any(|c| c.eq_ignore_ascii_case(distractor)) {
                candidates.push(distractor.clone());
            }
        }
        candidates
    }

    /// Returns the similarity score for a crop.
    ///
    /// The score is the higher of the own-label and target-label scores,
    /// or 0 if the classifier returned neither.
    ///
    /// # Errors
    ///
    /// Propagates classifier failures.
    pub async fn verify(
        &self,
        crop: &DynamicImage,
        label: &str,
        target: Option<&str>,
    ) -> EngineResult<f32> {
        let candidates = self.candidate_labels(label, target);
        let scores = self.classifier.classify(crop, &candidates).await?;

        let own = score_for(&scores, label);
        let wanted = target.and_then(|t| score_for(&scores, t.trim()));
        Ok(match (own, wanted) {
            (Some(a), Some(b)) => a.max(b),
            (Some(s), None) | (None, Some(s)) => s,
            (None, None) => 0.0,
        })
    }

    /// Model identifier of the underlying classifier.
    #[must_use]
    pub fn model(&self) -> &str {
        self.classifier.model()
    }
}
