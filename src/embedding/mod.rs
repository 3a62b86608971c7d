//! Zero-shot image classification.
//!
//! The semantic verifier scores an image crop against free-text candidate
//! labels. Scores are normalized across the candidates; callers must not
//! assume any ordering of the returned list.

mod clip;

pub use clip::HfZeroShotClassifier;

use crate::engine::EngineResult;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Score for one candidate label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    /// Candidate label.
    pub label: String,
    /// Normalized similarity in `[0, 1]`.
    pub score: f32,
}

impl LabelScore {
    /// Creates a label score.
    #[must_use]
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Trait for zero-shot image classifiers.
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    /// Model identifier.
    fn model(&self) -> &str;

    /// Scores an image against candidate labels.
    ///
    /// The result contains a score for every candidate, in any order.
    ///
    /// # Errors
    ///
    /// Returns a classified [`crate::EngineError`] if the backend fails.
    async fn classify(
        &self,
        image: &DynamicImage,
        candidate_labels: &[String],
    ) -> EngineResult<Vec<LabelScore>>;
}

/// Returns the score of the first label matching `label` case-insensitively.
#[must_use]
pub fn score_for(scores: &[LabelScore], label: &str) -> Option<f32> {
    scores
        .iter()
        .find(|s| s.label.eq_ignore_ascii_case(label))
        .map(|s| s.score)
}
