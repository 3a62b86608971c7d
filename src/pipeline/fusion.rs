//! Confidence fusion.

use crate::config::PipelineConfig;
use crate::models::FusionDecision;

/// Weighted linear fusion of detection and similarity scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionPolicy {
    /// Weight of the raw detection score.
    pub detection_weight: f32,
    /// Weight of the similarity score.
    pub similarity_weight: f32,
    /// Inclusive lower bound of ACCEPT.
    pub accept_threshold: f32,
    /// Inclusive lower bound of UNCERTAIN.
    pub uncertain_threshold: f32,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl FusionPolicy {
    /// Builds the policy from pipeline settings.
    #[must_use]
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self {
            detection_weight: config.detection_weight,
            similarity_weight: config.similarity_weight,
            accept_threshold: config.accept_threshold,
            uncertain_threshold: config.uncertain_threshold,
        }
    }

    /// Fuses the two scores.
    #[must_use]
    pub fn fuse(&self, detection_score: f32, similarity_score: f32) -> f32 {
        self.detection_weight
            .mul_add(detection_score, self.similarity_weight * similarity_score)
    }

    /// Classifies a fused confidence.
    #[must_use]
    pub fn decide(&self, final_confidence: f32) -> FusionDecision {
        if final_confidence >= self.accept_threshold {
            FusionDecision::Accept
        } else if final_confidence >= self.uncertain_threshold {
            FusionDecision::Uncertain
        } else {
            FusionDecision::Reject
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_equal_weights_accept_boundary() {
        let policy = FusionPolicy::default();
        let fused = policy.fuse(0.8, 0.4);
        assert!((fused - 0.6).abs() < f32::EPSILON);
        assert_eq!(policy.decide(fused), FusionDecision::Accept);
    }

    #[test_case(0.60, FusionDecision::Accept ; "accept inclusive")]
    #[test_case(0.599, FusionDecision::Uncertain ; "just below accept")]
    #[test_case(0.45, FusionDecision::Uncertain ; "uncertain inclusive")]
    #[test_case(0.4499, FusionDecision::Reject ; "just below uncertain")]
    #[test_case(0.0, FusionDecision::Reject ; "zero")]
    fn test_decision_bands(confidence: f32, expected: FusionDecision) {
        assert_eq!(FusionPolicy::default().decide(confidence), expected);
    }

    #[test]
    fn test_custom_weights() {
        let policy = FusionPolicy {
            detection_weight: 0.7,
            similarity_weight: 0.3,
            ..FusionPolicy::default()
        };
        assert!((policy.fuse(1.0, 0.0) - 0.7).abs() < 1e-6);
    }
}
