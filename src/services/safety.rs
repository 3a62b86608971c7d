//! Safety gate.
//!
//! Applies a stricter bar than the pipeline's own fusion bands: the pipeline
//! decides whether an object is reported, the gate decides whether a report
//! is safe to act on.

use crate::config::SafetyConfig;
use serde::Serialize;
use std::fmt;

/// Outcome of a safety evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyRating {
    /// Evidence clears the context threshold.
    Safe,
    /// Evidence is plausible but below the context threshold.
    Uncertain,
    /// Evidence contradicts the target or is too weak to mention.
    Refused,
}

impl SafetyRating {
    /// Returns the rating as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Uncertain => "UNCERTAIN",
            Self::Refused => "REFUSED",
        }
    }
}

impl fmt::Display for SafetyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of [`SafetyGate::evaluate_evidence`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateResult {
    /// Rating.
    pub rating: SafetyRating,
    /// Confidence that was evaluated.
    pub confidence: f32,
    /// Threshold applied to the target.
    pub threshold: f32,
    /// Why the evidence was not rated safe.
    pub reason: Option<String>,
}

/// Context-sensitive confidence gate.
#[derive(Debug, Clone, Default)]
pub struct SafetyGate {
    config: SafetyConfig,
}

impl SafetyGate {
    /// Creates a gate.
    #[must_use]
    pub const fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    /// Returns true if the target names a high-risk category.
    #[must_use]
    pub fn is_high_risk(&self, target: &str) -> bool {
        let target = target.to_lowercase();
        self.config
            .high_risk_terms
            .iter()
            .any(|term| target.contains(&term.to_lowercase()))
    }

    /// Returns the threshold that applies to the target.
    #[must_use]
    pub fn threshold_for(&self, target: &str) -> f32 {
        if self.is_high_risk(target) {
            self.config.high_risk_threshold
        } else {
            self.config.standard_threshold
        }
    }

    /// Rates evidence for a target.
    ///
    /// The observed label, when given, must match the target in the sense
    /// that one contains the other, ignoring case.
    #[must_use]
    pub fn evaluate_evidence(
        &self,
        target: &str,
        confidence: f32,
        observed_label: Option<&str>,
    ) -> GateResult {
        let threshold = self.threshold_for(target);
        let refuse = |reason: String| GateResult {
            rating: SafetyRating::Refused,
            confidence,
            threshold,
            reason: Some(reason),
        };

        if let Some(label) = observed_label {
            if !labels_match(target, label) {
                return refuse(format!("Observed '{label}' does not match '{target}'"));
            }
        }
        if confidence.is_nan() || confidence < self.config.refusal_floor {
            return refuse(format!(
                "Confidence {confidence:.2} is below refusal floor {:.2}",
                self.config.refusal_floor
            ));
        }
        if confidence < threshold {
            return GateResult {
                rating: SafetyRating::Uncertain,
                confidence,
                threshold,
                reason: Some(format!(
                    "Confidence {confidence:.2} is below threshold {threshold:.2}"
                )),
            };
        }

        GateResult {
            rating: SafetyRating::Safe,
            confidence,
            threshold,
            reason: None,
        }
    }
}

fn labels_match(target: &str, label: &str) -> bool {
    let target = target.trim().to_lowercase();
    let label = label.trim().to_lowercase();
    target.contains(&label) || label.contains(&target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn gate() -> SafetyGate {
        SafetyGate::new(SafetyConfig::default())
    }

    #[test_case("stairs", 0.84, SafetyRating::Uncertain ; "high risk below")]
    #[test_case("Stairs", 0.85, SafetyRating::Safe ; "high risk at threshold")]
    #[test_case("cup", 0.75, SafetyRating::Safe ; "standard at threshold")]
    #[test_case("cup", 0.74, SafetyRating::Uncertain ; "standard below")]
    #[test_case("cup", 0.2, SafetyRating::Refused ; "below refusal floor")]
    fn test_thresholds(target: &str, confidence: f32, expected: SafetyRating) {
        assert_eq!(gate().evaluate_evidence(target, confidence, None).rating, expected);
    }

    #[test]
    fn test_high_risk_substring() {
        let gate = gate();
        assert!(gate.is_high_risk("the front steps"));
        assert!(gate.is_high_risk("Traffic light"));
        assert!(!gate.is_high_risk("coffee mug"));
        assert!((gate.threshold_for("my pills") - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn test_label_mismatch_refused() {
        let result = gate().evaluate_evidence("keys", 0.95, Some("remote"));
        assert_eq!(result.rating, SafetyRating::Refused);
        assert!(result.reason.unwrap().contains("does not match"));
    }

    #[test]
    fn test_label_containment_matches() {
        let result = gate().evaluate_evidence("bottle", 0.9, Some("Water Bottle"));
        assert_eq!(result.rating, SafetyRating::Safe);
        assert_eq!(result.reason, None);
    }
}
