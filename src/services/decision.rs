//! Turns pipeline output into one spoken answer.

use super::safety::{GateResult, SafetyGate, SafetyRating};
use crate::config::SafetyConfig;
use crate::engine::image_stats::HorizontalPosition;
use crate::models::{PipelineObject, PipelineResult};
use serde::Serialize;

/// Whether the system answers or declines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    /// Speak the message as an answer.
    Answer,
    /// Decline to identify anything.
    Refuse,
}

/// Risk of acting on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Backed by strong evidence.
    Low,
    /// Backed only by weak evidence.
    Medium,
}

/// Final decision for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Answer or refusal.
    pub kind: DecisionKind,
    /// Confidence in the decision: 0.9 with strong evidence, 0.4 otherwise.
    pub confidence: f32,
    /// Risk level.
    pub risk: RiskLevel,
    /// Message to speak.
    pub message: String,
    /// Safety rating of a found target.
    pub gate: Option<GateResult>,
    /// How the decision was reached.
    pub reasoning: Vec<String>,
}

/// Aggregates verified objects into a decision.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    gate: SafetyGate,
    strong_evidence: f32,
    weak_evidence: f32,
}

impl DecisionEngine {
    const STRONG_CONFIDENCE: f32 = 0.9;
    const WEAK_CONFIDENCE: f32 = 0.4;

    /// Creates an engine from safety settings.
    #[must_use]
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            strong_evidence: config.strong_evidence,
            weak_evidence: config.refusal_floor,
            gate: SafetyGate::new(config),
        }
    }

    /// Returns the safety gate used for found targets.
    #[must_use]
    pub const fn gate(&self) -> &SafetyGate {
        &self.gate
    }

    /// Decides what to say about a processed frame.
    ///
    /// Objects above the strong-evidence bar are used when any exist;
    /// otherwise anything above the refusal floor is used.
    #[must_use]
    pub fn evaluate(&self, result: &PipelineResult, target: Option<&str>) -> Decision {
        let strong = evidence_above(&result.objects, self.strong_evidence);
        let usable = if strong.is_empty() {
            evidence_above(&result.objects, self.weak_evidence)
        } else {
            strong.clone()
        };
        let has_strong = !strong.is_empty();
        let mut reasoning = vec![
            format!("Found {} items", usable.len()),
            format!("Strong: {}", strong.len()),
        ];

        let (kind, message, gate) = if usable.is_empty() {
            (
                DecisionKind::Refuse,
                "I see a dark or blurry scene. I cannot identify objects.".to_string(),
                None,
            )
        } else if let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) {
            let (message, gate) = self.find_target(&usable, target, result.image_width);
            if let Some(gate) = &gate {
                reasoning.push(format!("Safety: {}", gate.rating));
                if let Some(reason) = &gate.reason {
                    reasoning.push(reason.clone());
                }
            }
            (DecisionKind::Answer, message, gate)
        } else {
            (DecisionKind::Answer, describe(&usable), None)
        };

        Decision {
            kind,
            confidence: if has_strong {
                Self::STRONG_CONFIDENCE
            } else {
                Self::WEAK_CONFIDENCE
            },
            risk: if has_strong {
                RiskLevel::Low
            } else {
                RiskLevel::Medium
            },
            message,
            gate,
            reasoning,
        }
    }

    fn find_target(
        &self,
        usable: &[&PipelineObject],
        target: &str,
        image_width: u32,
    ) -> (String, Option<GateResult>) {
        let needle = target.to_lowercase();
        let Some(hit) = usable
            .iter()
            .find(|o| o.label().to_lowercase().contains(&needle))
        else {
            let seen = usable.first().map_or("", |o| o.label());
            return (format!("I don't see {needle}, but I do see a {seen}."), None);
        };

        let position = HorizontalPosition::of(hit.bbox(), image_width);
        let found = format!("I found the {}. It is {}.", hit.label(), position.phrase());
        let gate = self.gate.evaluate_evidence(
            target,
            hit.final_confidence.unwrap_or(0.0),
            Some(hit.label()),
        );
        let message = match gate.rating {
            SafetyRating::Safe => found,
            SafetyRating::Uncertain => format!(
                "I might see the {}, {}, but I'm not certain. Please check before relying on it.",
                hit.label(),
                position.phrase()
            ),
            SafetyRating::Refused => {
                format!("I can't confirm the {target}. Please move closer or improve the lighting.")
            },
        };
        (message, Some(gate))
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}

fn evidence_above(objects: &[PipelineObject], floor: f32) -> Vec<&PipelineObject> {
    objects
        .iter()
        .filter(|o| o.final_confidence.is_some_and(|c| c > floor))
        .collect()
}

fn describe(usable: &[&PipelineObject]) -> String {
    let mut labels: Vec<&str> = Vec::with_capacity(usable.len());
    for object in usable {
        if !labels.contains(&object.label()) {
            labels.push(object.label());
        }
    }
    match labels.split_last() {
        Some((only, [])) => format!("I see a {only}."),
        Some((last, rest)) => format!("I see {} and {last}.", rest.join(", ")),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, DetectedObject, FusionDecision};

    fn object(label: &str, x: f32, confidence: f32) -> PipelineObject {
        let mut object = PipelineObject::new(DetectedObject::new(
            label,
            confidence,
            BoundingBox::new(x, 100.0, 100.0, 100.0),
        ));
        object.final_confidence = Some(confidence);
        object.decision = Some(if confidence >= 0.6 {
            FusionDecision::Accept
        } else {
            FusionDecision::Uncertain
        });
        object
    }

    fn result(objects: Vec<PipelineObject>) -> PipelineResult {
        PipelineResult {
            objects,
            timestamp: 0,
            image_width: 900,
            image_height: 600,
            decision_trace: Vec::new(),
        }
    }

    #[test]
    fn test_empty_frame_is_refused() {
        let decision = DecisionEngine::default().evaluate(&result(Vec::new()), None);
        assert_eq!(decision.kind, DecisionKind::Refuse);
        assert_eq!(
            decision.message,
            "I see a dark or blurry scene. I cannot identify objects."
        );
        assert_eq!(decision.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_describe_dedupes_labels() {
        let engine = DecisionEngine::new(SafetyConfig::default());
        let decision = engine.evaluate(
            &result(vec![
                object("cup", 10.0, 0.9),
                object("cup", 400.0, 0.8),
                object("book", 700.0, 0.7),
                object("phone", 300.0, 0.65),
            ]),
            None,
        );
        assert_eq!(decision.message, "I see cup, book and phone.");
        assert!((decision.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(decision.risk, RiskLevel::Low);
    }

    #[test]
    fn test_weak_evidence_used_when_no_strong() {
        let engine = DecisionEngine::new(SafetyConfig::default());
        let decision = engine.evaluate(&result(vec![object("chair", 10.0, 0.46)]), None);
        assert_eq!(decision.message, "I see a chair.");
        assert!((decision.confidence - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_found_target_with_position() {
        let engine = DecisionEngine::new(SafetyConfig::default());
        let decision = engine.evaluate(&result(vec![object("bottle", 700.0, 0.9)]), Some("Bottle"));
        assert_eq!(decision.message, "I found the bottle. It is on the right.");
        assert_eq!(decision.gate.unwrap().rating, SafetyRating::Safe);
    }

    #[test]
    fn test_high_risk_target_is_hedged() {
        let engine = DecisionEngine::new(SafetyConfig::default());
        let decision = engine.evaluate(&result(vec![object("stairs", 400.0, 0.8)]), Some("stairs"));
        assert_eq!(decision.gate.as_ref().unwrap().rating, SafetyRating::Uncertain);
        assert!(decision.message.contains("not certain"));
        assert!(decision.message.contains("in the center"));
    }

    #[test]
    fn test_missing_target_names_what_is_seen() {
        let engine = DecisionEngine::new(SafetyConfig::default());
        let decision = engine.evaluate(&result(vec![object("remote", 10.0, 0.8)]), Some("Keys"));
        assert_eq!(decision.message, "I don't see keys, but I do see a remote.");
        assert!(decision.gate.is_none());
    }
}
