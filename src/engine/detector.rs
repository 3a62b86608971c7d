//! Local object-detector engine.

use super::image_stats::{HorizontalPosition, Proximity, region_colors};
use super::{EngineError, EngineReply, EngineResult, VisionEngine, VisionPrompt};
use crate::detection::{DetectionOptions, ObjectDetector};
use crate::models::{DetectedObject, EngineKind, ImageInput, TaskMode};
use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt::Write as _;
use std::sync::Arc;

/// Cascade slot backed by an [`ObjectDetector`].
///
/// Turns detections into a sentence naming each object with its colors and
/// position. The reported confidence is the top detection score.
pub struct LocalDetectorEngine {
    detector: Arc<dyn ObjectDetector>,
    options: DetectionOptions,
}

impl LocalDetectorEngine {
    /// Detection floor used when describing whole scenes.
    pub const DEFAULT_MIN_SCORE: f32 = 0.3;

    /// Creates an engine over a detector.
    #[must_use]
    pub fn new(detector: Arc<dyn ObjectDetector>) -> Self {
        Self {
            detector,
            options: DetectionOptions {
                min_score: Self::DEFAULT_MIN_SCORE,
                ..DetectionOptions::default()
            },
        }
    }

    /// Sets detection bounds.
    #[must_use]
    pub const fn with_options(mut self, options: DetectionOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl VisionEngine for LocalDetectorEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::LocalDetector
    }

    fn model(&self) -> &str {
        self.detector.model()
    }

    fn endpoint(&self) -> Option<&str> {
        self.detector.endpoint()
    }

    async fn initialize(&mut self, _credential: Option<&SecretString>) -> bool {
        true
    }

    async fn analyze(
        &self,
        image: &ImageInput,
        prompt: &VisionPrompt,
    ) -> EngineResult<EngineReply> {
        let decoded = image
            .decode()
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        let detections = self.detector.detect(&decoded, &self.options).await?;
        let Some(top) = detections.first() else {
            return Err(EngineError::Empty("no objects detected".to_string()));
        };
        let confidence = top.score;

        let described: Vec<Described<'_>> = detections
            .iter()
            .map(|d| Described {
                object: d,
                colors: region_colors(&decoded, &d.bbox),
                position: HorizontalPosition::of(&d.bbox, decoded.width()),
                proximity: Proximity::of(&d.bbox, decoded.width()),
            })
            .collect();

        Ok(
            EngineReply::new(describe(&described, prompt), confidence, self.detector.model())
                .with_detected_objects(detections.len()),
        )
    }
}

struct Described<'a> {
    object: &'a DetectedObject,
    colors: Vec<&'static str>,
    position: HorizontalPosition,
    proximity: Proximity,
}

impl Described<'_> {
    fn color_phrase(&self) -> String {
        if self.colors.is_empty() {
            "multicolored".to_string()
        } else {
            self.colors.join(" and ")
        }
    }
}

fn describe(objects: &[Described<'_>], prompt: &VisionPrompt) -> String {
    let Some(primary) = objects.first() else {
        return String::new();
    };

    match prompt.mode {
        TaskMode::Scan => {
            let mut text = format!(
                "I can see a {} {} {}, {}.",
                primary.color_phrase(),
                primary.object.label,
                primary.position.phrase(),
                primary.proximity.phrase()
            );
            if objects.len() > 1 {
                let others: Vec<&str> = objects[1..]
                    .iter()
                    .take(2)
                    .map(|o| o.object.label.as_str())
                    .collect();
                let _ = write!(text, " Also visible: {}.", others.join(", "));
            }
            let _ = write!(
                text,
                " Confidence: {:.0}%.",
                f64::from(primary.object.score) * 100.0
            );
            text
        },
        TaskMode::Shopping => {
            let target = prompt.query_or_empty().to_lowercase();
            let found = (!target.is_empty())
                .then(|| {
                    objects
                        .iter()
                        .find(|o| o.object.label.to_lowercase().contains(&target))
                })
                .flatten();
            match found {
                Some(hit) => format!(
                    "FOUND: {} with {} colors, {}, {}. Reach forward to grab it.",
                    hit.object.label,
                    hit.color_phrase(),
                    hit.position.phrase(),
                    hit.proximity.phrase()
                ),
                None => {
                    let visible: Vec<String> = objects
                        .iter()
                        .map(|o| {
                            format!("{} {} {}", o.color_phrase(), o.object.label, o.position.phrase())
                        })
                        .collect();
                    let target = if target.is_empty() {
                        "your item".to_string()
                    } else {
                        target
                    };
                    format!(
                        "Searching for {target}... Currently visible: {}. Keep panning the camera.",
                        visible.join(", ")
                    )
                },
            }
        },
        TaskMode::Surroundings => {
            let parts: Vec<String> = objects
                .iter()
                .map(|o| {
                    format!(
                        "a {} {} {}, {}",
                        o.color_phrase(),
                        o.object.label,
                        o.position.phrase(),
                        o.proximity.phrase()
                    )
                })
                .collect();
            format!(
                "In your surroundings: {}. Total {} objects detected.",
                parts.join("; "),
                objects.len()
            )
        },
        TaskMode::Learning | TaskMode::Conversation | TaskMode::Standby => format!(
            "I can see a {} {} {}, {}.",
            primary.color_phrase(),
            primary.object.label,
            primary.position.phrase(),
            primary.proximity.phrase()
        ),
    }
}
