//! Detection and pipeline types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl BoundingBox {
    /// Creates a bounding box.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the box area in square pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        f64::from(self.width.max(0.0)) * f64::from(self.height.max(0.0))
    }

    /// Returns the horizontal center.
    #[must_use]
    pub fn center_x(&self) -> f32 {
        self.width.mul_add(0.5, self.x)
    }

    /// Returns the box grown by `ratio` of its size on each side.
    ///
    /// The result is not clamped to any image bounds.
    #[must_use]
    pub fn padded(&self, ratio: f32) -> Self {
        let pad_w = self.width * ratio;
        let pad_h = self.height * ratio;
        Self {
            x: self.x - pad_w,
            y: self.y - pad_h,
            width: pad_w.mul_add(2.0, self.width),
            height: pad_h.mul_add(2.0, self.height),
        }
    }

    /// Clamps the box to an image of the given size.
    ///
    /// Returns `None` if nothing of the box lies inside the image.
    #[must_use]
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<Self> {
        #[allow(clippy::cast_precision_loss)]
        let (max_w, max_h) = (image_width as f32, image_height as f32);
        let x = self.x.max(0.0);
        let y = self.y.max(0.0);
        let right = (self.x + self.width).min(max_w);
        let bottom = (self.y + self.height).min(max_h);
        if right <= x || bottom <= y {
            return None;
        }
        Some(Self::new(x, y, right - x, bottom - y))
    }
}

/// A raw detection produced by an [`crate::ObjectDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Class label.
    pub label: String,
    /// Raw detector score.
    pub score: f32,
    /// Bounding box in pixel space.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl DetectedObject {
    /// Creates a detection.
    #[must_use]
    pub fn new(label: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }
}

/// Fusion outcome for a pipeline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FusionDecision {
    /// Confidently identified.
    Accept,
    /// Reported, but flagged as low confidence.
    Uncertain,
    /// Dropped from the output.
    Reject,
}

impl FusionDecision {
    /// Returns the decision as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Uncertain => "UNCERTAIN",
            Self::Reject => "REJECT",
        }
    }

    /// Returns true if objects with this decision appear in pipeline output.
    #[must_use]
    pub const fn is_retained(&self) -> bool {
        matches!(self, Self::Accept | Self::Uncertain)
    }
}

impl fmt::Display for FusionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detection annotated as it moves through the pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineObject {
    /// The raw detection.
    #[serde(flatten)]
    pub detection: DetectedObject,
    /// Zero-shot similarity score, once verified.
    pub similarity_score: Option<f32>,
    /// Fused confidence, once fused.
    pub final_confidence: Option<f32>,
    /// Fusion decision, once fused.
    pub decision: Option<FusionDecision>,
    /// Ordered notes from every stage the object passed through.
    pub decision_trace: Vec<String>,
}

impl PipelineObject {
    /// Wraps a raw detection.
    #[must_use]
    pub fn new(detection: DetectedObject) -> Self {
        let decision_trace = vec![format!("Detection: raw score {:.2}", detection.score)];
        Self {
            detection,
            similarity_score: None,
            final_confidence: None,
            decision: None,
            decision_trace,
        }
    }

    /// Returns the detected label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.detection.label
    }

    /// Returns the raw detection score.
    #[must_use]
    pub const fn detection_score(&self) -> f32 {
        self.detection.score
    }

    /// Returns the bounding box.
    #[must_use]
    pub const fn bbox(&self) -> &BoundingBox {
        &self.detection.bbox
    }

    /// Appends a note to the decision trace.
    pub fn note(&mut self, entry: impl Into<String>) {
        self.decision_trace.push(entry.into());
    }

    /// Returns true if the object was kept with low confidence.
    #[must_use]
    pub fn is_uncertain(&self) -> bool {
        self.decision == Some(FusionDecision::Uncertain)
    }
}

/// Output of one [`crate::ObjectPipeline::process`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Accepted and uncertain objects, highest final confidence first.
    pub objects: Vec<PipelineObject>,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    /// Width of the processed frame.
    pub image_width: u32,
    /// Height of the processed frame.
    pub image_height: u32,
    /// Every candidate, including dropped ones, in detection order.
    pub decision_trace: Vec<PipelineObject>,
}

impl PipelineResult {
    /// Returns true if no object survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the confidently identified objects.
    pub fn accepted(&self) -> impl Iterator<Item = &PipelineObject> {
        self.objects
            .iter()
            .filter(|o| o.decision == Some(FusionDecision::Accept))
    }

    /// Returns the objects kept with low confidence.
    pub fn uncertain(&self) -> impl Iterator<Item = &PipelineObject> {
        self.objects.iter().filter(|o| o.is_uncertain())
    }
}
