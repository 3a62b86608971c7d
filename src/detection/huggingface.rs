//! Object detection over the Hugging Face Inference API.

use super::{DetectionOptions, ObjectDetector};
use crate::engine::{EngineError, EngineResult, HfInferenceClient};
use crate::models::{BoundingBox, DetectedObject};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::io::Cursor;

/// DETR-style detector served by the Inference API.
pub struct HfObjectDetector {
    inference: HfInferenceClient,
    model: String,
}

impl HfObjectDetector {
    /// Default detection model.
    pub const DEFAULT_MODEL: &'static str = "facebook/detr-resnet-50";

    /// Creates a detector over an inference client.
    #[must_use]
    pub fn new(inference: HfInferenceClient) -> Self {
        Self {
            inference,
            model: Self::DEFAULT_MODEL.to_string(),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl ObjectDetector for HfObjectDetector {
    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Option<&str> {
        Some(self.inference.endpoint())
    }

    async fn detect(
        &self,
        image: &DynamicImage,
        options: &DetectionOptions,
    ) -> EngineResult<Vec<DetectedObject>> {
        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        let raw: Vec<RawDetection> = self
            .inference
            .post_image(&self.model, encoded.get_ref(), "image/png")
            .await?;
        Ok(options.apply(raw.into_iter().map(RawDetection::into_detected).collect()))
    }
}

/// One object-detection output.
#[derive(Debug, Deserialize)]
struct RawDetection {
    label: String,
    score: f32,
    #[serde(rename = "box")]
    bbox: CornerBox,
}

/// Corner-encoded box as returned by the API.
#[derive(Debug, Deserialize)]
struct CornerBox {
    xmin: f32,
    ymin: f32,
    xmax: f32,
    ymax: f32,
}

impl RawDetection {
    fn into_detected(self) -> DetectedObject {
        let b = self.bbox;
        DetectedObject::new(
            self.label,
            self.score,
            BoundingBox::new(b.xmin, b.ymin, (b.xmax - b.xmin).max(0.0), (b.ymax - b.ymin).max(0.0)),
        )
    }
}
