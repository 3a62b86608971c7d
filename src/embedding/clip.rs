//! CLIP zero-shot classification over the Hugging Face Inference API.

use super::{LabelScore, ZeroShotClassifier};
use crate::engine::{EngineError, EngineResult, HfInferenceClient};
use crate::models::ImageInput;
use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;

/// CLIP classifier served by the Inference API.
pub struct HfZeroShotClassifier {
    inference: HfInferenceClient,
    model: String,
}

impl HfZeroShotClassifier {
    /// Default zero-shot model.
    pub const DEFAULT_MODEL: &'static str = "openai/clip-vit-base-patch32";

    /// Creates a classifier over an inference client.
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
impl ZeroShotClassifier for HfZeroShotClassifier {
    fn model(&self) -> &str {
        &self.model
    }

    async fn classify(
        &self,
        image: &DynamicImage,
        candidate_labels: &[String],
    ) -> EngineResult<Vec<LabelScore>> {
        let encoded =
            ImageInput::from_image(image).map_err(|e| EngineError::Malformed(e.to_string()))?;
        let request = ZeroShotRequest {
            inputs: encoded.to_base64(),
            parameters: ZeroShotParameters {
                candidate_labels: candidate_labels.to_vec(),
            },
        };
        let scores: Vec<LabelScore> = self.inference.post_json(&self.model, &request).await?;
        if scores.is_empty() {
            return Err(EngineError::Empty("classifier returned no scores".to_string()));
        }
        Ok(scores)
    }
}

#[derive(Debug, Serialize)]
struct ZeroShotRequest {
    inputs: String,
    parameters: ZeroShotParameters,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters {
    candidate_labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ZeroShotRequest {
            inputs: "AAAA".to_string(),
            parameters: ZeroShotParameters {
                candidate_labels: vec!["cup".to_string(), "noise".to_string()],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["inputs"], "AAAA");
        assert_eq!(json["parameters"]["candidate_labels"][1], "noise");
    }

    #[test]
    fn test_response_parses_into_label_scores() {
        let scores: Vec<LabelScore> =
            serde_json::from_str(r#"[{"score":0.91,"label":"cup"},{"score":0.09,"label":"noise"}]"#)
                .unwrap();
        assert_eq!(scores[0], LabelScore::new("cup", 0.91));
    }

    #[test]
    fn test_default_model() {
        let classifier = HfZeroShotClassifier::new(HfInferenceClient::new());
        assert_eq!(classifier.model(), HfZeroShotClassifier::DEFAULT_MODEL);
    }
}
