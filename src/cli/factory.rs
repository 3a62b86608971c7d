//! Builds routers and pipelines from configuration.

use crate::config::VisionConfig;
use crate::detection::{HfObjectDetector, ObjectDetector};
use crate::embedding::{HfZeroShotClassifier, ZeroShotClassifier};
use crate::pipeline::ObjectPipeline;
use crate::services::VisionRouter;
use crate::Result;
use std::sync::Arc;

fn object_detector(config: &VisionConfig) -> Arc<dyn ObjectDetector> {
    let mut detector = HfObjectDetector::new(config.inference_client());
    if let Some(model) = &config.engines.detector_model {
        detector = detector.with_model(model.clone());
    }
    Arc::new(detector)
}

fn zero_shot_classifier(config: &VisionConfig) -> Arc<dyn ZeroShotClassifier> {
    let mut classifier = HfZeroShotClassifier::new(config.inference_client());
    if let Some(model) = &config.engines.classifier_model {
        classifier = classifier.with_model(model.clone());
    }
    Arc::new(classifier)
}

/// Builds and initializes the full engine cascade.
///
/// The local detector slot uses the configured object detection model.
///
/// # Errors
///
/// Returns an error if the engine set is invalid.
pub async fn build_router(config: &VisionConfig) -> Result<VisionRouter> {
    let mut router = VisionRouter::from_config(config, Some(object_detector(config)))?;
    let status = router.initialize(&config.credentials).await;
    tracing::debug!(available = ?status.available_engines(), "Cascade ready");
    Ok(router)
}

/// Builds the object pipeline over the configured detector and classifier.
#[must_use]
pub fn build_pipeline(config: &VisionConfig) -> ObjectPipeline {
    ObjectPipeline::new(
        object_detector(config),
        zero_shot_classifier(config),
        &config.pipeline,
    )
}
