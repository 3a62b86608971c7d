//! Object identification pipeline.
//!
//! Five stages run in order for every frame:
//!
//! 1. Physical detection, bounded by a score floor and a result cap
//! 2. Spatial sanity: boxes under the minimum share of the frame are dropped
//! 3. Region cropping: padded, clamped, resized to a square
//! 4. Semantic verification by a zero-shot classifier
//! 5. Confidence fusion into ACCEPT, UNCERTAIN or REJECT
//!
//! Accepted and uncertain objects are returned, highest fused confidence
//! first. Each call is independent; nothing is carried between frames.

mod cropper;
mod fusion;
mod spatial;
mod verifier;

pub use cropper::RegionCropper;
pub use fusion::FusionPolicy;
pub use spatial::SpatialValidator;
pub use verifier::SemanticVerifier;

use crate::config::PipelineConfig;
use crate::detection::{DetectionOptions, ObjectDetector};
use crate::embedding::ZeroShotClassifier;
use crate::models::{FusionDecision, ImageInput, PipelineObject, PipelineResult};
use crate::{Error, Result, current_timestamp_ms};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Detection-plus-verification pipeline.
pub struct ObjectPipeline {
    detector: Arc<dyn ObjectDetector>,
    verifier: SemanticVerifier,
    options: DetectionOptions,
    spatial: SpatialValidator,
    cropper: RegionCropper,
    fusion: FusionPolicy,
}

impl ObjectPipeline {
    /// Creates a pipeline over a detector and a zero-shot classifier.
    #[must_use]
    pub fn new(
        detector: Arc<dyn ObjectDetector>,
        classifier: Arc<dyn ZeroShotClassifier>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            detector,
            verifier: SemanticVerifier::new(classifier, config.distractor_labels.clone()),
            options: config.detection,
            spatial: SpatialValidator::new(config.min_area_ratio),
            cropper: RegionCropper::new(config.crop_padding, config.crop_size),
            fusion: FusionPolicy::from_config(config),
        }
    }

    /// Decodes an encoded frame and processes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the frame cannot be decoded, or any
    /// error from [`Self::process`].
    pub async fn process_input(
        &self,
        input: &ImageInput,
        target: Option<&str>,
    ) -> Result<PipelineResult> {
        let image = input.decode()?;
        self.process(&image, target).await
    }

    /// Runs all five stages over a frame.
    ///
    /// An empty result is a normal outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the detector fails. Verifier
    /// failures are recorded per object and scored as zero similarity.
    pub async fn process(&self, image: &DynamicImage, target: Option<&str>) -> Result<PipelineResult> {
        let target = target.map(str::trim).filter(|t| !t.is_empty());
        let span = tracing::info_span!(
            "pipeline.process",
            detector = %self.detector.model(),
            target = target.unwrap_or(""),
            detected = tracing::field::Empty,
            kept = tracing::field::Empty,
        );
        self.run(image, target).instrument(span).await
    }

    async fn run(&self, image: &DynamicImage, target: Option<&str>) -> Result<PipelineResult> {
        let start = Instant::now();
        let (width, height) = (image.width(), image.height());

        let mut detections = self
            .detector
            .detect(image, &self.options)
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "detect".to_string(),
                cause: e.to_string(),
            })?;
        detections.retain(|d| d.score >= self.options.min_score);
        detections.truncate(self.options.max_results);
        tracing::Span::current().record("detected", detections.len());

        let mut trace = Vec::with_capacity(detections.len());
        for detection in detections {
            let mut object = PipelineObject::new(detection);
            self.evaluate(&mut object, image, target).await;
            trace.push(object);
        }

        let mut objects: Vec<PipelineObject> = trace
            .iter()
            .filter(|o| o.decision.is_some_and(|d| d.is_retained()))
            .cloned()
            .collect();
        objects.sort_by(|a, b| {
            let a = a.final_confidence.unwrap_or(0.0);
            let b = b.final_confidence.unwrap_or(0.0);
            b.total_cmp(&a)
        });

        tracing::Span::current().record("kept", objects.len());
        tracing::debug!(
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Pipeline complete"
        );

        Ok(PipelineResult {
            objects,
            timestamp: current_timestamp_ms(),
            image_width: width,
            image_height: height,
            decision_trace: trace,
        })
    }

    /// Runs stages 2 to 5 for one object, annotating it in place.
    async fn evaluate(&self, object: &mut PipelineObject, image: &DynamicImage, target: Option<&str>) {
        let (width, height) = (image.width(), image.height());

        let ratio = SpatialValidator::area_ratio(object.bbox(), width, height);
        if !self.spatial.is_plausible(object.bbox(), width, height) {
            object.note(format!(
                "Spatial: area ratio {ratio:.3} below {:.3}, dropped",
                self.spatial.min_area_ratio()
            ));
            reject(object);
            return;
        }
        object.note(format!("Spatial: area ratio {ratio:.3} ok"));

        let Some(crop) = self.cropper.crop(image, object.bbox()) else {
            object.note("Crop: region outside frame, dropped");
            reject(object);
            return;
        };

        let label = object.label().to_string();
        let similarity = match self.verifier.verify(&crop, &label, target).await {
            Ok(score) => {
                object.note(format!("Verification: similarity {score:.2}"));
                score
            },
            Err(e) => {
                tracing::warn!(label = %label, error = %e, "Semantic verification failed");
                object.note(format!("Verification failed ({}), similarity 0.00", e.class()));
                0.0
            },
        };
        object.similarity_score = Some(similarity);

        let fused = self.fusion.fuse(object.detection_score(), similarity);
        let decision = self.fusion.decide(fused);
        object.final_confidence = Some(fused);
        object.decision = Some(decision);
        object.note(format!("Fusion: final {fused:.2}, {decision}"));
        metrics::counter!("pipeline_objects_total", "decision" => decision.as_str()).increment(1);
    }
}

fn reject(object: &mut PipelineObject) {
    object.decision = Some(FusionDecision::Reject);
    metrics::counter!("pipeline_objects_total", "decision" => FusionDecision::Reject.as_str())
        .increment(1);
}
