//! Image and voice commands.

use super::factory::{build_pipeline, build_router};
use crate::config::VisionConfig;
use crate::models::{AnalysisResult, ImageInput, PipelineResult, TaskMode};
use crate::services::{Decision, DecisionEngine, VoiceResponse};
use crate::{Error, Result};
use serde::Serialize;
use std::path::Path;

/// Parses a task mode argument.
fn parse_mode(mode: &str) -> Result<TaskMode> {
    TaskMode::parse(mode).ok_or_else(|| Error::InvalidInput(format!("unknown mode: {mode}")))
}

/// Describes an image through the cascade.
///
/// # Errors
///
/// Returns an error if the image cannot be read or the mode is unknown.
pub async fn cmd_analyze(
    config: &VisionConfig,
    path: &Path,
    mode: &str,
    query: Option<&str>,
) -> Result<AnalysisResult> {
    let mode = parse_mode(mode)?;
    let image = ImageInput::from_path(path)?;
    let router = build_router(config).await?;
    Ok(router.analyze_image(&image, mode, query).await)
}

/// Output of the identify command.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyOutput {
    /// What to say about the frame.
    pub decision: Decision,
    /// Verified objects and the full decision trace.
    pub pipeline: PipelineResult,
}

/// Runs the object pipeline and the decision engine over an image.
///
/// # Errors
///
/// Returns an error if the image cannot be read or decoded, or the detector
/// fails.
pub async fn cmd_identify(
    config: &VisionConfig,
    path: &Path,
    target: Option<&str>,
) -> Result<IdentifyOutput> {
    let image = ImageInput::from_path(path)?;
    let pipeline = build_pipeline(config);
    let result = pipeline.process_input(&image, target).await?;
    let decision = DecisionEngine::new(config.safety.clone()).evaluate(&result, target);
    Ok(IdentifyOutput {
        decision,
        pipeline: result,
    })
}

/// Classifies a voice command.
///
/// # Errors
///
/// Returns an error if the mode is unknown.
pub async fn cmd_voice(config: &VisionConfig, transcript: &str, mode: &str) -> Result<VoiceResponse> {
    let mode = parse_mode(mode)?;
    let router = build_router(config).await?;
    Ok(router.process_voice_command(transcript, mode).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("find").unwrap(), TaskMode::Shopping);
        assert!(matches!(parse_mode("dance"), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_analyze_missing_file() {
        let result = cmd_analyze(
            &VisionConfig::default(),
            Path::new("/nonexistent/frame.jpg"),
            "scan",
            None,
        )
        .await;
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }
}
