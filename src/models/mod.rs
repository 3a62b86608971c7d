//! Data models for visualky.
//!
//! This module contains the core data structures shared by the cascade router,
//! the engine adapters and the object identification pipeline.

mod analysis;
mod detection;
mod image;

pub use analysis::{AnalysisResult, EngineKind, EngineStatus, TaskMode, metadata_keys};
pub use detection::{BoundingBox, DetectedObject, FusionDecision, PipelineObject, PipelineResult};
pub use image::ImageInput;
