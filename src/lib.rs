//! # Visualky
//!
//! Multi-engine vision cascade and verified object identification for
//! assistive camera applications.
//!
//! Two components form the core:
//!
//! - [`VisionRouter`] resolves "describe this image for task X" into exactly one
//!   [`AnalysisResult`], trying remote engines in a fixed priority order and
//!   falling back to a local heuristic that cannot fail.
//! - [`ObjectPipeline`] turns a frame into a confidence-ranked list of objects by
//!   fusing physical detection with zero-shot semantic verification.
//!
//! ## Example
//!
//! ```rust,ignore
//! use visualky::{ImageInput, TaskMode, VisionConfig, VisionRouter};
//!
//! let config = VisionConfig::load_default();
//! let mut router = VisionRouter::from_config(&config, None)?;
//! router.initialize(&config.credentials).await;
//!
//! let result = router
//!     .analyze_image(&ImageInput::from_bytes(frame), TaskMode::Surroundings, None)
//!     .await;
//! println!("{} ({})", result.response, result.engine);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod detection;
pub mod embedding;
pub mod engine;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod services;

// Re-exports for convenience
pub use config::VisionConfig;
pub use detection::ObjectDetector;
pub use embedding::ZeroShotClassifier;
pub use engine::{EngineError, VisionEngine};
pub use models::{
    AnalysisResult, BoundingBox, DetectedObject, EngineKind, EngineStatus, FusionDecision,
    ImageInput, PipelineObject, PipelineResult, TaskMode,
};
pub use pipeline::ObjectPipeline;
pub use services::{DecisionEngine, SafetyGate, VisionRouter, VoiceResponse};

/// Error type for visualky operations.
///
/// Engine failures inside the cascade never surface through this type; they are
/// recovered by the router. This type covers configuration, decoding and
/// capability failures outside the cascade.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Undecodable images, duplicate engines, bad config values |
/// | `OperationFailed` | I/O errors, config parsing, detector failures |
/// | `Engine` | A capability adapter failed outside the cascade |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Image bytes or base64 payloads cannot be decoded
    /// - Two engines with the same [`EngineKind`] are registered
    /// - A configuration value is out of range
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Configuration files cannot be read or parsed
    /// - The object detector fails during pipeline stage 1
    /// - Logging has already been initialized
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A capability adapter failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type alias for visualky operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// # Examples
///
/// ```rust
/// use visualky::current_timestamp_ms;
///
/// assert!(current_timestamp_ms() > 0);
/// ```
#[must_use]
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
