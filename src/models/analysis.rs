//! Cascade result types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Task mode the user is in when a frame is analyzed.
///
/// Each mode selects a prompt template and a fixed fallback description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Identify a single product held up to the camera.
    Scan,
    /// Search for a named product on shelves.
    Shopping,
    /// Describe the environment with spatial layout.
    Surroundings,
    /// Capture a visual profile of an item to remember.
    Learning,
    /// Answer a free-form question about the frame.
    Conversation,
    /// Idle; give a general overview.
    #[default]
    Standby,
}

impl TaskMode {
    /// Returns all task modes.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Scan,
            Self::Shopping,
            Self::Surroundings,
            Self::Learning,
            Self::Conversation,
            Self::Standby,
        ]
    }

    /// Returns the mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Shopping => "shopping",
            Self::Surroundings => "surroundings",
            Self::Learning => "learning",
            Self::Conversation => "conversation",
            Self::Standby => "standby",
        }
    }

    /// Parses a mode from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "scan" => Some(Self::Scan),
            "shopping" | "find" => Some(Self::Shopping),
            "surroundings" => Some(Self::Surroundings),
            "learning" | "learn" => Some(Self::Learning),
            "conversation" | "chat" => Some(Self::Conversation),
            "standby" | "general" => Some(Self::Standby),
            _ => None,
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifier of a vision engine.
///
/// Declaration order is the cascade priority order: `Ord` sorts the
/// highest-quality engine first and the always-available heuristic last.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum EngineKind {
    /// Primary cloud engine (Gemini).
    #[serde(rename = "gemini")]
    Gemini,
    /// Secondary free-tier engine (Hugging Face Inference API).
    #[serde(rename = "huggingface")]
    HuggingFace,
    /// Tertiary free-tier engine (OpenRouter or another compatible provider).
    #[serde(rename = "openrouter")]
    OpenRouter,
    /// Local object detector.
    #[serde(rename = "local_detector")]
    LocalDetector,
    /// Local image-statistics heuristic. Never fails.
    #[serde(rename = "local_heuristic")]
    LocalHeuristic,
}

impl EngineKind {
    /// Returns all engine kinds in priority order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Gemini,
            Self::HuggingFace,
            Self::OpenRouter,
            Self::LocalDetector,
            Self::LocalHeuristic,
        ]
    }

    /// Returns the engine identifier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::HuggingFace => "huggingface",
            Self::OpenRouter => "openrouter",
            Self::LocalDetector => "local_detector",
            Self::LocalHeuristic => "local_heuristic",
        }
    }

    /// Returns true for slots configured with their own credential.
    ///
    /// The detector slot borrows whatever its detector needs, so it has none.
    #[must_use]
    pub const fn takes_credential(&self) -> bool {
        matches!(self, Self::Gemini | Self::HuggingFace | Self::OpenRouter)
    }

    /// Parses an engine kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "huggingface" | "hugging_face" | "hf" => Some(Self::HuggingFace),
            "openrouter" | "open_router" => Some(Self::OpenRouter),
            "local_detector" | "detector" | "tensorflow" => Some(Self::LocalDetector),
            "local_heuristic" | "heuristic" | "local" => Some(Self::LocalHeuristic),
            _ => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known keys of [`AnalysisResult::metadata`].
pub mod metadata_keys {
    /// Model name reported by the engine.
    pub const MODEL: &str = "model";
    /// Wall-clock time of the whole cascade call in milliseconds.
    pub const PROCESSING_TIME_MS: &str = "processing_time_ms";
    /// Why higher-priority engines were not used.
    pub const FALLBACK_REASON: &str = "fallback_reason";
    /// Ordered list of `engine: outcome` strings for every attempted engine.
    pub const ATTEMPTS: &str = "attempts";
    /// Number of objects the local detector reported.
    pub const DETECTED_OBJECTS: &str = "detected_objects";
}

/// Result of a cascade analysis.
///
/// Always produced by [`crate::VisionRouter::analyze_image`], even when every
/// remote engine fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Natural-language answer.
    pub response: String,
    /// Engine-reported confidence in `[0, 1]`.
    pub confidence: f32,
    /// Engine that produced the answer.
    pub engine: EngineKind,
    /// Task mode the answer was produced for.
    pub mode: TaskMode,
    /// Open key-value metadata; see [`metadata_keys`].
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AnalysisResult {
    /// Creates a result with empty metadata. Confidence is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(
        response: impl Into<String>,
        confidence: f32,
        engine: EngineKind,
        mode: TaskMode,
    ) -> Self {
        Self {
            response: response.into(),
            confidence: clamp_unit(confidence),
            engine,
            mode,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns a string metadata entry.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns the recorded fallback reason, if any engine was skipped.
    #[must_use]
    pub fn fallback_reason(&self) -> Option<&str> {
        self.metadata_str(metadata_keys::FALLBACK_REASON)
    }

    /// Returns true if the answer came from the local heuristic.
    #[must_use]
    pub fn is_last_resort(&self) -> bool {
        self.engine == EngineKind::LocalHeuristic
    }
}

/// Clamps a score to `[0, 1]`, mapping NaN to 0.
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Availability snapshot of every engine.
///
/// Recomputed when engines are initialized and when an engine is marked
/// unavailable after an auth or quota failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineStatus {
    available: BTreeMap<EngineKind, bool>,
}

impl EngineStatus {
    /// Creates the pre-initialization status: only the built-in heuristic is available.
    #[must_use]
    pub fn new() -> Self {
        let available = EngineKind::all()
            .iter()
            .map(|kind| (*kind, *kind == EngineKind::LocalHeuristic))
            .collect();
        Self { available }
    }

    /// Returns true if the engine may be attempted.
    #[must_use]
    pub fn is_available(&self, kind: EngineKind) -> bool {
        self.available.get(&kind).copied().unwrap_or(false)
    }

    /// Sets the availability of an engine.
    pub fn set(&mut self, kind: EngineKind, available: bool) {
        self.available.insert(kind, available);
    }

    /// Returns the available engines in priority order.
    #[must_use]
    pub fn available_engines(&self) -> Vec<EngineKind> {
        self.available
            .iter()
            .filter_map(|(kind, available)| available.then_some(*kind))
            .collect()
    }

    /// Iterates over `(engine, available)` pairs in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (EngineKind, bool)> + '_ {
        self.available.iter().map(|(kind, available)| (*kind, *available))
    }
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_priority_order() {
        let mut kinds = vec![
            EngineKind::LocalHeuristic,
            EngineKind::OpenRouter,
            EngineKind::Gemini,
            EngineKind::LocalDetector,
            EngineKind::HuggingFace,
        ];
        kinds.sort();
        assert_eq!(kinds, EngineKind::all());
    }

    #[test]
    fn test_task_mode_parse() {
        assert_eq!(TaskMode::parse("SCAN"), Some(TaskMode::Scan));
        assert_eq!(TaskMode::parse(" shopping "), Some(TaskMode::Shopping));
        assert_eq!(TaskMode::parse("general"), Some(TaskMode::Standby));
        assert_eq!(TaskMode::parse("dance"), None);
        for mode in TaskMode::all() {
            assert_eq!(TaskMode::parse(mode.as_str()), Some(*mode));
        }
    }

    #[test]
    fn test_engine_kind_parse_roundtrip() {
        for kind in EngineKind::all() {
            assert_eq!(EngineKind::parse(kind.as_str()), Some(*kind));
        }
        assert_eq!(EngineKind::parse("hf"), Some(EngineKind::HuggingFace));
    }

    #[test]
    fn test_analysis_result_clamps_confidence() {
        let result = AnalysisResult::new("x", 1.7, EngineKind::Gemini, TaskMode::Scan);
        assert!((result.confidence - 1.0).abs() < f32::EPSILON);
        let result = AnalysisResult::new("x", f32::NAN, EngineKind::Gemini, TaskMode::Scan);
        assert!(result.confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn test_metadata_accessors() {
        let result = AnalysisResult::new("x", 0.5, EngineKind::LocalHeuristic, TaskMode::Scan)
            .with_metadata(metadata_keys::FALLBACK_REASON, "all remote engines failed");
        assert_eq!(result.fallback_reason(), Some("all remote engines failed"));
        assert!(result.is_last_resort());
    }

    #[test]
    fn test_engine_status_defaults() {
        let status = EngineStatus::new();
        assert!(!status.is_available(EngineKind::Gemini));
        assert!(status.is_available(EngineKind::LocalHeuristic));
        assert!(!status.is_available(EngineKind::LocalDetector));
        assert_eq!(status.available_engines(), vec![EngineKind::LocalHeuristic]);
    }

    #[test]
    fn test_engine_status_serializes_as_map() {
        let mut status = EngineStatus::new();
        status.set(EngineKind::Gemini, true);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["gemini"], serde_json::Value::Bool(true));
        assert_eq!(json["openrouter"], serde_json::Value::Bool(false));
    }
}
