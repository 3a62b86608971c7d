//! Configuration management.
//!
//! Every hand-tuned constant of the cascade, the pipeline and the safety
//! gate lives here with its default. Values are loaded from TOML, then
//! `VISUALKY_*` environment variables are applied on top.

mod credentials;

pub use credentials::EngineCredentials;

use crate::detection::DetectionOptions;
use crate::engine::{HfInferenceClient, HttpConfig, LocalDetectorEngine};
use crate::models::EngineKind;
use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for visualky.
#[derive(Debug, Clone, Default)]
pub struct VisionConfig {
    /// Cascade router settings.
    pub cascade: CascadeConfig,
    /// Object pipeline settings.
    pub pipeline: PipelineConfig,
    /// Safety gate and decision settings.
    pub safety: SafetyConfig,
    /// Per-engine model and endpoint overrides.
    pub engines: EngineSettings,
    /// HTTP client timeouts for remote engines.
    pub http: HttpConfig,
    /// Remote engine credentials.
    pub credentials: EngineCredentials,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Cascade router settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeConfig {
    /// Minimum confidence per engine; engines without an entry are never gated.
    pub min_confidence: BTreeMap<EngineKind, f32>,
    /// Upper bound on one engine call.
    pub engine_timeout: Duration,
    /// Raw score floor for detections described by the detector engine.
    pub detector_min_score: f32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            min_confidence: BTreeMap::from([
                (EngineKind::Gemini, 0.8),
                (EngineKind::HuggingFace, 0.7),
                (EngineKind::OpenRouter, 0.6),
            ]),
            engine_timeout: Duration::from_secs(20),
            detector_min_score: LocalDetectorEngine::DEFAULT_MIN_SCORE,
        }
    }
}

impl CascadeConfig {
    /// Returns the acceptance floor for an engine, if gated.
    #[must_use]
    pub fn floor(&self, kind: EngineKind) -> Option<f32> {
        self.min_confidence.get(&kind).copied()
    }

    /// Returns true if a reply with this confidence is acceptable from the engine.
    #[must_use]
    pub fn accepts(&self, kind: EngineKind, confidence: f32) -> bool {
        self.floor(kind).is_none_or(|floor| confidence >= floor)
    }
}

/// Object pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Detector bounds (raw score floor, result cap).
    pub detection: DetectionOptions,
    /// Boxes covering less than this fraction of the frame are dropped.
    pub min_area_ratio: f64,
    /// Padding added on each side of a box before cropping, as a fraction of its size.
    pub crop_padding: f32,
    /// Side length of the square verifier input.
    pub crop_size: u32,
    /// Weight of the detection score in fusion.
    pub detection_weight: f32,
    /// Weight of the similarity score in fusion.
    pub similarity_weight: f32,
    /// Fused confidence at or above which an object is accepted.
    pub accept_threshold: f32,
    /// Fused confidence at or above which an object is kept as uncertain.
    pub uncertain_threshold: f32,
    /// Distractor labels offered to the verifier alongside the real ones.
    pub distractor_labels: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection: DetectionOptions::default(),
            min_area_ratio: 0.02,
            crop_padding: 0.15,
            crop_size: 224,
            detection_weight: 0.5,
            similarity_weight: 0.5,
            accept_threshold: 0.60,
            uncertain_threshold: 0.45,
            distractor_labels: vec![
                "background".to_string(),
                "blurry".to_string(),
                "noise".to_string(),
            ],
        }
    }
}

/// Safety gate and decision settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyConfig {
    /// Threshold for ordinary targets.
    pub standard_threshold: f32,
    /// Threshold for targets matching a high-risk term.
    pub high_risk_threshold: f32,
    /// Substrings marking a target as high-risk.
    pub high_risk_terms: Vec<String>,
    /// Evidence below this confidence is refused outright.
    pub refusal_floor: f32,
    /// Evidence above this confidence counts as strong.
    pub strong_evidence: f32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            standard_threshold: 0.75,
            high_risk_threshold: 0.85,
            high_risk_terms: ["stairs", "step", "curb", "traffic", "medicine", "pills"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            refusal_floor: 0.25,
            strong_evidence: 0.5,
        }
    }
}

/// Per-engine model and endpoint overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    /// Gemini model.
    pub gemini_model: Option<String>,
    /// Gemini endpoint.
    pub gemini_endpoint: Option<String>,
    /// Hugging Face Inference API endpoint.
    pub huggingface_endpoint: Option<String>,
    /// Captioning model.
    pub caption_model: Option<String>,
    /// Object detection model.
    pub detector_model: Option<String>,
    /// Zero-shot classification model.
    pub classifier_model: Option<String>,
    /// Chat completions model for the tertiary slot.
    pub openrouter_model: Option<String>,
    /// Chat completions endpoint for the tertiary slot.
    pub openrouter_endpoint: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Cascade section.
    pub cascade: Option<ConfigFileCascade>,
    /// Pipeline section.
    pub pipeline: Option<ConfigFilePipeline>,
    /// Safety section.
    pub safety: Option<ConfigFileSafety>,
    /// Engines section.
    pub engines: Option<ConfigFileEngines>,
    /// HTTP section.
    pub http: Option<ConfigFileHttp>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Cascade section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCascade {
    /// Engine call timeout in milliseconds.
    pub engine_timeout_ms: Option<u64>,
    /// Detection floor for the detector engine.
    pub detector_min_score: Option<f32>,
    /// Acceptance floors keyed by engine name.
    pub min_confidence: Option<BTreeMap<String, f32>>,
}

/// Pipeline section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFilePipeline {
    /// Raw detection score floor.
    pub min_detection_score: Option<f32>,
    /// Detection cap.
    pub max_results: Option<usize>,
    /// Minimum box area ratio.
    pub min_area_ratio: Option<f64>,
    /// Crop padding ratio.
    pub crop_padding: Option<f32>,
    /// Verifier input size.
    pub crop_size: Option<u32>,
    /// Detection weight.
    pub detection_weight: Option<f32>,
    /// Similarity weight.
    pub similarity_weight: Option<f32>,
    /// Accept threshold.
    pub accept_threshold: Option<f32>,
    /// Uncertain threshold.
    pub uncertain_threshold: Option<f32>,
    /// Distractor labels.
    pub distractor_labels: Option<Vec<String>>,
}

/// Safety section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSafety {
    /// Standard threshold.
    pub standard_threshold: Option<f32>,
    /// High-risk threshold.
    pub high_risk_threshold: Option<f32>,
    /// High-risk terms.
    pub high_risk_terms: Option<Vec<String>>,
    /// Refusal floor.
    pub refusal_floor: Option<f32>,
    /// Strong evidence threshold.
    pub strong_evidence: Option<f32>,
}

/// Engines section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEngines {
    /// Gemini settings.
    pub gemini: Option<ConfigFileEngine>,
    /// Hugging Face settings.
    pub huggingface: Option<ConfigFileHuggingFace>,
    /// OpenRouter settings.
    pub openrouter: Option<ConfigFileEngine>,
}

/// Settings for a chat-style remote engine.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEngine {
    /// API key.
    pub api_key: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Endpoint URL.
    pub endpoint: Option<String>,
}

/// Hugging Face settings.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileHuggingFace {
    /// API token.
    pub token: Option<String>,
    /// Endpoint URL.
    pub endpoint: Option<String>,
    /// Captioning model.
    pub caption_model: Option<String>,
    /// Object detection model.
    pub detector_model: Option<String>,
    /// Zero-shot classification model.
    pub classifier_model: Option<String>,
}

/// HTTP section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileHttp {
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// Output format.
    pub format: Option<LogFormat>,
}

impl VisionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the Hugging Face client shared by captioning, detection and
    /// zero-shot classification.
    #[must_use]
    pub fn inference_client(&self) -> HfInferenceClient {
        let mut client = HfInferenceClient::new().with_http_config(self.http);
        if let Some(endpoint) = &self.engines.huggingface_endpoint {
            client = client.with_endpoint(endpoint.clone());
        }
        client.set_token(self.credentials.huggingface.as_ref());
        client
    }

    /// Loads configuration from a file path, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or a value is out of range.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let config = Self::from_config_file(file)?.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Returns the default config file path (`<config_dir>/visualky/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("visualky").join("config.toml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns defaults with environment overrides if no readable, valid
    /// config file is found. Overrides that fail validation are dropped.
    #[must_use]
    pub fn load_default() -> Self {
        if let Some(path) = Self::default_path().filter(|p| p.exists()) {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                },
            }
        }
        let config = Self::default().with_env_overrides();
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid environment overrides");
                Self {
                    http: config.http,
                    credentials: config.credentials,
                    logging: config.logging,
                    ..Self::default()
                }
            },
        }
    }

    /// Applies `VISUALKY_*` overrides and fills missing credentials from the
    /// environment.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("VISUALKY_ENGINE_TIMEOUT_MS") {
            match parse_timeout_override(&value) {
                Some(timeout) => self.cascade.engine_timeout = timeout,
                None => tracing::warn!(value = %value, "Ignoring VISUALKY_ENGINE_TIMEOUT_MS"),
            }
        }
        self.http = self.http.with_env_overrides();
        self.logging = self.logging.with_env_overrides();
        self.credentials = self.credentials.with_env_fallback();
        self
    }

    /// Checks that every threshold is in range and the floors are ordered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f32| -> Result<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(Error::InvalidInput(format!("{name} must be within [0, 1], got {value}")))
            }
        };

        let mut previous: Option<(EngineKind, f32)> = None;
        for (kind, floor) in &self.cascade.min_confidence {
            unit(&format!("cascade.min_confidence.{kind}"), *floor)?;
            if let Some((prev_kind, prev_floor)) = previous {
                if *floor >= prev_floor {
                    return Err(Error::InvalidInput(format!(
                        "acceptance floor for {kind} ({floor}) must be below {prev_kind} ({prev_floor})"
                    )));
                }
            }
            previous = Some((*kind, *floor));
        }
        if self.cascade.engine_timeout.is_zero() {
            return Err(Error::InvalidInput("engine timeout must be positive".to_string()));
        }
        unit("cascade.detector_min_score", self.cascade.detector_min_score)?;

        let p = &self.pipeline;
        unit("pipeline.min_detection_score", p.detection.min_score)?;
        unit("pipeline.detection_weight", p.detection_weight)?;
        unit("pipeline.similarity_weight", p.similarity_weight)?;
        unit("pipeline.accept_threshold", p.accept_threshold)?;
        unit("pipeline.uncertain_threshold", p.uncertain_threshold)?;
        if p.uncertain_threshold > p.accept_threshold {
            return Err(Error::InvalidInput(
                "pipeline.uncertain_threshold must not exceed accept_threshold".to_string(),
            ));
        }
        if p.detection.max_results == 0 || p.crop_size == 0 {
            return Err(Error::InvalidInput(
                "pipeline.max_results and crop_size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&p.min_area_ratio) || p.crop_padding < 0.0 {
            return Err(Error::InvalidInput(
                "pipeline.min_area_ratio must be within [0, 1) and crop_padding non-negative"
                    .to_string(),
            ));
        }

        let s = &self.safety;
        unit("safety.standard_threshold", s.standard_threshold)?;
        unit("safety.high_risk_threshold", s.high_risk_threshold)?;
        unit("safety.refusal_floor", s.refusal_floor)?;
        unit("safety.strong_evidence", s.strong_evidence)?;
        Ok(())
    }

    /// Converts a `ConfigFile` to `VisionConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(cascade) = file.cascade {
            if let Some(ms) = cascade.engine_timeout_ms {
                config.cascade.engine_timeout = Duration::from_millis(ms);
            }
            if let Some(score) = cascade.detector_min_score {
                config.cascade.detector_min_score = score;
            }
            if let Some(floors) = cascade.min_confidence {
                config.cascade.min_confidence.clear();
                for (name, floor) in floors {
                    let kind = EngineKind::parse(&name).ok_or_else(|| {
                        Error::InvalidInput(format!("unknown engine in cascade.min_confidence: {name}"))
                    })?;
                    config.cascade.min_confidence.insert(kind, floor);
                }
            }
        }

        if let Some(pipeline) = file.pipeline {
            let p = &mut config.pipeline;
            if let Some(v) = pipeline.min_detection_score {
                p.detection.min_score = v;
            }
            if let Some(v) = pipeline.max_results {
                p.detection.max_results = v;
            }
            if let Some(v) = pipeline.min_area_ratio {
                p.min_area_ratio = v;
            }
            if let Some(v) = pipeline.crop_padding {
                p.crop_padding = v;
            }
            if let Some(v) = pipeline.crop_size {
                p.crop_size = v;
            }
            if let Some(v) = pipeline.detection_weight {
                p.detection_weight = v;
            }
            if let Some(v) = pipeline.similarity_weight {
                p.similarity_weight = v;
            }
            if let Some(v) = pipeline.accept_threshold {
                p.accept_threshold = v;
            }
            if let Some(v) = pipeline.uncertain_threshold {
                p.uncertain_threshold = v;
            }
            if let Some(v) = pipeline.distractor_labels {
                p.distractor_labels = v;
            }
        }

        if let Some(safety) = file.safety {
            let s = &mut config.safety;
            if let Some(v) = safety.standard_threshold {
                s.standard_threshold = v;
            }
            if let Some(v) = safety.high_risk_threshold {
                s.high_risk_threshold = v;
            }
            if let Some(v) = safety.high_risk_terms {
                s.high_risk_terms = v;
            }
            if let Some(v) = safety.refusal_floor {
                s.refusal_floor = v;
            }
            if let Some(v) = safety.strong_evidence {
                s.strong_evidence = v;
            }
        }

        if let Some(engines) = file.engines {
            if let Some(gemini) = engines.gemini {
                config.credentials.gemini = gemini.api_key.as_deref().and_then(credentials::secret);
                config.engines.gemini_model = gemini.model;
                config.engines.gemini_endpoint = gemini.endpoint;
            }
            if let Some(hf) = engines.huggingface {
                config.credentials.huggingface = hf.token.as_deref().and_then(credentials::secret);
                config.engines.huggingface_endpoint = hf.endpoint;
                config.engines.caption_model = hf.caption_model;
                config.engines.detector_model = hf.detector_model;
                config.engines.classifier_model = hf.classifier_model;
            }
            if let Some(openrouter) = engines.openrouter {
                config.credentials.openrouter =
                    openrouter.api_key.as_deref().and_then(credentials::secret);
                config.engines.openrouter_model = openrouter.model;
                config.engines.openrouter_endpoint = openrouter.endpoint;
            }
        }

        if let Some(http) = file.http {
            if let Some(v) = http.timeout_ms {
                config.http.timeout_ms = v;
            }
            if let Some(v) = http.connect_timeout_ms {
                config.http.connect_timeout_ms = v;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(format) = logging.format {
                config.logging.format = format;
            }
        }

        Ok(config)
    }
}

/// Parses an engine timeout in milliseconds; zero and garbage are rejected.
fn parse_timeout_override(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
