//! Vision cascade router.
//!
//! Tries engines strictly in priority order, one at a time, and returns the
//! first reply that clears the engine's confidence floor. Every failure is
//! recovered: the local heuristic answers when nothing else does.

use super::voice::{VoiceIntent, VoiceResponse, classify_intent};
use crate::config::{CascadeConfig, EngineCredentials, VisionConfig};
use crate::detection::{DetectionOptions, ObjectDetector};
use crate::engine::prompt::build_voice_prompt;
use crate::engine::{
    EngineError, EngineReply, EngineResult, GeminiEngine, HeuristicEngine, HuggingFaceEngine,
    LocalDetectorEngine, OpenRouterEngine, VisionEngine, VisionPrompt,
};
use crate::models::{AnalysisResult, EngineKind, EngineStatus, ImageInput, TaskMode, metadata_keys};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::Instrument;

/// Routes analysis requests through the engine cascade.
///
/// Owns the [`EngineStatus`] of its engines. An engine that fails with an
/// auth or quota error is skipped by every later call until
/// [`Self::reset_engine_status`] is called.
pub struct VisionRouter {
    engines: Vec<Box<dyn VisionEngine>>,
    heuristic: HeuristicEngine,
    config: CascadeConfig,
    status: Mutex<EngineStatus>,
    ready: EngineStatus,
}

impl VisionRouter {
    /// Creates a router over the given engines.
    ///
    /// Engines are ordered by [`EngineKind`] priority regardless of the order
    /// they are passed in. Engines with an endpoint start unavailable until
    /// [`Self::initialize`] runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if two engines share a kind or an
    /// engine claims the [`EngineKind::LocalHeuristic`] slot.
    pub fn new(mut engines: Vec<Box<dyn VisionEngine>>, config: CascadeConfig) -> Result<Self> {
        engines.sort_by_key(|engine| engine.kind());
        for pair in engines.windows(2) {
            if pair[0].kind() == pair[1].kind() {
                return Err(Error::InvalidInput(format!(
                    "duplicate engine: {}",
                    pair[0].kind()
                )));
            }
        }
        if engines
            .iter()
            .any(|engine| engine.kind() == EngineKind::LocalHeuristic)
        {
            return Err(Error::InvalidInput(
                "the local_heuristic slot is built in".to_string(),
            ));
        }

        let mut status = EngineStatus::new();
        for engine in &engines {
            if engine.kind() == EngineKind::LocalDetector && engine.endpoint().is_none() {
                status.set(EngineKind::LocalDetector, true);
            }
        }

        Ok(Self {
            engines,
            heuristic: HeuristicEngine::new(),
            config,
            ready: status.clone(),
            status: Mutex::new(status),
        })
    }

    /// Builds the standard cascade from configuration.
    ///
    /// The detector slot is filled only when a detector is given. A detector
    /// served by the Inference API shares its endpoint, and so its quota, with
    /// the Hugging Face captioning slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine set is invalid.
    pub fn from_config(
        config: &VisionConfig,
        detector: Option<Arc<dyn ObjectDetector>>,
    ) -> Result<Self> {
        let settings = &config.engines;

        let mut gemini = GeminiEngine::new().with_http_config(config.http);
        if let Some(model) = &settings.gemini_model {
            gemini = gemini.with_model(model.clone());
        }
        if let Some(endpoint) = &settings.gemini_endpoint {
            gemini = gemini.with_endpoint(endpoint.clone());
        }

        let mut huggingface = HuggingFaceEngine::with_client(config.inference_client());
        if let Some(model) = &settings.caption_model {
            huggingface = huggingface.with_model(model.clone());
        }

        let mut openrouter = OpenRouterEngine::new().with_http_config(config.http);
        if let Some(model) = &settings.openrouter_model {
            openrouter = openrouter.with_model(model.clone());
        }
        if let Some(endpoint) = &settings.openrouter_endpoint {
            openrouter = openrouter.with_endpoint(endpoint.clone());
        }

        let mut engines: Vec<Box<dyn VisionEngine>> =
            vec![Box::new(gemini), Box::new(huggingface), Box::new(openrouter)];
        if let Some(detector) = detector {
            let options = DetectionOptions {
                min_score: config.cascade.detector_min_score,
                ..DetectionOptions::default()
            };
            engines.push(Box::new(LocalDetectorEngine::new(detector).with_options(options)));
        }

        Self::new(engines, config.cascade.clone())
    }

    /// Initializes every engine with its credential and returns the status.
    pub async fn initialize(&mut self, credentials: &EngineCredentials) -> EngineStatus {
        let mut ready = EngineStatus::new();
        for engine in &mut self.engines {
            let kind = engine.kind();
            let is_ready = engine.initialize(credentials.for_engine(kind)).await;
            if is_ready {
                tracing::info!(engine = %kind, model = %engine.model(), "Engine ready");
            } else {
                tracing::info!(engine = %kind, "Engine not configured");
            }
            ready.set(kind, is_ready);
        }
        self.ready = ready.clone();
        *self.lock_status() = ready.clone();
        ready
    }

    /// Returns a snapshot of engine availability.
    #[must_use]
    pub fn engine_status(&self) -> EngineStatus {
        self.lock_status().clone()
    }

    /// Clears unavailability marks, restoring the state after initialization.
    pub fn reset_engine_status(&self) {
        *self.lock_status() = self.ready.clone();
        tracing::info!("Engine status reset");
    }

    /// Returns the endpoint of every engine that makes network calls.
    #[must_use]
    pub fn remote_endpoints(&self) -> BTreeMap<EngineKind, String> {
        self.engines
            .iter()
            .filter_map(|engine| Some((engine.kind(), engine.endpoint()?.to_string())))
            .collect()
    }

    /// Returns true if an available engine would make a network call.
    #[must_use]
    pub fn any_remote_available(&self) -> bool {
        let status = self.lock_status();
        self.engines
            .iter()
            .any(|engine| engine.endpoint().is_some() && status.is_available(engine.kind()))
    }

    /// Returns the registered engine kinds in cascade order.
    #[must_use]
    pub fn engine_kinds(&self) -> Vec<EngineKind> {
        self.engines.iter().map(|engine| engine.kind()).collect()
    }

    /// Returns the cascade settings.
    #[must_use]
    pub const fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Analyzes an image, always producing a result.
    pub async fn analyze_image(
        &self,
        image: &ImageInput,
        mode: TaskMode,
        query: Option<&str>,
    ) -> AnalysisResult {
        let span = tracing::info_span!(
            "vision.cascade",
            mode = %mode,
            engine = tracing::field::Empty,
            attempts = tracing::field::Empty,
        );
        self.run_cascade(image, mode, query).instrument(span).await
    }

    async fn run_cascade(
        &self,
        image: &ImageInput,
        mode: TaskMode,
        query: Option<&str>,
    ) -> AnalysisResult {
        let start = Instant::now();
        let prompt = VisionPrompt::new(mode, query);
        let mut attempts: Vec<String> = Vec::new();

        if image.is_empty() {
            tracing::debug!("Empty image; skipping to local heuristic");
            attempts.push("all: skipped (empty image)".to_string());
        } else {
            for engine in &self.engines {
                let kind = engine.kind();
                if !self.is_available(kind) {
                    attempts.push(format!("{kind}: skipped (unavailable)"));
                    continue;
                }

                match self.attempt(engine.as_ref(), image, &prompt).await {
                    Ok(reply) if self.config.accepts(kind, reply.confidence) => {
                        record_attempt(kind, "success");
                        attempts.push(format!("{kind}: success"));
                        return Self::finish(kind, reply, mode, attempts, start);
                    },
                    Ok(reply) => {
                        record_attempt(kind, "below_threshold");
                        tracing::info!(
                            engine = %kind,
                            confidence = reply.confidence,
                            floor = self.config.floor(kind).unwrap_or(0.0),
                            "Engine reply below confidence floor"
                        );
                        attempts.push(format!(
                            "{kind}: below threshold ({:.2} < {:.2})",
                            reply.confidence,
                            self.config.floor(kind).unwrap_or(0.0)
                        ));
                    },
                    Err(e) => {
                        record_attempt(kind, e.class());
                        tracing::warn!(engine = %kind, error = %e, "Engine failed, trying fallback");
                        if e.disables_engine() {
                            self.mark_unavailable(kind, &e);
                        }
                        attempts.push(format!("{kind}: {}", e.class()));
                    },
                }
            }
        }

        let reply = self.heuristic.analyze(image, &prompt);
        attempts.push(format!("{}: success", EngineKind::LocalHeuristic));
        record_attempt(EngineKind::LocalHeuristic, "success");
        Self::finish(EngineKind::LocalHeuristic, reply, mode, attempts, start)
    }

    /// Runs one engine under the cascade's time budget.
    async fn attempt(
        &self,
        engine: &dyn VisionEngine,
        image: &ImageInput,
        prompt: &VisionPrompt,
    ) -> EngineResult<EngineReply> {
        let budget = self.config.engine_timeout;
        let span = tracing::info_span!(
            "vision.engine",
            engine = %engine.kind(),
            model = %engine.model(),
        );
        tokio::time::timeout(budget, engine.analyze(image, prompt).instrument(span))
            .await
            .unwrap_or(Err(EngineError::Timeout(budget)))
    }

    fn finish(
        kind: EngineKind,
        reply: EngineReply,
        mode: TaskMode,
        attempts: Vec<String>,
        start: Instant,
    ) -> AnalysisResult {
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let current = tracing::Span::current();
        current.record("engine", kind.as_str());
        current.record("attempts", attempts.len());
        #[allow(clippy::cast_precision_loss)]
        metrics::histogram!("vision_cascade_duration_ms", "engine" => kind.as_str())
            .record(elapsed_ms as f64);

        let skipped: Vec<&String> = attempts
            .iter()
            .filter(|a| !a.ends_with(": success"))
            .collect();

        let mut result = AnalysisResult::new(reply.text, reply.confidence, kind, mode)
            .with_metadata(metadata_keys::MODEL, reply.model)
            .with_metadata(metadata_keys::PROCESSING_TIME_MS, elapsed_ms);
        if kind == EngineKind::LocalHeuristic {
            let reason = if skipped.is_empty() {
                "no engines registered".to_string()
            } else {
                "all engines unavailable or failed".to_string()
            };
            result = result.with_metadata(metadata_keys::FALLBACK_REASON, reason);
        } else if !skipped.is_empty() {
            let reason = skipped
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            result = result.with_metadata(metadata_keys::FALLBACK_REASON, reason);
        }
        if let Some(count) = reply.detected_objects {
            result = result.with_metadata(metadata_keys::DETECTED_OBJECTS, count);
        }
        result.with_metadata(metadata_keys::ATTEMPTS, attempts)
    }

    /// Classifies a voice command and phrases an acknowledgment.
    ///
    /// The primary cloud engine phrases the reply when it is available;
    /// otherwise a fixed per-intent sentence is used.
    pub async fn process_voice_command(
        &self,
        transcript: &str,
        current_mode: TaskMode,
    ) -> VoiceResponse {
        let intent = classify_intent(transcript);
        let target_mode = intent.kind.suggested_mode();
        let suggested_mode = target_mode.filter(|mode| *mode != current_mode);
        tracing::debug!(intent = %intent.kind, target = ?intent.target, "Voice intent classified");

        let (response_text, engine) = match self.converse(transcript, current_mode, &intent).await {
            Some(text) => (text, Some(EngineKind::Gemini)),
            None => (intent.fallback_response(), None),
        };

        VoiceResponse {
            response_text,
            intent: intent.kind,
            target: intent.target,
            suggested_mode,
            mode: target_mode.unwrap_or(current_mode),
            engine,
        }
    }

    async fn converse(
        &self,
        transcript: &str,
        mode: TaskMode,
        intent: &VoiceIntent,
    ) -> Option<String> {
        let engine = self
            .engines
            .iter()
            .find(|engine| engine.kind() == EngineKind::Gemini)?;
        if !self.is_available(EngineKind::Gemini) {
            return None;
        }

        let prompt = build_voice_prompt(transcript, mode, intent.kind.as_str());
        let budget = self.config.engine_timeout;
        let outcome = tokio::time::timeout(budget, engine.converse(&prompt))
            .await
            .unwrap_or(Err(EngineError::Timeout(budget)));

        match outcome {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Voice reply generation failed, using fixed reply");
                if e.disables_engine() {
                    self.mark_unavailable(EngineKind::Gemini, &e);
                }
                None
            },
        }
    }

    fn is_available(&self, kind: EngineKind) -> bool {
        self.lock_status().is_available(kind)
    }

    /// Disables an engine and every engine sharing its endpoint.
    fn mark_unavailable(&self, kind: EngineKind, cause: &EngineError) {
        let endpoint = self
            .engines
            .iter()
            .find(|engine| engine.kind() == kind)
            .and_then(|engine| engine.endpoint());
        let mut status = self.lock_status();
        for engine in &self.engines {
            let other = engine.kind();
            let shared = endpoint.is_some() && engine.endpoint() == endpoint;
            if (other == kind || shared) && status.is_available(other) {
                status.set(other, false);
                metrics::counter!("vision_engine_disabled_total", "engine" => other.as_str())
                    .increment(1);
                tracing::warn!(
                    engine = %other,
                    failed = %kind,
                    cause = cause.class(),
                    "Engine marked unavailable"
                );
            }
        }
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, EngineStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for VisionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionRouter")
            .field("engines", &self.engine_kinds())
            .field("config", &self.config)
            .field("status", &self.engine_status())
            .finish_non_exhaustive()
    }
}

fn record_attempt(kind: EngineKind, status: &'static str) {
    metrics::counter!(
        "vision_engine_attempts_total",
        "engine" => kind.as_str(),
        "status" => status
    )
    .increment(1);
}
