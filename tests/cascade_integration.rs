//! Vision cascade integration tests.
//!
//! Exercises `VisionRouter` with scripted engines:
//! - Every call resolves to a result, even when all engines fail
//! - Engines are tried in priority order and stop at the first accepted reply
//! - Auth and quota failures disable an engine, and every engine sharing
//!   its endpoint, until reset
//! - Hung engines are cut off by the per-engine deadline
//! - Voice commands fall back to fixed replies

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use secrecy::SecretString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use visualky::config::{CascadeConfig, EngineCredentials};
use visualky::detection::{DetectionOptions, ObjectDetector};
use visualky::engine::{EngineError, EngineReply, EngineResult, VisionEngine, VisionPrompt};
use visualky::models::metadata_keys;
use visualky::services::VoiceIntentKind;
use visualky::{
    BoundingBox, DetectedObject, EngineKind, ImageInput, TaskMode, VisionConfig, VisionRouter,
};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Clone)]
enum Behavior {
    Reply(f32),
    Fail(EngineError),
    Hang,
}

/// Engine that follows a script and counts its calls.
struct ScriptedEngine {
    kind: EngineKind,
    behavior: Behavior,
    ready: bool,
    voice: Option<EngineResult<String>>,
    endpoint: Option<&'static str>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    fn new(kind: EngineKind, behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Self {
            kind,
            behavior,
            ready: true,
            voice: None,
            endpoint: None,
            calls: Arc::clone(&calls),
        };
        (engine, calls)
    }

    fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    fn with_voice(mut self, reply: EngineResult<String>) -> Self {
        self.voice = Some(reply);
        self
    }

    fn at(mut self, endpoint: &'static str) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
}

#[async_trait]
impl VisionEngine for ScriptedEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn endpoint(&self) -> Option<&str> {
        self.endpoint
    }

    async fn initialize(&mut self, _credential: Option<&SecretString>) -> bool {
        self.ready
    }

    async fn analyze(
        &self,
        _image: &ImageInput,
        prompt: &VisionPrompt,
    ) -> EngineResult<EngineReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Reply(confidence) => Ok(EngineReply::new(
                format!("{} reply for {}", self.kind, prompt.mode),
                *confidence,
                "scripted-model",
            )),
            Behavior::Fail(err) => Err(err.clone()),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EngineError::Network("unreachable".to_string()))
            },
        }
    }

    async fn converse(&self, _prompt: &str) -> EngineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.voice
            .clone()
            .unwrap_or_else(|| Err(EngineError::Unsupported("no voice".to_string())))
    }
}

fn frame() -> ImageInput {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 48, Rgba([30, 60, 200, 255])));
    ImageInput::from_image(&img).expect("encode frame")
}

async fn router(engines: Vec<ScriptedEngine>) -> VisionRouter {
    router_with(engines, CascadeConfig::default()).await
}

async fn router_with(engines: Vec<ScriptedEngine>, config: CascadeConfig) -> VisionRouter {
    let boxed: Vec<Box<dyn VisionEngine>> = engines
        .into_iter()
        .map(|e| Box::new(e) as Box<dyn VisionEngine>)
        .collect();
    let mut router = VisionRouter::new(boxed, config).expect("valid engine set");
    router.initialize(&EngineCredentials::default()).await;
    router
}

fn attempts(result: &visualky::AnalysisResult) -> Vec<String> {
    result.metadata[metadata_keys::ATTEMPTS]
        .as_array()
        .expect("attempts array")
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// Total correctness
// ============================================================================

#[tokio::test]
async fn test_all_engines_failing_still_yields_result() {
    let (gemini, _) = ScriptedEngine::new(
        EngineKind::Gemini,
        Behavior::Fail(EngineError::Network("down".to_string())),
    );
    let (hf, _) = ScriptedEngine::new(
        EngineKind::HuggingFace,
        Behavior::Fail(EngineError::Malformed("garbage".to_string())),
    );
    let (openrouter, _) = ScriptedEngine::new(
        EngineKind::OpenRouter,
        Behavior::Fail(EngineError::Empty("nothing".to_string())),
    );
    let (detector, _) = ScriptedEngine::new(
        EngineKind::LocalDetector,
        Behavior::Fail(EngineError::Empty("no objects".to_string())),
    );
    let router = router(vec![gemini, hf, openrouter, detector]).await;

    for mode in TaskMode::all() {
        let result = router.analyze_image(&frame(), *mode, Some("cereal")).await;
        assert_eq!(result.engine, EngineKind::LocalHeuristic);
        assert_eq!(result.mode, *mode);
        assert!(!result.response.is_empty());
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.fallback_reason().is_some());
        assert!(result.metadata.contains_key(metadata_keys::PROCESSING_TIME_MS));
    }
}

#[tokio::test]
async fn test_undecodable_image_uses_template() {
    let (gemini, _) = ScriptedEngine::new(
        EngineKind::Gemini,
        Behavior::Fail(EngineError::Malformed("bad image".to_string())),
    );
    let router = router(vec![gemini]).await;

    let result = router
        .analyze_image(&ImageInput::from_bytes(vec![0xde, 0xad]), TaskMode::Scan, None)
        .await;
    assert!(result.is_last_resort());
    assert!((result.confidence - 0.5).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_no_engines_registered() {
    let router = router(Vec::new()).await;
    let result = router
        .analyze_image(&frame(), TaskMode::Surroundings, None)
        .await;
    assert!(result.is_last_resort());
    assert_eq!(result.fallback_reason(), Some("no engines registered"));
}

// ============================================================================
// Priority ordering
// ============================================================================

#[tokio::test]
async fn test_first_acceptable_engine_wins() {
    let (gemini, gemini_calls) = ScriptedEngine::new(
        EngineKind::Gemini,
        Behavior::Fail(EngineError::Network("timeout".to_string())),
    );
    let (hf, hf_calls) = ScriptedEngine::new(EngineKind::HuggingFace, Behavior::Reply(0.85));
    let (openrouter, openrouter_calls) =
        ScriptedEngine::new(EngineKind::OpenRouter, Behavior::Reply(0.95));
    // Passed out of order; the router sorts by priority.
    let router = router(vec![openrouter, hf, gemini]).await;

    let result = router.analyze_image(&frame(), TaskMode::Scan, None).await;

    assert_eq!(result.engine, EngineKind::HuggingFace);
    assert_eq!(gemini_calls.load(Ordering::SeqCst), 1);
    assert_eq!(hf_calls.load(Ordering::SeqCst), 1);
    assert_eq!(openrouter_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.fallback_reason(), Some("gemini: network"));
    assert_eq!(
        attempts(&result),
        vec!["gemini: network".to_string(), "huggingface: success".to_string()]
    );
    assert_eq!(
        result.metadata_str(metadata_keys::MODEL),
        Some("scripted-model")
    );
}

#[tokio::test]
async fn test_reply_below_floor_falls_through() {
    let (gemini, _) = ScriptedEngine::new(EngineKind::Gemini, Behavior::Reply(0.79));
    let (hf, _) = ScriptedEngine::new(EngineKind::HuggingFace, Behavior::Reply(0.70));
    let router = router(vec![gemini, hf]).await;

    let result = router.analyze_image(&frame(), TaskMode::Scan, None).await;

    assert_eq!(result.engine, EngineKind::HuggingFace);
    assert!(attempts(&result)[0].starts_with("gemini: below threshold"));
}

#[tokio::test]
async fn test_floor_is_inclusive() {
    let (gemini, _) = ScriptedEngine::new(EngineKind::Gemini, Behavior::Reply(0.8));
    let router = router(vec![gemini]).await;
    let result = router.analyze_image(&frame(), TaskMode::Scan, None).await;
    assert_eq!(result.engine, EngineKind::Gemini);
    assert_eq!(result.fallback_reason(), None);
}

#[tokio::test]
async fn test_not_ready_engine_is_never_called() {
    let (gemini, gemini_calls) = ScriptedEngine::new(EngineKind::Gemini, Behavior::Reply(0.99));
    let (hf, _) = ScriptedEngine::new(EngineKind::HuggingFace, Behavior::Reply(0.9));
    let router = router(vec![gemini.not_ready(), hf]).await;

    let result = router.analyze_image(&frame(), TaskMode::Scan, None).await;

    assert_eq!(result.engine, EngineKind::HuggingFace);
    assert_eq!(gemini_calls.load(Ordering::SeqCst), 0);
    assert!(!router.engine_status().is_available(EngineKind::Gemini));
}

// ============================================================================
// Disablement
// ============================================================================

#[tokio::test]
async fn test_quota_failure_disables_engine_until_reset() {
    let (gemini, gemini_calls) = ScriptedEngine::new(
        EngineKind::Gemini,
        Behavior::Fail(EngineError::Quota("daily limit".to_string())),
    );
    let (hf, _) = ScriptedEngine::new(EngineKind::HuggingFace, Behavior::Reply(0.9));
    let router = router(vec![gemini, hf]).await;

    let first = router.analyze_image(&frame(), TaskMode::Scan, None).await;
    assert_eq!(first.engine, EngineKind::HuggingFace);
    assert!(!router.engine_status().is_available(EngineKind::Gemini));

    let second = router.analyze_image(&frame(), TaskMode::Scan, None).await;
    assert_eq!(second.engine, EngineKind::HuggingFace);
    assert_eq!(gemini_calls.load(Ordering::SeqCst), 1);
    assert_eq!(attempts(&second)[0], "gemini: skipped (unavailable)");

    router.reset_engine_status();
    assert!(router.engine_status().is_available(EngineKind::Gemini));
    router.analyze_image(&frame(), TaskMode::Scan, None).await;
    assert_eq!(gemini_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_auth_failure_disables_engine() {
    let (openrouter, calls) = ScriptedEngine::new(
        EngineKind::OpenRouter,
        Behavior::Fail(EngineError::Auth("invalid key".to_string())),
    );
    let router = router(vec![openrouter]).await;

    router.analyze_image(&frame(), TaskMode::Scan, None).await;
    router.analyze_image(&frame(), TaskMode::Scan, None).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!router.engine_status().is_available(EngineKind::OpenRouter));
}

#[tokio::test]
async fn test_network_failure_does_not_disable() {
    let (gemini, calls) = ScriptedEngine::new(
        EngineKind::Gemini,
        Behavior::Fail(EngineError::Network("reset".to_string())),
    );
    let router = router(vec![gemini]).await;

    router.analyze_image(&frame(), TaskMode::Scan, None).await;
    router.analyze_image(&frame(), TaskMode::Scan, None).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(router.engine_status().is_available(EngineKind::Gemini));
}

const INFERENCE_API: &str = "https://inference.test";

#[tokio::test]
async fn test_quota_failure_disables_engines_sharing_endpoint() {
    let (hf, _) = ScriptedEngine::new(
        EngineKind::HuggingFace,
        Behavior::Fail(EngineError::Quota("monthly credits used".to_string())),
    );
    let (detector, detector_calls) =
        ScriptedEngine::new(EngineKind::LocalDetector, Behavior::Reply(0.9));
    let router = router(vec![hf.at(INFERENCE_API), detector.at(INFERENCE_API)]).await;

    let result = router.analyze_image(&frame(), TaskMode::Scan, None).await;

    assert!(result.is_last_resort());
    assert_eq!(detector_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        attempts(&result),
        vec![
            "huggingface: quota".to_string(),
            "local_detector: skipped (unavailable)".to_string(),
            "local_heuristic: success".to_string(),
        ]
    );
    let status = router.engine_status();
    assert!(!status.is_available(EngineKind::HuggingFace));
    assert!(!status.is_available(EngineKind::LocalDetector));

    router.reset_engine_status();
    assert!(router.engine_status().is_available(EngineKind::LocalDetector));
}

#[tokio::test]
async fn test_in_process_detector_survives_remote_quota() {
    let (hf, _) = ScriptedEngine::new(
        EngineKind::HuggingFace,
        Behavior::Fail(EngineError::Quota("monthly credits used".to_string())),
    );
    let (detector, detector_calls) =
        ScriptedEngine::new(EngineKind::LocalDetector, Behavior::Reply(0.4));
    let router = router(vec![hf.at(INFERENCE_API), detector]).await;

    let result = router.analyze_image(&frame(), TaskMode::Scan, None).await;

    assert_eq!(result.engine, EngineKind::LocalDetector);
    assert_eq!(detector_calls.load(Ordering::SeqCst), 1);
    assert!(router.engine_status().is_available(EngineKind::LocalDetector));
    assert!(!router.any_remote_available());
}

#[tokio::test]
async fn test_remote_detector_waits_for_initialize() {
    let (detector, _) = ScriptedEngine::new(EngineKind::LocalDetector, Behavior::Reply(0.9));
    let boxed: Vec<Box<dyn VisionEngine>> = vec![Box::new(detector.at(INFERENCE_API))];
    let mut router = VisionRouter::new(boxed, CascadeConfig::default()).unwrap();

    assert!(!router.engine_status().is_available(EngineKind::LocalDetector));
    assert!(!router.any_remote_available());

    router.initialize(&EngineCredentials::default()).await;
    assert!(router.engine_status().is_available(EngineKind::LocalDetector));
    assert!(router.any_remote_available());
    assert_eq!(
        router.remote_endpoints().get(&EngineKind::LocalDetector).map(String::as_str),
        Some(INFERENCE_API)
    );
}

// ============================================================================
// Detector slot configuration
// ============================================================================

/// In-process detector that remembers the bounds it was called with.
struct RecordingDetector {
    seen: Arc<Mutex<Option<DetectionOptions>>>,
}

#[async_trait]
impl ObjectDetector for RecordingDetector {
    fn model(&self) -> &str {
        "recording"
    }

    async fn detect(
        &self,
        _image: &DynamicImage,
        options: &DetectionOptions,
    ) -> EngineResult<Vec<DetectedObject>> {
        *self.seen.lock().unwrap() = Some(*options);
        Ok(options.apply(vec![DetectedObject::new(
            "chair",
            0.5,
            BoundingBox::new(4.0, 4.0, 40.0, 30.0),
        )]))
    }
}

#[tokio::test]
async fn test_detector_floor_comes_from_config() {
    // Remote slots point at a closed local port so they fail fast.
    let mut config = VisionConfig::default();
    config.engines.gemini_endpoint = Some("http://127.0.0.1:9".to_string());
    config.engines.huggingface_endpoint = Some("http://127.0.0.1:9".to_string());
    config.engines.openrouter_endpoint = Some("http://127.0.0.1:9".to_string());
    config.cascade.engine_timeout = Duration::from_secs(2);
    config.cascade.detector_min_score = 0.9;

    let seen = Arc::new(Mutex::new(None));
    let detector = RecordingDetector {
        seen: Arc::clone(&seen),
    };
    let mut router = VisionRouter::from_config(&config, Some(Arc::new(detector))).unwrap();
    router.initialize(&EngineCredentials::default()).await;

    let result = router.analyze_image(&frame(), TaskMode::Scan, None).await;

    let options = seen.lock().unwrap().expect("detector was called");
    assert!((options.min_score - 0.9).abs() < f32::EPSILON);
    assert!(result.is_last_resort());
    assert!(attempts(&result).contains(&"local_detector: empty".to_string()));
}

// ============================================================================
// Timeouts
// ============================================================================

#[tokio::test]
async fn test_hung_engine_is_cut_off() {
    let (gemini, _) = ScriptedEngine::new(EngineKind::Gemini, Behavior::Hang);
    let (hf, _) = ScriptedEngine::new(EngineKind::HuggingFace, Behavior::Reply(0.9));
    let config = CascadeConfig {
        engine_timeout: Duration::from_millis(50),
        ..CascadeConfig::default()
    };
    let router = router_with(vec![gemini, hf], config).await;

    let result = router.analyze_image(&frame(), TaskMode::Scan, None).await;

    assert_eq!(result.engine, EngineKind::HuggingFace);
    assert_eq!(attempts(&result)[0], "gemini: timeout");
    assert!(router.engine_status().is_available(EngineKind::Gemini));
}

// ============================================================================
// Voice commands
// ============================================================================

#[tokio::test]
async fn test_find_my_keys() {
    let router = router(Vec::new()).await;
    let response = router
        .process_voice_command("find my keys", TaskMode::Standby)
        .await;

    assert_eq!(response.intent, VoiceIntentKind::Find);
    assert_eq!(response.target.as_deref(), Some("my keys"));
    assert_eq!(response.suggested_mode, Some(TaskMode::Shopping));
    assert_eq!(response.mode, TaskMode::Shopping);
    assert_eq!(response.engine, None);
    assert_eq!(
        response.response_text,
        "Looking for my keys. I'll guide you as you pan the camera across the shelves."
    );
}

#[tokio::test]
async fn test_general_command_keeps_current_mode() {
    let router = router(Vec::new()).await;
    let response = router
        .process_voice_command("thank you", TaskMode::Learning)
        .await;
    assert_eq!(response.intent, VoiceIntentKind::General);
    assert_eq!(response.suggested_mode, None);
    assert_eq!(response.mode, TaskMode::Learning);
}

#[tokio::test]
async fn test_no_suggestion_when_already_in_mode() {
    let router = router(Vec::new()).await;
    let response = router
        .process_voice_command("where is the cereal", TaskMode::Shopping)
        .await;
    assert_eq!(response.intent, VoiceIntentKind::Find);
    assert_eq!(response.target.as_deref(), Some("the cereal"));
    assert_eq!(response.suggested_mode, None);
    assert_eq!(response.mode, TaskMode::Shopping);
}

#[tokio::test]
async fn test_voice_uses_primary_engine_when_available() {
    let (gemini, _) = ScriptedEngine::new(EngineKind::Gemini, Behavior::Reply(0.9));
    let router = router(vec![gemini.with_voice(Ok("  Sure, scanning now.  ".to_string()))]).await;

    let response = router
        .process_voice_command("what is this", TaskMode::Standby)
        .await;

    assert_eq!(response.intent, VoiceIntentKind::Scan);
    assert_eq!(response.engine, Some(EngineKind::Gemini));
    assert_eq!(response.response_text, "Sure, scanning now.");
}

#[tokio::test]
async fn test_voice_quota_failure_falls_back_and_disables() {
    let (gemini, calls) = ScriptedEngine::new(EngineKind::Gemini, Behavior::Reply(0.9));
    let router = router(vec![
        gemini.with_voice(Err(EngineError::Quota("exhausted".to_string()))),
    ])
    .await;

    let response = router
        .process_voice_command("remember this mug", TaskMode::Standby)
        .await;
    assert_eq!(response.intent, VoiceIntentKind::Learn);
    assert_eq!(response.engine, None);
    assert_eq!(
        response.response_text,
        "Show me the item you want to remember, and I'll save its details."
    );
    assert!(!router.engine_status().is_available(EngineKind::Gemini));

    router
        .process_voice_command("scan this", TaskMode::Standby)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
