//! Vision engine abstraction.
//!
//! Every engine in the cascade implements [`VisionEngine`]: an `initialize`
//! step that reports readiness and an `analyze` step that either returns an
//! [`EngineReply`] or a classified [`EngineError`]. The local heuristic is not
//! a `VisionEngine`; it is infallible and lives in [`HeuristicEngine`].

mod detector;
mod gemini;
mod heuristic;
mod huggingface;
pub mod image_stats;
mod openrouter;
pub mod prompt;

pub use detector::LocalDetectorEngine;
pub use gemini::GeminiEngine;
pub use heuristic::HeuristicEngine;
pub use huggingface::{HfInferenceClient, HuggingFaceEngine, TOKEN_ENV_VARS as HF_TOKEN_ENV_VARS};
pub use openrouter::OpenRouterEngine;
pub use prompt::{VisionPrompt, build_prompt};

use crate::models::{EngineKind, ImageInput};
use async_trait::async_trait;
use secrecy::SecretString;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Classified engine failure.
///
/// Every variant is recoverable by the cascade. [`Auth`](Self::Auth) and
/// [`Quota`](Self::Quota) additionally take the engine out of rotation until
/// the router's status is reset.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum EngineError {
    /// Credentials missing, invalid or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Rate limit or quota exhausted.
    #[error("quota exhausted: {0}")]
    Quota(String),
    /// Transport failure or upstream 5xx.
    #[error("network error: {0}")]
    Network(String),
    /// Response could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The engine did not answer within its time budget.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// The engine answered but had nothing usable to say.
    #[error("no usable result: {0}")]
    Empty(String),
    /// The engine does not support the requested operation.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl EngineError {
    /// Returns true if the failure should disable the engine for the rest of
    /// the process lifetime.
    #[must_use]
    pub const fn disables_engine(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Quota(_))
    }

    /// Short machine-readable class name.
    #[must_use]
    pub const fn class(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Quota(_) => "quota",
            Self::Network(_) => "network",
            Self::Malformed(_) => "malformed",
            Self::Timeout(_) => "timeout",
            Self::Empty(_) => "empty",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Successful engine answer.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineReply {
    /// Natural-language answer.
    pub text: String,
    /// Engine confidence in `[0, 1]`.
    pub confidence: f32,
    /// Model that produced the answer.
    pub model: String,
    /// Number of objects behind the answer, for detector-backed engines.
    pub detected_objects: Option<usize>,
}

impl EngineReply {
    /// Creates a reply.
    #[must_use]
    pub fn new(text: impl Into<String>, confidence: f32, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence,
            model: model.into(),
            detected_objects: None,
        }
    }

    /// Records how many objects the answer is based on.
    #[must_use]
    pub const fn with_detected_objects(mut self, count: usize) -> Self {
        self.detected_objects = Some(count);
        self
    }
}

/// Trait for vision engines tried by the cascade.
#[async_trait]
pub trait VisionEngine: Send + Sync {
    /// Which cascade slot the engine occupies.
    fn kind(&self) -> EngineKind;

    /// Model identifier reported in result metadata.
    fn model(&self) -> &str;

    /// Base URL of the remote service behind the engine; `None` when it runs
    /// in-process.
    ///
    /// Engines reporting the same endpoint share its quota and credentials.
    fn endpoint(&self) -> Option<&str> {
        None
    }

    /// Prepares the engine, returning true if it is ready for requests.
    ///
    /// The credential is the one configured for this engine's slot, if any.
    async fn initialize(&mut self, credential: Option<&SecretString>) -> bool;

    /// Analyzes an image for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns a classified [`EngineError`]; the cascade recovers from all of them.
    async fn analyze(&self, image: &ImageInput, prompt: &VisionPrompt)
    -> EngineResult<EngineReply>;

    /// Generates a short text-only reply.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unsupported`] unless the engine overrides it.
    async fn converse(&self, _prompt: &str) -> EngineResult<String> {
        Err(EngineError::Unsupported(format!(
            "{} has no text-only mode",
            self.kind()
        )))
    }
}

/// HTTP client configuration for remote engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl HttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout_ms) = env_u64("VISUALKY_HTTP_TIMEOUT_MS") {
            self.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = env_u64("VISUALKY_HTTP_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

/// Builds an HTTP client for engine requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: HttpConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build engine HTTP client: {err}");
        reqwest::Client::new()
    })
}

/// Maximum number of body characters kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Maps a non-success HTTP status to an engine error.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str) -> EngineError {
    let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let message = format!("status {status}: {snippet}");
    let lower = body.to_lowercase();

    match status.as_u16() {
        401 | 403 => EngineError::Auth(message),
        429 => EngineError::Quota(message),
        _ if lower.contains("quota") || lower.contains("rate limit") => {
            EngineError::Quota(message)
        },
        500..=599 => EngineError::Network(message),
        _ => EngineError::Malformed(message),
    }
}

/// Maps a transport-level error to an engine error.
pub(crate) fn classify_transport(err: &reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::Network(format!("request timed out: {err}"))
    } else if err.is_decode() {
        EngineError::Malformed(err.to_string())
    } else {
        EngineError::Network(err.to_string())
    }
}

/// Sends a request and returns the body of a successful response.
pub(crate) async fn send_for_text(request: reqwest::RequestBuilder) -> EngineResult<String> {
    let response = request.send().await.map_err(|e| classify_transport(&e))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| classify_transport(&e))?;
    if !status.is_success() {
        return Err(classify_status(status, &body));
    }
    Ok(body)
}

/// Sends a request and decodes a successful JSON response.
pub(crate) async fn send_for_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> EngineResult<T> {
    let body = send_for_text(request).await?;
    serde_json::from_str(&body).map_err(|e| EngineError::Malformed(format!("invalid JSON: {e}")))
}
