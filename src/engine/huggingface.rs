//! Hugging Face Inference API engine and shared client.

use super::prompt::format_caption;
use super::{
    EngineError, EngineReply, EngineResult, HttpConfig, VisionEngine, VisionPrompt,
    build_http_client, send_for_json,
};
use crate::models::{EngineKind, ImageInput};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Environment variables checked for a Hugging Face token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["HF_TOKEN", "HUGGINGFACE_API_KEY"];

/// Thin client for the hosted Inference API.
///
/// Shared by the captioning engine, the object detector and the zero-shot
/// classifier. A token is optional; anonymous calls hit the free tier.
#[derive(Clone)]
pub struct HfInferenceClient {
    token: Option<SecretString>,
    endpoint: String,
    client: reqwest::Client,
}

impl HfInferenceClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api-inference.huggingface.co";

    /// Creates a client, reading the token from the environment if set.
    #[must_use]
    pub fn new() -> Self {
        let token = TOKEN_ENV_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);
        Self {
            token,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            client: build_http_client(HttpConfig::from_env()),
        }
    }

    /// Sets the API token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Replaces the token if one is given.
    pub fn set_token(&mut self, token: Option<&SecretString>) {
        if let Some(token) = token {
            self.token = Some(SecretString::from(token.expose_secret().to_string()));
        }
    }

    /// Returns true if a token is configured.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().trim().is_empty())
    }

    /// Returns the API endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{model}", self.endpoint.trim_end_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) if !token.expose_secret().trim().is_empty() => {
                request.header("Authorization", format!("Bearer {}", token.expose_secret()))
            },
            _ => request,
        }
    }

    /// Posts raw image bytes to a model and decodes the JSON answer.
    ///
    /// # Errors
    ///
    /// Returns a classified [`EngineError`].
    pub async fn post_image<T: DeserializeOwned>(
        &self,
        model: &str,
        image: &[u8],
        mime_type: &str,
    ) -> EngineResult<T> {
        tracing::debug!(model, bytes = image.len(), "Posting image to inference API");
        let request = self
            .client
            .post(self.model_url(model))
            .header("Content-Type", mime_type)
            .body(image.to_vec());
        send_for_json(self.authorize(request)).await
    }

    /// Posts a JSON payload to a model and decodes the JSON answer.
    ///
    /// # Errors
    ///
    /// Returns a classified [`EngineError`].
    pub async fn post_json<B: serde::Serialize + Sync, T: DeserializeOwned>(
        &self,
        model: &str,
        body: &B,
    ) -> EngineResult<T> {
        tracing::debug!(model, "Posting JSON to inference API");
        let request = self.client.post(self.model_url(model)).json(body);
        send_for_json(self.authorize(request)).await
    }
}

impl Default for HfInferenceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Secondary engine: BLIP image captioning, formatted per task mode.
pub struct HuggingFaceEngine {
    inference: HfInferenceClient,
    model: String,
}

impl HuggingFaceEngine {
    /// Default captioning model.
    pub const DEFAULT_MODEL: &'static str = "Salesforce/blip-image-captioning-large";

    /// Confidence reported for successful answers.
    pub const CONFIDENCE: f32 = 0.85;

    /// Creates a new engine with the default model.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(HfInferenceClient::new())
    }

    /// Creates an engine over an existing inference client.
    #[must_use]
    pub fn with_client(inference: HfInferenceClient) -> Self {
        Self {
            inference,
            model: Self::DEFAULT_MODEL.to_string(),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for HuggingFaceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionEngine for HuggingFaceEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::HuggingFace
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Option<&str> {
        Some(self.inference.endpoint())
    }

    async fn initialize(&mut self, credential: Option<&SecretString>) -> bool {
        self.inference.set_token(credential);
        if !self.inference.has_token() {
            tracing::debug!("Hugging Face engine running on the anonymous free tier");
        }
        true
    }

    async fn analyze(
        &self,
        image: &ImageInput,
        prompt: &VisionPrompt,
    ) -> EngineResult<EngineReply> {
        let bytes = image
            .to_bytes()
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        let captions: Vec<CaptionOutput> = self
            .inference
            .post_image(&self.model, &bytes, &image.mime_type())
            .await?;
        let caption = first_caption(captions)?;
        Ok(EngineReply::new(
            format_caption(&caption, prompt),
            Self::CONFIDENCE,
            &self.model,
        ))
    }
}

/// One image-to-text output.
#[derive(Debug, Deserialize)]
struct CaptionOutput {
    generated_text: String,
}

fn first_caption(captions: Vec<CaptionOutput>) -> EngineResult<String> {
    captions
        .into_iter()
        .map(|c| c.generated_text.trim().to_string())
        .find(|c| !c.is_empty())
        .ok_or_else(|| EngineError::Empty("captioning model returned no text".to_string()))
}
