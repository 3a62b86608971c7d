//! OpenAI-compatible chat completions engine.
//!
//! Defaults to OpenRouter's free tier; any provider speaking the same
//! `chat/completions` dialect with `image_url` parts can occupy the slot.

use super::{
    EngineError, EngineReply, EngineResult, HttpConfig, VisionEngine, VisionPrompt,
    build_http_client, send_for_json,
};
use crate::models::{EngineKind, ImageInput};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Tertiary engine backed by a chat completions API.
pub struct OpenRouterEngine {
    /// API key (optional for free-tier models).
    api_key: Option<SecretString>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// Value of the `HTTP-Referer` header.
    referer: String,
    /// HTTP client.
    client: reqwest::Client,
}

impl OpenRouterEngine {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://openrouter.ai/api/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "google/gemini-flash-1.5-8b-exp";

    /// Default `HTTP-Referer` value.
    pub const DEFAULT_REFERER: &'static str = "https://github.com/visualky/visualky";

    /// Confidence reported for successful answers.
    pub const CONFIDENCE: f32 = 0.80;

    /// Creates a new engine, reading `OPENROUTER_API_KEY` if set.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            referer: Self::DEFAULT_REFERER.to_string(),
            client: build_http_client(HttpConfig::from_env()),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the `HTTP-Referer` header value.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    fn build_request(&self, image: &ImageInput, prompt: &VisionPrompt) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: prompt.text.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.to_data_url(),
                        },
                    },
                ],
            }],
        }
    }
}

impl Default for OpenRouterEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionEngine for OpenRouterEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::OpenRouter
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.endpoint)
    }

    async fn initialize(&mut self, credential: Option<&SecretString>) -> bool {
        if let Some(key) = credential {
            self.api_key = Some(SecretString::from(key.expose_secret().to_string()));
        }
        true
    }

    async fn analyze(
        &self,
        image: &ImageInput,
        prompt: &VisionPrompt,
    ) -> EngineResult<EngineReply> {
        tracing::debug!(engine = "openrouter", model = %self.model, "Making vision request");

        let mut request = self
            .client
            .post(self.url())
            .header("HTTP-Referer", &self.referer)
            .json(&self.build_request(image, prompt));
        if let Some(key) = self
            .api_key
            .as_ref()
            .filter(|k| !k.expose_secret().trim().is_empty())
        {
            request = request.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let response: ChatCompletionResponse = send_for_json(request).await?;
        let text = extract_content(response)?;
        Ok(EngineReply::new(text, Self::CONFIDENCE, &self.model))
    }
}

fn extract_content(response: ChatCompletionResponse) -> EngineResult<String> {
    if let Some(error) = response.error {
        return Err(EngineError::Malformed(error.message));
    }
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| EngineError::Malformed("no choices in response".to_string()))
}

/// Request to the chat completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Response from the chat completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
