//! Google Gemini engine.

use super::{
    EngineError, EngineReply, EngineResult, HttpConfig, VisionEngine, VisionPrompt,
    build_http_client, send_for_json,
};
use crate::models::{EngineKind, ImageInput};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Primary cloud engine backed by the Gemini `generateContent` API.
pub struct GeminiEngine {
    /// API key.
    api_key: Option<SecretString>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::Client,
}

impl GeminiEngine {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";

    /// Confidence reported for successful answers.
    pub const CONFIDENCE: f32 = 0.95;

    /// Creates a new Gemini engine, reading `GEMINI_API_KEY` if set.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
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

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    fn api_key(&self) -> EngineResult<&str> {
        self.api_key
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EngineError::Auth("GEMINI_API_KEY not set".to_string()))
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    /// Makes a request to the Gemini API.
    async fn request(&self, parts: Vec<Part>) -> EngineResult<String> {
        let api_key = self.api_key()?;

        tracing::debug!(engine = "gemini", model = %self.model, "Making vision request");

        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 1000,
            },
        };

        let response: GenerateContentResponse = send_for_json(
            self.client
                .post(self.url())
                .header("x-goog-api-key", api_key)
                .json(&request),
        )
        .await?;

        extract_text(response)
    }
}

impl Default for GeminiEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionEngine for GeminiEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Gemini
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
        let ready = self.api_key().is_ok();
        if !ready {
            tracing::info!("No Gemini API key configured; primary engine disabled");
        }
        ready
    }

    async fn analyze(
        &self,
        image: &ImageInput,
        prompt: &VisionPrompt,
    ) -> EngineResult<EngineReply> {
        let parts = vec![
            Part::Text {
                text: prompt.text.clone(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type(),
                    data: image.to_base64(),
                },
            },
        ];
        let text = self.request(parts).await?;
        Ok(EngineReply::new(text, Self::CONFIDENCE, &self.model))
    }

    async fn converse(&self, prompt: &str) -> EngineResult<String> {
        self.request(vec![Part::Text {
            text: prompt.to_string(),
        }])
        .await
    }
}

/// Pulls the first non-empty text part out of a response.
fn extract_text(response: GenerateContentResponse) -> EngineResult<String> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(EngineError::Empty(format!("prompt blocked: {reason}")));
    }

    response
        .candidates
        .into_iter()
        .flat_map(|candidate| candidate.content.map(|c| c.parts).unwrap_or_default())
        .filter_map(|part| match part {
            Part::Text { text } if !text.trim().is_empty() => Some(text),
            _ => None,
        })
        .next()
        .ok_or_else(|| EngineError::Malformed("no text candidates in response".to_string()))
}

/// Request to the `generateContent` API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

/// Response from the `generateContent` API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
