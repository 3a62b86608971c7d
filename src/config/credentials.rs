//! Engine credentials.

use crate::engine::HF_TOKEN_ENV_VARS;
use crate::models::EngineKind;
use secrecy::{ExposeSecret, SecretString};

/// API credentials for the remote engines.
///
/// Values never appear in `Debug` output.
#[derive(Debug, Default)]
pub struct EngineCredentials {
    /// Gemini API key.
    pub gemini: Option<SecretString>,
    /// Hugging Face token.
    pub huggingface: Option<SecretString>,
    /// OpenRouter (or compatible provider) API key.
    pub openrouter: Option<SecretString>,
}

impl EngineCredentials {
    /// Reads credentials from the environment.
    ///
    /// Checks `GEMINI_API_KEY`, `HF_TOKEN` then `HUGGINGFACE_API_KEY`, and
    /// `OPENROUTER_API_KEY`. Blank values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            gemini: env_secret(&["GEMINI_API_KEY"]),
            huggingface: env_secret(&HF_TOKEN_ENV_VARS),
            openrouter: env_secret(&["OPENROUTER_API_KEY"]),
        }
    }

    /// Fills unset credentials from the environment.
    #[must_use]
    pub fn with_env_fallback(self) -> Self {
        let env = Self::from_env();
        Self {
            gemini: self.gemini.or(env.gemini),
            huggingface: self.huggingface.or(env.huggingface),
            openrouter: self.openrouter.or(env.openrouter),
        }
    }

    /// Returns the credential for an engine slot.
    #[must_use]
    pub const fn for_engine(&self, kind: EngineKind) -> Option<&SecretString> {
        match kind {
            EngineKind::Gemini => self.gemini.as_ref(),
            EngineKind::HuggingFace => self.huggingface.as_ref(),
            EngineKind::OpenRouter => self.openrouter.as_ref(),
            EngineKind::LocalDetector | EngineKind::LocalHeuristic => None,
        }
    }

    /// Returns true if a credential is configured for the engine slot.
    #[must_use]
    pub fn has(&self, kind: EngineKind) -> bool {
        self.for_engine(kind).is_some()
    }
}

impl Clone for EngineCredentials {
    fn clone(&self) -> Self {
        Self {
            gemini: self.gemini.as_ref().map(copy_secret),
            huggingface: self.huggingface.as_ref().map(copy_secret),
            openrouter: self.openrouter.as_ref().map(copy_secret),
        }
    }
}

/// Wraps a non-blank string as a secret.
pub(crate) fn secret(value: &str) -> Option<SecretString> {
    let value = value.trim();
    (!value.is_empty()).then(|| SecretString::from(value.to_string()))
}

fn copy_secret(value: &SecretString) -> SecretString {
    SecretString::from(value.expose_secret().to_string())
}

fn env_secret(names: &[&str]) -> Option<SecretString> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().and_then(|v| secret(&v)))
}
