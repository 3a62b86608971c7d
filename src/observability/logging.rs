//! Structured logging configuration.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a log filter directive.
pub const LOG_ENV_VAR: &str = "VISUALKY_LOG";

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive (`info`, `visualky=debug`, ...).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Applies `VISUALKY_LOG` and `VISUALKY_LOG_FORMAT` overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var(LOG_ENV_VAR) {
            if !level.trim().is_empty() {
                self.level = level;
            }
        }
        if let Ok(format) = std::env::var("VISUALKY_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        self
    }

    /// Raises the level to `debug` when verbose output is requested.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }

    /// Builds the event filter.
    ///
    /// `RUST_LOG` takes precedence over the configured level.
    #[must_use]
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}
