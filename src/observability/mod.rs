//! Observability and telemetry.
//!
//! Library code emits `tracing` events and spans plus `metrics` counters;
//! this module only installs the subscriber. No metrics exporter is
//! installed here, so counters are no-ops unless the host registers a
//! recorder.

mod logging;

pub use logging::{LOG_ENV_VAR, LogFormat, LoggingConfig};

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global tracing subscriber.
///
/// Events are written to stderr so that command output on stdout stays
/// machine-readable.
///
/// # Errors
///
/// Returns an error if observability has already been initialized.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "observability already initialized".to_string(),
        });
    }

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true),
                )
                .with(config.filter())
                .try_init()
                .map_err(init_error)?;
        },
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .with(config.filter())
                .try_init()
                .map_err(init_error)?;
        },
    }

    let _ = OBSERVABILITY_INIT.set(());
    Ok(())
}

/// Helper to convert init errors.
#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: e.to_string(),
    }
}
