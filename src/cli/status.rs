//! Status and safety gate commands.

use super::factory::build_router;
use crate::config::VisionConfig;
use crate::models::{EngineKind, EngineStatus};
use crate::services::{GateResult, SafetyGate};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Engine availability report.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Crate version.
    pub version: &'static str,
    /// Availability after initialization.
    pub engines: EngineStatus,
    /// Whether a credential is configured per credentialed slot.
    pub credentials: BTreeMap<EngineKind, bool>,
    /// Endpoint of every engine that makes network calls.
    pub remote_endpoints: BTreeMap<EngineKind, String>,
    /// Acceptance floor per gated engine.
    pub min_confidence: BTreeMap<EngineKind, f32>,
    /// Per-engine time budget in milliseconds.
    pub engine_timeout_ms: u128,
}

/// Initializes the cascade used by `analyze` and reports its availability.
///
/// # Errors
///
/// Returns an error if the engine set is invalid.
pub async fn cmd_status(config: &VisionConfig) -> Result<StatusReport> {
    let router = build_router(config).await?;
    let engines = router.engine_status();
    let credentials = EngineKind::all()
        .iter()
        .filter(|kind| kind.takes_credential())
        .map(|kind| (*kind, config.credentials.has(*kind)))
        .collect();

    Ok(StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        engines,
        credentials,
        remote_endpoints: router.remote_endpoints(),
        min_confidence: config.cascade.min_confidence.clone(),
        engine_timeout_ms: config.cascade.engine_timeout.as_millis(),
    })
}

/// Rates evidence for a target.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the confidence is outside `[0, 1]`.
pub fn cmd_gate(
    config: &VisionConfig,
    target: &str,
    confidence: f32,
    label: Option<&str>,
) -> Result<GateResult> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(Error::InvalidInput(format!(
            "confidence must be in [0, 1], got {confidence}"
        )));
    }
    Ok(SafetyGate::new(config.safety.clone()).evaluate_evidence(target, confidence, label))
}
