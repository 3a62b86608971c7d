//! Caller-facing services.
//!
//! The router answers whole-frame questions through the engine cascade; the
//! decision engine and safety gate turn pipeline output into something safe
//! to say out loud.

mod cascade;
mod decision;
mod safety;
mod voice;

pub use cascade::VisionRouter;
pub use decision::{Decision, DecisionEngine, DecisionKind, RiskLevel};
pub use safety::{GateResult, SafetyGate, SafetyRating};
pub use voice::{VoiceIntent, VoiceIntentKind, VoiceResponse, classify_intent};
