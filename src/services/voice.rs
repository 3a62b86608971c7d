//! Voice command intent classification.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::models::{EngineKind, TaskMode};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Phrases that introduce a search target.
static TARGET_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"find|where is|looking for").expect("static regex: target markers"));

/// Intent of a spoken command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceIntentKind {
    /// Identify the item in front of the camera.
    Scan,
    /// Look for a named item.
    Find,
    /// Describe the environment.
    Surroundings,
    /// Remember an item.
    Learn,
    /// Look behind the user.
    Behind,
    /// Anything else.
    General,
}

/// Ordered keyword rules; the first rule with a matching keyword wins.
const INTENT_RULES: [(VoiceIntentKind, &[&str]); 5] = [
    (VoiceIntentKind::Scan, &["scan", "what is this"]),
    (VoiceIntentKind::Find, &["find", "where is", "looking for"]),
    (
        VoiceIntentKind::Surroundings,
        &["surroundings", "around me", "what do you see"],
    ),
    (VoiceIntentKind::Learn, &["remember", "learn"]),
    (VoiceIntentKind::Behind, &["behind", "back"]),
];

impl VoiceIntentKind {
    /// Returns the intent as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Find => "find",
            Self::Surroundings => "surroundings",
            Self::Learn => "learn",
            Self::Behind => "behind",
            Self::General => "general",
        }
    }

    /// Task mode the intent switches to, if any.
    #[must_use]
    pub const fn suggested_mode(&self) -> Option<TaskMode> {
        match self {
            Self::Scan => Some(TaskMode::Scan),
            Self::Find => Some(TaskMode::Shopping),
            Self::Surroundings | Self::Behind => Some(TaskMode::Surroundings),
            Self::Learn => Some(TaskMode::Learning),
            Self::General => None,
        }
    }
}

impl fmt::Display for VoiceIntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified voice command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceIntent {
    /// Intent kind.
    pub kind: VoiceIntentKind,
    /// Search target for [`VoiceIntentKind::Find`].
    pub target: Option<String>,
}

impl VoiceIntent {
    /// Fixed spoken acknowledgment used when no cloud engine answers.
    #[must_use]
    pub fn fallback_response(&self) -> String {
        match (self.kind, self.target.as_deref()) {
            (VoiceIntentKind::Scan, _) => {
                "I'll scan that for you now. Point the camera at the item and hold steady.".to_string()
            },
            (VoiceIntentKind::Find, Some(target)) => format!(
                "Looking for {target}. I'll guide you as you pan the camera across the shelves."
            ),
            (VoiceIntentKind::Find, None) => {
                "What product are you looking for? I'll help you find it.".to_string()
            },
            (VoiceIntentKind::Surroundings, _) => {
                "Let me describe what's around you. I'm analyzing your surroundings now.".to_string()
            },
            (VoiceIntentKind::Learn, _) => {
                "Show me the item you want to remember, and I'll save its details.".to_string()
            },
            (VoiceIntentKind::Behind, _) => "To see what's behind you, slowly turn around 180 degrees \
                 and I'll scan that area."
                .to_string(),
            (VoiceIntentKind::General, _) => "I'm here to help. You can ask me to scan items, \
                 describe surroundings, or find products."
                .to_string(),
        }
    }
}

/// Classifies a transcript by ordered keyword rules.
///
/// Matching is case-insensitive and by substring. For find commands the
/// target is the text between the first target marker (`find`, `where is`,
/// `looking for`) and the next one, trimmed: "find my keys" yields
/// "my keys".
#[must_use]
pub fn classify_intent(transcript: &str) -> VoiceIntent {
    let lower = transcript.to_lowercase();
    let kind = INTENT_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or(VoiceIntentKind::General, |(kind, _)| *kind);

    let target = if kind == VoiceIntentKind::Find {
        extract_target(&lower)
    } else {
        None
    };
    VoiceIntent { kind, target }
}

fn extract_target(lower: &str) -> Option<String> {
    let mut markers = TARGET_MARKERS.find_iter(lower);
    let start = markers.next()?.end();
    let end = markers.next().map_or(lower.len(), |m| m.start());
    let target = lower[start..end]
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim();
    (!target.is_empty()).then(|| target.to_string())
}

/// Reply to a voice command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceResponse {
    /// Spoken acknowledgment.
    pub response_text: String,
    /// Classified intent.
    pub intent: VoiceIntentKind,
    /// Search target, for find commands.
    pub target: Option<String>,
    /// Mode the caller should switch to, when it differs from the current one.
    pub suggested_mode: Option<TaskMode>,
    /// Mode in effect after the command.
    pub mode: TaskMode,
    /// Engine that phrased the acknowledgment; `None` for the fixed text.
    pub engine: Option<EngineKind>,
}
