//! Mode-specific prompt templates.
//!
//! Every template carries the same content contract: the answer must name the
//! object types, their colors and their relative position (left/center/right,
//! near/far). Remote adapters send [`VisionPrompt::text`] verbatim; local
//! engines honour the same contract when composing their own descriptions.

use crate::models::TaskMode;

/// Section markers every generated prompt must contain.
pub const REQUIRED_SECTIONS: [&str; 3] = ["OBJECTS", "COLORS", "SPATIAL"];

/// Position vocabulary every generated prompt must mention.
pub const SPATIAL_TERMS: [&str; 5] = ["left", "center", "right", "near", "far"];

/// Shared preamble carrying the content contract.
pub const BASE_PROMPT: &str = r#"You are an assistant describing camera frames for a blind or low-vision user. Analyze this image and respond conversationally.

CRITICAL: ALWAYS include in your response:
1. OBJECTS: Identify specific objects (e.g. "ceramic mug", "plastic bottle", "cardboard box")
2. COLORS: Describe all visible colors (e.g. "red and white", "blue packaging", "green label")
3. SPATIAL: Describe where each object is: left, center or right of the frame, and near or far from the camera

Format: "[OBJECT] with [COLORS] located [POSITION]""#;

const SCAN_TASK: &str = r#"TASK: Product identification

Include:
1. Object type (e.g. "ceramic coffee mug", "plastic water bottle")
2. All visible colors (e.g. "white body with blue handle and red logo")
3. Any visible text, logos or brand names
4. Product category (food, beverage, household, electronics, ...)
5. Size, shape and distinctive characteristics
6. Any visible warnings, allergens or usage instructions

Example: "I can see a [COLOR] [OBJECT] in the center, close to the camera. It's a [BRAND] [PRODUCT] with [COLOR] [FEATURES]. I can read [TEXT].""#;

const SHOPPING_TASK: &str = r#"TASK: Product search and location guidance

Include:
1. Whether the target is visible (YES/NO)
2. If found: its colors, its position (left/center/right, near/far, shelf level) and how to reach it
3. If not found: every visible object with its color and position, and where to look next

Example: "FOUND: a [COLOR] [TARGET] on the right, near you. Reach forward and slightly right." or "NOT VISIBLE: I see a [COLOR] [OBJECT] on the left and a [COLOR] [OBJECT] in the center, far away. Try panning right.""#;

const SURROUNDINGS_TASK: &str = r#"TASK: Spatial awareness

Include:
1. Every visible object with its color
2. Its position using left, center, right, near and far
3. Clear paths and obstacles
4. Potential hazards (stairs, curbs, traffic, wet floors)
5. The type of environment (store aisle, room, street, ...)

Example: "On the LEFT, near you, a [COLOR] [OBJECT]. In the CENTER, far away, a [COLOR] [OBJECT]. On the RIGHT, a [COLOR] [OBJECT]. The path ahead is [CLEAR/BLOCKED].""#;

const LEARNING_TASK: &str = r#"TASK: Item memory profile

Include:
1. Specific item name
2. Every visible color in detail
3. Distinctive features (logos, patterns, text, shape)
4. Approximate size and form
5. Where the item sits in the frame (left/center/right, near/far)
6. Cues to recognize this item later

Example: "Capturing profile: a [COLOR] [OBJECT] in the center, close up. Distinctive features: [FEATURES].""#;

const CONVERSATION_TASK: &str = r#"TASK: Answer the user's question with a complete visual description

Include:
1. A direct answer to the question
2. The visible objects with their colors
3. Where things are (left/center/right, near/far)

Example: "[ANSWER]. I can see [COLOR] [OBJECTS] on the [POSITION].""#;

const STANDBY_TASK: &str = r#"TASK: General scene overview

Include:
1. The main objects with their colors
2. The kind of environment
3. The general layout (left/center/right, near/far)
4. What the user can ask next

Example: "I can see [COLOR] [OBJECTS] in what looks like a [LOCATION]. [LAYOUT].""#;

/// A fully rendered prompt for one cascade call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionPrompt {
    /// Task mode the prompt was built for.
    pub mode: crate::models::TaskMode,
    /// User hint, if any.
    pub query: Option<String>,
    /// Prompt text sent to remote engines.
    pub text: String,
}

impl VisionPrompt {
    /// Builds the prompt for a mode and optional user query.
    #[must_use]
    pub fn new(mode: TaskMode, query: Option<&str>) -> Self {
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(ToString::to_string);
        let text = build_prompt(mode, query.as_deref());
        Self { mode, query, text }
    }

    /// Returns the user query, or an empty string.
    #[must_use]
    pub fn query_or_empty(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

/// Renders the prompt text for a mode and optional user query.
#[must_use]
pub fn build_prompt(mode: TaskMode, query: Option<&str>) -> String {
    let task = match mode {
        TaskMode::Scan => SCAN_TASK,
        TaskMode::Shopping => SHOPPING_TASK,
        TaskMode::Surroundings => SURROUNDINGS_TASK,
        TaskMode::Learning => LEARNING_TASK,
        TaskMode::Conversation => CONVERSATION_TASK,
        TaskMode::Standby => STANDBY_TASK,
    };

    let query_line = match (mode, query) {
        (_, None) => String::new(),
        (TaskMode::Shopping, Some(q)) => format!("\n\nTARGET: The user is looking for \"{q}\""),
        (TaskMode::Conversation, Some(q)) => format!("\n\nUser asked: \"{q}\""),
        (_, Some(q)) => format!("\n\nUser's question: \"{q}\""),
    };

    format!("{BASE_PROMPT}\n\n{task}{query_line}")
}

/// Returns true if the prompt carries the object/color/position contract.
#[must_use]
pub fn satisfies_content_contract(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    REQUIRED_SECTIONS.iter().all(|section| prompt.contains(section))
        && SPATIAL_TERMS.iter().all(|term| lower.contains(term))
}

/// Builds the prompt for a short spoken acknowledgment of a voice command.
#[must_use]
pub fn build_voice_prompt(transcript: &str, mode: TaskMode, intent: &str) -> String {
    format!(
        "You are a helpful assistant for a blind person.\n\n\
         Current mode: {mode}\n\
         User said: \"{transcript}\"\n\
         Detected intent: {intent}\n\n\
         Generate a brief, natural spoken response (1-2 sentences) that:\n\
         1. Acknowledges their request\n\
         2. Explains what you're doing or what they should do next\n\
         3. Sounds conversational and helpful\n\n\
         Be concise but warm."
    )
}

/// Color words recognized in free text.
const COLOR_WORDS: [&str; 16] = [
    "red", "blue", "green", "yellow", "orange", "purple", "pink", "brown", "black", "white",
    "gray", "grey", "silver", "gold", "beige", "tan",
];

/// Extracts color words mentioned in free text, in vocabulary order.
#[must_use]
pub fn extract_colors(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    COLOR_WORDS
        .iter()
        .copied()
        .filter(|color| words.contains(color))
        .collect()
}

/// Formats a bare image caption into a mode-specific answer that still honours
/// the content contract.
#[must_use]
pub fn format_caption(caption: &str, prompt: &VisionPrompt) -> String {
    let caption = caption.trim();
    let colors = extract_colors(caption);
    let color_desc = if colors.is_empty() {
        "various colors".to_string()
    } else {
        colors.join(", ")
    };

    match prompt.mode {
        TaskMode::Scan => format!(
            "I can see: {caption}. This appears to be an item with {color_desc}. \
             The object is in the center of your view, close to the camera."
        ),
        TaskMode::Shopping => {
            let target = prompt.query_or_empty();
            if !target.is_empty() && caption.to_lowercase().contains(&target.to_lowercase()) {
                format!(
                    "FOUND: I can see {caption}. This matches your search for \"{target}\". \
                     It has {color_desc} and is in the center of your view, within reach."
                )
            } else {
                let target = if target.is_empty() { "the item" } else { target };
                format!(
                    "Searching for {target}... Currently visible in the center: {caption}, \
                     with {color_desc}. This doesn't appear to be your target. \
                     Keep panning left or right."
                )
            }
        },
        TaskMode::Surroundings => format!(
            "In your surroundings: {caption}. I can see objects with {color_desc}, \
             mostly in the center of your view. Pan left or right, or move forward, to explore more."
        ),
        TaskMode::Learning => format!(
            "Capturing item profile: {caption}, in the center of the frame. \
             Colors detected: {color_desc}. This visual signature will help me recognize it later."
        ),
        TaskMode::Conversation | TaskMode::Standby => {
            let question = prompt
                .query
                .as_deref()
                .map(|q| format!(" Regarding your question \"{q}\": the image shows these characteristics."))
                .unwrap_or_default();
            format!("{caption}. I can see {color_desc} in the center of the image.{question}")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mode_satisfies_contract() {
        for mode in TaskMode::all() {
            let prompt = build_prompt(*mode, None);
            assert!(
                satisfies_content_contract(&prompt),
                "prompt for {mode} misses required content"
            );
        }
    }

    #[test]
    fn test_shopping_prompt_names_target() {
        let prompt = VisionPrompt::new(TaskMode::Shopping, Some(" cereal "));
        assert!(prompt.text.contains("TARGET: The user is looking for \"cereal\""));
        assert_eq!(prompt.query.as_deref(), Some("cereal"));
    }

    #[test]
    fn test_blank_query_dropped() {
        let prompt = VisionPrompt::new(TaskMode::Conversation, Some("   "));
        assert!(prompt.query.is_none());
        assert!(!prompt.text.contains("User asked"));
    }

    #[test]
    fn test_extract_colors_whole_words_only() {
        assert_eq!(
            extract_colors("A red mug next to a Blue bottle"),
            vec!["red", "blue"]
        );
        assert!(extract_colors("a tangerine and a bored cat").is_empty());
    }

    #[test]
    fn test_format_caption_shopping_found() {
        let prompt = VisionPrompt::new(TaskMode::Shopping, Some("bottle"));
        let text = format_caption("a green bottle on a shelf", &prompt);
        assert!(text.starts_with("FOUND"));
        assert!(text.contains("green"));
    }

    #[test]
    fn test_format_caption_shopping_not_found() {
        let prompt = VisionPrompt::new(TaskMode::Shopping, Some("keys"));
        let text = format_caption("a green bottle on a shelf", &prompt);
        assert!(text.starts_with("Searching for keys"));
    }

    #[test]
    fn test_voice_prompt_mentions_intent() {
        let prompt = build_voice_prompt("find my keys", TaskMode::Standby, "find");
        assert!(prompt.contains("Detected intent: find"));
        assert!(prompt.contains("User said: \"find my keys\""));
    }
}
