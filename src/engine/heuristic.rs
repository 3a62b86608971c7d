//! Last-resort local engine.

use super::image_stats::ImageStats;
use super::{EngineReply, VisionPrompt};
use crate::models::{ImageInput, TaskMode};

/// Always-available engine built on pixel statistics.
///
/// Unlike the [`super::VisionEngine`] implementations this engine has no
/// failure path: frames it cannot decode get a fixed per-mode template.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEngine;

impl HeuristicEngine {
    /// Model identifier reported in metadata.
    pub const MODEL: &'static str = "local-image-statistics";

    /// Confidence of a statistics-based description.
    pub const STATS_CONFIDENCE: f32 = 0.72;

    /// Confidence of the fixed template.
    pub const TEMPLATE_CONFIDENCE: f32 = 0.5;

    /// Creates the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Describes the frame.
    #[must_use]
    pub fn analyze(&self, image: &ImageInput, prompt: &VisionPrompt) -> EngineReply {
        match image.decode() {
            Ok(decoded) => {
                let stats = ImageStats::from_image(&decoded);
                EngineReply::new(
                    describe(&stats, prompt),
                    Self::STATS_CONFIDENCE,
                    Self::MODEL,
                )
            },
            Err(e) => {
                tracing::debug!(error = %e, "Frame not decodable; using template description");
                EngineReply::new(
                    template(prompt),
                    Self::TEMPLATE_CONFIDENCE,
                    Self::MODEL,
                )
            },
        }
    }
}

fn describe(stats: &ImageStats, prompt: &VisionPrompt) -> String {
    let colors = stats.colors.dominant(3).join(", ");
    let category = stats.estimate_category();
    let texture = stats.texture_word();
    let definition = stats.definition_word();

    match (prompt.mode, prompt.query.as_deref()) {
        (TaskMode::Shopping, Some(target)) => format!(
            "Analyzing for {target}. I detect a {colors} colored item in the center of your view \
             with a {texture} surface and {definition} edges. Category: {category}. \
             Adjust the camera position for a better match."
        ),
        (TaskMode::Surroundings, _) => format!(
            "I detect a {category} with {colors} coloring in the center of your view. \
             The surface appears {texture} with {definition} definition. \
             Objects to the left and right, near or far, need a clearer frame."
        ),
        (TaskMode::Learning, _) => format!(
            "Capturing: a {category} with a {colors} profile, centered in the frame. \
             Surface texture: {texture}. This profile will help identify similar items."
        ),
        _ => format!(
            "I see a {category} with {colors} colors and a {texture} appearance in the center \
             of your view. The item has {definition} visual definition."
        ),
    }
}

fn template(prompt: &VisionPrompt) -> String {
    match prompt.mode {
        TaskMode::Scan => "I'm analyzing the item you're showing me. It appears to be a packaged \
             product in the center of your view. For brand, colors and details, ensure good lighting \
             and hold the camera steady for 2-3 seconds."
            .to_string(),
        TaskMode::Surroundings => "I can see your surroundings. There appear to be several objects \
             around you. I'll describe what I see to the left, center and right, near and far, \
             once the frame is clearer."
            .to_string(),
        TaskMode::Shopping => format!(
            "I'm searching for {}. Please slowly pan your camera across the shelves. \
             I'll alert you when I detect a potential match.",
            prompt.query.as_deref().unwrap_or("the item you mentioned")
        ),
        TaskMode::Learning => "I'm capturing the details of this item to remember it for you, \
             noting its colors, visual features and any text. This will help me recognize it \
             when you show it to me again."
            .to_string(),
        TaskMode::Conversation => "I'm here to help you with shopping and navigation. You can ask \
             me to scan products, describe your surroundings, or help you find specific items."
            .to_string(),
        TaskMode::Standby => "I'm ready to assist you. You can ask me to scan a product, describe \
             your surroundings, help you shop, or remember an item for later. What would you like \
             me to do?"
            .to_string(),
    }
}
