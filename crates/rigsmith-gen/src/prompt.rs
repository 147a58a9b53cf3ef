//! Prompt templates sent to the image, text and video models

use crate::parts::PartKind;
use rigsmith_catalog::LayerDefinition;

/// Used when the text model returns an empty description
pub const DEFAULT_DESCRIPTION: &str = "Anime character";

pub const DEFAULT_ANIMATION_PROMPT: &str =
    "Natural breathing, gentle blinking, slight head movement, looking at camera, looping video.";

pub const DETECT_PROMPT: &str = "Return the bounding box of the main character's full body in the image. Return as a JSON array of integers: [ymin, xmin, ymax, xmax] on a 0-1000 scale.";

pub const DESCRIBE_PROMPT: &str = "Describe this character in detail for the purpose of regenerating a high-quality production asset. Include hair color, style, eye color, clothing details, and expression. Output a single paragraph or comma-separated list.";

pub const ANALYZE_PROMPT: &str = "Analyze this character image. 1. Return the bounding box of the face area (from top of forehead to chin, ear to ear). 2. Provide short rigging recommendations.";

/// Clean, front-facing full-body master image
pub fn master_prompt(description: &str) -> String {
    format!(
        "(Masterpiece), (Best Quality), (Vector Art), (White Background), (Front View), {}, full body standing, neutral pose, flat coloring, anime style.",
        description.trim()
    )
}

/// One isolated rigging part in the style of `description`
pub fn part_prompt(part: PartKind, description: &str) -> String {
    format!(
        "(Vector Asset), (White Background), (Isolated), {}. Style based on: {}. Exclude: {}.",
        part.subject().trim_end_matches('.'),
        description.trim(),
        part.exclusions()
    )
}

/// A catalog layer in the global style, whitespace collapsed
pub fn layer_prompt(definition: &LayerDefinition, style: &str) -> String {
    let exclude = definition
        .negative_prompt
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| format!("Exclude: {}.", n))
        .unwrap_or_default();

    let prompt = format!(
        "(Vector Asset:1.5), (White Background:1.5), Style: {}. Subject: {}. Ensure this is an isolated element. {} Clean lines, high quality, anime production material.",
        style, definition.prompt, exclude
    );
    collapse_whitespace(&prompt)
}

/// Character reference sheet for the `character` command
pub fn character_sheet_prompt(prompt: &str) -> String {
    format!(
        "Anime style character reference sheet, white background, high quality, vtuber model, detailed, {}",
        prompt.trim()
    )
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigsmith_catalog::LayerId;

    fn definition(negative: Option<&str>) -> LayerDefinition {
        LayerDefinition {
            id: LayerId::new("Mouth/Mouth_A"),
            required: true,
            z_order: 35,
            label: "Mouth (A)".to_string(),
            label_ja: None,
            prompt: "anime open mouth,\n  saying 'ah'".to_string(),
            negative_prompt: negative.map(str::to_string),
        }
    }

    #[test]
    fn test_layer_prompt_collapses_whitespace() {
        let prompt = layer_prompt(&definition(Some("face, skin")), "pastel   watercolor");
        assert_eq!(
            prompt,
            "(Vector Asset:1.5), (White Background:1.5), Style: pastel watercolor. Subject: anime open mouth, saying 'ah'. Ensure this is an isolated element. Exclude: face, skin. Clean lines, high quality, anime production material."
        );
    }

    #[test]
    fn test_layer_prompt_without_negative() {
        let prompt = layer_prompt(&definition(None), "cel shaded");
        assert!(!prompt.contains("Exclude"));
        assert!(!prompt.contains("  "));
    }

    #[test]
    fn test_part_prompt() {
        let prompt = part_prompt(PartKind::Mouth, "silver hair, red eyes");
        assert_eq!(
            prompt,
            "(Vector Asset), (White Background), (Isolated), Anime mouth (lips and open mouth). Floating. No face skin. Style based on: silver hair, red eyes. Exclude: eyes, nose, face skin, hair."
        );
    }

    #[test]
    fn test_master_prompt() {
        let prompt = master_prompt(" twin tails ");
        assert!(prompt.starts_with("(Masterpiece)"));
        assert!(prompt.contains("(Front View), twin tails, full body standing"));
    }
}
