// Prompt templates for headshot generation and edits.
// Shared fragments live in gemini_client::prompts.

use crate::gemini_client::prompts::{IDENTITY_PRESERVATION, IMAGE_ONLY_INSTRUCTION};

/// Replace `{style_prompt}` and `{modifier}` before sending.
pub const GENERATION_PROMPT_TEMPLATE: &str = "Please transform this casual photo into a professional headshot. \
Use the following style description: {style_prompt}. \
Lighting variation: {modifier}.";

/// Replace `{edit_prompt}` before sending.
pub const EDIT_PROMPT_TEMPLATE: &str = "Based on this professional headshot, perform the following modification: {edit_prompt}. \
Ensure the person's facial likeness remains consistent.";

pub fn build_generation_prompt(style_prompt: &str, modifier: &str) -> String {
    let head = GENERATION_PROMPT_TEMPLATE
        .replace("{style_prompt}", style_prompt.trim())
        .replace("{modifier}", modifier.trim());
    format!("{head}\n\n{IDENTITY_PRESERVATION}\n- {IMAGE_ONLY_INSTRUCTION}")
}

pub fn build_edit_prompt(edit_prompt: &str) -> String {
    let head = EDIT_PROMPT_TEMPLATE.replace("{edit_prompt}", edit_prompt.trim());
    format!("{head} {IMAGE_ONLY_INSTRUCTION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_carries_style_and_modifier() {
        let prompt = build_generation_prompt("grey backdrop", "high contrast dramatic lighting");
        assert!(prompt.contains("style description: grey backdrop."));
        assert!(prompt.contains("Lighting variation: high contrast dramatic lighting."));
        assert!(prompt.contains("identity preservation is critical"));
        assert!(prompt.ends_with("Only return the image."));
    }

    #[test]
    fn test_edit_prompt_trims_user_text() {
        let prompt = build_edit_prompt("  make my suit dark navy blue \n");
        assert!(prompt.contains("modification: make my suit dark navy blue."));
        assert!(prompt.ends_with("Only return the image."));
    }
}
