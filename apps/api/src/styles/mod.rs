//! Headshot style presets and suggested edit prompts.

use rand::seq::IndexedRandom;
use serde::Serialize;

/// A named preset bundling the generation prompt with a preview image.
#[derive(Debug, Clone, Serialize)]
pub struct HeadshotStyle {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub preview_url: &'static str,
    pub prompt: &'static str,
}

pub static HEADSHOT_STYLES: [HeadshotStyle; 4] = [
    HeadshotStyle {
        id: "corporate-grey",
        name: "Corporate Studio",
        description: "Clean grey backdrop with soft professional studio lighting.",
        preview_url: "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=400&h=400&fit=crop",
        prompt: "A professional high-end corporate headshot, solid soft grey studio backdrop, \
            wearing formal business attire, soft cinematic studio lighting, sharp focus, \
            8k resolution, professional photography.",
    },
    HeadshotStyle {
        id: "tech-office",
        name: "Modern Tech",
        description: "Modern glass office background with bright natural light.",
        preview_url: "https://images.unsplash.com/photo-1573496359142-b8d87734a5a2?w=400&h=400&fit=crop",
        prompt: "A modern professional headshot in a bright tech office with glass partitions \
            and soft bokeh greenery in the background, smart casual attire, natural daytime \
            lighting, modern professional aesthetic.",
    },
    HeadshotStyle {
        id: "outdoor-natural",
        name: "Outdoor Lifestyle",
        description: "Soft blurred city or park background with warm sunlight.",
        preview_url: "https://images.unsplash.com/photo-1500648767791-00dcc994a43e?w=400&h=400&fit=crop",
        prompt: "An outdoor professional lifestyle headshot, blurred urban park background, \
            warm golden hour natural lighting, wearing a stylish blazer, friendly and \
            approachable expression, high depth of field.",
    },
    HeadshotStyle {
        id: "dark-minimal",
        name: "Executive Dark",
        description: "Moody, high-contrast lighting with a dark professional background.",
        preview_url: "https://images.unsplash.com/photo-1560250097-0b93528c311a?w=400&h=400&fit=crop",
        prompt: "Executive dramatic headshot, dark charcoal textured background, high contrast \
            Rembrandt lighting, sharp professional focus, wearing a dark suit, powerful and \
            sophisticated atmosphere.",
    },
];

/// Edit prompts offered to users who don't know what to ask for.
pub const SUGGESTED_PROMPTS: [&str; 5] = [
    "Make me look more confident and approachable",
    "Change the background to a modern office blur",
    "Fix the lighting to be more even",
    "Make my suit dark navy blue",
    "Remove the glare from my glasses",
];

const SUGGESTIONS_SHOWN: usize = 3;

pub fn find_style(id: &str) -> Option<&'static HeadshotStyle> {
    HEADSHOT_STYLES.iter().find(|s| s.id == id)
}

/// Three distinct suggestions in random order.
pub fn random_suggestions() -> Vec<&'static str> {
    SUGGESTED_PROMPTS
        .choose_multiple(&mut rand::rng(), SUGGESTIONS_SHOWN)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_style_ids_are_unique() {
        let ids: HashSet<_> = HEADSHOT_STYLES.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), HEADSHOT_STYLES.len());
    }

    #[test]
    fn test_find_style() {
        assert_eq!(find_style("tech-office").unwrap().name, "Modern Tech");
        assert!(find_style("watercolour").is_none());
    }

    #[test]
    fn test_random_suggestions_are_distinct_known_prompts() {
        let picked = random_suggestions();
        assert_eq!(picked.len(), 3);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(picked.iter().all(|p| SUGGESTED_PROMPTS.contains(p)));
    }
}
