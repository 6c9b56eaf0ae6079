// Shared prompt fragments.
// Each service that calls Gemini keeps its own templates alongside it;
// this file holds the instructions every image request repeats.

/// Appended to every image-producing request.
pub const IMAGE_ONLY_INSTRUCTION: &str = "Only return the image.";

/// Identity rules for headshot generation.
pub const IDENTITY_PRESERVATION: &str = "\
IMPORTANT:
- Maintain the person's exact facial features and likeness (identity preservation is critical).
- Upgrade clothing, lighting, and background to look like a high-end studio photo (8k resolution, photorealistic).
- Ensure natural skin texture (avoid plastic/smooth skin).
- NO cartoons, NO illustrations, NO distorted features, NO artifacts.";

/// System prompt for structured answers: JSON only, no prose.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise vision assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences.";
