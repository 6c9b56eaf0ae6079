//! Headshot generation — pluggable generator plus the fixed variation fan-out.
//!
//! `AppState` holds an `Arc<dyn HeadshotGenerator>`. Production uses
//! `GeminiHeadshotGenerator`; handler tests swap in a stub.

use std::time::Instant;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::info;

use crate::gemini_client::{GeminiClient, GeminiError};
use crate::generation::prompts::{build_edit_prompt, build_generation_prompt};
use crate::imaging::ImageData;
use crate::styles::HeadshotStyle;

/// One generation request is issued per modifier, concurrently.
pub const LIGHTING_MODIFIERS: [&str; 4] = [
    "soft studio lighting, balanced contrast",
    "neutral professional lighting, sharp focus",
    "high contrast dramatic lighting",
    "warm ambient lighting, soft bokeh",
];

/// A generated image and the lighting modifier that produced it.
#[derive(Debug, Clone)]
pub struct Variation {
    pub modifier: &'static str,
    pub image: ImageData,
}

#[async_trait]
pub trait HeadshotGenerator: Send + Sync {
    /// Turns a source selfie into a studio headshot.
    async fn generate(
        &self,
        source: &ImageData,
        style_prompt: &str,
        modifier: &str,
    ) -> Result<ImageData, GeminiError>;

    /// Applies a natural-language modification to an existing headshot.
    async fn edit(&self, headshot: &ImageData, edit_prompt: &str)
        -> Result<ImageData, GeminiError>;
}

pub struct GeminiHeadshotGenerator(pub GeminiClient);

#[async_trait]
impl HeadshotGenerator for GeminiHeadshotGenerator {
    async fn generate(
        &self,
        source: &ImageData,
        style_prompt: &str,
        modifier: &str,
    ) -> Result<ImageData, GeminiError> {
        let prompt = build_generation_prompt(style_prompt, modifier);
        self.0.transform_image(source, &prompt).await
    }

    async fn edit(
        &self,
        headshot: &ImageData,
        edit_prompt: &str,
    ) -> Result<ImageData, GeminiError> {
        let prompt = build_edit_prompt(edit_prompt);
        self.0.transform_image(headshot, &prompt).await
    }
}

/// Generates one variation per `LIGHTING_MODIFIERS` entry, concurrently.
///
/// All-or-nothing: the first failure is returned and the remaining in-flight
/// requests are dropped. Output order follows `LIGHTING_MODIFIERS`.
pub async fn generate_variations(
    generator: &dyn HeadshotGenerator,
    source: &ImageData,
    style: &HeadshotStyle,
) -> Result<Vec<Variation>, GeminiError> {
    info!(
        "Generating {} variations for style '{}'",
        LIGHTING_MODIFIERS.len(),
        style.id
    );
    let started = Instant::now();

    let requests = LIGHTING_MODIFIERS.iter().map(|&modifier| async move {
        let image = generator.generate(source, style.prompt, modifier).await?;
        Ok::<_, GeminiError>(Variation { modifier, image })
    });
    let variations = try_join_all(requests).await?;

    info!(
        "Generated {} variations in {}ms",
        variations.len(),
        started.elapsed().as_millis()
    );
    Ok(variations)
}
