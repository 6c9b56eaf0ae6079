// Headshot generation: prompt templates, the pluggable generator, the four-way fan-out.
// All Gemini calls go through gemini_client; nothing here talks HTTP directly.

pub mod generator;
pub mod prompts;

pub use generator::{generate_variations, GeminiHeadshotGenerator, HeadshotGenerator, Variation};
