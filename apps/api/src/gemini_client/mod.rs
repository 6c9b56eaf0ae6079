/// Gemini Client — the single point of entry for all generative-image API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All generation, editing and detection requests MUST go through this module.
///
/// Models are hardcoded to keep prompt behaviour stable across deployments.
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::imaging::ImageData;

pub mod prompts;

/// Image-in, image-out model used for generation and edits.
pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
/// Multimodal text model used for structured (JSON) answers about an image.
pub const VISION_MODEL: &str = "gemini-2.5-flash";
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// First retry delay; doubles on each further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model unavailable for this key or region: {0}")]
    ModelUnavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service overloaded: {0}")]
    Overloaded(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("No image data returned from Gemini")]
    NoImage,

    #[error("Gemini returned empty content")]
    EmptyContent,
}

impl GeminiError {
    /// The static message shown to end users for this failure.
    pub fn user_message(&self) -> String {
        match self {
            GeminiError::ModelUnavailable(_) => "Model Availability Error: This specific AI model \
                (Gemini 2.5 Flash Image) appears to be restricted for your API key or region. \
                Please check your Google AI Studio project settings or try a different key."
                .to_string(),
            GeminiError::RateLimited(_) => "Rate Limit Exceeded: You've hit the free tier quota. \
                Please wait about 60 seconds and try your request again."
                .to_string(),
            GeminiError::Overloaded(_) => "AI Studio is currently experiencing heavy load. \
                Please try again in a few moments."
                .to_string(),
            GeminiError::InvalidApiKey => "Invalid API Key: Please check your configuration \
                and ensure your API key is correct."
                .to_string(),
            GeminiError::NoImage => "No image data returned from Gemini".to_string(),
            GeminiError::Api { message, .. } => generic_message(message),
            other => generic_message(&other.to_string()),
        }
    }
}

fn generic_message(detail: &str) -> String {
    let first_line = detail.lines().next().unwrap_or_default();
    format!("AI Generation Error: {first_line}")
}

/// Maps a non-success response onto the error taxonomy.
///
/// `body` is matched as raw text because the interesting markers
/// (`RESOURCE_EXHAUSTED`, `limit: 0`, `API_KEY_INVALID`) live in different
/// fields depending on the failure.
fn classify_failure(status: u16, body: &str) -> GeminiError {
    let message = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
        if body.contains("limit: 0") {
            return GeminiError::ModelUnavailable(message);
        }
        return GeminiError::RateLimited(message);
    }

    if status == 500 || status == 503 || body.contains("Internal Server Error") {
        return GeminiError::Overloaded(message);
    }

    if body.contains("API_KEY_INVALID") {
        return GeminiError::InvalidApiKey;
    }

    GeminiError::Api { status, message }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: OutgoingInlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingInlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'a str>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    pub text: Option<String>,
    pub inline_data: Option<IncomingInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingInlineData {
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    pub data: String,
}

fn default_mime_type() -> String {
    "image/png".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// First part carrying inline image data.
    pub fn first_image(&self) -> Option<&IncomingInlineData> {
        self.first_parts()
            .iter()
            .find_map(|p| p.inline_data.as_ref())
    }

    /// First part carrying text.
    pub fn text(&self) -> Option<&str> {
        self.first_parts().iter().find_map(|p| p.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single Gemini client shared by every service in the API.
/// Wraps `models/{model}:generateContent` with retry on server errors.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry_base_delay: Duration,
}

/// Delay before retry number `attempt` (1-based): base, 2×base, 4×base...
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << attempt.saturating_sub(1))
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self, GeminiError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            base_url,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    /// Sends `image` plus an instruction to the image model and returns the
    /// image it produces.
    pub async fn transform_image(
        &self,
        image: &ImageData,
        instruction: &str,
    ) -> Result<ImageData, GeminiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![inline_part(image), RequestPart::Text { text: instruction }],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_modalities: Some(vec!["IMAGE", "TEXT"]),
            }),
        };

        let response = self.generate_content(IMAGE_MODEL, &request).await?;
        let inline = response.first_image().ok_or(GeminiError::NoImage)?;
        let bytes = BASE64.decode(inline.data.as_bytes())?;

        Ok(ImageData::new(bytes, inline.mime_type.clone()))
    }

    /// Asks the vision model a question about `image` and deserializes the
    /// JSON answer. The prompt must describe the expected schema.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        image: &ImageData,
        prompt: &str,
        system: &str,
    ) -> Result<T, GeminiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![inline_part(image), RequestPart::Text { text: prompt }],
            }],
            system_instruction: Some(Content {
                parts: vec![RequestPart::Text { text: system }],
            }),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json"),
                response_modalities: None,
            }),
        };

        let response = self.generate_content(VISION_MODEL, &request).await?;
        let text = response.text().ok_or(GeminiError::EmptyContent)?;

        serde_json::from_str(strip_json_fences(text)).map_err(GeminiError::Parse)
    }

    /// Makes a raw `generateContent` call.
    /// Retries 5xx responses with exponential backoff. A 429 is returned
    /// immediately: the free-tier quota window is about a minute. Transport
    /// failures (timeouts, refused connections) are not retried either, since
    /// each attempt may already have waited the full request timeout.
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let mut last_error: Option<GeminiError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base_delay, attempt);
                warn!(
                    "Gemini call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(request)
                .send()
                .await;

            let response = response.map_err(|e| {
                warn!("Gemini request to {model} failed: {e}");
                GeminiError::Http(e)
            })?;

            let status = response.status();

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!("Gemini API returned {}: {}", status, body);
                let error = classify_failure(status.as_u16(), &body);
                if status.is_server_error() {
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }

            let parsed: GenerateContentResponse = response.json().await?;

            if let Some(usage) = &parsed.usage_metadata {
                debug!(
                    "Gemini call succeeded: model={}, prompt_tokens={}, candidate_tokens={}",
                    model, usage.prompt_token_count, usage.candidates_token_count
                );
            }

            return Ok(parsed);
        }

        Err(last_error.unwrap_or_else(|| {
            GeminiError::Overloaded(format!("gave up after {MAX_RETRIES} attempts"))
        }))
    }
}

fn inline_part(image: &ImageData) -> RequestPart<'_> {
    RequestPart::Inline {
        inline_data: OutgoingInlineData {
            mime_type: image.mime_type(),
            data: BASE64.encode(image.bytes()),
        },
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}
