use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gemini_client::GeminiError;
use crate::imaging::ImageError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The session is not in a step that allows the requested operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gemini error: {0}")]
    Gemini(#[from] GeminiError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Gemini(e) => {
                tracing::error!("Gemini error: {e}");
                let (status, code) = match e {
                    GeminiError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
                    GeminiError::ModelUnavailable(_) => {
                        (StatusCode::FORBIDDEN, "MODEL_UNAVAILABLE")
                    }
                    GeminiError::Overloaded(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "AI_OVERLOADED")
                    }
                    GeminiError::InvalidApiKey => (StatusCode::BAD_GATEWAY, "AI_KEY_INVALID"),
                    _ => (StatusCode::BAD_GATEWAY, "AI_ERROR"),
                };
                (status, code, e.user_message())
            }
            AppError::Image(e) => match e {
                ImageError::Decode(_) | ImageError::Empty => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "IMAGE_ERROR",
                    "The image could not be processed.".to_string(),
                ),
                _ => {
                    tracing::error!("Image processing error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "IMAGE_ERROR",
                        "Failed to process image.".to_string(),
                    )
                }
            },
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
