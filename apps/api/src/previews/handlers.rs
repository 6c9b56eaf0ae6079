//! Axum route handlers for the Preview API.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::imaging::crop::{crop_to_resume_aspect, crop_to_square};
use crate::imaging::{ImageData, ImageError};
use crate::previews::business_card::BusinessCardRequest;
use crate::routes::download::attachment;
use crate::state::AppState;

fn selected_image(state: &AppState, id: Uuid) -> Result<ImageData, AppError> {
    state.sessions.read(id, |s| {
        s.selected()
            .map(|r| r.image.clone())
            .ok_or_else(|| AppError::Conflict("Select a headshot first".to_string()))
    })
}

async fn crop_selected(
    state: &AppState,
    id: Uuid,
    crop: fn(&[u8]) -> Result<ImageData, ImageError>,
) -> Result<ImageData, AppError> {
    let image = selected_image(state, id)?;
    let cropped = tokio::task::spawn_blocking(move || crop(image.bytes()))
        .await
        .map_err(ImageError::from)??;
    Ok(cropped)
}

/// GET /api/v1/sessions/:id/previews/linkedin
pub async fn handle_linkedin_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let image = crop_selected(&state, id, crop_to_square).await?;
    let stem = format!("linkedin-profile-photo-{}", Utc::now().timestamp_millis());
    Ok(attachment(&image, &stem))
}

/// GET /api/v1/sessions/:id/previews/resume
pub async fn handle_resume_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let image = crop_selected(&state, id, crop_to_resume_aspect).await?;
    let stem = format!("resume-photo-4x5-{}", Utc::now().timestamp_millis());
    Ok(attachment(&image, &stem))
}

/// POST /api/v1/sessions/:id/previews/business-card
pub async fn handle_business_card_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<BusinessCardRequest>,
) -> Result<Response, AppError> {
    request.validate()?;
    let photo = selected_image(&state, id)?;
    let renderer = state.card_renderer.clone();
    let theme = request.theme;

    let card = tokio::task::spawn_blocking(move || renderer.render_card(&request, &photo))
        .await
        .map_err(ImageError::from)??;

    info!(
        "Session {id}: rendered {} business card ({} bytes)",
        theme.as_str(),
        card.len()
    );
    Ok(attachment(&card, &format!("business-card-{}", theme.as_str())))
}
