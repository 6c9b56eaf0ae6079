//! Axum route handlers for the Session API.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::generate_variations;
use crate::imaging::smart_crop::smart_crop;
use crate::imaging::ImageData;
use crate::routes::download::{attachment, inline_image};
use crate::session::models::{SessionView, SourceImage};
use crate::session::upload::{fetch_image_from_url, read_multipart_image, upload_image_error};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ImportUrlRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChooseStyleRequest {
    pub style_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectResultRequest {
    pub result_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub prompt: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionView>) {
    let view = state.sessions.create();
    info!("Created session {}", view.id);
    (StatusCode::CREATED, Json(view))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.view(id)?))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id)?;
    info!("Deleted session {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/reset
pub async fn handle_reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let view = state.sessions.update(id, |s| {
        s.reset();
        Ok(s.view())
    })?;
    Ok(Json(view))
}

// ────────────────────────────────────────────────────────────────────────────
// Source photo
// ────────────────────────────────────────────────────────────────────────────

/// PUT /api/v1/sessions/:id/source
///
/// Multipart upload (`image` field). The photo is smart-cropped before it is stored.
pub async fn handle_upload_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    state.sessions.read(id, |s| s.ensure_accepts_source())?;
    let original = read_multipart_image(multipart, state.config.max_upload_bytes).await?;
    attach_processed_source(&state, id, original).await
}

/// POST /api/v1/sessions/:id/source/url
pub async fn handle_import_source_url(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ImportUrlRequest>,
) -> Result<Json<SessionView>, AppError> {
    state.sessions.read(id, |s| s.ensure_accepts_source())?;
    let original = fetch_image_from_url(
        &state.http,
        &request.url,
        state.config.max_upload_bytes,
        state.config.allow_private_url_imports,
    )
    .await?;
    attach_processed_source(&state, id, original).await
}

async fn attach_processed_source(
    state: &AppState,
    id: Uuid,
    original: ImageData,
) -> Result<Json<SessionView>, AppError> {
    let original_size = original.len();
    let outcome = smart_crop(original, state.face_detector.as_ref())
        .await
        .map_err(upload_image_error)?;

    info!(
        "Session {id}: source attached ({} -> {} bytes, method={:?})",
        original_size,
        outcome.image.len(),
        outcome.method
    );

    let view = state.sessions.update(id, |s| {
        s.attach_source(SourceImage {
            image: outcome.image,
            was_cropped: outcome.was_cropped,
            crop_method: outcome.method,
        })?;
        Ok(s.view())
    })?;
    Ok(Json(view))
}

/// GET /api/v1/sessions/:id/source
pub async fn handle_get_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let image = state.sessions.read(id, |s| {
        s.source
            .as_ref()
            .map(|src| src.image.clone())
            .ok_or_else(|| AppError::NotFound("No photo uploaded yet".to_string()))
    })?;
    Ok(inline_image(&image))
}

// ────────────────────────────────────────────────────────────────────────────
// Style, generation, selection, edits
// ────────────────────────────────────────────────────────────────────────────

/// PUT /api/v1/sessions/:id/style
pub async fn handle_choose_style(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChooseStyleRequest>,
) -> Result<Json<SessionView>, AppError> {
    let view = state.sessions.update(id, |s| {
        s.choose_style(&request.style_id)?;
        Ok(s.view())
    })?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/:id/generate
///
/// Runs the four-way fan-out. The work runs on its own task so a client
/// disconnect cannot leave the session stuck in the generating step.
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let ticket = state.sessions.update(id, |s| s.begin_generation())?;
    let sessions = state.sessions.clone();
    let generator = state.generator.clone();

    let task = tokio::spawn(async move {
        let outcome = generate_variations(generator.as_ref(), &ticket.source, ticket.style).await;
        let recorded = match &outcome {
            Ok(variations) => Ok(variations.clone()),
            Err(e) => Err(e.user_message()),
        };
        let applied = sessions
            .update(id, |s| Ok(s.complete_generation(ticket.epoch, recorded)))
            .unwrap_or(false);
        (outcome, applied)
    });

    let (outcome, applied) = task
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("generation task failed: {e}")))?;
    outcome?;

    if !applied {
        warn!("Session {id}: generation finished after the session was reset or removed");
        return Err(AppError::Conflict(
            "The session was reset while headshots were generating".to_string(),
        ));
    }
    Ok(Json(state.sessions.view(id)?))
}

/// PUT /api/v1/sessions/:id/selection
pub async fn handle_select_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectResultRequest>,
) -> Result<Json<SessionView>, AppError> {
    let view = state.sessions.update(id, |s| {
        s.select_result(request.result_id)?;
        Ok(s.view())
    })?;
    Ok(Json(view))
}

/// POST /api/v1/sessions/:id/edit
///
/// Applies a natural-language edit to the selected headshot. The edited image
/// is prepended to the results and selected.
pub async fn handle_edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EditRequest>,
) -> Result<Json<SessionView>, AppError> {
    let ticket = state.sessions.update(id, |s| s.begin_edit(&request.prompt))?;
    let sessions = state.sessions.clone();
    let generator = state.generator.clone();

    let task = tokio::spawn(async move {
        let outcome = generator.edit(&ticket.image, &ticket.prompt).await;
        let recorded = match &outcome {
            Ok(image) => Ok(image.clone()),
            Err(e) => Err(e.user_message()),
        };
        let new_id = sessions
            .update(id, |s| Ok(s.complete_edit(&ticket, recorded)))
            .ok()
            .flatten();
        (outcome, new_id)
    });

    let (outcome, new_id) = task
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("edit task failed: {e}")))?;
    outcome?;

    match new_id {
        Some(result_id) => info!("Session {id}: edit produced result {result_id}"),
        None => warn!("Session {id}: edit result discarded, session changed meanwhile"),
    }
    Ok(Json(state.sessions.view(id)?))
}

/// GET /api/v1/sessions/:id/results/:result_id
pub async fn handle_download_result(
    State(state): State<AppState>,
    Path((id, result_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let image = state.sessions.read(id, |s| {
        s.result(result_id)
            .map(|r| r.image.clone())
            .ok_or_else(|| AppError::NotFound(format!("Result {result_id} not found")))
    })?;
    Ok(attachment(&image, &format!("proshot-headshot-{result_id}")))
}
