use axum::Json;
use serde_json::{json, Value};

use crate::styles::{random_suggestions, HEADSHOT_STYLES};

/// GET /api/v1/styles
pub async fn handle_list_styles() -> Json<Value> {
    Json(json!({ "styles": &HEADSHOT_STYLES }))
}

/// GET /api/v1/suggestions
/// Three suggested edit prompts, reshuffled on every call.
pub async fn handle_suggestions() -> Json<Value> {
    Json(json!({ "suggestions": random_suggestions() }))
}
