use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::imaging::smart_crop::CropMethod;
use crate::imaging::ImageData;

/// Where a session is in the upload → style → generating → result flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppStep {
    Upload,
    Style,
    Generating,
    Result,
}

/// The processed upload that generation starts from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: ImageData,
    pub was_cropped: bool,
    pub crop_method: CropMethod,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeadshotOrigin {
    Variation { modifier: String },
    Edit { prompt: String, parent_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct GeneratedHeadshot {
    pub id: Uuid,
    pub image: ImageData,
    pub origin: HeadshotOrigin,
    pub created_at: DateTime<Utc>,
}

impl GeneratedHeadshot {
    pub fn new(image: ImageData, origin: HeadshotOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
            origin,
            created_at: Utc::now(),
        }
    }
}

/// In-memory workflow state for one user. Discarded on delete or idle expiry.
///
/// Invariants: at most one style and one result are selected, and
/// `selected_id`, when set, names an element of `results`.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub step: AppStep,
    pub source: Option<SourceImage>,
    pub style_id: Option<&'static str>,
    /// Newest edit first, then the generated variations in modifier order.
    pub results: Vec<GeneratedHeadshot>,
    pub selected_id: Option<Uuid>,
    pub last_error: Option<String>,
    /// Bumped whenever the source changes so late API responses can be discarded.
    pub epoch: u64,
    pub edit_in_flight: bool,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            step: AppStep::Upload,
            source: None,
            style_id: None,
            results: Vec::new(),
            selected_id: None,
            last_error: None,
            epoch: 0,
            edit_in_flight: false,
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub fn result(&self, id: Uuid) -> Option<&GeneratedHeadshot> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn selected(&self) -> Option<&GeneratedHeadshot> {
        self.selected_id.and_then(|id| self.result(id))
    }

    pub fn view(&self) -> SessionView {
        let base = format!("/api/v1/sessions/{}", self.id);
        SessionView {
            id: self.id,
            step: self.step,
            source: self.source.as_ref().map(|s| SourceView {
                url: format!("{base}/source"),
                mime_type: s.image.mime_type().to_string(),
                size_bytes: s.image.len(),
                was_cropped: s.was_cropped,
                crop_method: s.crop_method,
            }),
            style_id: self.style_id,
            results: self
                .results
                .iter()
                .map(|r| ResultView {
                    id: r.id,
                    url: format!("{base}/results/{}", r.id),
                    origin: r.origin.clone(),
                    created_at: r.created_at,
                })
                .collect(),
            selected_id: self.selected_id,
            last_error: self.last_error.clone(),
            edit_in_flight: self.edit_in_flight,
            created_at: self.created_at,
            last_active_at: self.last_active_at,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response views (image bytes are served by the download endpoints)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub step: AppStep,
    pub source: Option<SourceView>,
    pub style_id: Option<&'static str>,
    pub results: Vec<ResultView>,
    pub selected_id: Option<Uuid>,
    pub last_error: Option<String>,
    pub edit_in_flight: bool,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SourceView {
    pub url: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub was_cropped: bool,
    pub crop_method: CropMethod,
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub id: Uuid,
    pub url: String,
    pub origin: HeadshotOrigin,
    pub created_at: DateTime<Utc>,
}
