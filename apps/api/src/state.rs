use std::sync::Arc;

use crate::config::Config;
use crate::generation::HeadshotGenerator;
use crate::imaging::face_detection::FaceDetector;
use crate::previews::BusinessCardRenderer;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    /// Pluggable generator. Default: GeminiHeadshotGenerator.
    pub generator: Arc<dyn HeadshotGenerator>,
    /// Chosen from FACE_DETECTION at startup. `off` centre-crops uploads.
    pub face_detector: Arc<dyn FaceDetector>,
    /// URL-import client. Redirects are off; the importer re-checks each hop.
    pub http: reqwest::Client,
    /// Font database is loaded once and shared by every card render.
    pub card_renderer: Arc<BusinessCardRenderer>,
}
