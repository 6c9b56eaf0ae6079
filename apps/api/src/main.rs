mod config;
mod errors;
mod gemini_client;
mod generation;
mod imaging;
mod previews;
mod routes;
mod session;
mod state;
mod styles;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, FaceDetectionMode};
use crate::gemini_client::GeminiClient;
use crate::generation::GeminiHeadshotGenerator;
use crate::imaging::face_detection::{DisabledFaceDetector, FaceDetector, GeminiFaceDetector};
use crate::previews::BusinessCardRenderer;
use crate::routes::build_router;
use crate::session::upload::url_import_client;
use crate::session::SessionStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ProShot API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Gemini client
    let gemini = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_api_base.clone())?;
    info!(
        "Gemini client initialized (image model: {}, vision model: {})",
        gemini_client::IMAGE_MODEL,
        gemini_client::VISION_MODEL
    );

    // Face detection for the upload smart crop (off by default)
    let face_detector: Arc<dyn FaceDetector> = match config.face_detection {
        FaceDetectionMode::Off => Arc::new(DisabledFaceDetector),
        FaceDetectionMode::Gemini => Arc::new(GeminiFaceDetector(gemini.clone())),
    };
    info!("Face detection: {:?}", config.face_detection);

    // In-memory sessions with idle eviction
    let sessions = SessionStore::new(config.session_ttl_secs);
    sessions.spawn_sweeper();
    info!("Session store initialized (ttl {}s)", config.session_ttl_secs);

    let state = AppState {
        config: config.clone(),
        sessions,
        generator: Arc::new(GeminiHeadshotGenerator(gemini)),
        face_detector,
        http: url_import_client()?,
        card_renderer: Arc::new(BusinessCardRenderer::with_system_fonts()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
