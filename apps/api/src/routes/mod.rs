pub mod catalog;
pub mod download;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::previews::handlers as previews;
use crate::session::handlers as sessions;
use crate::state::AppState;

/// Room for multipart framing on top of the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Catalog
        .route("/api/v1/styles", get(catalog::handle_list_styles))
        .route("/api/v1/suggestions", get(catalog::handle_suggestions))
        // Session API
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/reset",
            post(sessions::handle_reset_session),
        )
        .route(
            "/api/v1/sessions/:id/source",
            put(sessions::handle_upload_source).get(sessions::handle_get_source),
        )
        .route(
            "/api/v1/sessions/:id/source/url",
            post(sessions::handle_import_source_url),
        )
        .route(
            "/api/v1/sessions/:id/style",
            put(sessions::handle_choose_style),
        )
        .route(
            "/api/v1/sessions/:id/generate",
            post(sessions::handle_generate),
        )
        .route(
            "/api/v1/sessions/:id/selection",
            put(sessions::handle_select_result),
        )
        .route("/api/v1/sessions/:id/edit", post(sessions::handle_edit))
        .route(
            "/api/v1/sessions/:id/results/:result_id",
            get(sessions::handle_download_result),
        )
        // Preview API
        .route(
            "/api/v1/sessions/:id/previews/linkedin",
            get(previews::handle_linkedin_preview),
        )
        .route(
            "/api/v1/sessions/:id/previews/resume",
            get(previews::handle_resume_preview),
        )
        .route(
            "/api/v1/sessions/:id/previews/business-card",
            post(previews::handle_business_card_preview),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, HeaderMap, Method, Request, StatusCode};
    use resvg::usvg::fontdb;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::gemini_client::GeminiError;
    use crate::generation::HeadshotGenerator;
    use crate::imaging::codec::test_support::png_of_size;
    use crate::imaging::face_detection::DisabledFaceDetector;
    use crate::imaging::ImageData;
    use crate::previews::BusinessCardRenderer;
    use crate::session::SessionStore;

    const BOUNDARY: &str = "proshot-test-boundary";

    /// Returns a fixed portrait PNG, or a rate-limit error when `rate_limited`.
    struct StubGenerator {
        rate_limited: bool,
    }

    #[async_trait]
    impl HeadshotGenerator for StubGenerator {
        async fn generate(
            &self,
            _source: &ImageData,
            _style_prompt: &str,
            _modifier: &str,
        ) -> Result<ImageData, GeminiError> {
            if self.rate_limited {
                return Err(GeminiError::RateLimited("quota exhausted".to_string()));
            }
            Ok(png_of_size(64, 80))
        }

        async fn edit(
            &self,
            _headshot: &ImageData,
            _edit_prompt: &str,
        ) -> Result<ImageData, GeminiError> {
            Ok(png_of_size(64, 80))
        }
    }

    fn app(rate_limited: bool) -> Router {
        app_with_config(rate_limited, Config::for_tests())
    }

    fn app_with_config(rate_limited: bool, config: Config) -> Router {
        build_router(AppState {
            config,
            sessions: SessionStore::new(3600),
            generator: Arc::new(StubGenerator { rate_limited }),
            face_detector: Arc::new(DisabledFaceDetector),
            http: crate::session::upload::url_import_client().unwrap(),
            card_renderer: Arc::new(BusinessCardRenderer::new(Arc::new(
                fontdb::Database::new(),
            ))),
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn send_json(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, _, bytes) = send(app, request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn multipart_upload(uri: &str, image: &ImageData) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"selfie.png\"\r\nContent-Type: {}\r\n\r\n",
            image.mime_type()
        )
        .into_bytes();
        body.extend_from_slice(image.bytes());
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    /// Creates a session, uploads a photo and picks a style.
    async fn session_ready_to_generate(app: &Router) -> String {
        let (status, created) = send_json(app, Method::POST, "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _, body) = send(
            app,
            multipart_upload(&format!("/api/v1/sessions/{id}/source"), &png_of_size(120, 90)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let view: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["step"], "style");
        assert_eq!(view["source"]["crop_method"], "center");

        let (status, view) = send_json(
            app,
            Method::PUT,
            &format!("/api/v1/sessions/{id}/style"),
            Some(json!({ "style_id": "corporate-grey" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["style_id"], "corporate-grey");
        id
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send_json(&app(false), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "proshot-api");
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let app = app(false);
        let (status, body) = send_json(&app, Method::GET, "/api/v1/styles", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["styles"].as_array().unwrap().len(), 4);

        let (status, body) = send_json(&app, Method::GET, "/api/v1/suggestions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_full_headshot_flow() {
        let app = app(false);
        let id = session_ready_to_generate(&app).await;

        let (status, view) =
            send_json(&app, Method::POST, &format!("/api/v1/sessions/{id}/generate"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "result");
        let results = view["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(view["selected_id"], results[0]["id"]);

        let second = results[1]["id"].as_str().unwrap().to_string();
        let (status, view) = send_json(
            &app,
            Method::PUT,
            &format!("/api/v1/sessions/{id}/selection"),
            Some(json!({ "result_id": second })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["selected_id"], second.as_str());

        let (status, view) = send_json(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/edit"),
            Some(json!({ "prompt": "Add a blue tie" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let results = view["results"].as_array().unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0]["origin"]["kind"], "edit");
        assert_eq!(results[0]["origin"]["parent_id"], second.as_str());
        assert_eq!(view["selected_id"], results[0]["id"]);
        assert_eq!(view["edit_in_flight"], false);

        let result_id = results[0]["id"].as_str().unwrap();
        let (status, headers, body) = send(
            &app,
            Request::get(format!("/api/v1/sessions/{id}/results/{result_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"proshot-headshot-{result_id}.png\"").as_str()
        );
        assert!(!body.is_empty());
    }

    #[tokio::test]
    async fn test_previews_of_selected_headshot() {
        let app = app(false);
        let id = session_ready_to_generate(&app).await;
        send_json(&app, Method::POST, &format!("/api/v1/sessions/{id}/generate"), None).await;

        let (status, headers, body) = send(
            &app,
            Request::get(format!("/api/v1/sessions/{id}/previews/linkedin"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"linkedin-profile-photo-"));
        let img = image::load_from_memory(&body).unwrap();
        assert_eq!((img.width(), img.height()), (64, 64));

        let (status, _, body) = send(
            &app,
            Request::get(format!("/api/v1/sessions/{id}/previews/resume"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let img = image::load_from_memory(&body).unwrap();
        assert_eq!((img.width(), img.height()), (64, 80));

        let (status, headers, body) = send(
            &app,
            Request::post(format!("/api/v1/sessions/{id}/previews/business-card"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "theme": "dark" }).to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"business-card-dark.png\""
        );
        let img = image::load_from_memory(&body).unwrap();
        assert_eq!((img.width(), img.height()), (1050, 600));
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429_and_keeps_session_usable() {
        let app = app(true);
        let id = session_ready_to_generate(&app).await;

        let (status, body) =
            send_json(&app, Method::POST, &format!("/api/v1/sessions/{id}/generate"), None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");

        let (status, view) =
            send_json(&app, Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "style");
        assert!(view["last_error"]
            .as_str()
            .unwrap()
            .starts_with("Rate Limit Exceeded"));
        assert!(view["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_requests_conflict() {
        let app = app(false);
        let (_, created) = send_json(&app, Method::POST, "/api/v1/sessions", None).await;
        let id = created["id"].as_str().unwrap();

        let (status, body) =
            send_json(&app, Method::POST, &format!("/api/v1/sessions/{id}/generate"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, _) = send_json(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/previews/business-card"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invalid_upload_is_rejected() {
        let app = app(false);
        let (_, created) = send_json(&app, Method::POST, "/api/v1/sessions", None).await;
        let id = created["id"].as_str().unwrap();

        let not_an_image = ImageData::new(b"plain text".to_vec(), "image/png");
        let (status, _, body) = send(
            &app,
            multipart_upload(&format!("/api/v1/sessions/{id}/source"), &not_an_image),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["error"]["message"],
            "Please upload a valid image file (JPG, PNG, WebP)."
        );
    }

    #[tokio::test]
    async fn test_upload_far_over_the_limit_is_payload_too_large() {
        let config = Config {
            max_upload_bytes: 1024 * 1024,
            ..Config::for_tests()
        };
        let app = app_with_config(false, config);
        let (_, created) = send_json(&app, Method::POST, "/api/v1/sessions", None).await;
        let id = created["id"].as_str().unwrap();

        let oversized = ImageData::new(vec![0u8; 2 * 1024 * 1024], "image/png");
        let (status, _, body) = send(
            &app,
            multipart_upload(&format!("/api/v1/sessions/{id}/source"), &oversized),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(
            body["error"]["message"],
            "Image is too large. Please upload an image under 1MB."
        );

        let (_, view) = send_json(&app, Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(view["step"], "upload");
    }

    #[tokio::test]
    async fn test_reset_and_delete() {
        let app = app(false);
        let id = session_ready_to_generate(&app).await;

        let (status, view) =
            send_json(&app, Method::POST, &format!("/api/v1/sessions/{id}/reset"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "upload");
        assert!(view["source"].is_null());

        let (status, _) =
            send_json(&app, Method::DELETE, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) =
            send_json(&app, Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
