//! API Routes

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::detect;
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::storage::FrameStore;
use crate::stream::STREAM_CONTENT_TYPE;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Camera control
        .route("/start_camera", get(start_camera))
        .route("/stop_camera", get(stop_camera))
        // Live stream & metrics
        .route("/video_feed", get(video_feed))
        .route("/metrics", get(get_metrics))
        .route("/confidence", post(set_confidence))
        // Frame capture & upload
        .route("/save-frame", post(save_frame))
        .route("/upload-detect", post(upload_detect))
        // Stored image listings & serving
        .route("/saved-frames", get(list_saved_frames))
        .route("/uploaded-frames", get(list_uploaded_frames))
        .route("/saved_frames/:filename", get(serve_saved_frame))
        .route("/uploads/:filename", get(serve_upload))
        .with_state(state)
}

// ========================================
// Camera Control Handlers
// ========================================

async fn start_camera(State(state): State<AppState>) -> Result<Json<Value>> {
    state.controller.start().await?;
    Ok(Json(json!({"status": "started"})))
}

async fn stop_camera(State(state): State<AppState>) -> Json<Value> {
    state.controller.stop().await;
    Json(json!({"status": "stopped"}))
}

// ========================================
// Stream & Metrics Handlers
// ========================================

/// Attach to the live stream. The response body is an unbounded multipart
/// sequence of JPEG parts; it ends when the stream is stopped or the camera
/// read fails.
async fn video_feed(State(state): State<AppState>) -> Result<Response> {
    let session = state.controller.open_session()?;

    Response::builder()
        .header(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(session.into_byte_stream()))
        .map_err(|e| Error::Internal(e.to_string()))
}

async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.metrics().read().await)
}

async fn set_confidence(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let value = parse_confidence(&body)?;
    let applied = state.controller.set_confidence(value).await?;
    Ok(Json(json!({"status": "ok", "confidence": applied})))
}

/// Accept the confidence as a JSON number or a numeric string (range inputs
/// post strings), rejecting anything else.
fn parse_confidence(body: &Value) -> Result<f64> {
    let field = body
        .get("confidence")
        .ok_or_else(|| Error::Validation("missing confidence field".to_string()))?;

    match field {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::Validation(format!("confidence is not a number: {n}"))),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| Error::Validation(format!("confidence is not numeric: {s:?}"))),
        other => Err(Error::Validation(format!(
            "confidence must be a number, got {other}"
        ))),
    }
}

// ========================================
// Capture & Upload Handlers
// ========================================

async fn save_frame(State(state): State<AppState>) -> Json<Value> {
    match state.controller.capture_frame().await {
        Ok(filename) => Json(json!({"status": "saved", "filename": filename})),
        Err(e) => {
            tracing::warn!(error = %e, "frame capture failed");
            Json(json!({"status": "error", "msg": e.to_string()}))
        }
    }
}

async fn upload_detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("malformed upload: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !FrameStore::allowed_upload(&filename) {
            return Err(Error::Validation(format!(
                "unsupported image type: {filename:?}"
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::Validation(format!("upload read failed: {e}")))?;

        let confidence = state.controller.confidence().await;
        let detections = state.detector.detect(&data, confidence).await?;
        let annotated = detect::render(&data, &detections.boxes, state.config.jpeg_quality)?;
        let saved = state.frames.save_upload(&annotated).await?;

        tracing::info!(
            filename = %saved,
            objects = detections.total(),
            "upload detected and stored"
        );
        return Ok(Json(json!({"status": "ok", "filename": saved})));
    }

    Err(Error::Validation("no image field in upload".to_string()))
}

// ========================================
// Stored Image Handlers
// ========================================

async fn list_saved_frames(State(state): State<AppState>) -> Result<Json<Value>> {
    let frames = state.frames.list_saved().await?;
    Ok(Json(json!({"frames": frames})))
}

async fn list_uploaded_frames(State(state): State<AppState>) -> Result<Json<Value>> {
    let frames = state.frames.list_uploads().await?;
    Ok(Json(json!({"frames": frames})))
}

async fn serve_saved_frame(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    serve_image(state.frames.saved_path(&filename)?).await
}

async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    serve_image(state.frames.upload_path(&filename)?).await
}

async fn serve_image(path: std::path::PathBuf) -> Result<Response> {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            bytes,
        )
            .into_response()),
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
            "no such image: {}",
            path.display()
        ))),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read stored image");
            Err(Error::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraResource;
    use crate::detect::StubDetector;
    use crate::metrics::MetricsStore;
    use crate::state::AppConfig;
    use crate::storage::FrameStore;
    use crate::stream::test_support::ScriptedFactory;
    use crate::stream::StreamController;
    use axum::body::to_bytes;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state(frames: usize) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            FrameStore::new(dir.path().join("saved"), dir.path().join("uploads"))
                .await
                .unwrap(),
        );
        let detector: Arc<dyn crate::detect::Detector> =
            Arc::new(StubDetector::with_counts(&[("person", 2), ("car", 1)]));
        let camera = Arc::new(CameraResource::new(Box::new(ScriptedFactory::new(frames))));
        let metrics = Arc::new(MetricsStore::new(0.3));
        let controller = Arc::new(StreamController::new(
            camera,
            detector.clone(),
            metrics,
            store.clone(),
            0.3,
            80,
        ));

        let state = AppState {
            config: AppConfig::default(),
            controller,
            detector,
            frames: store,
        };
        (state, dir)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn metrics_returns_default_snapshot() {
        let (state, _dir) = test_state(0).await;
        let app = create_router(state);

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fps"], 0.0);
        assert_eq!(body["object_count"], 0);
    }

    #[tokio::test]
    async fn start_then_stop_roundtrip() {
        let (state, _dir) = test_state(4).await;
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/start_camera").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "started");
        assert!(state.controller.is_active());

        let response = app
            .oneshot(Request::get("/stop_camera").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "stopped");
        assert!(!state.controller.is_active());
    }

    #[tokio::test]
    async fn video_feed_requires_active_stream() {
        let (state, _dir) = test_state(0).await;
        let app = create_router(state);

        let response = app
            .oneshot(Request::get("/video_feed").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn video_feed_has_multipart_content_type() {
        let (state, _dir) = test_state(4).await;
        state.controller.start().await.unwrap();
        let app = create_router(state);

        let response = app
            .oneshot(Request::get("/video_feed").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=frame"
        );
    }

    #[tokio::test]
    async fn confidence_accepts_numbers_and_numeric_strings() {
        let (state, _dir) = test_state(0).await;
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/confidence")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"confidence": 0.55}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.controller.confidence().await, 0.55);

        let response = app
            .clone()
            .oneshot(
                Request::post("/confidence")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"confidence": "0.7"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.controller.confidence().await, 0.7);
    }

    #[tokio::test]
    async fn confidence_clamps_and_rejects() {
        let (state, _dir) = test_state(0).await;
        let app = create_router(state.clone());

        // Above 1.0 clamps.
        let response = app
            .clone()
            .oneshot(
                Request::post("/confidence")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"confidence": 1.5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["confidence"], 1.0);

        // Non-positive rejects, prior value retained.
        let response = app
            .oneshot(
                Request::post("/confidence")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"confidence": -1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.controller.confidence().await, 1.0);
    }

    #[tokio::test]
    async fn save_frame_reports_inactive_camera() {
        let (state, _dir) = test_state(0).await;
        let app = create_router(state);

        let response = app
            .oneshot(Request::post("/save-frame").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn save_frame_persists_and_lists() {
        let (state, _dir) = test_state(4).await;
        state.controller.start().await.unwrap();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::post("/save-frame").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "saved");
        let filename = body["filename"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(Request::get("/saved-frames").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["frames"][0], filename.as_str());

        let response = app
            .oneshot(
                Request::get(format!("/saved_frames/{filename}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    }

    #[tokio::test]
    async fn stored_image_traversal_is_rejected() {
        let (state, _dir) = test_state(0).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::get("/saved_frames/..%2Fsecret.jpg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_stored_image_is_not_found() {
        let (state, _dir) = test_state(0).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::get("/saved_frames/nope.jpg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
