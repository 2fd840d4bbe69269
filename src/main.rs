//! Camwatch - live object-detection streaming server
//!
//! Main entry point.

use camwatch::{
    camera::{CameraResource, FfmpegConfig, FfmpegFactory},
    detect::{Detector, RemoteDetector, StubDetector},
    metrics::MetricsStore,
    state::{AppConfig, AppState},
    storage::FrameStore,
    stream::StreamController,
    web_api,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camwatch=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        device = %config.device,
        detector_url = %config.detector_url,
        detector_backend = %config.detector_backend,
        saved_frames_dir = %config.saved_frames_dir.display(),
        uploads_dir = %config.uploads_dir.display(),
        "Configuration loaded"
    );

    // Initialize components
    let frames = Arc::new(
        FrameStore::new(config.saved_frames_dir.clone(), config.uploads_dir.clone()).await?,
    );
    tracing::info!("FrameStore initialized");

    let detector: Arc<dyn Detector> = match config.detector_backend.as_str() {
        "stub" => {
            tracing::warn!("stub detector selected, no real inference will run");
            Arc::new(StubDetector::new())
        }
        _ => Arc::new(RemoteDetector::new(config.detector_url.clone())),
    };
    tracing::info!(backend = detector.name(), "Detector initialized");

    let camera = Arc::new(CameraResource::new(Box::new(FfmpegFactory::new(
        FfmpegConfig {
            device: config.device.clone(),
            width: config.frame_width,
            height: config.frame_height,
            frame_rate: config.frame_rate,
        },
    ))));

    let metrics = Arc::new(MetricsStore::new(config.default_confidence));

    let controller = Arc::new(StreamController::new(
        camera,
        detector.clone(),
        metrics,
        frames.clone(),
        config.default_confidence,
        config.jpeg_quality,
    ));
    tracing::info!("StreamController initialized");

    // Create application state
    let state = AppState {
        config: config.clone(),
        controller,
        detector,
        frames,
    };

    // Create router with static dashboard serving
    let serve_dir = ServeDir::new(&config.static_dir)
        .not_found_service(ServeFile::new(format!("{}/index.html", config.static_dir)));

    let app = web_api::create_router(state)
        .fallback_service(serve_dir)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::info!(static_dir = %config.static_dir, "Static file serving enabled");

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
