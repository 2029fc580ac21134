pub mod handlers;
pub mod state;
pub mod upstream_headers;

use crate::config::Config;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::get,
};
use state::AppState;
use tower_http::{
    compression::{
        CompressionLayer,
        predicate::{DefaultPredicate, NotForContentType, Predicate},
    },
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
};
use tracing::{error, info};

/// Response header carrying the crate version
const VERSION_HEADER: &str = "x-hlsgate-version";

/// Gzip for text responses, never for playlists or media
fn compression() -> CompressionLayer<impl Predicate + Clone> {
    let predicate = DefaultPredicate::new()
        .and(NotForContentType::const_new("video/"))
        .and(NotForContentType::const_new("audio/"))
        .and(NotForContentType::const_new("application/vnd.apple.mpegurl"))
        .and(NotForContentType::const_new("application/x-mpegurl"))
        .and(NotForContentType::const_new("application/octet-stream"));

    CompressionLayer::new().gzip(true).compress_when(predicate)
}

/// Build the router with all routes and layers
///
/// Separated from [`start`] so tests can drive the router without binding.
pub fn build_router(config: Config) -> Result<Router, reqwest::Error> {
    let static_dir = config.static_dir.clone();
    let state = AppState::new(config)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([
            header::ACCEPT_RANGES,
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
        ]);

    let mut router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        .route("/diag", get(handlers::diag::diag));

    if let Some(dir) = static_dir {
        info!("Serving static files from {}", dir.display());
        router = router.fallback_service(ServeDir::new(dir));
    }

    // Added after the compression layer so proxied bytes are never re-encoded
    Ok(router
        .layer(compression())
        .route("/hls/{*path}", get(handlers::hls::serve_hls))
        .with_state(state)
        .layer(cors)
        // Every response is CORS-permissive, including upstream passthroughs
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(VERSION_HEADER),
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        )))
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);
    let origin = config.origin_base.clone();

    let app = build_router(config)?;

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Listening on http://{} -> origin {}", addr, origin);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
