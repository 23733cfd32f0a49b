//! Router configuration for the gallery server.
//!
//! # Route Structure
//!
//! ```text
//! /health                                - Health check
//! /api/artworks                          - Discovery query (JSON)
//! /api/artworks/{slug}                   - Artwork detail (JSON)
//! /api/artworks/{slug}/thumbnail.jpg     - Thumbnail (JPEG)
//! /view/{slug}                           - OpenSeadragon viewer (HTML)
//! /*                                     - Static files from the artwork root
//! ```
//!
//! Descriptors and tiles are plain files, served by the static fallback
//! under the same paths the discovery query reports. Sidecars and dot-files
//! (including in-flight `.dzi-*.tmp` descriptors) are answered with 404.
//!
//! # Example
//!
//! ```ignore
//! use gigazoom::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new("Artworks")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//! let router = create_router(config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderValue, Method, StatusCode};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    artwork_handler, artworks_handler, health_handler, thumbnail_handler, viewer_handler,
    AppState,
};
use crate::config::{DEFAULT_CACHE_MAX_AGE, DEFAULT_THUMBNAIL_CACHE_CAPACITY};
use crate::gallery::{DEFAULT_THUMBNAIL_SIZE, SIDECAR_FILE};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Artwork root directory
    pub root: PathBuf,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Edge length of gallery thumbnails
    pub thumbnail_size: u32,

    /// Maximum number of cached thumbnails
    pub thumbnail_cache: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration serving `root`.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Thumbnails are 200 px
    /// - Tracing is enabled
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            thumbnail_cache: DEFAULT_THUMBNAIL_CACHE_CAPACITY,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Set the thumbnail edge length and cache capacity.
    pub fn with_thumbnails(mut self, size: u32, cache_capacity: usize) -> Self {
        self.thumbnail_size = size;
        self.thumbnail_cache = cache_capacity;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the gallery router.
pub fn create_router(config: RouterConfig) -> Router {
    let app_state = AppState::new(&config.root, config.thumbnail_size, config.thumbnail_cache)
        .with_cache_max_age(config.cache_max_age);

    let static_files = Router::new()
        .fallback_service(ServeDir::new(&config.root))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            cache_control_value(config.cache_max_age),
        ))
        .layer(middleware::from_fn(hide_private_files));

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/artworks", get(artworks_handler))
        .route("/api/artworks/{slug}", get(artwork_handler))
        .route("/api/artworks/{slug}/thumbnail.jpg", get(thumbnail_handler))
        .route("/view/{slug}", get(viewer_handler))
        .with_state(app_state)
        .merge(static_files)
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Refuse static requests for sidecars and dot-files.
async fn hide_private_files(request: Request, next: Next) -> Response {
    if is_private_path(request.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

/// Whether a static path names a sidecar or any dot-prefixed segment.
///
/// Segments are percent-decoded first; undecodable paths count as private.
fn is_private_path(path: &str) -> bool {
    path.split('/').any(|segment| match urlencoding::decode(segment) {
        Ok(segment) => segment.starts_with('.') || segment == SIDECAR_FILE,
        Err(_) => true,
    })
}

fn cache_control_value(max_age: u32) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={}", max_age))
        .unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
