//! HTTP request handlers for the gallery API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/artworks` - Discovery query
//! - `GET /api/artworks/{slug}` - One artwork with its descriptor
//! - `GET /api/artworks/{slug}/thumbnail.jpg` - JPEG thumbnail
//! - `GET /view/{slug}` - OpenSeadragon viewer page

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::ConversionError;
use crate::gallery::{self, ArtworkRecord, DiscoveredArtwork};

use super::thumbnail_cache::{ThumbnailCache, ThumbnailKey};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// Holds no artwork list: every request rescans the root, so conversions
/// finished while the server runs show up without a restart.
#[derive(Clone)]
pub struct AppState {
    /// Directory holding one subdirectory per artwork
    pub root: Arc<PathBuf>,

    /// Cache-Control max-age in seconds for thumbnails
    pub cache_max_age: u32,

    /// Edge length of gallery thumbnails
    pub thumbnail_size: u32,

    /// Rendered thumbnails
    pub thumbnails: Arc<ThumbnailCache>,
}

impl AppState {
    pub fn new(root: impl Into<PathBuf>, thumbnail_size: u32, thumbnail_cache: usize) -> Self {
        Self {
            root: Arc::new(root.into()),
            cache_max_age: 3600,
            thumbnail_size,
            thumbnails: Arc::new(ThumbnailCache::new(thumbnail_cache)),
        }
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// One entry of the gallery listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtworkSummary {
    /// Display name
    pub name: String,

    pub slug: String,

    /// Descriptor path relative to the served root
    pub path: String,

    /// Thumbnail URL
    pub thumbnail: String,
}

impl From<ArtworkRecord> for ArtworkSummary {
    fn from(record: ArtworkRecord) -> Self {
        Self {
            thumbnail: format!("/api/artworks/{}/thumbnail.jpg", record.slug),
            name: record.display_name,
            slug: record.slug,
            path: record.descriptor_path,
        }
    }
}

/// Detail response for one artwork.
#[derive(Debug, Serialize)]
pub struct ArtworkDetail {
    #[serde(flatten)]
    pub summary: ArtworkSummary,

    pub width: u32,
    pub height: u32,
    pub level_count: u32,

    /// Descriptor in the OpenSeadragon JSON form
    pub descriptor: serde_json::Value,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors surfaced by the gallery handlers.
#[derive(Debug)]
pub enum ApiError {
    /// No complete artwork with this slug
    NotFound(String),

    /// Artwork exists but its tiles are incomplete
    ThumbnailUnavailable(String),

    /// Filesystem or rendering failure
    Internal(String),
}

impl From<ConversionError> for ApiError {
    fn from(err: ConversionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(format!("I/O error: {}", err))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Worker task failed: {}", err))
    }
}

/// Convert ApiError to HTTP response.
///
/// 5xx errors are logged at ERROR level, 404s at DEBUG.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(slug) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Artwork not found: {}", slug),
            ),
            ApiError::ThumbnailUnavailable(slug) => (
                StatusCode::NOT_FOUND,
                "thumbnail_unavailable",
                format!("No tiles to build a thumbnail for: {}", slug),
            ),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle the gallery listing.
///
/// # Endpoint
///
/// `GET /api/artworks`
///
/// # Response
///
/// `200 OK` with a JSON array sorted by slug:
/// ```json
/// [
///   {
///     "name": "Starry Night",
///     "slug": "starry-night",
///     "path": "starry-night/starry-night.dzi",
///     "thumbnail": "/api/artworks/starry-night/thumbnail.jpg"
///   }
/// ]
/// ```
pub async fn artworks_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArtworkSummary>>, ApiError> {
    let root = Arc::clone(&state.root);
    let records = tokio::task::spawn_blocking(move || gallery::discover_artworks(&root)).await??;

    Ok(Json(records.into_iter().map(ArtworkSummary::from).collect()))
}

/// Handle artwork detail requests.
///
/// # Endpoint
///
/// `GET /api/artworks/{slug}`
///
/// # Errors
///
/// - `404 Not Found`: no complete artwork with this slug
pub async fn artwork_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArtworkDetail>, ApiError> {
    let artwork = find(&state, slug).await?;
    let descriptor = &artwork.descriptor;

    Ok(Json(ArtworkDetail {
        width: descriptor.width,
        height: descriptor.height,
        level_count: descriptor.level_count(),
        descriptor: descriptor.to_json(),
        summary: artwork.record.into(),
    }))
}

/// Handle thumbnail requests.
///
/// # Endpoint
///
/// `GET /api/artworks/{slug}/thumbnail.jpg`
///
/// # Headers
///
/// - `Content-Type: image/jpeg`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Thumbnail-Cache-Hit: true|false`
///
/// # Errors
///
/// - `404 Not Found`: unknown artwork, or its tiles are missing
pub async fn thumbnail_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let artwork = find(&state, slug).await?;
    let slug = artwork.record.slug.clone();
    let key = ThumbnailKey::new(slug.as_str(), state.thumbnail_size, artwork.modified);

    let (data, cache_hit) = match state.thumbnails.get(&key).await {
        Some(data) => (data, true),
        None => {
            let artwork_dir = artwork.record.artwork_dir(&state.root);
            let size = state.thumbnail_size;
            let rendered = tokio::task::spawn_blocking(move || {
                gallery::render_thumbnail(&artwork_dir, &artwork.record.slug, &artwork.descriptor, size)
            })
            .await??;

            let data = Bytes::from(rendered.ok_or_else(|| ApiError::ThumbnailUnavailable(slug))?);
            state.thumbnails.put(key, data.clone()).await;
            (data, false)
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        )
        .header("X-Thumbnail-Cache-Hit", cache_hit.to_string())
        .body(Body::from(data))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Handle viewer requests - serves an HTML page with OpenSeadragon viewer.
///
/// # Endpoint
///
/// `GET /view/{slug}`
pub async fn viewer_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Html<String>, ApiError> {
    let artwork = find(&state, slug).await?;
    Ok(Html(super::viewer::generate_viewer_html(
        &artwork.record,
        &artwork.descriptor,
    )))
}

async fn find(state: &AppState, slug: String) -> Result<DiscoveredArtwork, ApiError> {
    let root = Arc::clone(&state.root);
    let lookup = slug.clone();
    tokio::task::spawn_blocking(move || gallery::find_artwork(&root, &lookup))
        .await?
        .ok_or(ApiError::NotFound(slug))
}

// =============================================================================
// Tests
// =============================================================================
