//! Gallery HTTP API integration tests.
//!
//! Tests verify:
//! - Listing, detail and viewer endpoints over a converted artwork root
//! - Thumbnail rendering and caching headers
//! - Static descriptor and tile serving, hiding sidecars and dot-files
//! - Error responses for unknown slugs

use std::path::Path;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use gigazoom::convert::{convert_artwork, ConversionOptions};
use gigazoom::pyramid::BuildOptions;
use gigazoom::server::{create_router, RouterConfig};

use super::test_utils::{is_valid_jpeg, write_png};

/// Artwork root with two converted artworks.
fn gallery_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("Artworks");
    let options = ConversionOptions {
        build: BuildOptions {
            tile_size: 64,
            ..BuildOptions::default()
        },
        cleanup_original: false,
    };

    let starry = write_png(dir.path(), "Starry Night.png", 400, 300);
    let irises = write_png(dir.path(), "Irises.png", 120, 160);
    convert_artwork(&starry, &root, options).unwrap();
    convert_artwork(&irises, &root, options).unwrap();
    dir
}

fn router_for(dir: &Path) -> Router {
    create_router(
        RouterConfig::new(dir.join("Artworks"))
            .with_thumbnails(100, 8)
            .with_tracing(false),
    )
}

async fn get(router: Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let response = get(router_for(dir.path()), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

// =============================================================================
// Listing and Detail
// =============================================================================

#[tokio::test]
async fn test_list_artworks() {
    let dir = gallery_root();
    let response = get(router_for(dir.path()), "/api/artworks").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );

    let json = body_json(response).await;
    let artworks = json.as_array().unwrap();
    assert_eq!(artworks.len(), 2);

    // sorted by slug
    assert_eq!(artworks[0]["slug"], "irises");
    assert_eq!(artworks[1]["slug"], "starry-night");
    assert_eq!(artworks[1]["name"], "Starry Night");
    assert_eq!(artworks[1]["path"], "starry-night/starry-night.dzi");
    assert_eq!(
        artworks[1]["thumbnail"],
        "/api/artworks/starry-night/thumbnail.jpg"
    );
}

#[tokio::test]
async fn test_list_empty_root() {
    let dir = TempDir::new().unwrap();
    let response = get(router_for(dir.path()), "/api/artworks").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_artwork_detail() {
    let dir = gallery_root();
    let response = get(router_for(dir.path()), "/api/artworks/starry-night").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["slug"], "starry-night");
    assert_eq!(json["width"], 400);
    assert_eq!(json["height"], 300);
    assert_eq!(json["level_count"], 10);
    assert_eq!(json["descriptor"]["Image"]["TileSize"], "64");
}

#[tokio::test]
async fn test_unknown_artwork_is_404() {
    let dir = gallery_root();
    let response = get(router_for(dir.path()), "/api/artworks/sunflowers").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

// =============================================================================
// Thumbnails
// =============================================================================

#[tokio::test]
async fn test_thumbnail_rendered_then_cached() {
    let dir = gallery_root();
    let router = router_for(dir.path());

    let first = get(router.clone(), "/api/artworks/starry-night/thumbnail.jpg").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("content-type").unwrap(), "image/jpeg");
    assert_eq!(first.headers().get("x-thumbnail-cache-hit").unwrap(), "false");
    let first_body = first.into_body().collect().await.unwrap().to_bytes();
    assert!(is_valid_jpeg(&first_body));

    let thumb = image::load_from_memory(&first_body).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (100, 75));

    let second = get(router, "/api/artworks/starry-night/thumbnail.jpg").await;
    assert_eq!(second.headers().get("x-thumbnail-cache-hit").unwrap(), "true");
    let second_body = second.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn test_thumbnail_does_not_write_to_root() {
    let dir = gallery_root();
    let artwork_dir = dir.path().join("Artworks/irises");
    let before = std::fs::read_dir(&artwork_dir).unwrap().count();

    let response = get(router_for(dir.path()), "/api/artworks/irises/thumbnail.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(std::fs::read_dir(&artwork_dir).unwrap().count(), before);
}

#[tokio::test]
async fn test_thumbnail_without_tiles_is_404() {
    let dir = gallery_root();
    std::fs::remove_dir_all(dir.path().join("Artworks/irises/irises_files")).unwrap();

    let response = get(router_for(dir.path()), "/api/artworks/irises/thumbnail.jpg").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "thumbnail_unavailable");
}

// =============================================================================
// Viewer and Static Files
// =============================================================================

#[tokio::test]
async fn test_viewer_page() {
    let dir = gallery_root();
    let response = get(router_for(dir.path()), "/view/starry-night").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/html"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("/starry-night/starry-night.dzi"));
    assert!(html.contains("<title>Starry Night</title>"));
}

#[tokio::test]
async fn test_viewer_unknown_slug_is_404() {
    let dir = gallery_root();
    let response = get(router_for(dir.path()), "/view/nothing-here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_descriptor_served_statically() {
    let dir = gallery_root();
    let response = get(router_for(dir.path()), "/starry-night/starry-night.dzi").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let xml = String::from_utf8(body.to_vec()).unwrap();
    assert!(xml.contains(r#"Width="400""#));
}

#[tokio::test]
async fn test_tile_served_statically() {
    let dir = gallery_root();
    let response = get(
        router_for(dir.path()),
        "/starry-night/starry-night_files/9/0_0.jpg",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(is_valid_jpeg(&body));
}

#[tokio::test]
async fn test_missing_static_file_is_404() {
    let dir = gallery_root();
    let response = get(
        router_for(dir.path()),
        "/starry-night/starry-night_files/9/99_99.jpg",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sidecar_is_not_served() {
    let dir = gallery_root();
    assert!(dir.path().join("Artworks/starry-night/artwork.json").is_file());

    for uri in [
        "/starry-night/artwork.json",
        "/starry-night/artwork%2Ejson",
        "/irises/artwork.json",
    ] {
        let response = get(router_for(dir.path()), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(
            !String::from_utf8_lossy(&body).contains("source_file"),
            "{uri} leaked the sidecar"
        );
    }
}

#[tokio::test]
async fn test_dot_files_are_not_served() {
    let dir = gallery_root();
    let artwork_dir = dir.path().join("Artworks/starry-night");
    std::fs::write(artwork_dir.join(".dzi-pending.tmp"), "<Image/>").unwrap();
    std::fs::create_dir(dir.path().join("Artworks/.trash")).unwrap();
    std::fs::write(dir.path().join("Artworks/.trash/old.dzi"), "<Image/>").unwrap();

    for uri in ["/starry-night/.dzi-pending.tmp", "/.trash/old.dzi"] {
        let response = get(router_for(dir.path()), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_cors_preflight() {
    let dir = TempDir::new().unwrap();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/artworks")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "GET")
        .body(Body::empty())
        .unwrap();

    let response = router_for(dir.path()).oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}
