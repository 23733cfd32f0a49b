//! HTTP server layer for the artwork gallery.
//!
//! The server is a thin, read-only view over an artwork root:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   /api/artworks   /api/artworks/{slug}/thumbnail.jpg   /view    │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────────┐  ┌─────────────────────┐  │
//! │  │  handlers   │  │ thumbnail_cache │  │       routes        │  │
//! │  │ (requests)  │  │   (LRU, JPEG)   │  │ (router + static)   │  │
//! │  └─────────────┘  └─────────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                     gallery::discovery
//! ```

pub mod handlers;
pub mod routes;
pub mod thumbnail_cache;
mod viewer;

pub use handlers::{
    artwork_handler, artworks_handler, health_handler, thumbnail_handler, viewer_handler,
    ApiError, AppState, ArtworkDetail, ArtworkSummary, ErrorResponse, HealthResponse,
};
pub use routes::{create_router, RouterConfig};
pub use thumbnail_cache::{ThumbnailCache, ThumbnailKey};
