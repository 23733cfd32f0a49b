//! Naming and discovery of converted artworks.
//!
//! An artwork root holds one directory per artwork:
//!
//! ```text
//! {root}/{slug}/artwork.json          display name + source file
//! {root}/{slug}/{slug}.dzi            descriptor (present only when complete)
//! {root}/{slug}/{slug}_files/...      tiles
//! ```
//!
//! There is no global index; [`discover_artworks`] rebuilds the gallery from
//! the directory tree on every call.

pub mod discovery;
pub mod record;
pub mod slug;
pub mod thumbnail;

pub use discovery::{discover_artworks, find_artwork, scan, DiscoveredArtwork};
pub use record::{ArtworkRecord, ArtworkSidecar, SIDECAR_FILE};
pub use slug::{is_valid_slug, reserve_slug, slugify, SlugReservation, MAX_SLUG_ATTEMPTS};
pub use thumbnail::{
    compose_level, render_thumbnail, thumbnail_level, DEFAULT_THUMBNAIL_SIZE, THUMBNAIL_QUALITY,
};
