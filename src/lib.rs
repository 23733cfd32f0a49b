//! # gigazoom
//!
//! Converts arbitrarily large raster images into Deep Zoom (DZI) tile
//! pyramids so a viewer can stream only the visible tiles at the right
//! resolution, and serves the result as a browsable gallery.
//!
//! ## Features
//!
//! - **Bounded memory**: sources are read in bands of one tile row and
//!   coarser levels spill to temporary files above a configurable limit
//! - **Exact Deep Zoom geometry**: level and tile arithmetic identical to
//!   OpenSeadragon's, overlap only at internal seams, truncated edge tiles
//! - **Parallel tiling**: tiles of a band are encoded on the rayon pool
//! - **Safe publication**: the descriptor is written last and atomically
//! - **Directory as database**: the gallery is recomputed from the artwork
//!   root, no index file to go stale
//!
//! ## Architecture
//!
//! - [`pyramid`] - geometry, descriptor, downsampling and the builder
//! - [`source`] - image backends (streaming PNG and TIFF, full decode)
//! - [`tile`] - tile formats and encoding
//! - [`gallery`] - slugs, sidecars, discovery and thumbnails
//! - [`convert`] - the conversion entry point
//! - [`server`] - Axum gallery server
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use gigazoom::{convert_artwork, discover_artworks, ConversionOptions};
//!
//! let record = convert_artwork(
//!     Path::new("Starry Night.jpg"),
//!     Path::new("Artworks"),
//!     ConversionOptions::default(),
//! )?;
//! assert_eq!(record.descriptor_path, "starry-night/starry-night.dzi");
//!
//! for artwork in discover_artworks(Path::new("Artworks"))? {
//!     println!("{} -> {}", artwork.display_name, artwork.descriptor_path);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod gallery;
pub mod pyramid;
pub mod server;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, ConvertConfig, ListConfig, ServeConfig};
pub use convert::{convert_artwork, ConversionOptions, Converter};
pub use error::{ConfigError, ConversionError, DescriptorError};
pub use gallery::{
    discover_artworks, find_artwork, render_thumbnail, reserve_slug, slugify, ArtworkRecord,
    ArtworkSidecar, DiscoveredArtwork,
};
pub use pyramid::{
    BuildOptions, CancelFlag, Progress, ProgressReporter, PyramidBuilder, PyramidDescriptor,
    PyramidGeometry,
};
pub use server::{create_router, AppState, RouterConfig};
pub use source::{
    select_backend, DecodedBackend, ImageBackend, PngStreamBackend, RegionReader,
    TiffStreamBackend,
};
pub use tile::{TileEncoder, TileFormat};
