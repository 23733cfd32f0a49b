//! Command-line configuration for gigazoom.
//!
//! Every option can also be set through an environment variable with the
//! `GIGAZOOM_` prefix:
//!
//! - `GIGAZOOM_OUTPUT_ROOT` / `GIGAZOOM_ROOT` - artwork root (default: Artworks)
//! - `GIGAZOOM_TILE_SIZE` - tile edge length (default: 256)
//! - `GIGAZOOM_OVERLAP` - tile overlap (default: 1)
//! - `GIGAZOOM_FORMAT` - tile format, jpg or png (default: jpg)
//! - `GIGAZOOM_QUALITY` - JPEG quality (default: 85)
//! - `GIGAZOOM_MEMORY_LIMIT_MB` - in-memory budget per level (default: 512)
//! - `GIGAZOOM_HOST` / `GIGAZOOM_PORT` - server bind address (default: 0.0.0.0:8000)
//! - `GIGAZOOM_CORS_ORIGINS` - allowed origins, comma-separated (default: any)
//! - `GIGAZOOM_CACHE_MAX_AGE` - Cache-Control max-age for tiles (default: 3600)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::convert::ConversionOptions;
use crate::gallery::DEFAULT_THUMBNAIL_SIZE;
use crate::pyramid::{
    BuildOptions, DEFAULT_OVERLAP, DEFAULT_TILE_SIZE, MAX_TILE_SIZE, MIN_TILE_SIZE,
};
use crate::tile::{TileFormat, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default artwork root directory.
pub const DEFAULT_ROOT: &str = "Artworks";

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default per-level memory budget in MiB.
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 512;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Default number of rendered thumbnails kept in memory.
pub const DEFAULT_THUMBNAIL_CACHE_CAPACITY: usize = 256;

// =============================================================================
// CLI Arguments
// =============================================================================

/// gigazoom - Deep Zoom pyramids for gigapixel artworks.
///
/// Converts very large images into tiled multi-resolution pyramids and serves
/// them to a pan/zoom viewer.
#[derive(Parser, Debug, Clone)]
#[command(name = "gigazoom")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert an image into a Deep Zoom pyramid.
    Convert(ConvertConfig),

    /// List converted artworks.
    List(ListConfig),

    /// Serve the gallery API, viewer and tiles over HTTP.
    Serve(ServeConfig),
}

/// Tile format accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatArg {
    #[default]
    #[value(alias = "jpeg")]
    Jpg,
    Png,
}

impl From<FormatArg> for TileFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Jpg => TileFormat::Jpeg,
            FormatArg::Png => TileFormat::Png,
        }
    }
}

// =============================================================================
// Convert
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ConvertConfig {
    /// Source image (JPEG, PNG, TIFF or BMP).
    pub source: PathBuf,

    /// Directory holding one subdirectory per artwork.
    #[arg(short, long, default_value = DEFAULT_ROOT, env = "GIGAZOOM_OUTPUT_ROOT")]
    pub output_root: PathBuf,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "GIGAZOOM_TILE_SIZE")]
    pub tile_size: u32,

    /// Pixels shared between neighboring tiles.
    #[arg(long, default_value_t = DEFAULT_OVERLAP, env = "GIGAZOOM_OVERLAP")]
    pub overlap: u32,

    /// Tile image format.
    #[arg(long, value_enum, default_value_t = FormatArg::Jpg, env = "GIGAZOOM_FORMAT")]
    pub format: FormatArg,

    /// JPEG quality (1-100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, env = "GIGAZOOM_QUALITY")]
    pub quality: u8,

    /// Memory a derived level may use before it is spilled to a temp file, in MiB.
    #[arg(long, default_value_t = DEFAULT_MEMORY_LIMIT_MB, env = "GIGAZOOM_MEMORY_LIMIT_MB")]
    pub memory_limit_mb: u64,

    /// Delete the original after a successful conversion (JPEG and PNG only).
    #[arg(long, default_value_t = false)]
    pub cleanup: bool,

    /// Do not draw a progress bar.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl ConvertConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return Err(format!(
                "tile_size must be between {} and {}",
                MIN_TILE_SIZE, MAX_TILE_SIZE
            ));
        }

        if self.overlap > self.tile_size / 2 {
            return Err("overlap must be at most half the tile size".to_string());
        }

        if self.quality == 0 || self.quality > 100 {
            return Err("quality must be between 1 and 100".to_string());
        }

        if self.memory_limit_mb == 0 {
            return Err("memory_limit_mb must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Library options equivalent to these arguments.
    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            build: BuildOptions {
                tile_size: self.tile_size,
                overlap: self.overlap,
                format: self.format.into(),
                quality: self.quality,
                memory_limit: self.memory_limit_mb.saturating_mul(1024 * 1024),
            },
            cleanup_original: self.cleanup,
        }
    }
}

// =============================================================================
// List
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ListConfig {
    /// Artwork root directory.
    #[arg(short, long, default_value = DEFAULT_ROOT, env = "GIGAZOOM_ROOT")]
    pub root: PathBuf,

    /// Print JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Artwork root directory to serve.
    #[arg(short, long, default_value = DEFAULT_ROOT, env = "GIGAZOOM_ROOT")]
    pub root: PathBuf,

    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GIGAZOOM_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GIGAZOOM_PORT")]
    pub port: u16,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "GIGAZOOM_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// HTTP Cache-Control max-age in seconds for tiles and thumbnails.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "GIGAZOOM_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Edge length of gallery thumbnails in pixels.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE, env = "GIGAZOOM_THUMBNAIL_SIZE")]
    pub thumbnail_size: u32,

    /// Maximum number of rendered thumbnails kept in memory.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_CACHE_CAPACITY, env = "GIGAZOOM_THUMBNAIL_CACHE")]
    pub thumbnail_cache: usize,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.thumbnail_size == 0 || self.thumbnail_size > 2048 {
            return Err("thumbnail_size must be between 1 and 2048".to_string());
        }

        if self.thumbnail_cache == 0 {
            return Err("thumbnail_cache must be greater than 0".to_string());
        }

        if let Some(origins) = &self.cors_origins {
            if origins.iter().any(|o| o.trim().is_empty()) {
                return Err("cors_origins must not contain empty entries".to_string());
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================
