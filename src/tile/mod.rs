//! Tile encoding.
//!
//! The pyramid builder cuts each level into RGBA tile buffers; this module
//! turns them into the bytes written to `{level}/{col}_{row}.{ext}`.
//!
//! - [`TileFormat`]: output format, doubles as the descriptor's `Format` value
//! - [`TileEncoder`]: format + quality, shared by all tile workers

mod encoder;

pub use encoder::{
    clamp_quality, is_valid_quality, TileEncoder, TileFormat, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
