//! Tile encoder.
//!
//! Encodes RGBA tile buffers produced by the pyramid builder into the
//! configured output format.
//!
//! # Formats
//!
//! - **JPEG**: alpha is dropped, quality is configurable (1-100).
//! - **PNG**: lossless, alpha is kept, quality is ignored.

use std::fmt;
use std::str::FromStr;

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

use crate::error::{ConfigError, ConversionError};

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Tile Format
// =============================================================================

/// Image format of the tiles in a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileFormat {
    #[default]
    Jpeg,
    Png,
}

impl TileFormat {
    /// File extension of tile files, also the descriptor's `Format` value.
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpg",
            TileFormat::Png => "png",
        }
    }

    /// HTTP content type of encoded tiles.
    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Png => "image/png",
        }
    }

    /// Whether the format discards information.
    pub fn is_lossy(&self) -> bool {
        matches!(self, TileFormat::Jpeg)
    }
}

impl FromStr for TileFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "jpg" | "jpeg" => Ok(TileFormat::Jpeg),
            "png" => Ok(TileFormat::Png),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// =============================================================================
// Tile Encoder
// =============================================================================

/// Encoder turning RGBA tile buffers into tile file bytes.
///
/// Cheap to clone and safe to share across worker threads.
///
/// # Example
///
/// ```
/// use gigazoom::tile::{TileEncoder, TileFormat};
/// use image::RgbaImage;
///
/// let encoder = TileEncoder::new(TileFormat::Jpeg, 85);
/// let tile = RgbaImage::new(16, 16);
/// let bytes = encoder.encode(&tile).unwrap();
/// assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEncoder {
    format: TileFormat,
    quality: u8,
}

impl TileEncoder {
    /// Create an encoder. Quality is clamped to 1-100.
    pub fn new(format: TileFormat, quality: u8) -> Self {
        Self {
            format,
            quality: clamp_quality(quality),
        }
    }

    /// Output format.
    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Effective quality.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode one tile.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::Encode`] if the codec rejects the buffer
    /// (e.g. a zero-sized tile).
    pub fn encode(&self, tile: &RgbaImage) -> Result<Vec<u8>, ConversionError> {
        let (width, height) = tile.dimensions();
        let mut output = Vec::new();

        match self.format {
            TileFormat::Jpeg => {
                let rgb: RgbImage = tile.convert();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.quality);
                encoder
                    .encode_image(&rgb)
                    .map_err(|e| ConversionError::Encode {
                        message: e.to_string(),
                    })?;
            }
            TileFormat::Png => {
                PngEncoder::new(&mut output)
                    .write_image(tile.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| ConversionError::Encode {
                        message: e.to_string(),
                    })?;
            }
        }

        Ok(output)
    }
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new(TileFormat::Jpeg, DEFAULT_JPEG_QUALITY)
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
