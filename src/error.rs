use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid conversion parameters.
///
/// These are detected by validation before any file is opened or written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Tile size outside the supported range
    #[error("Tile size must be between {min} and {max}, got {value}")]
    InvalidTileSize { value: u32, min: u32, max: u32 },

    /// Overlap too large for the tile size
    #[error("Overlap must be at most half the tile size ({tile_size}), got {overlap}")]
    InvalidOverlap { overlap: u32, tile_size: u32 },

    /// Quality outside 1-100
    #[error("Quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    /// Tile format has no encoder
    #[error("Unsupported tile format: {0} (expected jpg, jpeg or png)")]
    UnsupportedFormat(String),

    /// Memory limit of zero bytes
    #[error("Memory limit must be greater than 0")]
    ZeroMemoryLimit,
}

/// Errors that can occur while converting an image into a pyramid.
///
/// Every variant prevents the descriptor from being published.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Source image is unreadable, corrupt or in an unsupported format
    #[error("Cannot decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Invalid conversion parameters
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem failure, with the path that failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Every disambiguated slug candidate is taken
    #[error("No free slug for '{slug}' after {attempts} attempts")]
    SlugCollisionExhausted { slug: String, attempts: u32 },

    /// Tile encoding failed
    #[error("Tile encoding failed: {message}")]
    Encode { message: String },

    /// Conversion was cancelled through its cancel flag
    #[error("Conversion cancelled")]
    Cancelled,
}

impl ConversionError {
    /// Wrap an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConversionError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a decode error for the given source path.
    pub fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ConversionError::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Whether retrying the same conversion could succeed.
    ///
    /// Filesystem failures may be transient; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConversionError::Io { .. })
    }
}

/// Errors raised while reading a `.dzi` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Descriptor file could not be read
    #[error("Cannot read descriptor: {0}")]
    Io(String),

    /// Required element is absent
    #[error("Missing <{0}> element")]
    MissingElement(&'static str),

    /// Required attribute is absent
    #[error("Missing attribute {0}")]
    MissingAttribute(&'static str),

    /// Attribute present but not a valid value
    #[error("Invalid value for {attribute}: {value:?}")]
    InvalidAttribute {
        attribute: &'static str,
        value: String,
    },

    /// JSON form could not be parsed
    #[error("Invalid JSON descriptor: {0}")]
    Json(String),
}
