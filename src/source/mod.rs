//! Source image backends.
//!
//! The pyramid builder only depends on two capability traits:
//!
//! - [`ImageBackend`]: probe dimensions, open a row reader, encode a tile
//! - [`RegionReader`]: hand out the image top to bottom in full-width RGBA strips
//!
//! Concrete backends are chosen once per source by [`select_backend`]; the
//! builder never asks which library sits behind a backend.
//!
//! | Backend | Sources | Memory |
//! |---------|---------|--------|
//! | [`PngStreamBackend`] | non-interlaced PNG | one strip |
//! | [`TiffStreamBackend`] | chunky 8/16-bit gray or RGB(A) TIFF | one strip or tile row |
//! | [`DecodedBackend`] | anything the `image` crate decodes | full image |

mod decoded;
mod png_stream;
mod tiff_stream;

use std::path::Path;

use image::RgbaImage;

use crate::error::ConversionError;
use crate::tile::TileEncoder;

pub use decoded::DecodedBackend;
pub use png_stream::PngStreamBackend;
pub use tiff_stream::TiffStreamBackend;

/// Sequential reader over the rows of an image.
///
/// Rows are 8-bit RGBA, full width, delivered strictly top to bottom. The
/// builder asks for bands of roughly one tile height, so a streaming
/// implementation only ever holds one band in memory.
pub trait RegionReader: Send {
    /// Image width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Read up to `rows` further rows.
    ///
    /// Returns fewer rows only at the end of the image and an empty buffer
    /// once every row was delivered.
    fn read_rows(&mut self, rows: u32) -> Result<Vec<u8>, ConversionError>;
}

/// A way of decoding source images.
pub trait ImageBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether [`open`](Self::open) avoids materializing the whole image.
    fn can_stream(&self) -> bool;

    /// Whether this backend can decode the file at `path`.
    ///
    /// Only inspects the file header; a `true` answer does not guarantee the
    /// rest of the file is intact.
    fn supports(&self, path: &Path) -> bool;

    /// Width and height without decoding pixel data.
    fn probe(&self, path: &Path) -> Result<(u32, u32), ConversionError>;

    /// Open a row reader positioned at the first row.
    fn open(&self, path: &Path) -> Result<Box<dyn RegionReader>, ConversionError>;

    /// Encode one tile.
    fn encode_tile(
        &self,
        tile: &RgbaImage,
        encoder: &TileEncoder,
    ) -> Result<Vec<u8>, ConversionError> {
        encoder.encode(tile)
    }
}

/// All built-in backends, most capable first.
pub fn available_backends() -> Vec<Box<dyn ImageBackend>> {
    vec![
        Box::new(PngStreamBackend),
        Box::new(TiffStreamBackend),
        Box::new(DecodedBackend),
    ]
}

/// Pick the first backend that supports `path`.
///
/// # Errors
///
/// Returns [`ConversionError::Decode`] if no backend recognizes the file.
pub fn select_backend(path: &Path) -> Result<Box<dyn ImageBackend>, ConversionError> {
    available_backends()
        .into_iter()
        .find(|backend| backend.supports(path))
        .ok_or_else(|| ConversionError::decode(path, "unrecognized image format"))
}

/// Expand decoded pixels of `channels` components into RGBA.
pub(crate) fn expand_to_rgba(pixels: &[u8], channels: usize, out: &mut Vec<u8>) {
    match channels {
        1 => {
            for &v in pixels {
                out.extend_from_slice(&[v, v, v, 255]);
            }
        }
        2 => {
            for px in pixels.chunks_exact(2) {
                out.extend_from_slice(&[px[0], px[0], px[0], px[1]]);
            }
        }
        3 => {
            for px in pixels.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        _ => out.extend_from_slice(pixels),
    }
}
