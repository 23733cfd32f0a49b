//! Thumbnails rendered from an existing pyramid.
//!
//! The pyramid already contains every resolution, so a thumbnail never
//! touches the source image: the smallest level at least `size` pixels on
//! its larger side is stitched from its tiles and scaled down.

use std::io;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::debug;

use crate::error::ConversionError;
use crate::pyramid::{PyramidDescriptor, PyramidGeometry};
use crate::tile::{TileEncoder, TileFormat};

/// Default thumbnail edge length.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 200;

/// JPEG quality of thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 80;

/// Smallest level whose larger side is at least `size`, or the top level.
pub fn thumbnail_level(geometry: &PyramidGeometry, size: u32) -> u32 {
    (0..=geometry.max_level())
        .find(|&level| {
            geometry
                .level_dimensions(level)
                .is_some_and(|(w, h)| w.max(h) >= size)
        })
        .unwrap_or(geometry.max_level())
}

/// Stitch one level back together from its tiles.
///
/// Returns `Ok(None)` if a tile is missing.
pub fn compose_level(
    files_dir: &Path,
    descriptor: &PyramidDescriptor,
    level: u32,
) -> Result<Option<RgbaImage>, ConversionError> {
    let geometry = descriptor.geometry();
    let (Some((width, height)), Some((cols, rows))) =
        (geometry.level_dimensions(level), geometry.tile_grid(level))
    else {
        return Ok(None);
    };

    let mut canvas = RgbaImage::new(width, height);
    for row in 0..rows {
        for col in 0..cols {
            let path = files_dir.join(PyramidGeometry::tile_path(
                level,
                col,
                row,
                &descriptor.format,
            ));
            let tile = match image::open(&path) {
                Ok(tile) => tile.into_rgba8(),
                Err(image::ImageError::IoError(e)) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Tile missing");
                    return Ok(None);
                }
                Err(e) => return Err(ConversionError::decode(&path, e)),
            };

            if let Some(rect) = geometry.tile_rect(level, col, row) {
                imageops::replace(&mut canvas, &tile, rect.x as i64, rect.y as i64);
            }
        }
    }

    Ok(Some(canvas))
}

/// Render a JPEG thumbnail fitting `size` x `size` for the artwork in
/// `artwork_dir`.
///
/// Images smaller than `size` are not enlarged. Returns `Ok(None)` when the
/// needed tiles do not exist.
pub fn render_thumbnail(
    artwork_dir: &Path,
    slug: &str,
    descriptor: &PyramidDescriptor,
    size: u32,
) -> Result<Option<Vec<u8>>, ConversionError> {
    let size = size.max(1);
    let level = thumbnail_level(&descriptor.geometry(), size);
    let files_dir = artwork_dir.join(format!("{slug}_files"));

    let Some(canvas) = compose_level(&files_dir, descriptor, level)? else {
        return Ok(None);
    };

    let (width, height) = canvas.dimensions();
    let longest = width.max(height);
    let thumb = if longest > size {
        let scale = size as f64 / longest as f64;
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        imageops::resize(&canvas, w, h, FilterType::Lanczos3)
    } else {
        canvas
    };

    let encoder = TileEncoder::new(TileFormat::Jpeg, THUMBNAIL_QUALITY);
    encoder.encode(&thumb).map(Some)
}
