//! Pyramid builder.
//!
//! Turns a source image into a Deep Zoom tile tree plus descriptor:
//!
//! ```text
//! {output_dir}/{name}.dzi
//! {output_dir}/{name}_files/{level}/{col}_{row}.{ext}
//! ```
//!
//! # Algorithm
//!
//! Levels are produced from the top (native resolution) down. For each level:
//!
//! 1. Rows are pulled from a [`RegionReader`] one tile row (band) at a time,
//!    keeping `overlap` rows of the previous band for the top overlap of the
//!    next one.
//! 2. The tiles of a band are cropped, encoded and written in parallel.
//! 3. Every freshly read row also goes through a [`RowHalver`] into the
//!    [`LevelStore`] of the next-coarser level.
//!
//! Level L is only started once level L+1 is fully tiled and its reduction
//! fully stored, and at most one band plus the next level's store is resident
//! at a time. The descriptor is written last, atomically, so a failed or
//! cancelled build never advertises an incomplete tree.

use std::fs;
use std::io;
use std::path::Path;

use image::RgbaImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConversionError};
use crate::source::{ImageBackend, RegionReader};
use crate::tile::{is_valid_quality, TileEncoder, TileFormat, DEFAULT_JPEG_QUALITY};

use super::descriptor::{PyramidDescriptor, DESCRIPTOR_EXTENSION};
use super::downsample::{RowHalver, BYTES_PER_PIXEL};
use super::geometry::{tile_count, tile_span, PyramidGeometry, MAX_TILE_SIZE, MIN_TILE_SIZE};
use super::level_store::LevelStore;
use super::progress::{CancelFlag, ProgressReporter};

/// Default tile edge length.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default overlap between neighboring tiles.
pub const DEFAULT_OVERLAP: u32 = 1;

/// Default memory limit: 512 MiB.
pub const DEFAULT_MEMORY_LIMIT: u64 = 512 * 1024 * 1024;

// =============================================================================
// Options
// =============================================================================

/// Parameters of one pyramid build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Nominal tile edge length in pixels
    pub tile_size: u32,

    /// Extra pixels shared with each existing neighbor
    pub overlap: u32,

    /// Tile output format
    pub format: TileFormat,

    /// JPEG quality (1-100), ignored for PNG
    pub quality: u8,

    /// Bytes a derived level may occupy in memory before it is spilled to disk
    pub memory_limit: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            overlap: DEFAULT_OVERLAP,
            format: TileFormat::Jpeg,
            quality: DEFAULT_JPEG_QUALITY,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl BuildOptions {
    /// Check the parameters before any file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return Err(ConfigError::InvalidTileSize {
                value: self.tile_size,
                min: MIN_TILE_SIZE,
                max: MAX_TILE_SIZE,
            });
        }

        if self.overlap > self.tile_size / 2 {
            return Err(ConfigError::InvalidOverlap {
                overlap: self.overlap,
                tile_size: self.tile_size,
            });
        }

        if !is_valid_quality(self.quality) {
            return Err(ConfigError::InvalidQuality(self.quality));
        }

        if self.memory_limit == 0 {
            return Err(ConfigError::ZeroMemoryLimit);
        }

        Ok(())
    }

    /// Encoder configured from these options.
    pub fn encoder(&self) -> TileEncoder {
        TileEncoder::new(self.format, self.quality)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds Deep Zoom pyramids.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use gigazoom::pyramid::{BuildOptions, PyramidBuilder};
/// use gigazoom::source::select_backend;
///
/// let source = Path::new("painting.png");
/// let backend = select_backend(source)?;
/// let builder = PyramidBuilder::new(BuildOptions::default())?;
/// let descriptor = builder.build(backend.as_ref(), source, Path::new("out/painting"), "painting")?;
/// println!("{} levels", descriptor.level_count());
/// # Ok::<(), gigazoom::ConversionError>(())
/// ```
#[derive(Debug)]
pub struct PyramidBuilder {
    options: BuildOptions,
    encoder: TileEncoder,
    reporter: ProgressReporter,
    cancel: CancelFlag,
}

impl PyramidBuilder {
    /// Create a builder, rejecting invalid options.
    pub fn new(options: BuildOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            options,
            encoder: options.encoder(),
            reporter: ProgressReporter::disabled(),
            cancel: CancelFlag::new(),
        })
    }

    /// Publish progress through `reporter`.
    pub fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Stop at the next band or tile once `cancel` is set.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the pyramid of `source` into `output_dir` under `name`.
    ///
    /// Any previous `{name}.dzi` and `{name}_files` in `output_dir` are
    /// replaced. On failure or cancellation the partial tile tree is removed
    /// and no descriptor exists.
    pub fn build(
        &self,
        backend: &dyn ImageBackend,
        source: &Path,
        output_dir: &Path,
        name: &str,
    ) -> Result<PyramidDescriptor, ConversionError> {
        let descriptor_path = output_dir.join(format!("{name}.{DESCRIPTOR_EXTENSION}"));
        let files_dir = output_dir.join(format!("{name}_files"));

        remove_file_if_exists(&descriptor_path)?;
        remove_dir_if_exists(&files_dir)?;

        let (width, height) = backend.probe(source)?;
        if width == 0 || height == 0 {
            return Err(ConversionError::decode(source, "image has no pixels"));
        }

        let source_bytes = width as u64 * height as u64 * BYTES_PER_PIXEL as u64;
        if !backend.can_stream() && source_bytes > self.options.memory_limit {
            warn!(
                backend = backend.name(),
                source_bytes,
                memory_limit = self.options.memory_limit,
                "Source decoded fully into memory, exceeding the memory limit"
            );
        }

        let reader = backend.open(source)?;
        if reader.dimensions() != (width, height) {
            let (w, h) = reader.dimensions();
            return Err(ConversionError::decode(
                source,
                format!("header says {width}x{height} but decoder yields {w}x{h}"),
            ));
        }

        let geometry = PyramidGeometry::new(
            width,
            height,
            self.options.tile_size,
            self.options.overlap,
        );
        info!(
            source = %source.display(),
            width,
            height,
            levels = geometry.level_count(),
            tiles = geometry.total_tiles(),
            backend = backend.name(),
            "Building pyramid"
        );

        fs::create_dir_all(&files_dir).map_err(|e| ConversionError::io(&files_dir, e))?;
        self.reporter.start(geometry.total_tiles());

        let descriptor = PyramidDescriptor::new(&geometry, self.options.format);
        let result = self
            .build_levels(backend, reader, source, &geometry, &files_dir)
            .and_then(|()| descriptor.write_atomic(&descriptor_path));

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_dir_all(&files_dir) {
                warn!(path = %files_dir.display(), error = %cleanup, "Failed to remove partial tiles");
            }
            return Err(e);
        }

        info!(descriptor = %descriptor_path.display(), "Pyramid complete");
        Ok(descriptor)
    }

    fn build_levels(
        &self,
        backend: &dyn ImageBackend,
        mut reader: Box<dyn RegionReader>,
        source: &Path,
        geometry: &PyramidGeometry,
        files_dir: &Path,
    ) -> Result<(), ConversionError> {
        for level in (0..=geometry.max_level()).rev() {
            self.cancel.check()?;

            let mut next = match level.checked_sub(1).and_then(|l| geometry.level_dimensions(l)) {
                Some((w, h)) => Some(LevelStore::new(w, h, self.options.memory_limit)?),
                None => None,
            };

            self.tile_level(backend, reader.as_mut(), source, level, files_dir, next.as_mut())?;

            match next {
                Some(store) => {
                    debug!(
                        level = level - 1,
                        spilled = store.is_spilled(),
                        "Derived level stored"
                    );
                    reader = Box::new(store.finish()?);
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Tile one level band by band, feeding its reduction into `next`.
    fn tile_level(
        &self,
        backend: &dyn ImageBackend,
        reader: &mut dyn RegionReader,
        source: &Path,
        level: u32,
        files_dir: &Path,
        mut next: Option<&mut LevelStore>,
    ) -> Result<(), ConversionError> {
        let (width, height) = reader.dimensions();
        let tile_size = self.options.tile_size;
        let overlap = self.options.overlap;
        let (cols, rows) = tile_count(width, height, tile_size);
        let row_bytes = width as usize * BYTES_PER_PIXEL;

        let level_dir = files_dir.join(level.to_string());
        fs::create_dir_all(&level_dir).map_err(|e| ConversionError::io(&level_dir, e))?;
        debug!(level, width, height, cols, rows, "Tiling level");

        let mut halver = match next.as_ref() {
            Some(store) => {
                let halver = RowHalver::new(width);
                if halver.output_width() != store.width() {
                    return Err(ConversionError::Encode {
                        message: format!(
                            "level {level} halves to {} columns, next level has {}",
                            halver.output_width(),
                            store.width()
                        ),
                    });
                }
                Some(halver)
            }
            None => None,
        };
        let mut window: Vec<u8> = Vec::new();
        let mut window_start = 0u32;

        for row in 0..rows {
            self.cancel.check()?;

            let (y0, y1) = tile_span(row, tile_size, overlap, height);
            let loaded_end = window_start + (window.len() / row_bytes) as u32;
            if y1 > loaded_end {
                let wanted = y1 - loaded_end;
                let fresh = reader.read_rows(wanted)?;
                if fresh.len() != wanted as usize * row_bytes {
                    return Err(ConversionError::decode(
                        source,
                        format!(
                            "level {level} ended after {} of {height} rows",
                            loaded_end as usize + fresh.len() / row_bytes
                        ),
                    ));
                }
                if let (Some(halver), Some(store)) = (halver.as_mut(), next.as_deref_mut()) {
                    store.push_rows(&halver.push(&fresh))?;
                }
                window.extend_from_slice(&fresh);
            }

            if y0 > window_start {
                window.drain(..(y0 - window_start) as usize * row_bytes);
                window_start = y0;
            }

            let band = &window[..(y1 - y0) as usize * row_bytes];
            self.write_band(backend, band, width, y1 - y0, row, cols, &level_dir)?;
            self.reporter.advance(cols as u64, level);
        }

        if let (Some(halver), Some(store)) = (halver, next) {
            if let Some(last) = halver.finish() {
                store.push_rows(&last)?;
            }
        }
        Ok(())
    }

    /// Encode and write the `cols` tiles of one band in parallel.
    #[allow(clippy::too_many_arguments)]
    fn write_band(
        &self,
        backend: &dyn ImageBackend,
        band: &[u8],
        width: u32,
        band_height: u32,
        row: u32,
        cols: u32,
        level_dir: &Path,
    ) -> Result<(), ConversionError> {
        let extension = self.options.format.extension();

        (0..cols).into_par_iter().try_for_each(|col| {
            self.cancel.check()?;

            let (x0, x1) = tile_span(col, self.options.tile_size, self.options.overlap, width);
            let tile = crop_band(band, width, band_height, x0, x1)?;
            let bytes = backend.encode_tile(&tile, &self.encoder)?;

            let path = level_dir.join(format!("{col}_{row}.{extension}"));
            fs::write(&path, bytes).map_err(|e| ConversionError::io(&path, e))
        })
    }
}

/// Copy columns `[x0, x1)` of a band into a tile image.
fn crop_band(
    band: &[u8],
    width: u32,
    band_height: u32,
    x0: u32,
    x1: u32,
) -> Result<RgbaImage, ConversionError> {
    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let start = x0 as usize * BYTES_PER_PIXEL;
    let end = x1 as usize * BYTES_PER_PIXEL;

    let mut pixels = Vec::with_capacity((end - start) * band_height as usize);
    for y in 0..band_height as usize {
        let offset = y * row_bytes;
        pixels.extend_from_slice(&band[offset + start..offset + end]);
    }

    RgbaImage::from_raw(x1 - x0, band_height, pixels).ok_or_else(|| ConversionError::Encode {
        message: format!("tile buffer does not match {}x{}", x1 - x0, band_height),
    })
}

fn remove_file_if_exists(path: &Path) -> Result<(), ConversionError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(ConversionError::io(path, e)),
        _ => Ok(()),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), ConversionError> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(ConversionError::io(path, e)),
        _ => Ok(()),
    }
}
