//! Test utilities for integration tests.
//!
//! Synthetic source images, a recording backend that wraps a real one, and
//! helpers for inspecting a finished pyramid on disk.

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tiff::encoder::{colortype, TiffEncoder};

use gigazoom::error::ConversionError;
use gigazoom::source::{ImageBackend, RegionReader};
use gigazoom::tile::TileEncoder;

// =============================================================================
// Source Images
// =============================================================================

/// Deterministic, non-uniform RGBA pattern.
pub fn pattern_rgba(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 7 % 256) as u8,
            (y * 13 % 256) as u8,
            ((x + y) * 3 % 256) as u8,
            255,
        ])
    })
}

/// Write an opaque RGB PNG and return its path.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    DynamicImage::ImageRgba8(pattern_rgba(width, height))
        .to_rgb8()
        .save(&path)
        .unwrap();
    path
}

/// Write an RGBA PNG with the same pattern as [`pattern_rgba`].
pub fn write_rgba_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    pattern_rgba(width, height).save(&path).unwrap();
    path
}

/// Write a JPEG and return its path.
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let rgb = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    rgb.save(&path).unwrap();
    path
}

/// Write an RGB TIFF of [`pattern_rgba`] with `rows_per_strip` rows per strip.
pub fn write_tiff(dir: &Path, name: &str, width: u32, height: u32, rows_per_strip: u32) -> PathBuf {
    let path = dir.join(name);
    let rgb = DynamicImage::ImageRgba8(pattern_rgba(width, height)).to_rgb8();
    let mut file = fs::File::create(&path).unwrap();
    let mut tiff = TiffEncoder::new(&mut file).unwrap();
    let mut image = tiff.new_image::<colortype::RGB8>(width, height).unwrap();
    image.rows_per_strip(rows_per_strip).unwrap();
    image.write_data(rgb.as_raw()).unwrap();
    path
}

/// Write a file that starts like a PNG but is truncated garbage.
pub fn write_corrupt_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    fs::write(&path, bytes).unwrap();
    path
}

/// Write a valid PNG and cut off the second half of its image data.
pub fn write_truncated_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = write_png(dir, name, width, height);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    path
}

// =============================================================================
// Recording Backend
// =============================================================================

/// Wraps a backend and records the largest strip requested from the source,
/// plus the order of `probe`/`open` calls.
pub struct RecordingBackend<B> {
    inner: B,
    max_rows: Arc<AtomicU32>,
    reads: Arc<AtomicU32>,
    calls: Mutex<Vec<&'static str>>,
}

impl<B: ImageBackend> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            max_rows: Arc::new(AtomicU32::new(0)),
            reads: Arc::new(AtomicU32::new(0)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Backend entry points called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Largest number of rows asked for in a single read.
    pub fn max_rows(&self) -> u32 {
        self.max_rows.load(Ordering::SeqCst)
    }

    /// Number of read calls made against the source.
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

struct RecordingReader {
    inner: Box<dyn RegionReader>,
    max_rows: Arc<AtomicU32>,
    reads: Arc<AtomicU32>,
}

impl RegionReader for RecordingReader {
    fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    fn read_rows(&mut self, rows: u32) -> Result<Vec<u8>, ConversionError> {
        self.max_rows.fetch_max(rows, Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_rows(rows)
    }
}

impl<B: ImageBackend> ImageBackend for RecordingBackend<B> {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn can_stream(&self) -> bool {
        self.inner.can_stream()
    }

    fn supports(&self, path: &Path) -> bool {
        self.inner.supports(path)
    }

    fn probe(&self, path: &Path) -> Result<(u32, u32), ConversionError> {
        self.calls.lock().unwrap().push("probe");
        self.inner.probe(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RegionReader>, ConversionError> {
        self.calls.lock().unwrap().push("open");
        Ok(Box::new(RecordingReader {
            inner: self.inner.open(path)?,
            max_rows: Arc::clone(&self.max_rows),
            reads: Arc::clone(&self.reads),
        }))
    }
}

// =============================================================================
// Failing Backend
// =============================================================================

/// Wraps a backend and fails every tile write after the first `ok_tiles`
/// with an I/O error, as a full disk would.
pub struct FailingBackend<B> {
    inner: B,
    ok_tiles: u32,
    tiles: AtomicU32,
}

impl<B: ImageBackend> FailingBackend<B> {
    pub fn new(inner: B, ok_tiles: u32) -> Self {
        Self {
            inner,
            ok_tiles,
            tiles: AtomicU32::new(0),
        }
    }
}

impl<B: ImageBackend> ImageBackend for FailingBackend<B> {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn can_stream(&self) -> bool {
        self.inner.can_stream()
    }

    fn supports(&self, path: &Path) -> bool {
        self.inner.supports(path)
    }

    fn probe(&self, path: &Path) -> Result<(u32, u32), ConversionError> {
        self.inner.probe(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RegionReader>, ConversionError> {
        self.inner.open(path)
    }

    fn encode_tile(
        &self,
        tile: &RgbaImage,
        encoder: &TileEncoder,
    ) -> Result<Vec<u8>, ConversionError> {
        if self.tiles.fetch_add(1, Ordering::SeqCst) >= self.ok_tiles {
            return Err(ConversionError::io(
                "tile",
                io::Error::other("no space left on device"),
            ));
        }
        self.inner.encode_tile(tile, encoder)
    }
}

// =============================================================================
// Pyramid Inspection
// =============================================================================

/// All tile files below `files_dir`, as sorted relative paths.
pub fn list_tiles(files_dir: &Path) -> Vec<String> {
    let mut tiles = Vec::new();
    for level in fs::read_dir(files_dir).unwrap() {
        let level = level.unwrap();
        for tile in fs::read_dir(level.path()).unwrap() {
            let tile = tile.unwrap();
            tiles.push(format!(
                "{}/{}",
                level.file_name().to_string_lossy(),
                tile.file_name().to_string_lossy()
            ));
        }
    }
    tiles.sort();
    tiles
}

/// Read every tile file into memory, keyed by relative path.
pub fn read_tiles(files_dir: &Path) -> Vec<(String, Vec<u8>)> {
    list_tiles(files_dir)
        .into_iter()
        .map(|rel| {
            let bytes = fs::read(files_dir.join(&rel)).unwrap();
            (rel, bytes)
        })
        .collect()
}

/// Check if data is a valid JPEG (starts with SOI marker).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

/// Check if data is a PNG (starts with the PNG signature).
pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(b"\x89PNG\r\n\x1a\n")
}
