//! Bounded-memory storage of a derived pyramid level.
//!
//! While level L+1 is being tiled, its 2x reduction is appended row by row to
//! a [`LevelStore`]. Small levels stay in memory; levels whose RGBA size
//! exceeds the memory limit are spilled to an anonymous temporary file that
//! disappears when the reader is dropped. Either way the stored level is
//! replayed through the same [`RegionReader`] interface as a source image.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::ConversionError;
use crate::source::RegionReader;

use super::downsample::BYTES_PER_PIXEL;

enum Backing {
    Memory(Vec<u8>),
    Spill(BufWriter<File>),
}

/// Append-only store for one level's pixels.
pub struct LevelStore {
    width: u32,
    height: u32,
    rows_written: u32,
    backing: Backing,
}

impl LevelStore {
    /// Create a store for a `width` x `height` level.
    ///
    /// The level is spilled to disk if it needs more than `memory_limit`
    /// bytes.
    pub fn new(width: u32, height: u32, memory_limit: u64) -> Result<Self, ConversionError> {
        let size = level_bytes(width, height);
        let backing = if size > memory_limit {
            let file = tempfile::tempfile().map_err(|e| ConversionError::io(spill_dir(), e))?;
            debug!(width, height, size, "Spilling level to temporary file");
            Backing::Spill(BufWriter::new(file))
        } else {
            Backing::Memory(Vec::with_capacity(size as usize))
        };

        Ok(Self {
            width,
            height,
            rows_written: 0,
            backing,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self.backing, Backing::Spill(_))
    }

    /// Append complete rows.
    pub fn push_rows(&mut self, rows: &[u8]) -> Result<(), ConversionError> {
        if rows.is_empty() {
            return Ok(());
        }
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        let count = (rows.len() / row_bytes) as u32;

        match &mut self.backing {
            Backing::Memory(pixels) => pixels.extend_from_slice(rows),
            Backing::Spill(writer) => writer
                .write_all(rows)
                .map_err(|e| ConversionError::io(spill_dir(), e))?,
        }
        self.rows_written += count;
        Ok(())
    }

    /// Seal the store and return a reader positioned at the first row.
    ///
    /// # Errors
    ///
    /// Fails with [`ConversionError::Encode`] if fewer or more rows than the
    /// level height were pushed.
    pub fn finish(self) -> Result<LevelReader, ConversionError> {
        if self.rows_written != self.height {
            return Err(ConversionError::Encode {
                message: format!(
                    "level store holds {} rows, expected {}",
                    self.rows_written, self.height
                ),
            });
        }

        let backing = match self.backing {
            Backing::Memory(pixels) => ReadBacking::Memory { pixels, offset: 0 },
            Backing::Spill(writer) => {
                let mut file = writer
                    .into_inner()
                    .map_err(|e| ConversionError::io(spill_dir(), e.into_error()))?;
                file.seek(SeekFrom::Start(0))
                    .map_err(|e| ConversionError::io(spill_dir(), e))?;
                ReadBacking::Spill(BufReader::new(file))
            }
        };

        Ok(LevelReader {
            width: self.width,
            height: self.height,
            rows_read: 0,
            backing,
        })
    }
}

enum ReadBacking {
    Memory { pixels: Vec<u8>, offset: usize },
    Spill(BufReader<File>),
}

/// Replays a finished [`LevelStore`] top to bottom.
pub struct LevelReader {
    width: u32,
    height: u32,
    rows_read: u32,
    backing: ReadBacking,
}

impl RegionReader for LevelReader {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_rows(&mut self, rows: u32) -> Result<Vec<u8>, ConversionError> {
        let rows = rows.min(self.height - self.rows_read);
        let len = rows as usize * self.width as usize * BYTES_PER_PIXEL;

        let strip = match &mut self.backing {
            ReadBacking::Memory { pixels, offset } => {
                let strip = pixels[*offset..*offset + len].to_vec();
                *offset += len;
                strip
            }
            ReadBacking::Spill(reader) => {
                let mut strip = vec![0u8; len];
                reader
                    .read_exact(&mut strip)
                    .map_err(|e| ConversionError::io(spill_dir(), e))?;
                strip
            }
        };

        self.rows_read += rows;
        Ok(strip)
    }
}

fn level_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * BYTES_PER_PIXEL as u64
}

fn spill_dir() -> PathBuf {
    std::env::temp_dir()
}
