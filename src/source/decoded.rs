//! Full-decode backend on the `image` crate.
//!
//! Handles every codec the crate is built with (JPEG, PNG, TIFF, BMP). The
//! whole image is decoded up front, so memory use is proportional to the
//! source; the builder warns when that exceeds its memory limit.

use std::path::Path;

use image::ImageReader;

use crate::error::ConversionError;

use super::{ImageBackend, RegionReader};

/// Backend that decodes the whole source into memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodedBackend;

fn image_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, ConversionError> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| ConversionError::io(path, e))
}

impl ImageBackend for DecodedBackend {
    fn name(&self) -> &'static str {
        "decoded"
    }

    fn can_stream(&self) -> bool {
        false
    }

    fn supports(&self, path: &Path) -> bool {
        image_reader(path).is_ok_and(|reader| reader.format().is_some())
    }

    fn probe(&self, path: &Path) -> Result<(u32, u32), ConversionError> {
        image_reader(path)?
            .into_dimensions()
            .map_err(|e| ConversionError::decode(path, e))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RegionReader>, ConversionError> {
        let mut reader = image_reader(path)?;
        reader.no_limits();
        let image = reader
            .decode()
            .map_err(|e| ConversionError::decode(path, e))?
            .into_rgba8();

        let (width, height) = image.dimensions();
        Ok(Box::new(DecodedReader {
            pixels: image.into_raw(),
            width,
            height,
            offset: 0,
        }))
    }
}

struct DecodedReader {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    offset: usize,
}

impl RegionReader for DecodedReader {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_rows(&mut self, rows: u32) -> Result<Vec<u8>, ConversionError> {
        let row_bytes = self.width as usize * 4;
        let end = (self.offset + rows as usize * row_bytes).min(self.pixels.len());
        let strip = self.pixels[self.offset..end].to_vec();
        self.offset = end;
        Ok(strip)
    }
}
