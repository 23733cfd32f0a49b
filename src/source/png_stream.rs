//! Streaming PNG backend.
//!
//! Decodes rows on demand with the `png` crate, so converting a PNG never
//! needs more than one strip of decoded pixels. Palette, low bit depth and
//! 16-bit images are normalized to 8-bit channels by the decoder and then
//! expanded to RGBA.
//!
//! Interlaced (Adam7) files deliver their rows out of order and are left to
//! the decoded backend.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use png::{ColorType, Decoder, Reader, Transformations};

use crate::error::ConversionError;

use super::{expand_to_rgba, ImageBackend, RegionReader};

/// PNG row-streaming backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngStreamBackend;

fn open_reader(path: &Path) -> Result<Reader<BufReader<File>>, ConversionError> {
    let file = File::open(path).map_err(|e| ConversionError::io(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file));
    decoder.set_transformations(Transformations::normalize_to_color8());
    decoder
        .read_info()
        .map_err(|e| ConversionError::decode(path, e))
}

impl ImageBackend for PngStreamBackend {
    fn name(&self) -> &'static str {
        "png-stream"
    }

    fn can_stream(&self) -> bool {
        true
    }

    fn supports(&self, path: &Path) -> bool {
        match open_reader(path) {
            Ok(reader) => !reader.info().interlaced,
            Err(_) => false,
        }
    }

    fn probe(&self, path: &Path) -> Result<(u32, u32), ConversionError> {
        let reader = open_reader(path)?;
        let info = reader.info();
        Ok((info.width, info.height))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RegionReader>, ConversionError> {
        let reader = open_reader(path)?;
        let info = reader.info();
        if info.interlaced {
            return Err(ConversionError::decode(
                path,
                "interlaced PNG cannot be streamed",
            ));
        }
        let (width, height) = (info.width, info.height);

        let (color_type, _) = reader.output_color_type();
        let channels = match color_type {
            ColorType::Grayscale => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
            ColorType::Indexed => {
                return Err(ConversionError::decode(path, "palette was not expanded"));
            }
        };

        Ok(Box::new(PngRowReader {
            path: path.to_path_buf(),
            reader,
            width,
            height,
            channels,
            rows_read: 0,
        }))
    }
}

struct PngRowReader {
    path: PathBuf,
    reader: Reader<BufReader<File>>,
    width: u32,
    height: u32,
    channels: usize,
    rows_read: u32,
}

impl RegionReader for PngRowReader {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_rows(&mut self, rows: u32) -> Result<Vec<u8>, ConversionError> {
        let wanted = rows.min(self.height - self.rows_read);
        let mut out = Vec::with_capacity(wanted as usize * self.width as usize * 4);

        for _ in 0..wanted {
            let row = self
                .reader
                .next_row()
                .map_err(|e| ConversionError::decode(&self.path, e))?
                .ok_or_else(|| {
                    ConversionError::decode(
                        &self.path,
                        format!("image data ends after {} rows", self.rows_read),
                    )
                })?;
            expand_to_rgba(row.data(), self.channels, &mut out);
            self.rows_read += 1;
        }

        Ok(out)
    }
}
