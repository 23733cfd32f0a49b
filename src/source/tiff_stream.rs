//! Streaming TIFF backend.
//!
//! Decodes one strip band (or one row of tiles) at a time with the `tiff`
//! crate, so memory stays proportional to the file's chunk height rather
//! than to the image. Chunky 8- and 16-bit gray, gray+alpha, RGB and RGBA
//! layouts are handled here; everything else (planar, palette, CMYK,
//! YCbCr, floating point, WhiteIsZero) falls through to the decoded
//! backend.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tiff::decoder::{ChunkType, Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::error::ConversionError;

use super::{expand_to_rgba, ImageBackend, RegionReader};

/// Size of the byte-order mark plus version field.
const TIFF_HEADER_SIZE: usize = 4;

/// TIFF strip and tile streaming backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffStreamBackend;

/// Check for a classic or BigTIFF header in either byte order.
fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }
    let version = match &bytes[..2] {
        b"II" => u16::from_le_bytes([bytes[2], bytes[3]]),
        b"MM" => u16::from_be_bytes([bytes[2], bytes[3]]),
        _ => return false,
    };
    version == 42 || version == 43
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, ConversionError> {
    let mut file = File::open(path).map_err(|e| ConversionError::io(path, e))?;
    let mut header = [0u8; TIFF_HEADER_SIZE];
    let is_tiff = file.read_exact(&mut header).is_ok() && is_tiff_header(&header);
    if !is_tiff {
        return Err(ConversionError::decode(path, "not a TIFF file"));
    }

    let file = File::open(path).map_err(|e| ConversionError::io(path, e))?;
    Decoder::new(BufReader::new(file))
        .map(|decoder| decoder.with_limits(Limits::unlimited()))
        .map_err(|e| ConversionError::decode(path, e))
}

/// Samples per pixel for the layouts this backend streams.
fn streamable_channels(
    decoder: &mut Decoder<BufReader<File>>,
    path: &Path,
) -> Result<usize, ConversionError> {
    let color_type = decoder
        .colortype()
        .map_err(|e| ConversionError::decode(path, e))?;
    let channels = match color_type {
        ColorType::Gray(8 | 16) => 1,
        ColorType::GrayA(8 | 16) => 2,
        ColorType::RGB(8 | 16) => 3,
        ColorType::RGBA(8 | 16) => 4,
        other => {
            return Err(ConversionError::decode(
                path,
                format!("TIFF color type {other:?} cannot be streamed"),
            ));
        }
    };

    let planar = decoder
        .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)
        .map_err(|e| ConversionError::decode(path, e))?;
    if planar.unwrap_or(1) != 1 {
        return Err(ConversionError::decode(path, "planar TIFF cannot be streamed"));
    }

    // 0 = WhiteIsZero, which would need inverting
    let photometric = decoder
        .find_tag_unsigned::<u16>(Tag::PhotometricInterpretation)
        .map_err(|e| ConversionError::decode(path, e))?;
    if channels <= 2 && photometric == Some(0) {
        return Err(ConversionError::decode(
            path,
            "WhiteIsZero TIFF cannot be streamed",
        ));
    }

    Ok(channels)
}

impl ImageBackend for TiffStreamBackend {
    fn name(&self) -> &'static str {
        "tiff-stream"
    }

    fn can_stream(&self) -> bool {
        true
    }

    fn supports(&self, path: &Path) -> bool {
        match open_decoder(path) {
            Ok(mut decoder) => streamable_channels(&mut decoder, path).is_ok(),
            Err(_) => false,
        }
    }

    fn probe(&self, path: &Path) -> Result<(u32, u32), ConversionError> {
        open_decoder(path)?
            .dimensions()
            .map_err(|e| ConversionError::decode(path, e))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RegionReader>, ConversionError> {
        let mut decoder = open_decoder(path)?;
        let channels = streamable_channels(&mut decoder, path)?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| ConversionError::decode(path, e))?;

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        if chunk_width == 0 || chunk_height == 0 {
            return Err(ConversionError::decode(path, "TIFF chunk has no pixels"));
        }
        let (chunks_across, chunk_count) = match decoder.get_chunk_type() {
            ChunkType::Strip => (1, decoder.strip_count()),
            ChunkType::Tile => (width.div_ceil(chunk_width), decoder.tile_count()),
        };
        let chunk_count = chunk_count.map_err(|e| ConversionError::decode(path, e))?;
        let needed = u64::from(chunks_across) * u64::from(height.div_ceil(chunk_height));
        if u64::from(chunk_count) < needed {
            return Err(ConversionError::decode(
                path,
                format!("TIFF has {chunk_count} chunks, layout needs {needed}"),
            ));
        }

        Ok(Box::new(TiffRowReader {
            path: path.to_path_buf(),
            decoder,
            width,
            height,
            channels,
            chunk_width,
            chunk_height,
            chunks_across,
            next_band: 0,
            pending: Vec::new(),
        }))
    }
}

struct TiffRowReader {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    width: u32,
    height: u32,
    channels: usize,
    chunk_width: u32,
    chunk_height: u32,
    chunks_across: u32,
    next_band: u32,
    /// Decoded RGBA rows not yet handed out.
    pending: Vec<u8>,
}

impl TiffRowReader {
    fn band_count(&self) -> u32 {
        self.height.div_ceil(self.chunk_height)
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    /// Decode every chunk of the next band into `pending`.
    fn decode_band(&mut self) -> Result<(), ConversionError> {
        let band_top = self.next_band * self.chunk_height;
        let band_rows = self.chunk_height.min(self.height - band_top);
        let row_bytes = self.row_bytes();
        let mut band = vec![0u8; band_rows as usize * row_bytes];

        for col in 0..self.chunks_across {
            let index = self.next_band * self.chunks_across + col;
            let (_, data_rows) = self.decoder.chunk_data_dimensions(index);
            let rgba = match self.decoder.read_chunk(index) {
                Ok(DecodingResult::U8(samples)) => {
                    let mut out = Vec::with_capacity(samples.len() / self.channels * 4);
                    expand_to_rgba(&samples, self.channels, &mut out);
                    out
                }
                Ok(DecodingResult::U16(samples)) => {
                    let narrowed: Vec<u8> = samples.iter().map(|&v| narrow_u16(v)).collect();
                    let mut out = Vec::with_capacity(narrowed.len() / self.channels * 4);
                    expand_to_rgba(&narrowed, self.channels, &mut out);
                    out
                }
                Ok(_) => {
                    return Err(ConversionError::decode(
                        &self.path,
                        "unexpected TIFF sample format",
                    ));
                }
                Err(e) => return Err(ConversionError::decode(&self.path, e)),
            };

            let x0 = col * self.chunk_width;
            let rows = data_rows.min(band_rows);
            place_chunk(&mut band, self.width, x0, &rgba, data_rows, rows).ok_or_else(|| {
                ConversionError::decode(
                    &self.path,
                    format!("TIFF chunk {index} is smaller than its declared size"),
                )
            })?;
        }

        self.next_band += 1;
        self.pending.extend_from_slice(&band);
        Ok(())
    }
}

/// Narrow a 16-bit sample to 8 bits with rounding.
fn narrow_u16(v: u16) -> u8 {
    ((u32::from(v) + 128) / 257) as u8
}

/// Copy `rows` rows of a decoded RGBA chunk into a full-width band at
/// column `x0`.
///
/// The chunk's row stride is derived from its length and `chunk_rows`, so
/// padded edge tiles are handled. Columns past the band width are dropped.
/// Returns `None` if the chunk is too short for `rows` rows.
fn place_chunk(
    band: &mut [u8],
    band_width: u32,
    x0: u32,
    chunk: &[u8],
    chunk_rows: u32,
    rows: u32,
) -> Option<()> {
    if chunk_rows == 0 || rows > chunk_rows || x0 >= band_width {
        return (rows == 0).then_some(());
    }
    let stride = chunk.len() / chunk_rows as usize;
    if stride < 4 || stride % 4 != 0 {
        return None;
    }
    let copy_width = (stride / 4).min((band_width - x0) as usize);
    let band_stride = band_width as usize * 4;

    for y in 0..rows as usize {
        let src = chunk.get(y * stride..y * stride + copy_width * 4)?;
        let start = y * band_stride + x0 as usize * 4;
        band.get_mut(start..start + copy_width * 4)?
            .copy_from_slice(src);
    }
    Some(())
}

impl RegionReader for TiffRowReader {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_rows(&mut self, rows: u32) -> Result<Vec<u8>, ConversionError> {
        let row_bytes = self.row_bytes();
        while self.pending.len() < rows as usize * row_bytes
            && self.next_band < self.band_count()
        {
            self.decode_band()?;
        }

        let take = (rows as usize * row_bytes).min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }
}
