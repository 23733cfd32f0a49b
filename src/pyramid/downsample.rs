//! 2x area-average reduction of RGBA rows.
//!
//! Each output pixel is the rounded mean of the up-to-four input pixels it
//! covers. Odd widths and heights average the one or two pixels that exist at
//! the edge, which yields exactly `ceil(w / 2)` x `ceil(h / 2)` and therefore
//! matches the Deep Zoom level formula.
//!
//! Rows arrive in strips; [`RowHalver`] carries an unpaired trailing row over
//! to the next strip so strip boundaries never change the result.

use rayon::prelude::*;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Halve a block of `width`-wide RGBA rows in both dimensions.
///
/// `rows.len()` must be a multiple of `width * 4`.
pub fn halve(rows: &[u8], width: u32) -> Vec<u8> {
    let width = width as usize;
    let row_bytes = width * BYTES_PER_PIXEL;
    if row_bytes == 0 || rows.is_empty() {
        return Vec::new();
    }

    let height = rows.len() / row_bytes;
    let out_width = width.div_ceil(2);
    let out_height = height.div_ceil(2);
    let out_row_bytes = out_width * BYTES_PER_PIXEL;
    let mut out = vec![0u8; out_row_bytes * out_height];

    out.par_chunks_mut(out_row_bytes)
        .enumerate()
        .for_each(|(oy, out_row)| {
            let y0 = oy * 2;
            let top = &rows[y0 * row_bytes..(y0 + 1) * row_bytes];
            let bottom = if y0 + 1 < height {
                Some(&rows[(y0 + 1) * row_bytes..(y0 + 2) * row_bytes])
            } else {
                None
            };

            for ox in 0..out_width {
                let x0 = ox * 2;
                let x1 = if x0 + 1 < width { Some(x0 + 1) } else { None };

                for c in 0..BYTES_PER_PIXEL {
                    let mut sum = top[x0 * BYTES_PER_PIXEL + c] as u32;
                    let mut count = 1u32;
                    if let Some(x1) = x1 {
                        sum += top[x1 * BYTES_PER_PIXEL + c] as u32;
                        count += 1;
                    }
                    if let Some(bottom) = bottom {
                        sum += bottom[x0 * BYTES_PER_PIXEL + c] as u32;
                        count += 1;
                        if let Some(x1) = x1 {
                            sum += bottom[x1 * BYTES_PER_PIXEL + c] as u32;
                            count += 1;
                        }
                    }
                    out_row[ox * BYTES_PER_PIXEL + c] = ((sum + count / 2) / count) as u8;
                }
            }
        });

    out
}

/// Streaming 2x reducer for rows delivered in arbitrary strip sizes.
#[derive(Debug)]
pub struct RowHalver {
    width: u32,
    pending: Option<Vec<u8>>,
}

impl RowHalver {
    /// Create a reducer for rows of `width` pixels.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            pending: None,
        }
    }

    /// Width of the reduced rows.
    pub fn output_width(&self) -> u32 {
        self.width.div_ceil(2)
    }

    /// Feed the next rows (top to bottom) and return every reduced row that
    /// is now complete. May return an empty buffer.
    pub fn push(&mut self, rows: &[u8]) -> Vec<u8> {
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        if row_bytes == 0 || rows.is_empty() {
            return Vec::new();
        }

        let mut input = match self.pending.take() {
            Some(mut pending) => {
                pending.extend_from_slice(rows);
                pending
            }
            None => rows.to_vec(),
        };

        let row_count = input.len() / row_bytes;
        if row_count % 2 == 1 {
            let tail = input.split_off((row_count - 1) * row_bytes);
            self.pending = Some(tail);
        }

        halve(&input, self.width)
    }

    /// Flush an unpaired last row, if any.
    pub fn finish(mut self) -> Option<Vec<u8>> {
        self.pending.take().map(|row| halve(&row, self.width))
    }
}
