//! Deep Zoom pyramid geometry.
//!
//! Levels are derived data: every quantity here is a pure function of the
//! image size, tile size and overlap. The builder and any viewer compute the
//! same numbers independently, so nothing in this module is ever persisted.
//!
//! # Level Numbering
//!
//! Deep Zoom counts levels from the thumbnail up:
//! - level 0 = 1x1 pixel (lowest resolution)
//! - `max_level` = native resolution
//!
//! At level L the image is `ceil(W / 2^(max_level - L))` by
//! `ceil(H / 2^(max_level - L))`.

/// Smallest accepted tile size.
pub const MIN_TILE_SIZE: u32 = 1;

/// Largest accepted tile size.
pub const MAX_TILE_SIZE: u32 = 8192;

/// Calculate the maximum DZI level for given image dimensions.
///
/// `max_level = ceil(log2(max(width, height)))`, computed without floating
/// point so very large sizes never round the wrong way.
pub fn max_level(width: u32, height: u32) -> u32 {
    let max_dim = width.max(height);
    if max_dim <= 1 {
        return 0;
    }
    u32::BITS - (max_dim - 1).leading_zeros()
}

/// Calculate dimensions at a specific DZI level.
///
/// Returns `None` if `level > max_level`.
pub fn level_dimensions(width: u32, height: u32, level: u32, max_level: u32) -> Option<(u32, u32)> {
    if level > max_level {
        return None;
    }

    let scale = 1u64 << (max_level - level);
    let level_width = (width as u64).div_ceil(scale) as u32;
    let level_height = (height as u64).div_ceil(scale) as u32;

    Some((level_width.max(1), level_height.max(1)))
}

/// Number of tile columns and rows covering a level.
pub fn tile_count(level_width: u32, level_height: u32, tile_size: u32) -> (u32, u32) {
    let cols = level_width.div_ceil(tile_size);
    let rows = level_height.div_ceil(tile_size);
    (cols.max(1), rows.max(1))
}

/// Pixel span `[start, end)` of tile `index` along one axis.
///
/// Overlap is added only towards neighbors that exist, and the span is
/// truncated at the image edge rather than padded.
pub fn tile_span(index: u32, tile_size: u32, overlap: u32, extent: u32) -> (u32, u32) {
    let nominal_start = index as u64 * tile_size as u64;
    let start = if index > 0 {
        nominal_start.saturating_sub(overlap as u64)
    } else {
        0
    };
    let end = (nominal_start + tile_size as u64 + overlap as u64).min(extent as u64);
    (start as u32, end as u32)
}

/// Pixel rectangle of one tile within its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Geometry of a whole pyramid.
///
/// # Example
///
/// ```
/// use gigazoom::pyramid::PyramidGeometry;
///
/// let geometry = PyramidGeometry::new(1000, 500, 256, 1);
/// assert_eq!(geometry.max_level(), 10);
/// assert_eq!(geometry.level_dimensions(10), Some((1000, 500)));
/// assert_eq!(geometry.level_dimensions(9), Some((500, 250)));
/// assert_eq!(geometry.tile_grid(10), Some((4, 2)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidGeometry {
    width: u32,
    height: u32,
    tile_size: u32,
    overlap: u32,
    max_level: u32,
}

impl PyramidGeometry {
    /// Create the geometry for a `width` x `height` image.
    ///
    /// `tile_size` must be non-zero; callers validate it beforehand.
    pub fn new(width: u32, height: u32, tile_size: u32, overlap: u32) -> Self {
        Self {
            width,
            height,
            tile_size: tile_size.max(MIN_TILE_SIZE),
            overlap,
            max_level: max_level(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    /// Highest (native resolution) level.
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Number of levels, `max_level + 1`.
    pub fn level_count(&self) -> u32 {
        self.max_level + 1
    }

    /// Dimensions of a level, `None` past `max_level`.
    pub fn level_dimensions(&self, level: u32) -> Option<(u32, u32)> {
        level_dimensions(self.width, self.height, level, self.max_level)
    }

    /// Tile columns and rows of a level.
    pub fn tile_grid(&self, level: u32) -> Option<(u32, u32)> {
        let (w, h) = self.level_dimensions(level)?;
        Some(tile_count(w, h, self.tile_size))
    }

    /// Pixel rectangle of tile `(col, row)` at `level`, overlap included.
    pub fn tile_rect(&self, level: u32, col: u32, row: u32) -> Option<TileRect> {
        let (w, h) = self.level_dimensions(level)?;
        let (cols, rows) = tile_count(w, h, self.tile_size);
        if col >= cols || row >= rows {
            return None;
        }

        let (x0, x1) = tile_span(col, self.tile_size, self.overlap, w);
        let (y0, y1) = tile_span(row, self.tile_size, self.overlap, h);
        Some(TileRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    /// Total number of tiles over all levels.
    pub fn total_tiles(&self) -> u64 {
        (0..=self.max_level)
            .filter_map(|level| self.tile_grid(level))
            .map(|(cols, rows)| cols as u64 * rows as u64)
            .sum()
    }

    /// Tile file path relative to the `_files` directory.
    pub fn tile_path(level: u32, col: u32, row: u32, extension: &str) -> String {
        format!("{level}/{col}_{row}.{extension}")
    }
}
