//! Deep Zoom pyramid generation.
//!
//! - [`geometry`]: level and tile arithmetic shared with viewers
//! - [`descriptor`]: the `.dzi` file
//! - [`downsample`] and [`level_store`]: bounded-memory derivation of coarser levels
//! - [`builder`]: the band-by-band tiling pipeline
//! - [`progress`]: progress channel and cancellation flag

pub mod builder;
pub mod descriptor;
pub mod downsample;
pub mod geometry;
pub mod level_store;
pub mod progress;

pub use builder::{
    BuildOptions, PyramidBuilder, DEFAULT_MEMORY_LIMIT, DEFAULT_OVERLAP, DEFAULT_TILE_SIZE,
};
pub use descriptor::{PyramidDescriptor, DEEPZOOM_XMLNS, DESCRIPTOR_EXTENSION};
pub use geometry::{PyramidGeometry, TileRect, MAX_TILE_SIZE, MIN_TILE_SIZE};
pub use level_store::{LevelReader, LevelStore};
pub use progress::{progress_channel, CancelFlag, Progress, ProgressReporter};
