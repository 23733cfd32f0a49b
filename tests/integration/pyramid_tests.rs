//! Pyramid builder integration tests.
//!
//! Tests verify:
//! - On-disk layout and descriptor of a finished pyramid
//! - Pixel exactness of lossless tiles at the full-resolution level
//! - Rebuilds and spilled levels produce identical output
//! - PNG and TIFF sources are read in strips, never whole
//! - Cancelled and failed builds leave no descriptor behind

use std::fs;

use image::imageops;
use tempfile::TempDir;

use gigazoom::error::ConversionError;
use gigazoom::pyramid::{
    progress_channel, BuildOptions, CancelFlag, ProgressReporter, PyramidBuilder,
    PyramidDescriptor, PyramidGeometry,
};
use gigazoom::source::{
    select_backend, DecodedBackend, ImageBackend, PngStreamBackend, TiffStreamBackend,
};
use gigazoom::tile::TileFormat;

use super::test_utils::{
    is_valid_jpeg, is_valid_png, list_tiles, pattern_rgba, read_tiles, write_jpeg, write_png,
    write_tiff, write_truncated_png, FailingBackend, RecordingBackend,
};

fn png_options(tile_size: u32, overlap: u32) -> BuildOptions {
    BuildOptions {
        tile_size,
        overlap,
        format: TileFormat::Png,
        ..BuildOptions::default()
    }
}

fn build(
    backend: &dyn ImageBackend,
    options: BuildOptions,
    source: &std::path::Path,
    out: &std::path::Path,
    name: &str,
) -> Result<PyramidDescriptor, ConversionError> {
    PyramidBuilder::new(options)
        .unwrap()
        .build(backend, source, out, name)
}

// =============================================================================
// Layout and Descriptor
// =============================================================================

#[test]
fn test_pyramid_layout_matches_geometry() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "wide.png", 300, 200);
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let descriptor = build(&PngStreamBackend, png_options(128, 1), &source, &out, "wide").unwrap();

    assert_eq!((descriptor.width, descriptor.height), (300, 200));
    assert_eq!(descriptor.level_count(), 10);

    let geometry = PyramidGeometry::new(300, 200, 128, 1);
    let tiles = list_tiles(&out.join("wide_files"));
    assert_eq!(tiles.len() as u64, geometry.total_tiles());

    // one directory per level, level 0 is a single 1x1 tile
    for level in 0..geometry.level_count() {
        assert!(out.join("wide_files").join(level.to_string()).is_dir());
    }
    let top = image::open(out.join("wide_files/0/0_0.png")).unwrap();
    assert_eq!((top.width(), top.height()), (1, 1));

    // full-resolution level is 3x2 tiles
    assert!(tiles.contains(&"9/2_1.png".to_string()));
    assert!(!tiles.contains(&"9/3_0.png".to_string()));
    assert!(!tiles.contains(&"9/0_2.png".to_string()));
}

#[test]
fn test_descriptor_written_and_loadable() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "a.png", 100, 60);

    let descriptor = build(&PngStreamBackend, png_options(64, 1), &source, dir.path(), "a").unwrap();

    let xml = fs::read_to_string(dir.path().join("a.dzi")).unwrap();
    assert!(xml.contains(r#"Format="png""#));
    assert!(xml.contains(r#"Overlap="1""#));
    assert!(xml.contains(r#"TileSize="64""#));
    assert!(xml.contains(r#"Width="100""#));
    assert!(xml.contains(r#"Height="60""#));

    let loaded = PyramidDescriptor::load(&dir.path().join("a.dzi")).unwrap();
    assert_eq!(loaded, descriptor);
}

#[test]
fn test_tile_sizes_include_overlap() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "grid.png", 300, 200);

    build(&PngStreamBackend, png_options(128, 2), &source, dir.path(), "grid").unwrap();
    let files = dir.path().join("grid_files/9");

    let dims = |name: &str| {
        let tile = image::open(files.join(name)).unwrap();
        (tile.width(), tile.height())
    };
    // corner: overlap on the right and bottom only
    assert_eq!(dims("0_0.png"), (130, 130));
    // interior column: overlap on both sides
    assert_eq!(dims("1_0.png"), (132, 130));
    // last column and row are clipped to the image
    assert_eq!(dims("2_1.png"), (300 - 254, 200 - 126));
}

// =============================================================================
// Pixel Fidelity
// =============================================================================

#[test]
fn test_full_resolution_png_tiles_are_exact() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "exact.png", 300, 200);
    let expected = pattern_rgba(300, 200);

    build(&PngStreamBackend, png_options(128, 1), &source, dir.path(), "exact").unwrap();

    let geometry = PyramidGeometry::new(300, 200, 128, 1);
    let level = geometry.max_level();
    let (cols, rows) = geometry.tile_grid(level).unwrap();
    for row in 0..rows {
        for col in 0..cols {
            let rect = geometry.tile_rect(level, col, row).unwrap();
            let path = dir
                .path()
                .join("exact_files")
                .join(PyramidGeometry::tile_path(level, col, row, "png"));
            let tile = image::open(&path).unwrap().into_rgba8();
            let want =
                imageops::crop_imm(&expected, rect.x, rect.y, rect.width, rect.height).to_image();
            assert_eq!(tile, want, "tile {col}_{row} differs from source");
        }
    }
}

#[test]
fn test_rgba_source_keeps_alpha() {
    let dir = TempDir::new().unwrap();
    let source = super::test_utils::write_rgba_png(dir.path(), "alpha.png", 40, 30);

    build(&PngStreamBackend, png_options(64, 0), &source, dir.path(), "alpha").unwrap();

    let tile = image::open(dir.path().join("alpha_files/6/0_0.png"))
        .unwrap()
        .into_rgba8();
    assert_eq!(tile, pattern_rgba(40, 30));
}

#[test]
fn test_jpeg_source_through_decoded_backend() {
    let dir = TempDir::new().unwrap();
    let source = write_jpeg(dir.path(), "photo.jpg", 500, 300);

    let options = BuildOptions {
        tile_size: 256,
        ..BuildOptions::default()
    };
    let descriptor = build(&DecodedBackend, options, &source, dir.path(), "photo").unwrap();
    assert_eq!(descriptor.format, "jpg");

    for (name, bytes) in read_tiles(&dir.path().join("photo_files")) {
        assert!(name.ends_with(".jpg"));
        assert!(is_valid_jpeg(&bytes), "{name} is not a JPEG");
    }
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_rebuild_is_identical() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "again.png", 200, 150);
    let options = png_options(64, 1);

    build(&PngStreamBackend, options, &source, dir.path(), "again").unwrap();
    let first_descriptor = fs::read(dir.path().join("again.dzi")).unwrap();
    let first_tiles = read_tiles(&dir.path().join("again_files"));

    build(&PngStreamBackend, options, &source, dir.path(), "again").unwrap();
    let second_descriptor = fs::read(dir.path().join("again.dzi")).unwrap();
    let second_tiles = read_tiles(&dir.path().join("again_files"));

    assert_eq!(first_descriptor, second_descriptor);
    assert_eq!(first_tiles, second_tiles);
}

#[test]
fn test_rebuild_removes_stale_tiles() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "stale.png", 120, 80);

    build(&PngStreamBackend, png_options(64, 1), &source, dir.path(), "stale").unwrap();
    let leftover = dir.path().join("stale_files/7/9_9.png");
    fs::write(&leftover, b"old").unwrap();

    build(&PngStreamBackend, png_options(64, 1), &source, dir.path(), "stale").unwrap();
    assert!(!leftover.exists());
}

#[test]
fn test_spilled_levels_match_in_memory_levels() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "spill.png", 257, 190);

    let in_memory = dir.path().join("memory");
    let spilled = dir.path().join("spilled");
    fs::create_dir(&in_memory).unwrap();
    fs::create_dir(&spilled).unwrap();

    build(&PngStreamBackend, png_options(64, 1), &source, &in_memory, "spill").unwrap();
    let tiny = BuildOptions {
        memory_limit: 1,
        ..png_options(64, 1)
    };
    build(&PngStreamBackend, tiny, &source, &spilled, "spill").unwrap();

    assert_eq!(
        read_tiles(&in_memory.join("spill_files")),
        read_tiles(&spilled.join("spill_files"))
    );
}

// =============================================================================
// Streaming
// =============================================================================

#[test]
fn test_source_is_read_in_strips() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "tall.png", 64, 500);
    let backend = RecordingBackend::new(PngStreamBackend);

    build(&backend, png_options(32, 1), &source, dir.path(), "tall").unwrap();

    // first band needs tile_size + overlap rows, later bands one tile height
    assert_eq!(backend.max_rows(), 33);
    assert!(backend.reads() >= 500 / 32);
    assert!(backend.max_rows() < 500);
}

#[test]
fn test_tiff_source_is_read_in_strips() {
    let dir = TempDir::new().unwrap();
    let source = write_tiff(dir.path(), "tall.tif", 64, 500, 16);
    assert_eq!(select_backend(&source).unwrap().name(), "tiff-stream");
    let backend = RecordingBackend::new(TiffStreamBackend);

    build(&backend, png_options(32, 1), &source, dir.path(), "tall").unwrap();

    assert_eq!(backend.max_rows(), 33);
    assert!(backend.reads() >= 500 / 32);
    assert!(dir.path().join("tall.dzi").is_file());
}

#[test]
fn test_tiff_tiles_are_exact() {
    let dir = TempDir::new().unwrap();
    let source = write_tiff(dir.path(), "scan.tif", 150, 90, 7);
    let expected = pattern_rgba(150, 90);

    build(&TiffStreamBackend, png_options(64, 1), &source, dir.path(), "scan").unwrap();

    let geometry = PyramidGeometry::new(150, 90, 64, 1);
    let level = geometry.max_level();
    let (cols, rows) = geometry.tile_grid(level).unwrap();
    for row in 0..rows {
        for col in 0..cols {
            let rect = geometry.tile_rect(level, col, row).unwrap();
            let tile = image::open(
                dir.path()
                    .join("scan_files")
                    .join(PyramidGeometry::tile_path(level, col, row, "png")),
            )
            .unwrap()
            .into_rgba8();
            let want =
                imageops::crop_imm(&expected, rect.x, rect.y, rect.width, rect.height).to_image();
            assert_eq!(tile, want, "tile {col}_{row} differs from source");
        }
    }
}

#[test]
fn test_dimensions_read_from_header_before_decoding() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "order.png", 40, 40);
    let backend = RecordingBackend::new(PngStreamBackend);

    build(&backend, png_options(64, 0), &source, dir.path(), "order").unwrap();
    assert_eq!(backend.calls(), vec!["probe", "open"]);
}

#[test]
fn test_unreadable_header_never_opens_decoder() {
    let dir = TempDir::new().unwrap();
    let backend = RecordingBackend::new(PngStreamBackend);

    let result = build(
        &backend,
        png_options(64, 0),
        &dir.path().join("absent.png"),
        dir.path(),
        "absent",
    );

    assert!(matches!(result, Err(ConversionError::Io { .. })));
    assert_eq!(backend.calls(), vec!["probe"]);
    assert!(!dir.path().join("absent_files").exists());
}

#[test]
fn test_progress_reaches_total() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "progress.png", 150, 90);
    let (tx, rx) = progress_channel();

    let builder = PyramidBuilder::new(png_options(64, 1))
        .unwrap()
        .with_progress(ProgressReporter::new(tx));
    builder
        .build(&PngStreamBackend, &source, dir.path(), "progress")
        .unwrap();

    let progress = *rx.borrow();
    assert_eq!(
        progress.tiles_total,
        PyramidGeometry::new(150, 90, 64, 1).total_tiles()
    );
    assert!(progress.is_complete());
    assert_eq!(progress.percent(), 100);
    assert_eq!(progress.level, Some(0));
}

// =============================================================================
// Failure Handling
// =============================================================================

#[test]
fn test_cancelled_build_leaves_nothing() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "cancel.png", 200, 200);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = PyramidBuilder::new(png_options(64, 1))
        .unwrap()
        .with_cancel_flag(cancel)
        .build(&PngStreamBackend, &source, dir.path(), "cancel");

    assert!(matches!(result, Err(ConversionError::Cancelled)));
    assert!(!dir.path().join("cancel.dzi").exists());
    assert!(!dir.path().join("cancel_files").exists());
}

#[test]
fn test_truncated_source_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let source = write_truncated_png(dir.path(), "broken.png", 256, 256);

    let result = build(&PngStreamBackend, png_options(64, 1), &source, dir.path(), "broken");

    assert!(matches!(result, Err(ConversionError::Decode { .. })));
    assert!(!dir.path().join("broken.dzi").exists());
    assert!(!dir.path().join("broken_files").exists());
}

#[test]
fn test_failed_rebuild_removes_previous_descriptor() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "victim.png", 256, 256);
    build(&PngStreamBackend, png_options(64, 1), &source, dir.path(), "victim").unwrap();
    assert!(dir.path().join("victim.dzi").exists());

    let broken = write_truncated_png(dir.path(), "victim-broken.png", 256, 256);
    let result = build(&PngStreamBackend, png_options(64, 1), &broken, dir.path(), "victim");

    assert!(result.is_err());
    assert!(!dir.path().join("victim.dzi").exists());
}

#[test]
fn test_write_failure_mid_rebuild_leaves_nothing() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "disk.png", 256, 256);
    build(&PngStreamBackend, png_options(64, 1), &source, dir.path(), "disk").unwrap();
    assert!(dir.path().join("disk.dzi").exists());

    // fail after part of the full-resolution level is on disk
    let backend = FailingBackend::new(PngStreamBackend, 6);
    let result = build(&backend, png_options(64, 1), &source, dir.path(), "disk");

    assert!(matches!(result, Err(ConversionError::Io { .. })));
    assert!(!dir.path().join("disk.dzi").exists());
    assert!(!dir.path().join("disk_files").exists());
}

#[test]
fn test_invalid_options_rejected() {
    assert!(PyramidBuilder::new(png_options(0, 0)).is_err());
    assert!(PyramidBuilder::new(png_options(64, 40)).is_err());
    assert!(PyramidBuilder::new(BuildOptions {
        quality: 0,
        ..BuildOptions::default()
    })
    .is_err());
}

#[test]
fn test_png_tiles_have_png_signature() {
    let dir = TempDir::new().unwrap();
    let source = write_png(dir.path(), "sig.png", 70, 70);

    build(&PngStreamBackend, png_options(32, 1), &source, dir.path(), "sig").unwrap();

    for (name, bytes) in read_tiles(&dir.path().join("sig_files")) {
        assert!(is_valid_png(&bytes), "{name} is not a PNG");
    }
}
