//! Directory-as-database artwork discovery.
//!
//! The set of artworks is recomputed from the filesystem on every call: an
//! immediate subdirectory `{slug}` of the root is an artwork exactly when
//! `{slug}/{slug}.dzi` exists and parses. Anything else (dot directories,
//! loose files, half-converted trees without a descriptor, foreign folders)
//! is skipped without error.
//!
//! Because the builder publishes the descriptor last, a scan running
//! concurrently with a conversion either misses the new artwork or sees it
//! complete.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::trace;

use crate::pyramid::PyramidDescriptor;

use super::record::{ArtworkRecord, ArtworkSidecar};
use super::slug::is_valid_slug;

/// An artwork found on disk, with its parsed descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredArtwork {
    pub record: ArtworkRecord,
    pub descriptor: PyramidDescriptor,

    /// Modification time of the descriptor, when the filesystem reports one
    pub modified: Option<SystemTime>,
}

/// List every complete artwork under `root`, sorted by slug.
///
/// A missing root yields an empty list.
///
/// # Errors
///
/// Only fails if `root` exists but cannot be listed.
pub fn discover_artworks(root: &Path) -> io::Result<Vec<ArtworkRecord>> {
    Ok(scan(root)?.into_iter().map(|artwork| artwork.record).collect())
}

/// Like [`discover_artworks`], keeping descriptors and timestamps.
pub fn scan(root: &Path) -> io::Result<Vec<DiscoveredArtwork>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut artworks: Vec<DiscoveredArtwork> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if name.starts_with('.') {
                return None;
            }
            load_artwork(root, &name)
        })
        .collect();

    artworks.sort_by(|a, b| a.record.slug.cmp(&b.record.slug));
    Ok(artworks)
}

/// Look up one artwork by slug.
///
/// Slugs that are not well formed are rejected before touching the
/// filesystem, so `..` or `a/b` can never escape the root.
pub fn find_artwork(root: &Path, slug: &str) -> Option<DiscoveredArtwork> {
    if !is_valid_slug(slug) {
        return None;
    }
    load_artwork(root, slug)
}

fn load_artwork(root: &Path, name: &str) -> Option<DiscoveredArtwork> {
    let artwork_dir = root.join(name);
    let fallback = ArtworkRecord::new(name, name);
    let descriptor_file = fallback.descriptor_file(root);

    let descriptor = match PyramidDescriptor::load(&descriptor_file) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            trace!(dir = %artwork_dir.display(), error = %e, "Skipping directory without descriptor");
            return None;
        }
    };
    let modified = fs::metadata(&descriptor_file)
        .and_then(|m| m.modified())
        .ok();

    let record = match ArtworkSidecar::load(&artwork_dir) {
        Some(sidecar) => ArtworkRecord::new(name, sidecar.display_name),
        None => fallback,
    };

    Some(DiscoveredArtwork {
        record,
        descriptor,
        modified,
    })
}
