//! Artwork records and their sidecar file.
//!
//! Each artwork directory carries an `artwork.json` sidecar holding the
//! human display name and the source it was converted from. The sidecar
//! never makes an artwork visible; only a readable descriptor does.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;
use crate::pyramid::DESCRIPTOR_EXTENSION;

/// Name of the per-artwork metadata file.
pub const SIDECAR_FILE: &str = "artwork.json";

/// Metadata stored next to a pyramid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkSidecar {
    pub display_name: String,
    pub source_file: String,
}

impl ArtworkSidecar {
    pub fn new(display_name: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            source_file: source_file.into(),
        }
    }

    /// Read the sidecar of `artwork_dir`. Missing or malformed files yield `None`.
    pub fn load(artwork_dir: &Path) -> Option<Self> {
        let bytes = fs::read(artwork_dir.join(SIDECAR_FILE)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Write the sidecar into `artwork_dir`, replacing any previous one.
    pub fn save(&self, artwork_dir: &Path) -> Result<(), ConversionError> {
        let path = artwork_dir.join(SIDECAR_FILE);
        let json = serde_json::to_vec_pretty(self).map_err(|e| ConversionError::Encode {
            message: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|e| ConversionError::io(&path, e))
    }
}

/// One converted artwork, as seen by discovery and the conversion entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtworkRecord {
    /// Human-readable name, usually the source file stem
    pub display_name: String,

    /// URL-safe identifier, also the directory name
    pub slug: String,

    /// Descriptor path relative to the artwork root, `{slug}/{slug}.dzi`
    pub descriptor_path: String,
}

impl ArtworkRecord {
    pub fn new(slug: impl Into<String>, display_name: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            display_name: display_name.into(),
            descriptor_path: format!("{slug}/{slug}.{DESCRIPTOR_EXTENSION}"),
            slug,
        }
    }

    /// Directory holding this artwork under `root`.
    pub fn artwork_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.slug)
    }

    /// Absolute descriptor path under `root`.
    pub fn descriptor_file(&self, root: &Path) -> PathBuf {
        self.artwork_dir(root)
            .join(format!("{}.{DESCRIPTOR_EXTENSION}", self.slug))
    }

    /// Tile tree directory under `root`.
    pub fn files_dir(&self, root: &Path) -> PathBuf {
        self.artwork_dir(root).join(format!("{}_files", self.slug))
    }
}
