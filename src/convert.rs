//! Conversion entry point.
//!
//! Ties the pieces together for one source file:
//!
//! 1. validate options (no I/O before this succeeds)
//! 2. pick a backend for the source
//! 3. reserve a slug under the output root and write the sidecar
//! 4. build the pyramid into `{root}/{slug}`
//! 5. optionally delete the original

use std::fs;
use std::path::Path;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ConfigError, ConversionError};
use crate::gallery::{reserve_slug, ArtworkRecord, ArtworkSidecar};
use crate::pyramid::{BuildOptions, CancelFlag, Progress, ProgressReporter, PyramidBuilder};
use crate::source::select_backend;

/// Source extensions eligible for `cleanup_original`.
const CLEANUP_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Options of [`convert_artwork`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Pyramid parameters
    pub build: BuildOptions,

    /// Delete the source after a successful conversion (JPEG and PNG only)
    pub cleanup_original: bool,
}

impl ConversionOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build.validate()
    }
}

/// Converts source images into artworks under an output root.
#[derive(Debug)]
pub struct Converter {
    options: ConversionOptions,
    progress: Option<watch::Sender<Progress>>,
    cancel: CancelFlag,
}

impl Converter {
    /// Create a converter, rejecting invalid options.
    pub fn new(options: ConversionOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            options,
            progress: None,
            cancel: CancelFlag::new(),
        })
    }

    /// Publish tile progress on `sender`.
    pub fn with_progress(mut self, sender: watch::Sender<Progress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Convert `source` into `{output_root}/{slug}`.
    ///
    /// Converting the same file again reuses its slug and replaces the
    /// previous pyramid. A failed conversion leaves no descriptor; a slug
    /// directory created by this call is removed again.
    pub fn convert(
        self,
        source: &Path,
        output_root: &Path,
    ) -> Result<ArtworkRecord, ConversionError> {
        let source = fs::canonicalize(source).map_err(|e| ConversionError::io(source, e))?;
        let backend = select_backend(&source)?;

        let display_name = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(source = %source.display(), backend = backend.name(), "Converting");

        fs::create_dir_all(output_root).map_err(|e| ConversionError::io(output_root, e))?;
        let sidecar = ArtworkSidecar::new(display_name.clone(), source.to_string_lossy());
        let reservation = reserve_slug(output_root, &sidecar)?;
        info!(slug = %reservation.slug, reused = !reservation.created, "Slug reserved");

        let reporter = match self.progress {
            Some(sender) => ProgressReporter::new(sender),
            None => ProgressReporter::disabled(),
        };
        let builder = PyramidBuilder::new(self.options.build)?
            .with_progress(reporter)
            .with_cancel_flag(self.cancel);

        if let Err(e) = builder.build(backend.as_ref(), &source, &reservation.dir, &reservation.slug) {
            if reservation.created {
                if let Err(cleanup) = fs::remove_dir_all(&reservation.dir) {
                    warn!(dir = %reservation.dir.display(), error = %cleanup, "Failed to remove artwork directory");
                }
            }
            return Err(e);
        }

        if self.options.cleanup_original {
            cleanup_original(&source)?;
        }

        Ok(ArtworkRecord::new(reservation.slug, display_name))
    }
}

/// Convert `source` with default progress handling (none) and no cancellation.
pub fn convert_artwork(
    source: &Path,
    output_root: &Path,
    options: ConversionOptions,
) -> Result<ArtworkRecord, ConversionError> {
    Converter::new(options)?.convert(source, output_root)
}

fn cleanup_original(source: &Path) -> Result<(), ConversionError> {
    let eligible = source
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CLEANUP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));

    if !eligible {
        warn!(source = %source.display(), "Keeping original: only JPEG and PNG sources are deleted");
        return Ok(());
    }

    fs::remove_file(source).map_err(|e| ConversionError::io(source, e))?;
    info!(source = %source.display(), "Original deleted");
    Ok(())
}
