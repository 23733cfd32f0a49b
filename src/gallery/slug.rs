//! Slugs: URL-safe artwork identifiers derived from display names.
//!
//! A slug is lowercase `[a-z0-9-]` with no leading, trailing or doubled
//! dashes. It doubles as the artwork's directory name, so reservation goes
//! through `create_dir`, which fails atomically if the name is taken.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::ConversionError;

use super::record::ArtworkSidecar;

/// Upper bound on `-2`, `-3`, ... suffixes tried before giving up.
pub const MAX_SLUG_ATTEMPTS: u32 = 1000;

/// Extensions dropped from the end of a display name before slugifying.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "tif", "tiff", "bmp", "webp", "gif",
];

/// Turn a display name into a slug.
///
/// # Example
///
/// ```
/// use gigazoom::gallery::slugify;
///
/// assert_eq!(slugify("Vincent van Gogh - Starry Night.jpg"), "vincent-van-gogh-starry-night");
/// assert_eq!(slugify("Café Terrace at Night"), "cafe-terrace-at-night");
/// assert!(slugify("   ").starts_with("artwork-"));
/// ```
pub fn slugify(name: &str) -> String {
    let stem = strip_image_extension(name.trim());

    let mut slug = String::with_capacity(stem.len());
    let mut pending_dash = false;
    for c in stem.chars() {
        let folded = fold_char(c);
        for c in folded.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
    }

    if slug.is_empty() {
        fallback_slug(name)
    } else {
        slug
    }
}

/// Whether `slug` could have been produced by [`slugify`] or reservation.
///
/// Used to reject path traversal before a slug touches the filesystem.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn strip_image_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => stem,
        _ => name,
    }
}

/// Deterministic placeholder for names without any usable character.
fn fallback_slug(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    format!("artwork-{}", &hex::encode(digest)[..8])
}

/// Fold common Latin letters with diacritics onto ASCII.
fn fold_char(c: char) -> String {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ñ' | 'Ñ' => "n",
        'ç' | 'Ç' => "c",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        _ => return c.to_string(),
    };
    folded.to_string()
}

/// A slug claimed under an artwork root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugReservation {
    pub slug: String,

    /// `{root}/{slug}`
    pub dir: PathBuf,

    /// `false` when an earlier conversion of the same source was reused
    pub created: bool,
}

/// Claim a directory for `sidecar.display_name` under `root`.
///
/// The plain slug is tried first, then `-2`, `-3`, ... An existing directory
/// whose sidecar names the same source file is reused, so converting the same
/// file again overwrites its earlier pyramid instead of creating a copy. The
/// sidecar is (re)written into the claimed directory.
///
/// # Errors
///
/// [`ConversionError::SlugCollisionExhausted`] after [`MAX_SLUG_ATTEMPTS`]
/// candidates, [`ConversionError::Io`] on any other filesystem failure.
pub fn reserve_slug(
    root: &Path,
    sidecar: &ArtworkSidecar,
) -> Result<SlugReservation, ConversionError> {
    let base = slugify(&sidecar.display_name);

    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = if attempt == 1 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };
        let dir = root.join(&slug);

        match fs::create_dir(&dir) {
            Ok(()) => {
                if let Err(e) = sidecar.save(&dir) {
                    discard_reservation(&dir);
                    return Err(e);
                }
                debug!(slug = %slug, "Reserved new slug");
                return Ok(SlugReservation {
                    slug,
                    dir,
                    created: true,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let same_source = ArtworkSidecar::load(&dir)
                    .is_some_and(|existing| existing.source_file == sidecar.source_file);
                if same_source {
                    sidecar.save(&dir)?;
                    debug!(slug = %slug, "Reusing slug of earlier conversion");
                    return Ok(SlugReservation {
                        slug,
                        dir,
                        created: false,
                    });
                }
            }
            Err(e) => return Err(ConversionError::io(&dir, e)),
        }
    }

    Err(ConversionError::SlugCollisionExhausted {
        slug: base,
        attempts: MAX_SLUG_ATTEMPTS,
    })
}

/// Remove a directory this process just created, logging instead of failing.
fn discard_reservation(dir: &Path) {
    if let Err(cleanup) = fs::remove_dir_all(dir) {
        warn!(dir = %dir.display(), error = %cleanup, "Failed to remove reserved artwork directory");
    }
}
