//! Deep Zoom Image (DZI) descriptor.
//!
//! The descriptor is the wire contract with viewers such as OpenSeadragon:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
//!        Format="jpg"
//!        Overlap="1"
//!        TileSize="256">
//!   <Size Width="46920" Height="33600" />
//! </Image>
//! ```
//!
//! Viewers build tile URLs from these fields alone, so the descriptor is
//! written exactly once per build, after every tile exists.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, DescriptorError};
use crate::tile::TileFormat;

use super::geometry::PyramidGeometry;

/// XML namespace of the Deep Zoom 2008 schema.
pub const DEEPZOOM_XMLNS: &str = "http://schemas.microsoft.com/deepzoom/2008";

/// File extension of descriptor files.
pub const DESCRIPTOR_EXTENSION: &str = "dzi";

/// Parsed or generated DZI descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidDescriptor {
    /// Tile file extension (`Format` attribute)
    pub format: String,

    /// Overlap in pixels
    pub overlap: u32,

    /// Nominal tile edge length in pixels
    pub tile_size: u32,

    /// Width of the top level in pixels
    pub width: u32,

    /// Height of the top level in pixels
    pub height: u32,
}

impl PyramidDescriptor {
    /// Create a descriptor for a pyramid of the given geometry.
    pub fn new(geometry: &PyramidGeometry, format: TileFormat) -> Self {
        Self {
            format: format.extension().to_string(),
            overlap: geometry.overlap(),
            tile_size: geometry.tile_size(),
            width: geometry.width(),
            height: geometry.height(),
        }
    }

    /// Geometry implied by this descriptor.
    pub fn geometry(&self) -> PyramidGeometry {
        PyramidGeometry::new(self.width, self.height, self.tile_size, self.overlap)
    }

    /// Derived level count (`max_level + 1`).
    pub fn level_count(&self) -> u32 {
        self.geometry().level_count()
    }

    /// Tile format, if the `Format` value is one this crate can encode.
    pub fn tile_format(&self) -> Option<TileFormat> {
        self.format.parse().ok()
    }

    // =========================================================================
    // XML
    // =========================================================================

    /// Serialize to DZI XML.
    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="{xmlns}"
       Format="{format}"
       Overlap="{overlap}"
       TileSize="{tile_size}">
  <Size Width="{width}" Height="{height}" />
</Image>
"#,
            xmlns = DEEPZOOM_XMLNS,
            format = self.format,
            overlap = self.overlap,
            tile_size = self.tile_size,
            width = self.width,
            height = self.height,
        )
    }

    /// Parse DZI XML.
    ///
    /// Only the `<Image>` and `<Size>` start tags are inspected; attribute
    /// order, quoting style and whitespace are free.
    pub fn from_xml(xml: &str) -> Result<Self, DescriptorError> {
        let image = start_tag(xml, "Image").ok_or(DescriptorError::MissingElement("Image"))?;
        let size = start_tag(xml, "Size").ok_or(DescriptorError::MissingElement("Size"))?;

        let format = attribute(image, "Format").ok_or(DescriptorError::MissingAttribute("Format"))?;
        if format.is_empty() {
            return Err(DescriptorError::InvalidAttribute {
                attribute: "Format",
                value: format.to_string(),
            });
        }

        let tile_size = numeric_attribute(image, "TileSize")?;
        if tile_size == 0 {
            return Err(DescriptorError::InvalidAttribute {
                attribute: "TileSize",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            format: format.to_string(),
            overlap: numeric_attribute(image, "Overlap")?,
            tile_size,
            width: numeric_attribute(size, "Width")?,
            height: numeric_attribute(size, "Height")?,
        })
    }

    // =========================================================================
    // JSON
    // =========================================================================

    /// Serialize to the JSON form of the descriptor understood by OpenSeadragon.
    pub fn to_json(&self) -> serde_json::Value {
        let json = DziJson {
            image: DziJsonImage {
                xmlns: DEEPZOOM_XMLNS.to_string(),
                format: self.format.clone(),
                overlap: self.overlap.to_string(),
                tile_size: self.tile_size.to_string(),
                size: DziJsonSize {
                    width: self.width.to_string(),
                    height: self.height.to_string(),
                },
            },
        };
        serde_json::to_value(json).unwrap_or(serde_json::Value::Null)
    }

    /// Parse the JSON form.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DescriptorError> {
        let json: DziJson = serde_json::from_value(value.clone())
            .map_err(|e| DescriptorError::Json(e.to_string()))?;
        let image = json.image;

        let tile_size = parse_number("TileSize", &image.tile_size)?;
        if tile_size == 0 {
            return Err(DescriptorError::InvalidAttribute {
                attribute: "TileSize",
                value: image.tile_size,
            });
        }

        Ok(Self {
            format: image.format,
            overlap: parse_number("Overlap", &image.overlap)?,
            tile_size,
            width: parse_number("Width", &image.size.width)?,
            height: parse_number("Height", &image.size.height)?,
        })
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Read and parse a `.dzi` file in either the XML or the JSON form.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let text = fs::read_to_string(path).map_err(|e| DescriptorError::Io(e.to_string()))?;
        if text.trim_start().starts_with('{') {
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| DescriptorError::Json(e.to_string()))?;
            Self::from_json(&value)
        } else {
            Self::from_xml(&text)
        }
    }

    /// Publish the descriptor at `path`.
    ///
    /// The XML is written to a temporary file in the same directory and
    /// renamed into place, so readers see either no descriptor or a complete one.
    pub fn write_atomic(&self, path: &Path) -> Result<(), ConversionError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::Builder::new()
            .prefix(".dzi-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| ConversionError::io(dir, e))?;
        tmp.write_all(self.to_xml().as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ConversionError::io(tmp.path(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))
                .map_err(|e| ConversionError::io(tmp.path(), e))?;
        }

        tmp.persist(path)
            .map_err(|e| ConversionError::io(path, e.error))?;
        Ok(())
    }
}

// =============================================================================
// JSON Schema
// =============================================================================

#[derive(Serialize, Deserialize)]
struct DziJson {
    #[serde(rename = "Image")]
    image: DziJsonImage,
}

#[derive(Serialize, Deserialize)]
struct DziJsonImage {
    xmlns: String,
    #[serde(rename = "Format")]
    format: String,
    #[serde(rename = "Overlap")]
    overlap: String,
    #[serde(rename = "TileSize")]
    tile_size: String,
    #[serde(rename = "Size")]
    size: DziJsonSize,
}

#[derive(Serialize, Deserialize)]
struct DziJsonSize {
    #[serde(rename = "Width")]
    width: String,
    #[serde(rename = "Height")]
    height: String,
}

// =============================================================================
// Minimal XML Scanning
// =============================================================================

/// Return the contents of the first `<name ...>` start tag, without the brackets.
fn start_tag<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}");
    let mut search_from = 0;

    while let Some(found) = xml[search_from..].find(&open) {
        let start = search_from + found + 1;
        let after_name = start + name.len();
        let boundary = xml[after_name..].chars().next()?;

        if boundary.is_whitespace() || boundary == '>' || boundary == '/' {
            let end = after_name + xml[after_name..].find('>')?;
            return Some(&xml[start..end]);
        }
        search_from = after_name;
    }
    None
}

/// Value of attribute `name` inside a start tag.
fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search_from = 0;

    while let Some(found) = tag[search_from..].find(name) {
        let start = search_from + found;
        let after_name = start + name.len();
        search_from = after_name;

        let preceded_by_space = tag[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_whitespace());
        if !preceded_by_space {
            continue;
        }

        let rest = tag[after_name..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let quote = rest.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let value = &rest[1..];
        let end = value.find(quote)?;
        return Some(&value[..end]);
    }
    None
}

fn numeric_attribute(tag: &str, name: &'static str) -> Result<u32, DescriptorError> {
    let value = attribute(tag, name).ok_or(DescriptorError::MissingAttribute(name))?;
    parse_number(name, value)
}

fn parse_number(name: &'static str, value: &str) -> Result<u32, DescriptorError> {
    value
        .trim()
        .parse()
        .map_err(|_| DescriptorError::InvalidAttribute {
            attribute: name,
            value: value.to_string(),
        })
}
