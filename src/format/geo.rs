//! Georeferencing tag carry-over.
//!
//! Geospatial sources (GeoTIFF) locate their pixels in a coordinate
//! reference system through a handful of TIFF tags. Conversion must not
//! destroy that placement, so the raw tag values are lifted from the source's
//! first IFD and replayed verbatim into the output's first IFD.
//!
//! Values are carried as decoded [`TagValue`]s, which normalizes byte order:
//! a big-endian source still produces correct little-endian output.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::error::TiffError;

use super::tiff::reader::TiffReader;
use super::tiff::tags::TiffTag;
use super::tiff::value::TagValue;
use super::tiff::writer::IfdBuilder;

/// Tags replayed from a geospatial source into the converted output.
const CARRY_OVER_TAGS: [TiffTag; 7] = [
    TiffTag::ModelPixelScale,
    TiffTag::ModelTiepoint,
    TiffTag::ModelTransformation,
    TiffTag::GeoKeyDirectory,
    TiffTag::GeoDoubleParams,
    TiffTag::GeoAsciiParams,
    TiffTag::GdalNodata,
];

/// Georeferencing metadata read from a source file.
#[derive(Debug, Clone, Default)]
pub struct GeoMetadata {
    entries: Vec<(TiffTag, TagValue)>,
}

impl GeoMetadata {
    /// Read the georeferencing tags from a source TIFF's first IFD.
    ///
    /// Returns `None` when the file carries no georeferencing tags.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Option<Self>, TiffError> {
        let file = File::open(path.as_ref())?;
        let mut reader = TiffReader::open(BufReader::new(file))?;
        let ifds = reader.ifds()?;
        let first = match ifds.first() {
            Some(ifd) => ifd,
            None => return Ok(None),
        };

        let mut entries = Vec::new();
        for &tag in &CARRY_OVER_TAGS {
            if let Some(value) = reader.tag_value(first, tag)? {
                debug!(tag = tag.as_u16(), count = value.count(), "carrying geo tag");
                entries.push((tag, value));
            }
        }
        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(GeoMetadata { entries }))
        }
    }

    /// Number of carried tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any tags were found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replay the carried tags into an output IFD.
    pub fn apply(&self, ifd: &mut IfdBuilder) {
        for (tag, value) in &self.entries {
            ifd.set(*tag, value.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
