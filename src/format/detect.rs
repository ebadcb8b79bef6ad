//! Source format detection.
//!
//! Classifies input files by magic bytes before any decoding happens:
//!
//! - [`sniff_format`] identifies the container format
//! - [`decode_backend`] maps a format to the decode backend that can read it
//! - [`is_raster`] answers "can the general raster backend decode this?"
//! - [`is_geospatial`] answers "does this TIFF carry georeferencing tags?"
//!
//! The detectors are pure classifiers: they read, never write, and the
//! boolean variants swallow errors into `false` so callers can branch without
//! ceremony.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::SourceError;

use super::tiff::reader::TiffReader;
use super::tiff::tags::TiffTag;

// =============================================================================
// SourceFormat
// =============================================================================

/// Detected source container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Classic TIFF or BigTIFF (including SVS, OME-TIFF, GeoTIFF)
    Tiff,

    /// PNG
    Png,

    /// JPEG/JFIF
    Jpeg,

    /// JPEG 2000 (JP2 container or raw codestream)
    Jpeg2000,

    /// WebP
    WebP,

    /// GIF
    Gif,

    /// BMP
    Bmp,

    /// None of the above
    Unknown,
}

impl SourceFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            SourceFormat::Tiff => "TIFF",
            SourceFormat::Png => "PNG",
            SourceFormat::Jpeg => "JPEG",
            SourceFormat::Jpeg2000 => "JPEG 2000",
            SourceFormat::WebP => "WebP",
            SourceFormat::Gif => "GIF",
            SourceFormat::Bmp => "BMP",
            SourceFormat::Unknown => "unknown",
        }
    }
}

/// Decode backend capable of reading a given source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeBackend {
    /// General raster decoding via the image crate
    Raster,

    /// TIFF-family decoding (multi-frame aware)
    Tiff,

    /// JPEG 2000 decoding
    Jpeg2000,
}

// =============================================================================
// Magic byte sniffing
// =============================================================================

/// Bytes needed to discriminate all supported formats.
const SNIFF_LEN: usize = 16;

/// JP2 signature box: length 12, type 'jP  ', payload 0x0D0A870A.
const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];

/// Classify raw header bytes.
pub fn sniff_bytes(bytes: &[u8]) -> SourceFormat {
    if is_tiff_header(bytes) {
        return SourceFormat::Tiff;
    }
    if bytes.len() >= 8 && bytes[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return SourceFormat::Png;
    }
    if bytes.len() >= 3 && bytes[..3] == [0xFF, 0xD8, 0xFF] {
        return SourceFormat::Jpeg;
    }
    if bytes.len() >= 12 && bytes[..12] == JP2_SIGNATURE {
        return SourceFormat::Jpeg2000;
    }
    // Raw J2K codestream: SOC marker followed by SIZ
    if bytes.len() >= 4 && bytes[..4] == [0xFF, 0x4F, 0xFF, 0x51] {
        return SourceFormat::Jpeg2000;
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return SourceFormat::WebP;
    }
    if bytes.len() >= 6 && (&bytes[..6] == b"GIF87a" || &bytes[..6] == b"GIF89a") {
        return SourceFormat::Gif;
    }
    if bytes.len() >= 2 && &bytes[..2] == b"BM" {
        return SourceFormat::Bmp;
    }
    SourceFormat::Unknown
}

/// Check if bytes start a valid TIFF or BigTIFF header.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    let le = bytes[0] == 0x49 && bytes[1] == 0x49;
    let be = bytes[0] == 0x4D && bytes[1] == 0x4D;
    if !le && !be {
        return false;
    }
    let version = if le {
        u16::from_le_bytes([bytes[2], bytes[3]])
    } else {
        u16::from_be_bytes([bytes[2], bytes[3]])
    };
    version == 42 || version == 43
}

/// Detect the container format of a file.
pub fn sniff_format(path: impl AsRef<Path>) -> Result<SourceFormat, SourceError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }
    let mut file = File::open(path)?;
    let mut bytes = [0u8; SNIFF_LEN];
    let mut read = 0;
    while read < SNIFF_LEN {
        match file.read(&mut bytes[read..])? {
            0 => break,
            n => read += n,
        }
    }
    Ok(sniff_bytes(&bytes[..read]))
}

// =============================================================================
// Backend classification
// =============================================================================

/// Which decode backend can read this file, if any.
pub fn decode_backend(path: impl AsRef<Path>) -> Result<Option<DecodeBackend>, SourceError> {
    let backend = match sniff_format(path)? {
        SourceFormat::Tiff => Some(DecodeBackend::Tiff),
        SourceFormat::Jpeg2000 => Some(DecodeBackend::Jpeg2000),
        SourceFormat::Png
        | SourceFormat::Jpeg
        | SourceFormat::WebP
        | SourceFormat::Gif
        | SourceFormat::Bmp => Some(DecodeBackend::Raster),
        SourceFormat::Unknown => None,
    };
    Ok(backend)
}

/// Whether the general raster backend (or any backend at all) can decode the
/// file. Vendor formats without a backend, non-images, and unreadable paths
/// all return `false`.
pub fn is_raster(path: impl AsRef<Path>) -> bool {
    matches!(decode_backend(path), Ok(Some(_)))
}

// =============================================================================
// Geospatial detection
// =============================================================================

/// Georeferencing tags whose presence marks a TIFF as geospatial.
const GEO_MARKER_TAGS: [TiffTag; 4] = [
    TiffTag::ModelPixelScale,
    TiffTag::ModelTiepoint,
    TiffTag::ModelTransformation,
    TiffTag::GeoKeyDirectory,
];

/// Check whether a file is a geospatial raster.
///
/// True iff the file parses as TIFF and any IFD carries a georeferencing
/// tag. Non-TIFF files, unreadable files, and plain TIFFs return `false`.
pub fn is_geospatial(path: impl AsRef<Path>) -> bool {
    let file = match File::open(path.as_ref()) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut reader = match TiffReader::open(BufReader::new(file)) {
        Ok(r) => r,
        Err(_) => return false,
    };
    let ifds = match reader.ifds() {
        Ok(ifds) => ifds,
        Err(_) => return false,
    };
    ifds.iter()
        .any(|ifd| GEO_MARKER_TAGS.iter().any(|&tag| ifd.has_tag(tag)))
}

// =============================================================================
// Tests
// =============================================================================
