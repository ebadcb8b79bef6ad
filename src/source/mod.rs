//! Source image decoding.
//!
//! Every input file is opened through [`open_source`], which sniffs the
//! container format and picks a decode backend:
//!
//! - [`RasterSource`] - PNG/JPEG/WebP/GIF/BMP via the image crate
//! - [`TiffSource`] - TIFF family (plain, striped, tiled, multi-frame/OME)
//! - [`Jp2kSource`] - JPEG 2000
//!
//! Backends present a uniform multi-frame view: a frame is one full-resolution
//! plane of the source. Reduced-resolution pyramid levels inside a source are
//! not frames; the converter rebuilds its own pyramid.

mod jp2k;
mod raster;
mod tiff;

use std::path::Path;

use image::DynamicImage;

use crate::error::SourceError;
use crate::format::{decode_backend, DecodeBackend};

pub use jp2k::Jp2kSource;
pub use raster::RasterSource;
pub use tiff::TiffSource;

// =============================================================================
// SourceImage
// =============================================================================

/// A decodable source image with one or more frames.
pub trait SourceImage: Send {
    /// Number of full-resolution frames.
    fn frame_count(&self) -> usize;

    /// Pixel dimensions of frame 0.
    fn dimensions(&self) -> (u32, u32);

    /// Decode one frame. Frames may be requested in any order and more than
    /// once (statistics re-read the base frame).
    fn read_frame(&mut self, index: usize) -> Result<DynamicImage, SourceError>;
}

/// Open a source image with the backend its format requires.
///
/// # Errors
/// - `NotFound` when the path does not exist
/// - `UnsupportedFormat` when no backend recognizes the file
/// - `Decode` when the backend recognizes but cannot decode it
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn SourceImage>, SourceError> {
    let path = path.as_ref();
    match decode_backend(path)? {
        Some(DecodeBackend::Raster) => Ok(Box::new(RasterSource::open(path)?)),
        Some(DecodeBackend::Tiff) => Ok(Box::new(TiffSource::open(path)?)),
        Some(DecodeBackend::Jpeg2000) => Ok(Box::new(Jp2kSource::open(path)?)),
        None => Err(SourceError::UnsupportedFormat {
            reason: format!("no decode backend for {}", path.display()),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
