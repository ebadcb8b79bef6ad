//! General raster source backed by the image crate.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use tracing::debug;

use crate::error::SourceError;

use super::SourceImage;

/// Single-frame raster source (PNG, JPEG, WebP, GIF, BMP).
///
/// The image is decoded eagerly at open time so unreadable files fail before
/// any output is created. The first `read_frame` hands the decoded image out
/// without copying; later reads decode again from disk.
pub struct RasterSource {
    path: PathBuf,
    dimensions: (u32, u32),
    decoded: Option<DynamicImage>,
}

impl RasterSource {
    /// Open and decode a raster file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let image = decode(&path)?;
        let dimensions = (image.width(), image.height());
        debug!(
            path = %path.display(),
            width = dimensions.0,
            height = dimensions.1,
            "opened raster source"
        );
        Ok(RasterSource {
            path,
            dimensions,
            decoded: Some(image),
        })
    }
}

impl SourceImage for RasterSource {
    fn frame_count(&self) -> usize {
        1
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn read_frame(&mut self, index: usize) -> Result<DynamicImage, SourceError> {
        if index != 0 {
            return Err(SourceError::FrameOutOfRange {
                frame: index,
                count: 1,
            });
        }
        match self.decoded.take() {
            Some(image) => Ok(image),
            None => decode(&self.path),
        }
    }
}

fn decode(path: &Path) -> Result<DynamicImage, SourceError> {
    let reader = ImageReader::open(path)?;
    let reader = reader
        .with_guessed_format()
        .map_err(|e| SourceError::Io(e.to_string()))?;
    reader.decode().map_err(|e| SourceError::Decode {
        message: e.to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
