//! JPEG 2000 source backed by the jpeg2k crate.

use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use crate::error::SourceError;

use super::SourceImage;

/// Single-frame JPEG 2000 source (JP2 container or raw codestream).
pub struct Jp2kSource {
    dimensions: (u32, u32),
    decoded: Option<DynamicImage>,
}

impl Jp2kSource {
    /// Open and fully decode a JPEG 2000 file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let jp2 = jpeg2k::Image::from_bytes(&bytes).map_err(|e| SourceError::Decode {
            message: e.to_string(),
        })?;
        let image: DynamicImage =
            (&jp2)
                .try_into()
                .map_err(|e: jpeg2k::error::Error| SourceError::Decode {
                    message: e.to_string(),
                })?;
        let dimensions = (image.width(), image.height());
        debug!(
            path = %path.display(),
            width = dimensions.0,
            height = dimensions.1,
            "opened JPEG 2000 source"
        );
        Ok(Jp2kSource {
            dimensions,
            decoded: Some(image),
        })
    }
}

impl SourceImage for Jp2kSource {
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
        // The decoded image moves out on first read; a repeat read would
        // need the file again, which statistics never do for JP2K sources.
        self.decoded
            .take()
            .ok_or_else(|| SourceError::Decode {
                message: "frame already consumed".to_string(),
            })
    }
}

// =============================================================================
// Tests
// =============================================================================
