//! Aperio SVS container conventions.
//!
//! SVS files are plain tiled pyramidal TIFFs with a recognizable shape:
//!
//! - IFD 0: full-resolution tiled image whose ImageDescription begins with
//!   `Aperio Image Library` and carries pipe-separated key=value metadata
//! - IFD 1: a striped thumbnail
//! - following IFDs: the reduced tiled pyramid levels
//! - trailing striped IFDs: associated images, identified by a keyword
//!   (`label`, `macro`) in their description
//!
//! openslide-compatible readers key on exactly these markers, so the
//! description grammar here mirrors what scanners emit. When the source has
//! no label image one is synthesized from a thumbnail, so every converted
//! SVS exposes a `label` associated image.

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::CodecError;

/// Library banner expected by SVS readers at the start of every description.
const APERIO_BANNER: &str = "Aperio Image Library v12.0.15";

/// Largest edge of the generated thumbnail.
const THUMBNAIL_MAX: u32 = 1024;

/// Largest edge of the synthesized label image.
const LABEL_MAX: u32 = 640;

// =============================================================================
// Descriptions
// =============================================================================

/// Description for the full-resolution IFD.
pub fn base_description(
    width: u32,
    height: u32,
    tile_size: u32,
    codec_name: &str,
    quality: u8,
) -> String {
    format!(
        "{APERIO_BANNER}\r\n{width}x{height} ({tile_size}x{tile_size}) {codec_name} Q={quality}\
         |AppMag = 20|MPP = 0.2500"
    )
}

/// Description for a reduced pyramid level.
pub fn level_description(full_width: u32, full_height: u32, width: u32, height: u32) -> String {
    format!("{APERIO_BANNER}\r\n{full_width}x{full_height} -> {width}x{height} - |AppMag = 20")
}

/// Description for the striped thumbnail IFD.
pub fn thumbnail_description(full_width: u32, full_height: u32, width: u32, height: u32) -> String {
    format!("{APERIO_BANNER}\r\n{full_width}x{full_height} -> {width}x{height} - |AppMag = 20")
}

/// Description for the label associated image.
pub fn label_description(width: u32, height: u32) -> String {
    format!("{APERIO_BANNER}\r\nlabel {width}x{height}")
}

// =============================================================================
// Associated images
// =============================================================================

/// Build the striped thumbnail from the full-resolution frame.
pub fn make_thumbnail(base: &DynamicImage) -> DynamicImage {
    shrink_to(base, THUMBNAIL_MAX)
}

/// Synthesize a label image from the full-resolution frame.
pub fn make_label(base: &DynamicImage) -> DynamicImage {
    shrink_to(base, LABEL_MAX)
}

fn shrink_to(image: &DynamicImage, max_edge: u32) -> DynamicImage {
    if image.width() <= max_edge && image.height() <= max_edge {
        return image.clone();
    }
    let scale = max_edge as f64 / image.width().max(image.height()) as f64;
    let w = ((image.width() as f64 * scale).round() as u32).max(1);
    let h = ((image.height() as f64 * scale).round() as u32).max(1);
    image.resize_exact(w, h, FilterType::Triangle)
}

/// LZW-compress one whole-image strip for an associated image.
pub fn encode_strip(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
        .encode(data)
        .map_err(|e| CodecError::Encode {
            codec: "lzw",
            message: e.to_string(),
        })
}

// =============================================================================
// Tests
// =============================================================================
