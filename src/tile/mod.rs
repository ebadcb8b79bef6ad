//! Tile extraction and encoding.
//!
//! The converter decomposes every pyramid level into fixed-size tiles,
//! encodes them with the configured codec, and hands the compressed bytes to
//! the container writer. This module owns the pixel-layout vocabulary, the
//! pyramid planner, and the per-tile codec dispatch.

pub mod encoder;
pub mod pyramid;

use image::DynamicImage;

pub use encoder::{Codec, TileEncoder, DEFAULT_QUALITY, DEFAULT_TILE_SIZE};
pub use pyramid::{downsample, extract_tile, plan_levels, PyramidLevel};

use crate::format::tiff::tags::{PHOTOMETRIC_MIN_IS_BLACK, PHOTOMETRIC_RGB, PHOTOMETRIC_YCBCR};

// =============================================================================
// PixelLayout
// =============================================================================

/// Normalized pixel layout of conversion output.
///
/// Sources are normalized to one of three 8-bit interleaved layouts before
/// tiling; higher bit depths and float samples are range-scaled by the source
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// Single 8-bit luminance sample
    Gray,

    /// 8-bit RGB
    Rgb,

    /// 8-bit RGB plus unassociated alpha
    Rgba,
}

impl PixelLayout {
    /// Samples per pixel.
    #[inline]
    pub const fn samples_per_pixel(self) -> u16 {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }

    /// Whether the layout carries an alpha channel.
    #[inline]
    pub const fn has_alpha(self) -> bool {
        matches!(self, PixelLayout::Rgba)
    }

    /// PhotometricInterpretation tag value for this layout under a codec.
    ///
    /// JPEG tiles are stored as complete streams whose own color model is
    /// YCbCr; everything else is MinIsBlack or RGB.
    pub fn photometric(self, codec: Codec) -> u16 {
        match self {
            PixelLayout::Gray => PHOTOMETRIC_MIN_IS_BLACK,
            PixelLayout::Rgb | PixelLayout::Rgba => {
                if codec == Codec::Jpeg {
                    PHOTOMETRIC_YCBCR
                } else {
                    PHOTOMETRIC_RGB
                }
            }
        }
    }
}

/// Normalize a decoded frame to one of the output layouts.
///
/// Alpha survives except under JPEG, which has no alpha channel; gray+alpha
/// sources widen to RGBA to keep their alpha.
pub fn normalize_frame(image: DynamicImage, codec: Codec) -> (DynamicImage, PixelLayout) {
    use image::ColorType;
    match image.color() {
        ColorType::L8 | ColorType::L16 => {
            (DynamicImage::ImageLuma8(image.to_luma8()), PixelLayout::Gray)
        }
        ColorType::La8 | ColorType::La16 | ColorType::Rgba8 | ColorType::Rgba16
        | ColorType::Rgba32F => {
            if codec == Codec::Jpeg {
                (DynamicImage::ImageRgb8(image.to_rgb8()), PixelLayout::Rgb)
            } else {
                (DynamicImage::ImageRgba8(image.to_rgba8()), PixelLayout::Rgba)
            }
        }
        _ => (DynamicImage::ImageRgb8(image.to_rgb8()), PixelLayout::Rgb),
    }
}

// =============================================================================
// TileBuffer
// =============================================================================

/// One raw tile: interleaved 8-bit samples padded to the full tile size.
#[derive(Debug, Clone)]
pub struct TileBuffer {
    /// Interleaved samples, `tile_size * tile_size * samples_per_pixel` bytes
    pub data: Vec<u8>,

    /// Tile edge length in pixels
    pub tile_size: u32,

    /// Pixel layout of `data`
    pub layout: PixelLayout,
}

impl TileBuffer {
    /// Total sample bytes a tile of this geometry holds.
    pub fn expected_len(tile_size: u32, layout: PixelLayout) -> usize {
        tile_size as usize * tile_size as usize * layout.samples_per_pixel() as usize
    }
}

// =============================================================================
// Tests
// =============================================================================
