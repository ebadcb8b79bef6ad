//! Pyramid planning and tile extraction.
//!
//! A pyramid is planned top-down from the full-resolution frame: each level
//! halves both dimensions (rounding up) until the whole image fits inside a
//! single tile. Level 0 is full resolution.
//!
//! Tiles are always full `tile_size` squares; edge tiles replicate their last
//! row/column into the padding so block codecs do not ring against an
//! artificial black border.

use image::imageops::FilterType;
use image::DynamicImage;

use super::{PixelLayout, TileBuffer};

// =============================================================================
// PyramidLevel
// =============================================================================

/// Geometry of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidLevel {
    /// Level index, 0 = full resolution
    pub level: usize,

    /// Level width in pixels
    pub width: u32,

    /// Level height in pixels
    pub height: u32,

    /// Tile edge length
    pub tile_size: u32,

    /// Tile columns
    pub tiles_x: u32,

    /// Tile rows
    pub tiles_y: u32,
}

impl PyramidLevel {
    fn new(level: usize, width: u32, height: u32, tile_size: u32) -> Self {
        PyramidLevel {
            level,
            width,
            height,
            tile_size,
            tiles_x: width.div_ceil(tile_size),
            tiles_y: height.div_ceil(tile_size),
        }
    }

    /// Total number of tiles in row-major order.
    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// Content dimensions of a tile (edge tiles cover less than a full tile).
    pub fn tile_dimensions(&self, tile_x: u32, tile_y: u32) -> (u32, u32) {
        let w = (self.width - tile_x * self.tile_size).min(self.tile_size);
        let h = (self.height - tile_y * self.tile_size).min(self.tile_size);
        (w, h)
    }
}

/// Plan the pyramid levels for a frame.
///
/// Halving continues until both dimensions fit in one tile, so every image
/// gets at least one level and a deep image converges in O(log n) levels.
pub fn plan_levels(width: u32, height: u32, tile_size: u32) -> Vec<PyramidLevel> {
    let mut levels = vec![PyramidLevel::new(0, width, height, tile_size)];
    let (mut w, mut h) = (width, height);
    while w > tile_size || h > tile_size {
        w = w.div_ceil(2).max(1);
        h = h.div_ceil(2).max(1);
        levels.push(PyramidLevel::new(levels.len(), w, h, tile_size));
    }
    levels
}

/// Downsample an image by a factor of two (rounding dimensions up).
pub fn downsample(image: &DynamicImage) -> DynamicImage {
    let w = image.width().div_ceil(2).max(1);
    let h = image.height().div_ceil(2).max(1);
    image.resize_exact(w, h, FilterType::Triangle)
}

/// Extract one padded tile from a normalized frame.
///
/// `image` must already be in the 8-bit layout named by `layout`; the
/// returned buffer is always `tile_size²` pixels with replicated edges.
pub fn extract_tile(
    image: &DynamicImage,
    layout: PixelLayout,
    tile_x: u32,
    tile_y: u32,
    tile_size: u32,
) -> TileBuffer {
    let spp = layout.samples_per_pixel() as usize;
    let img_w = image.width() as usize;
    let img_h = image.height() as usize;
    let src = image.as_bytes();
    let stride = img_w * spp;

    let x0 = (tile_x * tile_size) as usize;
    let y0 = (tile_y * tile_size) as usize;
    let content_w = (img_w - x0.min(img_w)).min(tile_size as usize);
    let content_h = (img_h - y0.min(img_h)).min(tile_size as usize);

    let ts = tile_size as usize;
    let row_bytes = ts * spp;
    let mut data = vec![0u8; ts * row_bytes];

    for row in 0..content_h {
        let src_start = (y0 + row) * stride + x0 * spp;
        let dst_start = row * row_bytes;
        let copy_bytes = content_w * spp;
        data[dst_start..dst_start + copy_bytes]
            .copy_from_slice(&src[src_start..src_start + copy_bytes]);

        // Replicate the last pixel across the horizontal padding
        if content_w < ts && content_w > 0 {
            let last = dst_start + (content_w - 1) * spp;
            let last_pixel: Vec<u8> = data[last..last + spp].to_vec();
            for col in content_w..ts {
                let at = dst_start + col * spp;
                data[at..at + spp].copy_from_slice(&last_pixel);
            }
        }
    }

    // Replicate the last content row across the vertical padding
    if content_h > 0 {
        let last_row_start = (content_h - 1) * row_bytes;
        let last_row: Vec<u8> = data[last_row_start..last_row_start + row_bytes].to_vec();
        for row in content_h..ts {
            let at = row * row_bytes;
            data[at..at + row_bytes].copy_from_slice(&last_row);
        }
    }

    TileBuffer {
        data,
        tile_size,
        layout,
    }
}

// =============================================================================
// Tests
// =============================================================================
