//! CLI configuration.
//!
//! The converter takes a source path, an optional output path, and flags
//! mirroring [`ConvertOptions`]. Every option can also be supplied through an
//! environment variable with the `PYRATIFF_` prefix.
//!
//! # Example
//!
//! ```text
//! pyratiff slide.png slide.tiff --compression jpeg --quality 85 --tile-size 512
//! pyratiff scan.ome.tif --no-subifds --concurrency 4 --full-stats
//! pyratiff scene.tif --format aperio out.svs
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::convert::{ConvertOptions, OutputFormat, StatsLevel};
use crate::error::ConvertError;
use crate::tile::{Codec, DEFAULT_QUALITY, DEFAULT_TILE_SIZE};

/// pyratiff - convert raster images into tiled pyramidal TIFF or SVS files.
///
/// The source may be a PNG, JPEG, WebP, GIF, BMP, JPEG 2000, or any TIFF
/// variant (including multi-frame OME-TIFF and GeoTIFF). Georeferencing tags
/// survive conversion; multi-frame sources become multi-frame pyramids.
#[derive(Parser, Debug, Clone)]
#[command(name = "pyratiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source image to convert.
    pub source: PathBuf,

    /// Output path. When omitted, derived next to the source (keeping a
    /// `geo.tiff` suffix for geospatial inputs).
    pub output: Option<PathBuf>,

    // =========================================================================
    // Compression
    // =========================================================================
    /// Tile codec: none, jpeg, deflate (alias: zip), lzw, packbits, zstd,
    /// webp, or jp2k.
    #[arg(long, default_value = "lzw", env = "PYRATIFF_COMPRESSION")]
    pub compression: String,

    /// Lossy quality 1-100; 0 selects lossless WebP.
    #[arg(short, long, default_value_t = DEFAULT_QUALITY, env = "PYRATIFF_QUALITY")]
    pub quality: u8,

    /// Compression level for deflate (1-9) or zstd (1-22).
    #[arg(long, env = "PYRATIFF_LEVEL")]
    pub level: Option<i32>,

    /// Apply the horizontal differencing predictor (LZW/deflate/zstd).
    #[arg(long, default_value_t = false)]
    pub predictor: bool,

    /// Target PSNR in dB for jp2k rate control.
    #[arg(long)]
    pub psnr: Option<f32>,

    /// Target compression ratio for jp2k rate control.
    #[arg(long)]
    pub cr: Option<f32>,

    // =========================================================================
    // Layout
    // =========================================================================
    /// Output tile width and height in pixels (multiple of 16).
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "PYRATIFF_TILE_SIZE")]
    pub tile_size: u32,

    /// Flatten multi-frame pyramids into top-level IFDs instead of nesting
    /// reduced levels as SubIFDs.
    #[arg(long = "no-subifds", default_value_t = false)]
    pub no_subifds: bool,

    /// Convert only this frame of a multi-frame source.
    #[arg(long)]
    pub only_frame: Option<usize>,

    /// Output container format: tiff or aperio.
    #[arg(long, default_value = "tiff", env = "PYRATIFF_FORMAT")]
    pub format: String,

    // =========================================================================
    // Behavior
    // =========================================================================
    /// Replace the output file if it already exists.
    #[arg(short = 'w', long, default_value_t = false)]
    pub overwrite: bool,

    /// Embed conversion statistics in the output ImageDescription.
    #[arg(long, default_value_t = false)]
    pub stats: bool,

    /// Embed full statistics including measured PSNR (implies --stats).
    #[arg(long = "full-stats", default_value_t = false)]
    pub full_stats: bool,

    /// Worker threads for tile encoding (0 = all cores).
    #[arg(long, default_value_t = 0, env = "PYRATIFF_CONCURRENCY")]
    pub concurrency: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the CLI flags into conversion options.
    pub fn to_options(&self) -> Result<ConvertOptions, ConvertError> {
        let options = ConvertOptions {
            compression: Codec::from_name(&self.compression)?,
            quality: self.quality,
            level: self.level,
            predictor: self.predictor,
            tile_size: self.tile_size,
            psnr: self.psnr,
            cr: self.cr,
            subifds: !self.no_subifds,
            only_frame: self.only_frame,
            overwrite: self.overwrite,
            format: OutputFormat::from_name(&self.format)?,
            stats: if self.full_stats {
                StatsLevel::Full
            } else if self.stats {
                StatsLevel::Basic
            } else {
                StatsLevel::Off
            },
            concurrency: self.concurrency,
        };
        options.validate()?;
        Ok(options)
    }
}

// =============================================================================
// Tests
// =============================================================================
