//! # pyratiff
//!
//! Convert raster images into tiled, pyramidal TIFF (or Aperio SVS) files
//! with configurable per-tile compression.
//!
//! Sources may be PNG, JPEG, WebP, GIF, BMP, JPEG 2000, or any TIFF variant,
//! including multi-frame OME-TIFF and georeferenced GeoTIFF. The output is a
//! tiled pyramid: the full-resolution image plus progressively halved levels,
//! each stored as fixed-size compressed tiles, so tile servers and slide
//! viewers can stream any region at any zoom without decoding whole images.
//!
//! ## Features
//!
//! - **Codecs**: LZW (default), JPEG, deflate, PackBits, Zstandard, WebP,
//!   and JPEG 2000, selected per conversion
//! - **Multi-frame layout**: frame pyramids nested as SubIFDs or flattened
//!   into the top-level IFD chain
//! - **Geospatial carry-over**: GeoTIFF tags survive conversion byte-exact
//! - **Aperio output**: SVS-shaped containers with thumbnail and label
//!   associated images, readable by openslide-based viewers
//! - **Embedded statistics**: optional conversion metadata (including
//!   measured PSNR) in the output's ImageDescription
//!
//! ## Architecture
//!
//! - [`mod@format`] - format detection, TIFF structure reader/writer,
//!   georeferencing carry-over
//! - [`source`] - decode backends behind one multi-frame trait
//! - [`tile`] - pyramid planning, tile extraction, codec dispatch
//! - [`convert`] - the conversion pipeline and its options
//! - [`config`] - CLI definition
//!
//! ## Example
//!
//! ```rust,no_run
//! use pyratiff::{convert, Codec, ConvertOptions};
//!
//! let options = ConvertOptions {
//!     compression: Codec::Jpeg,
//!     quality: 85,
//!     tile_size: 512,
//!     ..Default::default()
//! };
//! let output = convert("slide.png", None, &options)?;
//! println!("wrote {}", output.display());
//! # Ok::<(), pyratiff::ConvertError>(())
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::Cli;
pub use convert::{convert, ConvertOptions, OutputFormat, StatsLevel};
pub use error::{CodecError, ConvertError, SourceError, TiffError};
pub use format::{
    decode_backend, is_geospatial, is_raster, sniff_format, DecodeBackend, GeoMetadata,
    SourceFormat,
};
pub use format::tiff::{
    ByteOrder, Compression, FieldType, Ifd, IfdBuilder, IfdEntry, TagValue, TiffFileWriter,
    TiffHeader, TiffReader, TiffTag,
};
pub use source::{open_source, Jp2kSource, RasterSource, SourceImage, TiffSource};
pub use tile::{
    downsample, extract_tile, normalize_frame, plan_levels, Codec, PixelLayout, PyramidLevel,
    TileEncoder, DEFAULT_QUALITY, DEFAULT_TILE_SIZE,
};
