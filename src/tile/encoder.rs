//! Per-tile codec dispatch.
//!
//! Every output tile passes through [`TileEncoder::encode`], which applies
//! the optional horizontal predictor and compresses with the configured
//! codec:
//!
//! - byte-stream codecs: LZW (TIFF mode), deflate, Zstandard, PackBits, none
//! - image codecs: JPEG, WebP (lossless at quality 0), JPEG 2000
//!
//! JPEG 2000 rate targets (`psnr`, `cr`) are implemented by uniform
//! pre-quantization of the tile samples: coarser steps compress smaller and
//! measure lower PSNR, monotonically, without reaching into codec internals.

use std::io::Write;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::error::CodecError;
use crate::format::tiff::tags::Compression;

use super::{PixelLayout, TileBuffer};

/// Default output tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default lossy quality (JPEG, WebP).
pub const DEFAULT_QUALITY: u8 = 90;

/// Default deflate level.
const DEFAULT_DEFLATE_LEVEL: i32 = 6;

/// Default Zstandard level.
const DEFAULT_ZSTD_LEVEL: i32 = 3;

// =============================================================================
// Codec
// =============================================================================

/// Output tile compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// No compression
    None,

    /// JPEG (complete per-tile streams)
    Jpeg,

    /// Deflate/zlib
    Deflate,

    /// LZW (default)
    #[default]
    Lzw,

    /// PackBits run-length encoding
    Packbits,

    /// Zstandard
    Zstd,

    /// WebP (lossless when quality is 0)
    Webp,

    /// JPEG 2000
    Jp2k,
}

impl Codec {
    /// Parse a codec name as accepted by the CLI and the conversion options.
    ///
    /// `zip` is accepted as an alias for `deflate`. Matching is
    /// case-insensitive.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Ok(Codec::None),
            "jpeg" => Ok(Codec::Jpeg),
            "deflate" | "zip" => Ok(Codec::Deflate),
            "lzw" => Ok(Codec::Lzw),
            "packbits" => Ok(Codec::Packbits),
            "zstd" => Ok(Codec::Zstd),
            "webp" => Ok(Codec::Webp),
            "jp2k" => Ok(Codec::Jp2k),
            other => Err(CodecError::UnknownCompression(other.to_string())),
        }
    }

    /// Canonical codec name.
    pub const fn name(self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Jpeg => "jpeg",
            Codec::Deflate => "deflate",
            Codec::Lzw => "lzw",
            Codec::Packbits => "packbits",
            Codec::Zstd => "zstd",
            Codec::Webp => "webp",
            Codec::Jp2k => "jp2k",
        }
    }

    /// The TIFF Compression tag value written for this codec.
    pub const fn compression_tag(self) -> Compression {
        match self {
            Codec::None => Compression::None,
            Codec::Jpeg => Compression::Jpeg,
            Codec::Deflate => Compression::AdobeDeflate,
            Codec::Lzw => Compression::Lzw,
            Codec::Packbits => Compression::PackBits,
            Codec::Zstd => Compression::Zstd,
            Codec::Webp => Compression::WebP,
            Codec::Jp2k => Compression::Jp2kRgb,
        }
    }

    /// Whether this codec compresses raw sample bytes (and therefore can use
    /// the horizontal predictor).
    pub const fn is_byte_stream(self) -> bool {
        matches!(
            self,
            Codec::None | Codec::Deflate | Codec::Lzw | Codec::Packbits | Codec::Zstd
        )
    }

    /// Whether output tiles lose information at the given quality.
    pub fn is_lossy(self, quality: u8) -> bool {
        match self {
            Codec::Jpeg | Codec::Jp2k => true,
            Codec::Webp => quality > 0,
            _ => false,
        }
    }
}

// =============================================================================
// TileEncoder
// =============================================================================

/// Configured tile encoder, shared across worker threads.
#[derive(Debug, Clone)]
pub struct TileEncoder {
    /// Output codec
    pub codec: Codec,

    /// Lossy quality 1-100; 0 selects lossless WebP
    pub quality: u8,

    /// Compression level for deflate (1-9) and zstd (1-22)
    pub level: Option<i32>,

    /// Apply horizontal differencing before byte-stream compression
    pub predictor: bool,

    /// Target PSNR in dB for JPEG 2000 rate control
    pub psnr: Option<f32>,

    /// Target compression ratio for JPEG 2000 rate control
    pub cr: Option<f32>,
}

impl Default for TileEncoder {
    fn default() -> Self {
        TileEncoder {
            codec: Codec::default(),
            quality: DEFAULT_QUALITY,
            level: None,
            predictor: false,
            psnr: None,
            cr: None,
        }
    }
}

impl TileEncoder {
    /// Create an encoder for a codec with default settings.
    pub fn new(codec: Codec) -> Self {
        TileEncoder {
            codec,
            ..Default::default()
        }
    }

    /// Whether the output IFD should carry Predictor = 2.
    ///
    /// The predictor applies to LZW, deflate, and zstd; PackBits gains
    /// nothing from differencing and the image codecs transform pixels
    /// themselves.
    pub fn uses_predictor(&self) -> bool {
        self.predictor
            && matches!(self.codec, Codec::Lzw | Codec::Deflate | Codec::Zstd)
    }

    /// Encode one tile.
    pub fn encode(&self, tile: &TileBuffer) -> Result<Bytes, CodecError> {
        let out = match self.codec {
            Codec::None => self.byte_stream_input(tile),
            Codec::Lzw => {
                let data = self.byte_stream_input(tile);
                weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                    .encode(&data)
                    .map_err(|e| encode_err("lzw", e))?
            }
            Codec::Deflate => {
                let data = self.byte_stream_input(tile);
                let level = self.level.unwrap_or(DEFAULT_DEFLATE_LEVEL).clamp(1, 9);
                let mut encoder = flate2::write::ZlibEncoder::new(
                    Vec::new(),
                    flate2::Compression::new(level as u32),
                );
                encoder
                    .write_all(&data)
                    .and_then(|_| encoder.finish())
                    .map_err(|e| encode_err("deflate", e))?
            }
            Codec::Zstd => {
                let data = self.byte_stream_input(tile);
                let level = self.level.unwrap_or(DEFAULT_ZSTD_LEVEL).clamp(1, 22);
                zstd::bulk::compress(&data, level).map_err(|e| encode_err("zstd", e))?
            }
            Codec::Packbits => packbits_compress(&self.byte_stream_input(tile)),
            Codec::Jpeg => self.encode_jpeg(tile)?,
            Codec::Webp => self.encode_webp(tile)?,
            Codec::Jp2k => self.encode_jp2k(tile)?,
        };
        Ok(Bytes::from(out))
    }

    /// Decode an encoded lossy tile back to raw samples in the tile's
    /// layout. Returns `None` for lossless codecs, whose round trip is exact
    /// by construction.
    pub fn decode_lossy(
        &self,
        data: &[u8],
        layout: PixelLayout,
    ) -> Result<Option<Vec<u8>>, CodecError> {
        let image = match self.codec {
            Codec::Jpeg => image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
                .map_err(|e| decode_err("jpeg", e))?,
            Codec::Webp if self.quality > 0 => {
                image::load_from_memory_with_format(data, image::ImageFormat::WebP)
                    .map_err(|e| decode_err("webp", e))?
            }
            Codec::Jp2k => {
                let jp2 =
                    jpeg2k::Image::from_bytes(data).map_err(|e| decode_err("jp2k", e))?;
                (&jp2)
                    .try_into()
                    .map_err(|e: jpeg2k::error::Error| decode_err("jp2k", e))?
            }
            _ => return Ok(None),
        };
        Ok(Some(layout_bytes(&image, layout)))
    }

    // -------------------------------------------------------------------------
    // Byte-stream path
    // -------------------------------------------------------------------------

    fn byte_stream_input(&self, tile: &TileBuffer) -> Vec<u8> {
        let mut data = tile.data.clone();
        if self.uses_predictor() {
            apply_horizontal_predictor(
                &mut data,
                tile.tile_size as usize,
                tile.layout.samples_per_pixel() as usize,
            );
        }
        data
    }

    // -------------------------------------------------------------------------
    // Image codecs
    // -------------------------------------------------------------------------

    fn encode_jpeg(&self, tile: &TileBuffer) -> Result<Vec<u8>, CodecError> {
        let quality = self.quality.clamp(1, 100);
        let color = match tile.layout {
            PixelLayout::Gray => image::ExtendedColorType::L8,
            PixelLayout::Rgb => image::ExtendedColorType::Rgb8,
            // Frame normalization drops alpha for JPEG; a stray RGBA tile
            // would be a bug upstream
            PixelLayout::Rgba => image::ExtendedColorType::Rgba8,
        };
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode(&tile.data, tile.tile_size, tile.tile_size, color)
            .map_err(|e| encode_err("jpeg", e))?;
        Ok(out)
    }

    fn encode_webp(&self, tile: &TileBuffer) -> Result<Vec<u8>, CodecError> {
        let size = tile.tile_size;
        // WebP has no grayscale mode; widen gray tiles to RGB
        let rgb_data;
        let (data, has_alpha): (&[u8], bool) = match tile.layout {
            PixelLayout::Gray => {
                rgb_data = tile
                    .data
                    .iter()
                    .flat_map(|&v| [v, v, v])
                    .collect::<Vec<u8>>();
                (&rgb_data, false)
            }
            PixelLayout::Rgb => (&tile.data, false),
            PixelLayout::Rgba => (&tile.data, true),
        };
        let encoder = if has_alpha {
            webp::Encoder::from_rgba(data, size, size)
        } else {
            webp::Encoder::from_rgb(data, size, size)
        };
        let memory = if self.quality == 0 {
            encoder.encode_lossless()
        } else {
            encoder.encode(self.quality.clamp(1, 100) as f32)
        };
        Ok(memory.to_vec())
    }

    fn encode_jp2k(&self, tile: &TileBuffer) -> Result<Vec<u8>, CodecError> {
        let size = tile.tile_size;
        let mut data = tile.data.clone();
        if let Some(step) = self.jp2k_quant_step() {
            quantize(&mut data, step);
        }
        let image = match tile.layout {
            PixelLayout::Gray => image::GrayImage::from_raw(size, size, data)
                .map(DynamicImage::ImageLuma8),
            PixelLayout::Rgb => {
                image::RgbImage::from_raw(size, size, data).map(DynamicImage::ImageRgb8)
            }
            PixelLayout::Rgba => {
                image::RgbaImage::from_raw(size, size, data).map(DynamicImage::ImageRgba8)
            }
        }
        .ok_or_else(|| CodecError::Encode {
            codec: "jp2k",
            message: "tile buffer size mismatch".to_string(),
        })?;

        let jp2 = jpeg2k::Image::from_dynamic_image(&image)
            .map_err(|e| encode_err("jp2k", e))?;
        jp2.encode(None).map_err(|e| encode_err("jp2k", e))
    }

    /// Quantization step implementing the JPEG 2000 rate targets.
    ///
    /// A uniform quantizer with step `q` has MSE ~= q²/12, so a PSNR target
    /// solves to `q = sqrt(12 * 255² / 10^(psnr/10))`. A compression-ratio
    /// target uses a proportional heuristic. No target means no
    /// quantization.
    fn jp2k_quant_step(&self) -> Option<u16> {
        if let Some(psnr) = self.psnr {
            let q = (12.0 * 255.0f64 * 255.0 / 10f64.powf(psnr as f64 / 10.0)).sqrt();
            Some((q.round() as u16).clamp(2, 128))
        } else if let Some(cr) = self.cr {
            Some(((cr / 4.0).round() as u16).clamp(2, 128))
        } else {
            None
        }
    }
}

fn encode_err(codec: &'static str, err: impl std::fmt::Display) -> CodecError {
    CodecError::Encode {
        codec,
        message: err.to_string(),
    }
}

fn decode_err(codec: &'static str, err: impl std::fmt::Display) -> CodecError {
    CodecError::Decode {
        codec,
        message: err.to_string(),
    }
}

/// Extract raw samples from a decoded image in the requested layout.
fn layout_bytes(image: &DynamicImage, layout: PixelLayout) -> Vec<u8> {
    match layout {
        PixelLayout::Gray => image.to_luma8().into_raw(),
        PixelLayout::Rgb => image.to_rgb8().into_raw(),
        PixelLayout::Rgba => image.to_rgba8().into_raw(),
    }
}

// =============================================================================
// Predictor
// =============================================================================

/// Apply TIFF horizontal differencing (Predictor = 2) in place.
///
/// Each sample becomes its difference from the sample one pixel to the left
/// in the same channel, per row.
pub fn apply_horizontal_predictor(data: &mut [u8], tile_size: usize, spp: usize) {
    let row_bytes = tile_size * spp;
    for row in data.chunks_exact_mut(row_bytes) {
        for i in (spp..row_bytes).rev() {
            row[i] = row[i].wrapping_sub(row[i - spp]);
        }
    }
}

/// Undo horizontal differencing in place.
pub fn undo_horizontal_predictor(data: &mut [u8], tile_size: usize, spp: usize) {
    let row_bytes = tile_size * spp;
    for row in data.chunks_exact_mut(row_bytes) {
        for i in spp..row_bytes {
            row[i] = row[i].wrapping_add(row[i - spp]);
        }
    }
}

// =============================================================================
// PackBits
// =============================================================================

/// Compress with PackBits run-length encoding.
fn packbits_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 8);
    let mut i = 0;
    while i < data.len() {
        // Measure the run starting here
        let mut run = 1;
        while i + run < data.len() && run < 128 && data[i + run] == data[i] {
            run += 1;
        }
        if run > 1 {
            out.push((1i16 - run as i16) as i8 as u8);
            out.push(data[i]);
            i += run;
            continue;
        }

        // Literal sequence until the next run of 3+ (a 2-run inside a
        // literal costs nothing to keep literal)
        let start = i;
        i += 1;
        while i < data.len() && i - start < 128 {
            let next_run_3 = i + 2 < data.len()
                && data[i] == data[i + 1]
                && data[i] == data[i + 2];
            if next_run_3 {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&data[start..i]);
    }
    out
}

/// Uniform quantization used for JPEG 2000 rate targeting.
fn quantize(data: &mut [u8], step: u16) {
    let step = step.max(1) as u32;
    for v in data.iter_mut() {
        let bucket = *v as u32 / step;
        *v = (bucket * step + step / 2).min(255) as u8;
    }
}

// =============================================================================
// Tests
// =============================================================================
