//! The conversion pipeline.
//!
//! [`convert`] turns any supported source image into a tiled pyramidal TIFF
//! (or Aperio SVS) on disk:
//!
//! 1. classify the source (format, geospatial) and resolve the output path
//! 2. decode frames through the source layer
//! 3. plan a pyramid per frame and encode its tiles (in parallel) while
//!    streaming compressed payloads into the container writer
//! 4. lay out IFDs per the frame/subifds rules and finalize the container
//!
//! Output is written to a temp file next to the destination and persisted
//! only on success, so a failed conversion never leaves a partial file.

pub mod aperio;
pub mod stats;

use std::fs;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;
use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{CodecError, ConvertError, SourceError};
use crate::format::tiff::tags::{
    TiffTag, EXTRA_SAMPLE_UNASSOCIATED_ALPHA, PREDICTOR_HORIZONTAL, SAMPLE_FORMAT_UINT,
    SUBFILE_FULL_RESOLUTION, SUBFILE_REDUCED_IMAGE,
};
use crate::format::tiff::value::TagValue;
use crate::format::tiff::writer::{IfdBuilder, TiffFileWriter};
use crate::format::{is_geospatial, GeoMetadata};
use crate::source::{open_source, SourceImage};
use crate::tile::{
    downsample, extract_tile, normalize_frame, plan_levels, Codec, PixelLayout, PyramidLevel,
    TileEncoder, DEFAULT_QUALITY, DEFAULT_TILE_SIZE,
};

use stats::{ConversionReport, MseAccumulator};

// =============================================================================
// Options
// =============================================================================

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Tiled pyramidal TIFF
    #[default]
    Tiff,

    /// Aperio-style SVS container with associated images
    Aperio,
}

impl OutputFormat {
    /// Parse a format name as accepted by the CLI.
    pub fn from_name(name: &str) -> Result<Self, ConvertError> {
        match name.to_ascii_lowercase().as_str() {
            "tiff" => Ok(OutputFormat::Tiff),
            "aperio" | "svs" => Ok(OutputFormat::Aperio),
            other => Err(ConvertError::InvalidOptions(format!(
                "unknown output format: {other}"
            ))),
        }
    }
}

/// How much conversion metadata to embed in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsLevel {
    /// No embedded statistics
    #[default]
    Off,

    /// Sizes, timing, and geometry
    Basic,

    /// Basic plus measured PSNR of the base level
    Full,
}

/// Conversion options.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Tile compression codec (default LZW)
    pub compression: Codec,

    /// Lossy quality 1-100; 0 selects lossless WebP
    pub quality: u8,

    /// Compression level for deflate/zstd
    pub level: Option<i32>,

    /// Horizontal differencing predictor for LZW/deflate/zstd
    pub predictor: bool,

    /// Output tile edge length (multiple of 16)
    pub tile_size: u32,

    /// Target PSNR in dB for JPEG 2000
    pub psnr: Option<f32>,

    /// Target compression ratio for JPEG 2000
    pub cr: Option<f32>,

    /// Nest multi-frame pyramids as SubIFDs (default) vs flat IFD chains
    pub subifds: bool,

    /// Convert only this frame index
    pub only_frame: Option<usize>,

    /// Replace an existing output file
    pub overwrite: bool,

    /// Output container format
    pub format: OutputFormat,

    /// Embedded statistics level
    pub stats: StatsLevel,

    /// Tile-encoding worker threads (0 = all cores)
    pub concurrency: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            compression: Codec::default(),
            quality: DEFAULT_QUALITY,
            level: None,
            predictor: false,
            tile_size: DEFAULT_TILE_SIZE,
            psnr: None,
            cr: None,
            subifds: true,
            only_frame: None,
            overwrite: false,
            format: OutputFormat::default(),
            stats: StatsLevel::default(),
            concurrency: 0,
        }
    }
}

impl ConvertOptions {
    /// Validate option values and combinations.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.tile_size < 16 || self.tile_size % 16 != 0 {
            return Err(ConvertError::InvalidOptions(format!(
                "tile_size must be a multiple of 16, got {}",
                self.tile_size
            )));
        }
        if self.quality > 100 {
            return Err(ConvertError::InvalidOptions(format!(
                "quality must be 0-100, got {}",
                self.quality
            )));
        }
        if let Some(psnr) = self.psnr {
            if !(psnr > 0.0) {
                return Err(ConvertError::InvalidOptions(
                    "psnr target must be positive".to_string(),
                ));
            }
        }
        if let Some(cr) = self.cr {
            if !(cr >= 1.0) {
                return Err(ConvertError::InvalidOptions(
                    "cr target must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Build the tile encoder these options describe.
    pub fn encoder(&self) -> TileEncoder {
        TileEncoder {
            codec: self.compression,
            quality: self.quality,
            level: self.level,
            predictor: self.predictor,
            psnr: self.psnr,
            cr: self.cr,
        }
    }
}

// =============================================================================
// convert
// =============================================================================

/// Convert a source image into a tiled pyramidal TIFF or SVS.
///
/// With `output = None` the destination is derived next to the source,
/// keeping a `geo.tiff` suffix for geospatial inputs. Returns the resolved
/// output path.
///
/// # Errors
/// - [`ConvertError::OutputExists`] when the destination exists and
///   `overwrite` is off
/// - [`SourceError`] variants for missing/undecodable sources; in every
///   error case no output file is left behind
pub fn convert(
    source: impl AsRef<Path>,
    output: Option<&Path>,
    options: &ConvertOptions,
) -> Result<PathBuf, ConvertError> {
    let source = source.as_ref();
    options.validate()?;
    if !source.is_file() {
        return Err(SourceError::NotFound(source.to_path_buf()).into());
    }

    let start = Instant::now();
    let geospatial = is_geospatial(source);
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => derive_output_path(source, geospatial),
    };
    if output.exists() && !options.overwrite {
        return Err(ConvertError::OutputExists(output));
    }

    info!(
        source = %source.display(),
        output = %output.display(),
        codec = options.compression.name(),
        tile_size = options.tile_size,
        geospatial,
        "converting"
    );

    let mut src = open_source(source)?;
    let frame_count = src.frame_count();
    let frames: Vec<usize> = match options.only_frame {
        Some(frame) if frame >= frame_count => {
            return Err(SourceError::FrameOutOfRange {
                frame,
                count: frame_count,
            }
            .into())
        }
        Some(frame) => vec![frame],
        None => (0..frame_count).collect(),
    };
    let geo = if geospatial {
        GeoMetadata::read_from(source).ok().flatten()
    } else {
        None
    };

    let (width, height) = src.dimensions();
    let bigtiff = should_use_bigtiff(width, height, frames.len());
    let mut job = ConvertJob::new(options, bigtiff)?;

    // The temp file lives in the destination directory so the final persist
    // is a same-filesystem rename; dropping it on any error path removes it.
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent)?;

    {
        let mut writer = TiffFileWriter::new(BufWriter::new(temp.as_file_mut()), bigtiff)?;
        let mut top = match options.format {
            OutputFormat::Tiff => job.build_tiff_output(&mut writer, src.as_mut(), &frames)?,
            OutputFormat::Aperio => {
                job.build_aperio_output(&mut writer, src.as_mut(), &frames)?
            }
        };

        if let Some(geo) = &geo {
            debug!(tags = geo.len(), "replaying georeferencing tags");
            geo.apply(&mut top[0]);
        }
        top[0].set(
            TiffTag::Software,
            TagValue::ascii(concat!("pyratiff ", env!("CARGO_PKG_VERSION"))),
        );

        if options.stats != StatsLevel::Off {
            if options.format == OutputFormat::Aperio {
                warn!("statistics are not embedded in aperio output");
            } else {
                let report = ConversionReport {
                    elapsed: start.elapsed(),
                    input_size: fs::metadata(source)?.len(),
                    compressed_size: job.payload_bytes,
                    pixels: width as u64 * height as u64,
                    frames: frames.len(),
                    levels: job.levels_per_frame,
                    tile_size: options.tile_size,
                    compression: options.compression.name(),
                    psnr: job.mse.psnr(),
                };
                top[0].set(
                    TiffTag::ImageDescription,
                    TagValue::ascii(
                        report.to_description(options.stats == StatsLevel::Full),
                    ),
                );
            }
        }

        writer.finish(top)?;
    }

    temp.persist(&output)
        .map_err(|e| ConvertError::Io(e.to_string()))?;

    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        output = %output.display(),
        "conversion complete"
    );
    Ok(output)
}

// =============================================================================
// ConvertJob
// =============================================================================

/// Per-tile payloads and geometry of one encoded level.
struct LevelOutput {
    offsets: Vec<u64>,
    counts: Vec<u64>,
}

/// State threaded through one conversion.
struct ConvertJob<'a> {
    options: &'a ConvertOptions,
    encoder: TileEncoder,
    pool: Option<rayon::ThreadPool>,
    bigtiff: bool,
    payload_bytes: u64,
    mse: MseAccumulator,
    levels_per_frame: usize,
}

impl<'a> ConvertJob<'a> {
    fn new(options: &'a ConvertOptions, bigtiff: bool) -> Result<Self, ConvertError> {
        let pool = if options.concurrency > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(options.concurrency)
                    .build()
                    .map_err(|e| ConvertError::InvalidOptions(e.to_string()))?,
            )
        } else {
            None
        };
        Ok(ConvertJob {
            options,
            encoder: options.encoder(),
            pool,
            bigtiff,
            payload_bytes: 0,
            mse: MseAccumulator::new(),
            levels_per_frame: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Standard TIFF output
    // -------------------------------------------------------------------------

    /// Encode the selected frames and arrange their pyramids.
    ///
    /// Layout rules:
    /// - one frame: its levels become the top-level chain
    /// - multiple frames with subifds: one top IFD per frame, reduced levels
    ///   nested beneath it
    /// - multiple frames without subifds: everything flat, frame-major
    fn build_tiff_output<W: Write + Seek>(
        &mut self,
        writer: &mut TiffFileWriter<W>,
        src: &mut dyn SourceImage,
        frames: &[usize],
    ) -> Result<Vec<IfdBuilder>, ConvertError> {
        let mut chains = Vec::with_capacity(frames.len());
        for (position, &frame_index) in frames.iter().enumerate() {
            let frame = src.read_frame(frame_index)?;
            let measure = self.options.stats == StatsLevel::Full && position == 0;
            let chain = self.encode_frame_pyramid(writer, frame, measure)?;
            chains.push(chain);
        }

        let top = if chains.len() == 1 {
            chains.pop().expect("one chain")
        } else if self.options.subifds {
            chains
                .into_iter()
                .map(|mut chain| {
                    let mut base = chain.remove(0);
                    for reduced in chain {
                        base.push_subifd(reduced);
                    }
                    base
                })
                .collect()
        } else {
            chains.into_iter().flatten().collect()
        };
        Ok(top)
    }

    /// Encode one frame's full pyramid, returning one IFD per level.
    fn encode_frame_pyramid<W: Write + Seek>(
        &mut self,
        writer: &mut TiffFileWriter<W>,
        frame: DynamicImage,
        measure: bool,
    ) -> Result<Vec<IfdBuilder>, ConvertError> {
        let (mut image, layout) = normalize_frame(frame, self.options.compression);
        let levels = plan_levels(image.width(), image.height(), self.options.tile_size);
        self.levels_per_frame = levels.len();

        let mut chain = Vec::with_capacity(levels.len());
        for level in &levels {
            if level.level > 0 {
                image = downsample(&image);
            }
            let measure_level = measure && level.level == 0;
            let out = self.encode_level(writer, &image, layout, level, measure_level)?;
            let subfile = if level.level == 0 {
                SUBFILE_FULL_RESOLUTION
            } else {
                SUBFILE_REDUCED_IMAGE
            };
            chain.push(self.level_ifd(level, layout, &out, subfile));
        }
        Ok(chain)
    }

    /// Encode every tile of one level, row-batch parallel, streaming the
    /// compressed payloads in row-major order.
    fn encode_level<W: Write + Seek>(
        &mut self,
        writer: &mut TiffFileWriter<W>,
        image: &DynamicImage,
        layout: PixelLayout,
        level: &PyramidLevel,
        measure: bool,
    ) -> Result<LevelOutput, ConvertError> {
        debug!(
            level = level.level,
            width = level.width,
            height = level.height,
            tiles = level.tile_count(),
            "encoding level"
        );
        let encoder = self.encoder.clone();
        let mut offsets = Vec::with_capacity(level.tile_count() as usize);
        let mut counts = Vec::with_capacity(level.tile_count() as usize);

        for tile_y in 0..level.tiles_y {
            let row: Vec<_> = (0..level.tiles_x)
                .map(|tile_x| {
                    extract_tile(image, layout, tile_x, tile_y, self.options.tile_size)
                })
                .collect();

            let encode_row = || {
                row.par_iter()
                    .map(|tile| {
                        let bytes = encoder.encode(tile)?;
                        let mut mse = MseAccumulator::new();
                        if measure {
                            match encoder.decode_lossy(&bytes, tile.layout)? {
                                Some(decoded) => mse.add_pair(&tile.data, &decoded),
                                // Lossless codecs round-trip exactly
                                None => mse.add_pair(&tile.data, &tile.data),
                            }
                        }
                        Ok((bytes, mse))
                    })
                    .collect::<Result<Vec<_>, CodecError>>()
            };
            let encoded = match &self.pool {
                Some(pool) => pool.install(encode_row),
                None => encode_row(),
            }?;

            for (bytes, mse) in encoded {
                let offset = writer.append_payload(&bytes)?;
                offsets.push(offset);
                counts.push(bytes.len() as u64);
                self.payload_bytes += bytes.len() as u64;
                self.mse.merge(mse);
            }
        }
        Ok(LevelOutput { offsets, counts })
    }

    /// Build the IFD for one encoded level.
    fn level_ifd(
        &self,
        level: &PyramidLevel,
        layout: PixelLayout,
        out: &LevelOutput,
        subfile_type: u32,
    ) -> IfdBuilder {
        let spp = layout.samples_per_pixel();
        let codec = self.options.compression;

        let mut ifd = IfdBuilder::new();
        ifd.set(TiffTag::NewSubfileType, TagValue::long(subfile_type));
        ifd.set(TiffTag::ImageWidth, TagValue::long(level.width));
        ifd.set(TiffTag::ImageLength, TagValue::long(level.height));
        ifd.set(
            TiffTag::BitsPerSample,
            TagValue::Shorts(vec![8; spp as usize]),
        );
        ifd.set(
            TiffTag::Compression,
            TagValue::short(codec.compression_tag().as_u16()),
        );
        ifd.set(
            TiffTag::PhotometricInterpretation,
            TagValue::short(layout.photometric(codec)),
        );
        ifd.set(TiffTag::SamplesPerPixel, TagValue::short(spp));
        ifd.set(TiffTag::PlanarConfiguration, TagValue::short(1));
        ifd.set(
            TiffTag::TileWidth,
            TagValue::short(self.options.tile_size as u16),
        );
        ifd.set(
            TiffTag::TileLength,
            TagValue::short(self.options.tile_size as u16),
        );
        ifd.set(TiffTag::TileOffsets, self.offsets_value(&out.offsets));
        ifd.set(
            TiffTag::TileByteCounts,
            TagValue::Longs(out.counts.iter().map(|&c| c as u32).collect()),
        );
        ifd.set(
            TiffTag::SampleFormat,
            TagValue::Shorts(vec![SAMPLE_FORMAT_UINT; spp as usize]),
        );
        if self.encoder.uses_predictor() {
            ifd.set(TiffTag::Predictor, TagValue::short(PREDICTOR_HORIZONTAL));
        }
        if layout.has_alpha() {
            ifd.set(
                TiffTag::ExtraSamples,
                TagValue::Shorts(vec![EXTRA_SAMPLE_UNASSOCIATED_ALPHA]),
            );
        }
        ifd
    }

    fn offsets_value(&self, offsets: &[u64]) -> TagValue {
        if self.bigtiff {
            TagValue::Long8s(offsets.to_vec())
        } else {
            TagValue::Longs(offsets.iter().map(|&o| o as u32).collect())
        }
    }

    // -------------------------------------------------------------------------
    // Aperio output
    // -------------------------------------------------------------------------

    /// Encode an SVS-shaped container: full level, thumbnail, reduced
    /// levels, then a label associated image.
    fn build_aperio_output<W: Write + Seek>(
        &mut self,
        writer: &mut TiffFileWriter<W>,
        src: &mut dyn SourceImage,
        frames: &[usize],
    ) -> Result<Vec<IfdBuilder>, ConvertError> {
        if frames.len() > 1 {
            warn!(
                frames = frames.len(),
                "aperio output keeps only the first selected frame"
            );
        }
        let frame = src.read_frame(frames[0])?;
        let (base, layout) = normalize_frame(frame, self.options.compression);
        // SVS has no alpha convention; flatten to RGB
        let (mut image, layout) = if layout.has_alpha() {
            (DynamicImage::ImageRgb8(base.to_rgb8()), PixelLayout::Rgb)
        } else {
            (base, layout)
        };

        let (full_w, full_h) = (image.width(), image.height());
        let levels = plan_levels(full_w, full_h, self.options.tile_size);
        self.levels_per_frame = levels.len();
        let thumbnail = aperio::make_thumbnail(&image);
        let label = aperio::make_label(&image);

        let mut tiled = Vec::with_capacity(levels.len());
        for level in &levels {
            if level.level > 0 {
                image = downsample(&image);
            }
            let out = self.encode_level(writer, &image, layout, level, false)?;
            let mut ifd = self.level_ifd(level, layout, &out, SUBFILE_FULL_RESOLUTION);
            let description = if level.level == 0 {
                aperio::base_description(
                    full_w,
                    full_h,
                    self.options.tile_size,
                    self.options.compression.name(),
                    self.options.quality,
                )
            } else {
                aperio::level_description(full_w, full_h, level.width, level.height)
            };
            ifd.set(TiffTag::ImageDescription, TagValue::ascii(description));
            tiled.push(ifd);
        }

        let thumb_desc = aperio::thumbnail_description(
            full_w,
            full_h,
            thumbnail.width(),
            thumbnail.height(),
        );
        let thumb_ifd =
            self.stripped_ifd(writer, &thumbnail, thumb_desc, SUBFILE_FULL_RESOLUTION)?;

        let label_desc = aperio::label_description(label.width(), label.height());
        let label_ifd = self.stripped_ifd(writer, &label, label_desc, SUBFILE_REDUCED_IMAGE)?;

        // Chain: full level, thumbnail, reduced levels, label
        let mut top = Vec::with_capacity(tiled.len() + 2);
        let mut tiled = tiled.into_iter();
        top.push(tiled.next().expect("at least one level"));
        top.push(thumb_ifd);
        top.extend(tiled);
        top.push(label_ifd);
        Ok(top)
    }

    /// Write a striped RGB associated image as a single LZW strip.
    fn stripped_ifd<W: Write + Seek>(
        &mut self,
        writer: &mut TiffFileWriter<W>,
        image: &DynamicImage,
        description: String,
        subfile_type: u32,
    ) -> Result<IfdBuilder, ConvertError> {
        let rgb = image.to_rgb8();
        let (width, height) = (rgb.width(), rgb.height());
        let strip = aperio::encode_strip(&rgb.into_raw())?;
        let offset = writer.append_payload(&strip)?;
        self.payload_bytes += strip.len() as u64;

        let mut ifd = IfdBuilder::new();
        ifd.set(TiffTag::NewSubfileType, TagValue::long(subfile_type));
        ifd.set(TiffTag::ImageWidth, TagValue::long(width));
        ifd.set(TiffTag::ImageLength, TagValue::long(height));
        ifd.set(TiffTag::BitsPerSample, TagValue::Shorts(vec![8, 8, 8]));
        ifd.set(
            TiffTag::Compression,
            TagValue::short(Codec::Lzw.compression_tag().as_u16()),
        );
        ifd.set(TiffTag::PhotometricInterpretation, TagValue::short(2));
        ifd.set(TiffTag::ImageDescription, TagValue::ascii(description));
        ifd.set(TiffTag::SamplesPerPixel, TagValue::short(3));
        ifd.set(TiffTag::RowsPerStrip, TagValue::long(height));
        ifd.set(TiffTag::StripOffsets, self.offsets_value(&[offset]));
        ifd.set(
            TiffTag::StripByteCounts,
            TagValue::Longs(vec![strip.len() as u32]),
        );
        ifd.set(TiffTag::PlanarConfiguration, TagValue::short(1));
        ifd.set(TiffTag::SampleFormat, TagValue::Shorts(vec![1, 1, 1]));
        Ok(ifd)
    }
}

// =============================================================================
// Path derivation and sizing
// =============================================================================

/// Derive the default output path next to the source.
///
/// The source's final extension (and a trailing `.geo` marker) is stripped,
/// then `.tiff` or `.geo.tiff` is appended. A collision with the source path
/// itself inserts a numeric counter.
fn derive_output_path(source: &Path, geospatial: bool) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "converted".to_string());
    let stem = stem.strip_suffix(".geo").unwrap_or(&stem).to_string();
    let suffix = if geospatial { "geo.tiff" } else { "tiff" };
    let parent = source.parent().unwrap_or_else(|| Path::new("."));

    let candidate = parent.join(format!("{stem}.{suffix}"));
    if candidate != source {
        return candidate;
    }
    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{stem}.{counter}.{suffix}"));
        if candidate != source {
            return candidate;
        }
        counter += 1;
    }
}

/// Decide classic TIFF vs BigTIFF from the uncompressed payload estimate.
///
/// Worst case 4 samples/pixel plus a third for the pyramid; crossing 4 GiB
/// means classic offsets could overflow.
fn should_use_bigtiff(width: u32, height: u32, frames: usize) -> bool {
    let per_frame = width as u64 * height as u64 * 4;
    let estimate = per_frame.saturating_mul(frames as u64);
    let with_pyramid = estimate.saturating_add(estimate / 3);
    with_pyramid > u32::MAX as u64
}

// =============================================================================
// Tests
// =============================================================================
