//! TIFF-family source backed by the tiff crate.
//!
//! Handles striped and tiled organization, LZW/deflate/packbits source
//! compression, 8/16-bit integer and floating-point samples, and multi-frame
//! files (OME-TIFF planes stored as successive IFDs).
//!
//! Frame enumeration: an IFD is a frame when its dimensions match the first
//! IFD; smaller IFDs are reduced-resolution levels of an existing pyramid and
//! are skipped, since the converter rebuilds its own pyramid from full
//! resolution.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;
use tracing::debug;

use crate::error::SourceError;

use super::SourceImage;

/// Multi-frame TIFF source.
pub struct TiffSource {
    path: PathBuf,
    dimensions: (u32, u32),
    /// IFD chain indices of full-resolution frames
    frame_ifds: Vec<usize>,
}

impl TiffSource {
    /// Open a TIFF file and enumerate its frames.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let mut decoder = make_decoder(&path)?;

        let dimensions = decoder.dimensions().map_err(decode_err)?;
        let mut frame_ifds = vec![0];
        let mut index = 0;
        while decoder.more_images() {
            if decoder.next_image().is_err() {
                // Trailing corrupt IFDs do not invalidate the readable frames
                break;
            }
            index += 1;
            match decoder.dimensions() {
                Ok(dims) if dims == dimensions => frame_ifds.push(index),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        debug!(
            path = %path.display(),
            width = dimensions.0,
            height = dimensions.1,
            frames = frame_ifds.len(),
            "opened TIFF source"
        );
        Ok(TiffSource {
            path,
            dimensions,
            frame_ifds,
        })
    }
}

impl SourceImage for TiffSource {
    fn frame_count(&self) -> usize {
        self.frame_ifds.len()
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn read_frame(&mut self, index: usize) -> Result<DynamicImage, SourceError> {
        let ifd_index = *self
            .frame_ifds
            .get(index)
            .ok_or(SourceError::FrameOutOfRange {
                frame: index,
                count: self.frame_ifds.len(),
            })?;

        let mut decoder = make_decoder(&self.path)?;
        for _ in 0..ifd_index {
            decoder.next_image().map_err(decode_err)?;
        }

        let (width, height) = decoder.dimensions().map_err(decode_err)?;
        let channels = channel_count(decoder.colortype().map_err(decode_err)?)?;
        let result = decoder.read_image().map_err(decode_err)?;
        let samples = to_u8_samples(result)?;
        build_image(width, height, channels, samples)
    }
}

fn make_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, SourceError> {
    let file = File::open(path)?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(decode_err)?;
    Ok(decoder.with_limits(Limits::unlimited()))
}

fn decode_err(err: tiff::TiffError) -> SourceError {
    SourceError::Decode {
        message: err.to_string(),
    }
}

fn channel_count(colortype: ColorType) -> Result<u32, SourceError> {
    match colortype {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) => Ok(4),
        other => Err(SourceError::UnsupportedFormat {
            reason: format!("unsupported TIFF color type: {other:?}"),
        }),
    }
}

/// Normalize decoded samples to 8-bit unsigned.
///
/// Integer samples scale by bit depth; floating-point samples are range
/// scaled over the observed min/max (a constant plane maps to zero).
fn to_u8_samples(result: DecodingResult) -> Result<Vec<u8>, SourceError> {
    Ok(match result {
        DecodingResult::U8(v) => v,
        DecodingResult::U16(v) => v.iter().map(|&x| (x / 257) as u8).collect(),
        DecodingResult::U32(v) => v.iter().map(|&x| (x >> 24) as u8).collect(),
        DecodingResult::U64(v) => v.iter().map(|&x| (x >> 56) as u8).collect(),
        DecodingResult::I8(v) => v.iter().map(|&x| (x as i16 + 128) as u8).collect(),
        DecodingResult::I16(v) => v
            .iter()
            .map(|&x| ((x as i32 + 32768) / 257) as u8)
            .collect(),
        DecodingResult::F32(v) => scale_floats(v.iter().map(|&x| x as f64)),
        DecodingResult::F64(v) => scale_floats(v.iter().copied()),
        _ => {
            return Err(SourceError::UnsupportedFormat {
                reason: "unsupported TIFF sample format".to_string(),
            })
        }
    })
}

fn scale_floats(values: impl Iterator<Item = f64> + Clone) -> Vec<u8> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.clone() {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return values.map(|_| 0).collect();
    }
    values
        .map(|v| {
            if v.is_finite() {
                (((v - min) / range) * 255.0).round().clamp(0.0, 255.0) as u8
            } else {
                0
            }
        })
        .collect()
}

fn build_image(
    width: u32,
    height: u32,
    channels: u32,
    samples: Vec<u8>,
) -> Result<DynamicImage, SourceError> {
    let expected = width as usize * height as usize * channels as usize;
    if samples.len() != expected {
        return Err(SourceError::Decode {
            message: format!(
                "sample count mismatch: expected {expected}, got {}",
                samples.len()
            ),
        });
    }
    let image = match channels {
        1 => image::GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        2 => image::GrayAlphaImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageLumaA8),
        3 => image::RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        4 => image::RgbaImage::from_raw(width, height, samples).map(DynamicImage::ImageRgba8),
        _ => None,
    };
    image.ok_or_else(|| SourceError::Decode {
        message: "failed to assemble frame buffer".to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
