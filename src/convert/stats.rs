//! Conversion statistics.
//!
//! With statistics enabled, the converter embeds a JSON document in the
//! first IFD's ImageDescription tag under the `large_image_converter` key
//! (the key names are an on-disk compatibility contract with existing
//! readers). Full statistics additionally measure PSNR by decoding every
//! lossy base-level tile right after encoding it and accumulating squared
//! error against the raw samples.
//!
//! Typical PSNR values for 8-bit content:
//! - Excellent: > 40 dB
//! - Good: 30-40 dB
//! - Acceptable: 20-30 dB

use std::time::Duration;

use serde::Serialize;
use serde_json::json;

/// Peak sample value for 8-bit output.
const MAX_SAMPLE: f64 = 255.0;

// =============================================================================
// MSE accumulation
// =============================================================================

/// Accumulates squared error across tiles; mergeable so tiles can be
/// measured on worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct MseAccumulator {
    sum: f64,
    count: u64,
}

impl MseAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the per-sample squared error between two equally sized buffers.
    pub fn add_pair(&mut self, original: &[u8], decoded: &[u8]) {
        debug_assert_eq!(original.len(), decoded.len());
        for (&a, &b) in original.iter().zip(decoded) {
            let d = a as f64 - b as f64;
            self.sum += d * d;
        }
        self.count += original.len().min(decoded.len()) as u64;
    }

    /// Fold another accumulator in.
    pub fn merge(&mut self, other: MseAccumulator) {
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Mean squared error, `None` when nothing was accumulated.
    pub fn mse(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    /// PSNR in dB; infinite for an exact round trip.
    pub fn psnr(&self) -> Option<f64> {
        self.mse().map(|mse| {
            if mse <= 0.0 {
                f64::INFINITY
            } else {
                10.0 * (MAX_SAMPLE * MAX_SAMPLE / mse).log10()
            }
        })
    }
}

// =============================================================================
// ConversionReport
// =============================================================================

/// Everything the statistics JSON reports about one conversion.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// Wall-clock conversion time up to container finalization
    pub elapsed: Duration,

    /// Source file size in bytes
    pub input_size: u64,

    /// Total compressed tile payload bytes written
    pub compressed_size: u64,

    /// Pixels per frame (width x height)
    pub pixels: u64,

    /// Frames written
    pub frames: usize,

    /// Pyramid levels per frame
    pub levels: usize,

    /// Output tile edge length
    pub tile_size: u32,

    /// Codec name
    pub compression: &'static str,

    /// Measured PSNR (full statistics only); infinite means lossless
    pub psnr: Option<f64>,
}

impl ConversionReport {
    /// Render the ImageDescription JSON.
    ///
    /// `full` adds the `psnr` key. serde_json has no representation for
    /// infinity, so a lossless measurement serializes as `null` - the key
    /// stays present, which is what downstream readers key on.
    pub fn to_description(&self, full: bool) -> String {
        #[derive(Serialize)]
        struct StatsBody<'a> {
            time_sec: f64,
            input_size: u64,
            compressed_size: u64,
            pixels: u64,
            frames: usize,
            levels: usize,
            tile_size: u32,
            compression: &'a str,
        }

        let body = StatsBody {
            time_sec: self.elapsed.as_secs_f64(),
            input_size: self.input_size,
            compressed_size: self.compressed_size,
            pixels: self.pixels,
            frames: self.frames,
            levels: self.levels,
            tile_size: self.tile_size,
            compression: self.compression,
        };
        let mut stats = serde_json::to_value(body).unwrap_or_else(|_| json!({}));
        if full {
            // From<f64> maps non-finite values to JSON null
            stats["psnr"] = self.psnr.unwrap_or(f64::INFINITY).into();
        }
        json!({
            "large_image_converter": {
                "version": env!("CARGO_PKG_VERSION"),
                "conversion_stats": stats,
            }
        })
        .to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
