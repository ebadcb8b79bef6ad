use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening or decoding a source image
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Source file does not exist
    #[error("Source file not found: {0}")]
    NotFound(PathBuf),

    /// File exists but no decode backend recognizes it
    #[error("Unsupported source format: {reason}")]
    UnsupportedFormat { reason: String },

    /// A decode backend recognized the file but failed to decode it
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Frame index beyond the number of frames in the source
    #[error("Frame {frame} out of range: source has {count} frame(s)")]
    FrameOutOfRange { frame: usize, count: usize },

    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err.to_string())
    }
}

/// Errors that can occur when parsing or writing TIFF container structure
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Classic TIFF cannot address data past 4 GiB
    #[error("Offset {0} exceeds the classic TIFF 4 GiB limit; output requires BigTIFF")]
    OffsetOverflow(u64),

    /// I/O error while reading or writing the file
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TiffError {
    fn from(err: std::io::Error) -> Self {
        TiffError::Io(err.to_string())
    }
}

/// Errors raised by per-tile compression codecs
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Encoding a tile failed
    #[error("{codec} encode error: {message}")]
    Encode {
        codec: &'static str,
        message: String,
    },

    /// Decoding an encoded tile failed (used by statistics verification)
    #[error("{codec} decode error: {message}")]
    Decode {
        codec: &'static str,
        message: String,
    },

    /// Compression name not recognized by the option parser
    #[error("Unknown compression: {0}")]
    UnknownCompression(String),
}

/// Top-level conversion errors
#[derive(Debug, Clone, Error)]
pub enum ConvertError {
    /// Output file already exists and overwrite was not requested
    #[error("Output file already exists (pass overwrite to replace it): {0}")]
    OutputExists(PathBuf),

    /// Rejected option combination or value
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Error from the source decode layer
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Error from the TIFF container layer
    #[error(transparent)]
    Tiff(#[from] TiffError),

    /// Error from a tile codec
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// I/O error outside the container layer (temp files, renames)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Io(err.to_string())
    }
}
