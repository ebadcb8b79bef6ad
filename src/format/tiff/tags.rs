//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary shared by the container reader and
//! writer:
//! - Field types that determine how values are encoded
//! - Tag IDs for the image-structure, tile, pyramid, and georeferencing
//!   metadata the converter produces or carries over
//! - Compression scheme identifiers for every codec the tile encoder emits
//!
//! The definitions support both classic TIFF and BigTIFF.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Each field type has a fixed size in bytes, which decides whether a value
/// fits inline in an IFD entry or must be stored out-of-line at an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer (1 byte)
    Byte = 1,

    /// 8-bit ASCII character, NUL-terminated as an array (1 byte)
    Ascii = 2,

    /// Unsigned 16-bit integer (2 bytes)
    Short = 3,

    /// Unsigned 32-bit integer (4 bytes)
    Long = 4,

    /// Unsigned rational: numerator/denominator pair of u32 (8 bytes)
    Rational = 5,

    /// Undefined byte data (1 byte per element)
    Undefined = 7,

    /// Signed 32-bit integer (4 bytes)
    SLong = 9,

    /// IEEE 32-bit float (4 bytes)
    Float = 11,

    /// IEEE 64-bit float (8 bytes)
    Double = 12,

    /// Unsigned 64-bit integer (8 bytes) - BigTIFF only
    Long8 = 16,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float => 4,
            FieldType::Rational | FieldType::Double | FieldType::Long8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unsupported or unknown type values; unknown types
    /// in foreign files are skipped, not an error.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            9 => Some(FieldType::SLong),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }

    /// Get the numeric type ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if a value with this type and count fits inline in an IFD entry.
    ///
    /// Classic TIFF entries hold 4 inline bytes, BigTIFF entries hold 8.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let total = self.size_in_bytes() as u64 * count;
        let threshold = if is_bigtiff { 8 } else { 4 };
        total <= threshold
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs used by the converter.
///
/// Tags are 16-bit identifiers describing the metadata stored in an IFD
/// entry. The set below covers:
/// - Basic image structure (dimensions, samples, organization)
/// - Tile layout (offsets, byte counts, sizes)
/// - Strip layout (for associated images in SVS output)
/// - Pyramid structure (NewSubfileType, SubIFDs)
/// - Georeferencing carry-over (GeoTIFF and GDAL tags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    /// Kind of image: 0 = full resolution, 1 = reduced resolution
    NewSubfileType = 254,

    /// Image width in pixels
    ImageWidth = 256,

    /// Image height (length) in pixels
    ImageLength = 257,

    /// Bits per sample (always 8 in converter output)
    BitsPerSample = 258,

    /// Compression scheme used
    Compression = 259,

    /// Photometric interpretation (MinIsBlack, RGB, YCbCr)
    PhotometricInterpretation = 262,

    /// Description string; carries conversion metadata or the Aperio header
    ImageDescription = 270,

    /// Number of components per pixel (1, 3, or 4)
    SamplesPerPixel = 277,

    /// How components are organized (1 = chunky)
    PlanarConfiguration = 284,

    /// Software that produced the file
    Software = 305,

    /// Horizontal differencing predictor (2) for LZW/deflate/zstd
    Predictor = 317,

    /// Meaning of extra channels (2 = unassociated alpha)
    ExtraSamples = 338,

    /// Numeric interpretation of samples (1 = unsigned integer)
    SampleFormat = 339,

    // -------------------------------------------------------------------------
    // Strip Organization (associated images only)
    // -------------------------------------------------------------------------
    /// Byte offsets of strips
    StripOffsets = 273,

    /// Row count per strip
    RowsPerStrip = 278,

    /// Byte counts of strips
    StripByteCounts = 279,

    // -------------------------------------------------------------------------
    // Tile Organization
    // -------------------------------------------------------------------------
    /// Width of each tile in pixels
    TileWidth = 322,

    /// Height (length) of each tile in pixels
    TileLength = 323,

    /// Byte offsets of each tile in the file
    TileOffsets = 324,

    /// Byte counts of each tile
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // Pyramid Structure
    // -------------------------------------------------------------------------
    /// Offsets of nested reduced-resolution IFDs
    SubIfds = 330,

    // -------------------------------------------------------------------------
    // Georeferencing (carried over from geospatial sources)
    // -------------------------------------------------------------------------
    /// Pixel size in model space: [scaleX, scaleY, scaleZ]
    ModelPixelScale = 33550,

    /// Raster-to-model tie points: [i, j, k, x, y, z] tuples
    ModelTiepoint = 33922,

    /// Full raster-to-model affine transformation (16 doubles)
    ModelTransformation = 34264,

    /// GeoKey directory (coordinate reference system keys)
    GeoKeyDirectory = 34735,

    /// Double-valued GeoKey parameters
    GeoDoubleParams = 34736,

    /// ASCII GeoKey parameters
    GeoAsciiParams = 34737,

    /// GDAL per-band nodata value (ASCII)
    GdalNodata = 42113,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    ///
    /// Returns `None` for unrecognized tags; unknown tags in source files are
    /// ignored.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            254 => Some(TiffTag::NewSubfileType),
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            258 => Some(TiffTag::BitsPerSample),
            259 => Some(TiffTag::Compression),
            262 => Some(TiffTag::PhotometricInterpretation),
            270 => Some(TiffTag::ImageDescription),
            273 => Some(TiffTag::StripOffsets),
            277 => Some(TiffTag::SamplesPerPixel),
            278 => Some(TiffTag::RowsPerStrip),
            279 => Some(TiffTag::StripByteCounts),
            284 => Some(TiffTag::PlanarConfiguration),
            305 => Some(TiffTag::Software),
            317 => Some(TiffTag::Predictor),
            322 => Some(TiffTag::TileWidth),
            323 => Some(TiffTag::TileLength),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            330 => Some(TiffTag::SubIfds),
            338 => Some(TiffTag::ExtraSamples),
            339 => Some(TiffTag::SampleFormat),
            33550 => Some(TiffTag::ModelPixelScale),
            33922 => Some(TiffTag::ModelTiepoint),
            34264 => Some(TiffTag::ModelTransformation),
            34735 => Some(TiffTag::GeoKeyDirectory),
            34736 => Some(TiffTag::GeoDoubleParams),
            34737 => Some(TiffTag::GeoAsciiParams),
            42113 => Some(TiffTag::GdalNodata),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if this is one of the georeferencing tags.
    pub const fn is_geo(self) -> bool {
        matches!(
            self,
            TiffTag::ModelPixelScale
                | TiffTag::ModelTiepoint
                | TiffTag::ModelTransformation
                | TiffTag::GeoKeyDirectory
                | TiffTag::GeoDoubleParams
                | TiffTag::GeoAsciiParams
                | TiffTag::GdalNodata
        )
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers for every codec the converter writes.
///
/// The numeric values are the standard libtiff assignments; 33005 is the
/// Aperio RGB JPEG 2000 value used by SVS-producing scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    /// No compression
    None = 1,

    /// LZW compression (default output codec)
    Lzw = 5,

    /// JPEG compression (complete per-tile streams)
    Jpeg = 7,

    /// Adobe Deflate/zlib compression
    AdobeDeflate = 8,

    /// PackBits run-length encoding
    PackBits = 32773,

    /// JPEG 2000 (Aperio RGB variant)
    Jp2kRgb = 33005,

    /// Zstandard compression
    Zstd = 50000,

    /// WebP compression
    WebP = 50001,
}

impl Compression {
    /// Create a Compression from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::AdobeDeflate),
            32773 => Some(Compression::PackBits),
            33005 => Some(Compression::Jp2kRgb),
            50000 => Some(Compression::Zstd),
            50001 => Some(Compression::WebP),
            _ => None,
        }
    }

    /// Get the numeric compression value.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get a human-readable name for the compression scheme.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Lzw => "LZW",
            Compression::Jpeg => "JPEG",
            Compression::AdobeDeflate => "Adobe Deflate",
            Compression::PackBits => "PackBits",
            Compression::Jp2kRgb => "JPEG 2000",
            Compression::Zstd => "Zstandard",
            Compression::WebP => "WebP",
        }
    }
}

// =============================================================================
// Photometric Interpretation Values
// =============================================================================

/// Photometric interpretation values written by the converter.
pub const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
pub const PHOTOMETRIC_RGB: u16 = 2;
pub const PHOTOMETRIC_YCBCR: u16 = 6;

/// NewSubfileType values.
pub const SUBFILE_FULL_RESOLUTION: u32 = 0;
pub const SUBFILE_REDUCED_IMAGE: u32 = 1;

/// SampleFormat value for unsigned integer data.
pub const SAMPLE_FORMAT_UINT: u16 = 1;

/// Predictor values.
pub const PREDICTOR_NONE: u16 = 1;
pub const PREDICTOR_HORIZONTAL: u16 = 2;

/// ExtraSamples value for unassociated alpha.
pub const EXTRA_SAMPLE_UNASSOCIATED_ALPHA: u16 = 2;

// =============================================================================
// Tests
// =============================================================================
