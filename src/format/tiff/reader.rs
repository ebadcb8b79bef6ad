//! TIFF container structure reader.
//!
//! A minimal, codec-free parser for TIFF and BigTIFF structure: header, IFD
//! chains, and tag values. It never decodes pixel data; the converter uses it
//! to classify files (geospatial detection, frame counting) and to lift raw
//! georeferencing tag values out of source files. The integration tests also
//! use it to assert on the converter's own output.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::TiffError;

use super::tags::{FieldType, TiffTag};
use super::value::TagValue;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

/// Upper bound on IFDs walked in one file; breaks offset cycles in corrupt files.
const MAX_IFDS: usize = 4096;

/// Upper bound on a single tag value read into memory.
const MAX_VALUE_BYTES: u64 = 64 * 1024 * 1024;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from the stream using this byte order.
    #[inline]
    pub fn read_u16<R: Read>(self, r: &mut R) -> Result<u16, TiffError> {
        Ok(match self {
            ByteOrder::LittleEndian => r.read_u16::<LittleEndian>()?,
            ByteOrder::BigEndian => r.read_u16::<BigEndian>()?,
        })
    }

    /// Read a u32 from the stream using this byte order.
    #[inline]
    pub fn read_u32<R: Read>(self, r: &mut R) -> Result<u32, TiffError> {
        Ok(match self {
            ByteOrder::LittleEndian => r.read_u32::<LittleEndian>()?,
            ByteOrder::BigEndian => r.read_u32::<BigEndian>()?,
        })
    }

    /// Read a u64 from the stream using this byte order.
    #[inline]
    pub fn read_u64<R: Read>(self, r: &mut R) -> Result<u64, TiffError> {
        Ok(match self {
            ByteOrder::LittleEndian => r.read_u64::<LittleEndian>()?,
            ByteOrder::BigEndian => r.read_u64::<BigEndian>()?,
        })
    }

    /// Decode a u16 from a byte slice.
    #[inline]
    pub fn u16_from(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes([bytes[0], bytes[1]]),
            ByteOrder::BigEndian => u16::from_be_bytes([bytes[0], bytes[1]]),
        }
    }

    /// Decode a u32 from a byte slice.
    #[inline]
    pub fn u32_from(self, bytes: &[u8]) -> u32 {
        let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(b),
            ByteOrder::BigEndian => u32::from_be_bytes(b),
        }
    }

    /// Decode a u64 from a byte slice.
    #[inline]
    pub fn u64_from(self, bytes: &[u8]) -> u64 {
        let b = [
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ];
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(b),
            ByteOrder::BigEndian => u64::from_be_bytes(b),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// # Errors
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 or 43
    /// - `InvalidBigTiffOffsetSize` if BigTIFF offset size is not 8
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Byte order bytes compare equal under either endianness
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.u16_from(&bytes[2..4]);
        match version {
            VERSION_TIFF => {
                let first_ifd_offset = byte_order.u32_from(&bytes[4..8]) as u64;
                if first_ifd_offset >= file_size {
                    return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
                }
                Ok(TiffHeader {
                    byte_order,
                    is_bigtiff: false,
                    first_ifd_offset,
                })
            }
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.u16_from(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                let first_ifd_offset = byte_order.u64_from(&bytes[8..16]);
                if first_ifd_offset >= file_size {
                    return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
                }
                Ok(TiffHeader {
                    byte_order,
                    is_bigtiff: true,
                    first_ifd_offset,
                })
            }
            _ => Err(TiffError::InvalidVersion(version)),
        }
    }

    /// Size of an IFD entry in bytes (12 classic, 20 BigTIFF).
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the next-IFD offset field at the end of an IFD.
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Size of the value/offset field in an IFD entry.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IFD Entries
// =============================================================================

/// A single parsed IFD entry.
#[derive(Debug, Clone)]
pub struct IfdEntry {
    /// Numeric tag ID
    pub tag: u16,

    /// Decoded field type, `None` for types this reader does not model
    pub field_type: Option<FieldType>,

    /// Raw field type value as stored in the file
    pub field_type_raw: u16,

    /// Number of values
    pub count: u64,

    /// Raw value/offset field bytes (4 or 8 of them are meaningful)
    inline: [u8; 8],

    /// Whether the value is stored inline in the entry
    pub is_inline: bool,

    /// Offset of the value when stored out-of-line
    pub value_offset: u64,
}

impl IfdEntry {
    /// Total serialized size of the value in bytes.
    pub fn value_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| ft.size_in_bytes() as u64 * self.count)
    }
}

/// A parsed Image File Directory.
#[derive(Debug, Clone)]
pub struct Ifd {
    /// File offset this IFD was read from
    pub offset: u64,

    /// Entries in file order (ascending tag per the TIFF spec, not enforced)
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD in the chain, 0 for the last
    pub next_offset: u64,
}

impl Ifd {
    /// Look up an entry by tag.
    pub fn entry(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entry_raw(tag.as_u16())
    }

    /// Look up an entry by numeric tag ID.
    pub fn entry_raw(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    /// Check whether a tag is present.
    pub fn has_tag(&self, tag: TiffTag) -> bool {
        self.entry(tag).is_some()
    }

    /// Whether this IFD uses tile organization.
    pub fn is_tiled(&self) -> bool {
        self.has_tag(TiffTag::TileWidth) && self.has_tag(TiffTag::TileOffsets)
    }
}

// =============================================================================
// TiffReader
// =============================================================================

/// Structure reader over any seekable byte source.
pub struct TiffReader<R: Read + Seek> {
    inner: R,
    /// Parsed file header
    pub header: TiffHeader,
    file_size: u64,
}

impl<R: Read + Seek> TiffReader<R> {
    /// Open a TIFF structure reader, parsing and validating the header.
    pub fn open(mut inner: R) -> Result<Self, TiffError> {
        let file_size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        let mut header_bytes = [0u8; BIGTIFF_HEADER_SIZE];
        let want = (file_size as usize).min(BIGTIFF_HEADER_SIZE);
        if want < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: file_size,
            });
        }
        inner.read_exact(&mut header_bytes[..want])?;
        let header = TiffHeader::parse(&header_bytes[..want], file_size)?;

        Ok(TiffReader {
            inner,
            header,
            file_size,
        })
    }

    /// Total size of the underlying source in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Read and parse the IFD at the given offset.
    pub fn read_ifd(&mut self, offset: u64) -> Result<Ifd, TiffError> {
        if offset == 0 || offset >= self.file_size {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        self.inner.seek(SeekFrom::Start(offset))?;

        let order = self.header.byte_order;
        let entry_count = if self.header.is_bigtiff {
            order.read_u64(&mut self.inner)?
        } else {
            order.read_u16(&mut self.inner)? as u64
        };
        if entry_count > 65535 {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let entry_size = self.header.ifd_entry_size();
        let mut raw = vec![0u8; entry_count as usize * entry_size];
        self.inner.read_exact(&mut raw)?;

        let mut entries = Vec::with_capacity(entry_count as usize);
        for chunk in raw.chunks_exact(entry_size) {
            entries.push(self.parse_entry(chunk));
        }

        let next_offset = if self.header.is_bigtiff {
            order.read_u64(&mut self.inner)?
        } else {
            order.read_u32(&mut self.inner)? as u64
        };

        Ok(Ifd {
            offset,
            entries,
            next_offset,
        })
    }

    /// Walk the top-level IFD chain from the header.
    ///
    /// Stops at the first invalid offset rather than failing, so a partially
    /// corrupt file still yields its leading IFDs.
    pub fn ifds(&mut self) -> Result<Vec<Ifd>, TiffError> {
        let mut result = Vec::new();
        let mut offset = self.header.first_ifd_offset;
        while offset != 0 && result.len() < MAX_IFDS {
            // Cycle guard: offsets must not revisit an already-parsed IFD
            if result.iter().any(|ifd: &Ifd| ifd.offset == offset) {
                break;
            }
            match self.read_ifd(offset) {
                Ok(ifd) => {
                    offset = ifd.next_offset;
                    result.push(ifd);
                }
                Err(_) if !result.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    /// Decode the typed value of an entry.
    pub fn value(&mut self, entry: &IfdEntry) -> Result<TagValue, TiffError> {
        let ft = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        let total = ft.size_in_bytes() as u64 * entry.count;
        if total > MAX_VALUE_BYTES {
            return Err(TiffError::InvalidTagValue {
                tag: "value",
                message: format!("value too large: {total} bytes"),
            });
        }

        let bytes = if entry.is_inline {
            entry.inline[..total as usize].to_vec()
        } else {
            if entry.value_offset.saturating_add(total) > self.file_size {
                return Err(TiffError::InvalidTagValue {
                    tag: "value",
                    message: format!("value at {} runs past end of file", entry.value_offset),
                });
            }
            self.inner.seek(SeekFrom::Start(entry.value_offset))?;
            let mut buf = vec![0u8; total as usize];
            self.inner.read_exact(&mut buf)?;
            buf
        };

        Ok(decode_value(ft, &bytes, self.header.byte_order))
    }

    /// Convenience: decode the value of `tag` in `ifd`, if present.
    pub fn tag_value(&mut self, ifd: &Ifd, tag: TiffTag) -> Result<Option<TagValue>, TiffError> {
        match ifd.entry(tag) {
            Some(entry) => {
                let entry = entry.clone();
                self.value(&entry).map(Some)
            }
            None => Ok(None),
        }
    }

    fn parse_entry(&self, chunk: &[u8]) -> IfdEntry {
        let order = self.header.byte_order;
        let tag = order.u16_from(&chunk[0..2]);
        let field_type_raw = order.u16_from(&chunk[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_bytes) = if self.header.is_bigtiff {
            (order.u64_from(&chunk[4..12]), &chunk[12..20])
        } else {
            (order.u32_from(&chunk[4..8]) as u64, &chunk[8..12])
        };

        let mut inline = [0u8; 8];
        inline[..value_bytes.len()].copy_from_slice(value_bytes);

        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, self.header.is_bigtiff))
            .unwrap_or(false);
        let value_offset = if self.header.is_bigtiff {
            order.u64_from(value_bytes)
        } else {
            order.u32_from(value_bytes) as u64
        };

        IfdEntry {
            tag,
            field_type,
            field_type_raw,
            count,
            inline,
            is_inline,
            value_offset,
        }
    }
}

/// Decode raw value bytes into a [`TagValue`] per field type and byte order.
fn decode_value(ft: FieldType, bytes: &[u8], order: ByteOrder) -> TagValue {
    match ft {
        FieldType::Byte => TagValue::Bytes(bytes.to_vec()),
        FieldType::Undefined => TagValue::Undefined(bytes.to_vec()),
        FieldType::Ascii => {
            let end = bytes
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(bytes.len());
            TagValue::Ascii(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        FieldType::Short => TagValue::Shorts(
            bytes
                .chunks_exact(2)
                .map(|c| order.u16_from(c))
                .collect(),
        ),
        FieldType::Long => TagValue::Longs(
            bytes
                .chunks_exact(4)
                .map(|c| order.u32_from(c))
                .collect(),
        ),
        FieldType::Rational => TagValue::Rationals(
            bytes
                .chunks_exact(8)
                .map(|c| (order.u32_from(&c[0..4]), order.u32_from(&c[4..8])))
                .collect(),
        ),
        FieldType::SLong => TagValue::SLongs(
            bytes
                .chunks_exact(4)
                .map(|c| order.u32_from(c) as i32)
                .collect(),
        ),
        FieldType::Float => TagValue::Floats(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_bits(order.u32_from(c)))
                .collect(),
        ),
        FieldType::Double => TagValue::Doubles(
            bytes
                .chunks_exact(8)
                .map(|c| f64::from_bits(order.u64_from(c)))
                .collect(),
        ),
        FieldType::Long8 => TagValue::Long8s(
            bytes
                .chunks_exact(8)
                .map(|c| order.u64_from(c))
                .collect(),
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================
