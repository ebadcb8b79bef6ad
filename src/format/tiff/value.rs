//! Typed TIFF tag values.
//!
//! [`TagValue`] is the common currency between the container reader and
//! writer: the reader decodes raw entry bytes (respecting the source byte
//! order) into a `TagValue`, and the writer serializes a `TagValue` into
//! little-endian output bytes. Georeferencing carry-over moves values from
//! one side to the other without interpreting them.

use super::tags::FieldType;

/// A decoded TIFF tag value with its field type implied by the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// BYTE array
    Bytes(Vec<u8>),

    /// ASCII string (NUL terminator added during serialization)
    Ascii(String),

    /// SHORT array
    Shorts(Vec<u16>),

    /// LONG array
    Longs(Vec<u32>),

    /// RATIONAL array of (numerator, denominator) pairs
    Rationals(Vec<(u32, u32)>),

    /// UNDEFINED byte array
    Undefined(Vec<u8>),

    /// SLONG array
    SLongs(Vec<i32>),

    /// FLOAT array
    Floats(Vec<f32>),

    /// DOUBLE array
    Doubles(Vec<f64>),

    /// LONG8 array (BigTIFF)
    Long8s(Vec<u64>),
}

impl TagValue {
    /// Convenience constructor for a single SHORT.
    pub fn short(value: u16) -> Self {
        TagValue::Shorts(vec![value])
    }

    /// Convenience constructor for a single LONG.
    pub fn long(value: u32) -> Self {
        TagValue::Longs(vec![value])
    }

    /// Convenience constructor for an ASCII string.
    pub fn ascii(value: impl Into<String>) -> Self {
        TagValue::Ascii(value.into())
    }

    /// The TIFF field type this value serializes as.
    pub fn field_type(&self) -> FieldType {
        match self {
            TagValue::Bytes(_) => FieldType::Byte,
            TagValue::Ascii(_) => FieldType::Ascii,
            TagValue::Shorts(_) => FieldType::Short,
            TagValue::Longs(_) => FieldType::Long,
            TagValue::Rationals(_) => FieldType::Rational,
            TagValue::Undefined(_) => FieldType::Undefined,
            TagValue::SLongs(_) => FieldType::SLong,
            TagValue::Floats(_) => FieldType::Float,
            TagValue::Doubles(_) => FieldType::Double,
            TagValue::Long8s(_) => FieldType::Long8,
        }
    }

    /// The TIFF value count (array length; ASCII includes the NUL).
    pub fn count(&self) -> u64 {
        match self {
            TagValue::Bytes(v) => v.len() as u64,
            TagValue::Ascii(s) => s.len() as u64 + 1,
            TagValue::Shorts(v) => v.len() as u64,
            TagValue::Longs(v) => v.len() as u64,
            TagValue::Rationals(v) => v.len() as u64,
            TagValue::Undefined(v) => v.len() as u64,
            TagValue::SLongs(v) => v.len() as u64,
            TagValue::Floats(v) => v.len() as u64,
            TagValue::Doubles(v) => v.len() as u64,
            TagValue::Long8s(v) => v.len() as u64,
        }
    }

    /// Serialize the value to little-endian bytes for the output file.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TagValue::Bytes(v) | TagValue::Undefined(v) => v.clone(),
            TagValue::Ascii(s) => {
                let mut out = s.as_bytes().to_vec();
                out.push(0);
                out
            }
            TagValue::Shorts(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Longs(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Rationals(v) => v
                .iter()
                .flat_map(|(n, d)| {
                    let mut b = n.to_le_bytes().to_vec();
                    b.extend_from_slice(&d.to_le_bytes());
                    b
                })
                .collect(),
            TagValue::SLongs(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Floats(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Doubles(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Long8s(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    /// First element widened to u64, for integer-typed values.
    pub fn first_uint(&self) -> Option<u64> {
        match self {
            TagValue::Bytes(v) | TagValue::Undefined(v) => v.first().map(|&x| x as u64),
            TagValue::Shorts(v) => v.first().map(|&x| x as u64),
            TagValue::Longs(v) => v.first().map(|&x| x as u64),
            TagValue::Long8s(v) => v.first().copied(),
            _ => None,
        }
    }

    /// All elements widened to u64, for integer-typed values.
    pub fn uints(&self) -> Option<Vec<u64>> {
        match self {
            TagValue::Bytes(v) | TagValue::Undefined(v) => {
                Some(v.iter().map(|&x| x as u64).collect())
            }
            TagValue::Shorts(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Longs(v) => Some(v.iter().map(|&x| x as u64).collect()),
            TagValue::Long8s(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// The string payload of an ASCII value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(s) => Some(s),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
