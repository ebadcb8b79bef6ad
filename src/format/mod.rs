//! Container formats: detection, TIFF structure reading and writing, and
//! georeferencing carry-over.

pub mod detect;
pub mod geo;
pub mod tiff;

pub use detect::{
    decode_backend, is_geospatial, is_raster, is_tiff_header, sniff_bytes, sniff_format,
    DecodeBackend, SourceFormat,
};
pub use geo::GeoMetadata;
