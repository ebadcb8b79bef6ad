//! TIFF container structure: tag vocabulary, typed values, and the
//! structure-level reader and writer shared by detection, georeferencing
//! carry-over, and output generation.

pub mod reader;
pub mod tags;
pub mod value;
pub mod writer;

pub use reader::{ByteOrder, Ifd, IfdEntry, TiffHeader, TiffReader};
pub use tags::{Compression, FieldType, TiffTag};
pub use value::TagValue;
pub use writer::{IfdBuilder, TiffFileWriter};
