//! Shared fixture builders and output inspection helpers.
//!
//! Fixtures are generated with external encoders (image, tiff) so the tests
//! exercise real foreign files; outputs are inspected with this crate's own
//! structure reader.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::{Luma, Rgb, RgbImage};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use pyratiff::{Ifd, TagValue, TiffReader, TiffTag};

/// A gradient RGB PNG.
pub fn make_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    img.save(&path).unwrap();
    path
}

/// A multi-frame grayscale TIFF with `frames` equally sized pages.
pub fn make_multiframe_tiff(
    dir: &Path,
    name: &str,
    frames: usize,
    width: u32,
    height: u32,
) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut enc = TiffEncoder::new(file).unwrap();
    for frame in 0..frames {
        let data: Vec<u8> = (0..width as usize * height as usize)
            .map(|i| ((i + frame * 40) % 256) as u8)
            .collect();
        enc.write_image::<colortype::Gray8>(width, height, &data)
            .unwrap();
    }
    path
}

/// A single-frame float32 grayscale TIFF.
pub fn make_float_tiff(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut enc = TiffEncoder::new(file).unwrap();
    let data: Vec<f32> = (0..width as usize * height as usize)
        .map(|i| (i as f32).sin() * 100.0)
        .collect();
    enc.write_image::<colortype::Gray32Float>(width, height, &data)
        .unwrap();
    path
}

/// An RGB GeoTIFF carrying ModelTiepoint, ModelPixelScale, and a GeoKey
/// directory, written by an external encoder.
pub fn make_geotiff(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut enc = TiffEncoder::new(file).unwrap();
    let data: Vec<u8> = (0..width as usize * height as usize * 3)
        .map(|i| (i % 239) as u8)
        .collect();
    let mut image = enc.new_image::<colortype::RGB8>(width, height).unwrap();
    image
        .encoder()
        .write_tag(
            Tag::Unknown(33550),
            [60.0f64, 60.0, 0.0].as_slice(),
        )
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::Unknown(33922),
            [0.0f64, 0.0, 0.0, 440720.0, 3751320.0, 0.0].as_slice(),
        )
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::Unknown(34735),
            [1u16, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32617].as_slice(),
        )
        .unwrap();
    image.write_data(&data).unwrap();
    path
}

/// A file that exists but is not an image.
pub fn make_text_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "this is a text file, not an image\n").unwrap();
    path
}

// =============================================================================
// Output inspection
// =============================================================================

/// Open a converted file with the crate's own structure reader.
pub fn open_output(path: &Path) -> TiffReader<BufReader<File>> {
    TiffReader::open(BufReader::new(File::open(path).unwrap())).unwrap()
}

/// Top-level IFD chain of a converted file.
pub fn read_ifds(path: &Path) -> (TiffReader<BufReader<File>>, Vec<Ifd>) {
    let mut reader = open_output(path);
    let ifds = reader.ifds().unwrap();
    (reader, ifds)
}

/// First integer value of a tag in an IFD.
pub fn tag_uint(
    reader: &mut TiffReader<BufReader<File>>,
    ifd: &Ifd,
    tag: TiffTag,
) -> Option<u64> {
    reader
        .tag_value(ifd, tag)
        .unwrap()
        .and_then(|v| v.first_uint())
}

/// ASCII value of a tag in an IFD.
pub fn tag_string(
    reader: &mut TiffReader<BufReader<File>>,
    ifd: &Ifd,
    tag: TiffTag,
) -> Option<String> {
    reader
        .tag_value(ifd, tag)
        .unwrap()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
}

/// SubIFD offsets of an IFD, empty when absent.
pub fn subifd_offsets(reader: &mut TiffReader<BufReader<File>>, ifd: &Ifd) -> Vec<u64> {
    match reader.tag_value(ifd, TiffTag::SubIfds).unwrap() {
        Some(TagValue::Longs(v)) => v.into_iter().map(|o| o as u64).collect(),
        Some(TagValue::Long8s(v)) => v,
        Some(other) => other.uints().unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Make a gradient luma PNG whose content survives lossy round trips
/// recognizably (smooth, no hard edges).
pub fn make_smooth_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = image::GrayImage::from_fn(width, height, |x, y| {
        Luma([((x as f32 / width as f32 + y as f32 / height as f32) * 120.0) as u8])
    });
    img.save(&path).unwrap();
    path
}
