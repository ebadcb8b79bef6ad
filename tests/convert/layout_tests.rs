//! Multi-frame and pyramid IFD layout.

use pyratiff::{convert, ConvertOptions, TiffTag};

use super::test_utils::{make_multiframe_tiff, read_ifds, subifd_offsets, tag_uint};

// 600x400 at 256px tiles: levels 600x400, 300x200, 150x100
const WIDTH: u32 = 600;
const HEIGHT: u32 = 400;
const LEVELS: usize = 3;

#[test]
fn test_multiframe_default_nests_subifds() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_multiframe_tiff(dir.path(), "frames.tif", 3, WIDTH, HEIGHT);
    let output = dir.path().join("out.tiff");
    convert(&input, Some(&output), &ConvertOptions::default()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    // One top-level IFD per frame
    assert_eq!(ifds.len(), 3);

    for ifd in &ifds {
        assert_eq!(tag_uint(&mut reader, ifd, TiffTag::ImageWidth), Some(600));
        let subs = subifd_offsets(&mut reader, ifd);
        assert_eq!(subs.len(), LEVELS - 1);

        // Each nested IFD is a readable reduced level
        let sub = reader.read_ifd(subs[0]).unwrap();
        assert_eq!(tag_uint(&mut reader, &sub, TiffTag::ImageWidth), Some(300));
        assert_eq!(
            tag_uint(&mut reader, &sub, TiffTag::NewSubfileType),
            Some(1)
        );
    }
}

#[test]
fn test_multiframe_flat_layout() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_multiframe_tiff(dir.path(), "frames.tif", 3, WIDTH, HEIGHT);
    let output = dir.path().join("out.tiff");
    let options = ConvertOptions {
        subifds: false,
        ..Default::default()
    };
    convert(&input, Some(&output), &options).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    // frames x levels, frame-major
    assert_eq!(ifds.len(), 3 * LEVELS);
    let widths: Vec<u64> = ifds
        .iter()
        .map(|ifd| tag_uint(&mut reader, ifd, TiffTag::ImageWidth).unwrap())
        .collect();
    assert_eq!(widths, vec![600, 300, 150, 600, 300, 150, 600, 300, 150]);

    // No nesting anywhere
    for ifd in &ifds {
        assert!(subifd_offsets(&mut reader, ifd).is_empty());
    }
}

#[test]
fn test_only_frame_single_chain() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_multiframe_tiff(dir.path(), "frames.tif", 3, WIDTH, HEIGHT);
    let output = dir.path().join("out.tiff");
    let options = ConvertOptions {
        only_frame: Some(2),
        ..Default::default()
    };
    convert(&input, Some(&output), &options).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    // One frame laid out exactly like a single-frame conversion
    assert_eq!(ifds.len(), LEVELS);
    assert!(subifd_offsets(&mut reader, &ifds[0]).is_empty());
    let widths: Vec<u64> = ifds
        .iter()
        .map(|ifd| tag_uint(&mut reader, ifd, TiffTag::ImageWidth).unwrap())
        .collect();
    assert_eq!(widths, vec![600, 300, 150]);
}

#[test]
fn test_only_frame_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_multiframe_tiff(dir.path(), "frames.tif", 3, 64, 64);
    let output = dir.path().join("out.tiff");
    let options = ConvertOptions {
        only_frame: Some(7),
        ..Default::default()
    };
    assert!(convert(&input, Some(&output), &options).is_err());
    assert!(!output.exists());
}

#[test]
fn test_new_subfile_types() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_multiframe_tiff(dir.path(), "one.tif", 1, WIDTH, HEIGHT);
    let output = dir.path().join("out.tiff");
    convert(&input, Some(&output), &ConvertOptions::default()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    assert_eq!(
        tag_uint(&mut reader, &ifds[0], TiffTag::NewSubfileType),
        Some(0)
    );
    for reduced in &ifds[1..] {
        assert_eq!(
            tag_uint(&mut reader, reduced, TiffTag::NewSubfileType),
            Some(1)
        );
    }
}

#[test]
fn test_grayscale_frame_tags() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_multiframe_tiff(dir.path(), "gray.tif", 1, 128, 128);
    let output = dir.path().join("out.tiff");
    convert(&input, Some(&output), &ConvertOptions::default()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    assert_eq!(
        tag_uint(&mut reader, &ifds[0], TiffTag::SamplesPerPixel),
        Some(1)
    );
    assert_eq!(
        tag_uint(&mut reader, &ifds[0], TiffTag::PhotometricInterpretation),
        Some(1)
    );
    assert_eq!(
        tag_uint(&mut reader, &ifds[0], TiffTag::BitsPerSample),
        Some(8)
    );
}
