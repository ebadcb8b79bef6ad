//! Aperio (SVS) container output.

use pyratiff::{convert, ConvertOptions, OutputFormat, TiffTag};

use super::test_utils::{make_multiframe_tiff, make_png, read_ifds, tag_string, tag_uint};

fn aperio_options() -> ConvertOptions {
    ConvertOptions {
        format: OutputFormat::Aperio,
        ..Default::default()
    }
}

#[test]
fn test_aperio_description_and_shape() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 500, 400);
    let output = dir.path().join("out.svs");
    convert(&input, Some(&output), &aperio_options()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    // full level, thumbnail, one reduced level (250x200), label
    assert_eq!(ifds.len(), 4);

    // IFD 0: tiled full resolution with the Aperio banner
    let desc0 = tag_string(&mut reader, &ifds[0], TiffTag::ImageDescription).unwrap();
    assert!(
        desc0.starts_with("Aperio Image Library"),
        "got description: {desc0}"
    );
    assert!(desc0.contains("500x400"));
    assert!(ifds[0].is_tiled());

    // IFD 1: striped thumbnail
    assert!(!ifds[1].is_tiled());
    assert!(ifds[1].has_tag(TiffTag::StripOffsets));

    // IFD 2: reduced tiled level
    assert!(ifds[2].is_tiled());
    assert_eq!(tag_uint(&mut reader, &ifds[2], TiffTag::ImageWidth), Some(250));
}

#[test]
fn test_aperio_label_present() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 600, 400);
    let output = dir.path().join("out.svs");
    convert(&input, Some(&output), &aperio_options()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    let label = ifds
        .iter()
        .find(|ifd| {
            !ifd.is_tiled()
                && tag_string(&mut reader, ifd, TiffTag::ImageDescription)
                    .map(|d| d.contains("label"))
                    .unwrap_or(false)
        })
        .cloned();
    let label = label.expect("aperio output must expose a label image");
    assert!(label.has_tag(TiffTag::StripOffsets));
    assert!(label.has_tag(TiffTag::StripByteCounts));
    assert_eq!(tag_uint(&mut reader, &label, TiffTag::NewSubfileType), Some(1));
}

#[test]
fn test_aperio_every_description_carries_banner() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 600, 400);
    let output = dir.path().join("out.svs");
    convert(&input, Some(&output), &aperio_options()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    for ifd in &ifds {
        let desc = tag_string(&mut reader, ifd, TiffTag::ImageDescription)
            .expect("every aperio IFD is described");
        assert!(desc.starts_with("Aperio Image Library"));
    }
}

#[test]
fn test_multiframe_to_aperio_keeps_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_multiframe_tiff(dir.path(), "frames.tif", 3, 600, 400);
    let output = dir.path().join("out.tiff");
    convert(&input, Some(&output), &aperio_options()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    let desc0 = tag_string(&mut reader, &ifds[0], TiffTag::ImageDescription).unwrap();
    assert!(desc0.starts_with("Aperio Image Library"));

    // Label still present for multi-frame sources
    let has_label = ifds.iter().any(|ifd| {
        tag_string(&mut reader, ifd, TiffTag::ImageDescription)
            .map(|d| d.contains("label"))
            .unwrap_or(false)
    });
    assert!(has_label);
}
