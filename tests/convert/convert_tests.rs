//! Core conversion scenarios: codecs, tag contracts, error taxonomy, and
//! embedded statistics.

use pyratiff::{convert, Codec, ConvertError, ConvertOptions, SourceError, StatsLevel, TiffTag};

use super::test_utils::{
    make_float_tiff, make_geotiff, make_png, make_text_file, read_ifds, tag_string, tag_uint,
};

fn options_with(codec: Codec) -> ConvertOptions {
    ConvertOptions {
        compression: codec,
        ..Default::default()
    }
}

// =============================================================================
// Defaults and codec selection
// =============================================================================

#[test]
fn test_default_conversion_is_lzw_256() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 600, 400);
    let output = dir.path().join("out.tiff");

    let result = convert(&input, Some(&output), &ConvertOptions::default()).unwrap();
    assert_eq!(result, output);

    let (mut reader, ifds) = read_ifds(&output);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::Compression), Some(5));
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::TileWidth), Some(256));
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::TileLength), Some(256));
    // 600x400 -> 300x200 -> 150x100
    assert_eq!(ifds.len(), 3);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::ImageWidth), Some(600));
    assert_eq!(tag_uint(&mut reader, &ifds[1], TiffTag::ImageWidth), Some(300));
    assert_eq!(tag_uint(&mut reader, &ifds[2], TiffTag::ImageWidth), Some(150));
}

#[test]
fn test_codec_compression_tags() {
    let cases = [
        (Codec::Jpeg, 7u64),
        (Codec::Deflate, 8),
        (Codec::Lzw, 5),
        (Codec::Packbits, 32773),
        (Codec::Zstd, 50000),
        (Codec::Webp, 50001),
        (Codec::None, 1),
    ];
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 300, 200);

    for (codec, expected) in cases {
        let output = dir.path().join(format!("out_{}.tiff", codec.name()));
        convert(&input, Some(&output), &options_with(codec)).unwrap();
        let (mut reader, ifds) = read_ifds(&output);
        assert_eq!(
            tag_uint(&mut reader, &ifds[0], TiffTag::Compression),
            Some(expected),
            "codec {}",
            codec.name()
        );
    }
}

#[test]
fn test_tile_size_512() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 700, 500);
    let output = dir.path().join("out.tiff");

    let options = ConvertOptions {
        tile_size: 512,
        ..Default::default()
    };
    convert(&input, Some(&output), &options).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::TileWidth), Some(512));
    // 700x500 -> 350x250: both fit a 512 tile after one halving
    assert_eq!(ifds.len(), 2);
}

#[test]
fn test_tile_offsets_count_matches_grid() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 1000, 600);
    let output = dir.path().join("out.tiff");
    convert(&input, Some(&output), &ConvertOptions::default()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    let offsets = reader
        .tag_value(&ifds[0], TiffTag::TileOffsets)
        .unwrap()
        .unwrap()
        .uints()
        .unwrap();
    let counts = reader
        .tag_value(&ifds[0], TiffTag::TileByteCounts)
        .unwrap()
        .unwrap()
        .uints()
        .unwrap();
    // 1000x600 at 256px tiles: 4 x 3
    assert_eq!(offsets.len(), 12);
    assert_eq!(counts.len(), 12);
    assert!(counts.iter().all(|&c| c > 0));
}

#[test]
fn test_jpeg_quality_and_deflate_level() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 400, 300);

    let out_q = dir.path().join("q.tiff");
    let options = ConvertOptions {
        compression: Codec::Jpeg,
        quality: 50,
        ..Default::default()
    };
    convert(&input, Some(&out_q), &options).unwrap();
    let (mut reader, ifds) = read_ifds(&out_q);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::Compression), Some(7));

    let out_l = dir.path().join("l.tiff");
    let options = ConvertOptions {
        compression: Codec::Deflate,
        level: Some(2),
        ..Default::default()
    };
    convert(&input, Some(&out_l), &options).unwrap();
    let (mut reader, ifds) = read_ifds(&out_l);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::Compression), Some(8));
}

#[test]
fn test_lzw_predictor_tag() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 300, 300);
    let output = dir.path().join("out.tiff");

    let options = ConvertOptions {
        predictor: true,
        ..Default::default()
    };
    convert(&input, Some(&output), &options).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::Predictor), Some(2));
}

#[test]
fn test_no_predictor_tag_without_flag() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 64, 64);
    let output = dir.path().join("out.tiff");
    convert(&input, Some(&output), &ConvertOptions::default()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::Predictor), None);
}

// =============================================================================
// Sample formats
// =============================================================================

#[test]
fn test_float_input_becomes_uint_samples() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_float_tiff(dir.path(), "float.tif", 128, 96);
    let output = dir.path().join("out.tiff");
    convert(&input, Some(&output), &ConvertOptions::default()).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::SampleFormat), Some(1));
    assert_eq!(
        tag_uint(&mut reader, &ifds[0], TiffTag::BitsPerSample),
        Some(8)
    );
}

// =============================================================================
// Geospatial
// =============================================================================

#[test]
fn test_geospatial_conversion_preserves_tags_and_naming() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = make_geotiff(dir.path(), "rgb_geo.tiff", 200, 150);
    let input = dir.path().join("in.geo.tiff");
    std::fs::copy(&fixture, &input).unwrap();

    assert!(pyratiff::is_geospatial(&input));

    let output = convert(&input, None, &ConvertOptions::default()).unwrap();
    assert!(output.to_string_lossy().contains("geo.tiff"));
    assert_ne!(output, input);

    let (mut reader, ifds) = read_ifds(&output);
    let tiepoint = reader
        .tag_value(&ifds[0], TiffTag::ModelTiepoint)
        .unwrap()
        .expect("ModelTiepoint must survive conversion");
    match tiepoint {
        pyratiff::TagValue::Doubles(values) => {
            assert_eq!(values, vec![0.0, 0.0, 0.0, 440720.0, 3751320.0, 0.0]);
        }
        other => panic!("unexpected tiepoint value: {other:?}"),
    }
    assert!(reader
        .tag_value(&ifds[0], TiffTag::ModelPixelScale)
        .unwrap()
        .is_some());
    assert!(reader
        .tag_value(&ifds[0], TiffTag::GeoKeyDirectory)
        .unwrap()
        .is_some());
}

#[test]
fn test_non_geospatial_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let png = make_png(dir.path(), "plain.png", 32, 32);
    assert!(!pyratiff::is_geospatial(&png));
}

// =============================================================================
// Overwrite and failure atomicity
// =============================================================================

#[test]
fn test_overwrite_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 100, 80);
    let output = dir.path().join("out.tiff");
    std::fs::write(&output, "placeholder").unwrap();

    let result = convert(&input, Some(&output), &ConvertOptions::default());
    assert!(matches!(result, Err(ConvertError::OutputExists(_))));
    // The placeholder is untouched
    assert_eq!(std::fs::read(&output).unwrap(), b"placeholder");

    let options = ConvertOptions {
        overwrite: true,
        ..Default::default()
    };
    convert(&input, Some(&output), &options).unwrap();
    assert!(std::fs::metadata(&output).unwrap().len() > 100);
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.tiff");
    let result = convert(dir.path().join("nope.png"), Some(&output), &ConvertOptions::default());
    assert!(matches!(
        result,
        Err(ConvertError::Source(SourceError::NotFound(_)))
    ));
    assert!(!output.exists());
}

#[test]
fn test_non_image_input_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_text_file(dir.path(), "notanimage.txt");
    let output = dir.path().join("out.tiff");

    let result = convert(&input, Some(&output), &ConvertOptions::default());
    assert!(matches!(
        result,
        Err(ConvertError::Source(SourceError::UnsupportedFormat { .. }))
    ));
    assert!(!output.exists(), "failed conversion must not leave a file");
    // No temp files linger either
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path() != input)
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
}

// =============================================================================
// Statistics
// =============================================================================

fn description_json(path: &std::path::Path) -> serde_json::Value {
    let (mut reader, ifds) = read_ifds(path);
    let desc = tag_string(&mut reader, &ifds[0], TiffTag::ImageDescription)
        .expect("stats description present");
    serde_json::from_str(&desc).expect("description is JSON")
}

#[test]
fn test_stats_embedded() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 300, 200);
    let output = dir.path().join("out.tiff");
    let options = ConvertOptions {
        stats: StatsLevel::Basic,
        ..Default::default()
    };
    convert(&input, Some(&output), &options).unwrap();

    let value = description_json(&output);
    let stats = &value["large_image_converter"]["conversion_stats"];
    assert!(stats.is_object());
    assert_eq!(stats["compression"], "lzw");
    assert_eq!(stats["tile_size"], 256);
    assert!(stats.get("psnr").is_none());
}

#[test]
fn test_full_stats_psnr_lossy() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 300, 200);
    let output = dir.path().join("out.tiff");
    let options = ConvertOptions {
        compression: Codec::Jpeg,
        quality: 60,
        stats: StatsLevel::Full,
        ..Default::default()
    };
    convert(&input, Some(&output), &options).unwrap();

    let value = description_json(&output);
    let psnr = &value["large_image_converter"]["conversion_stats"]["psnr"];
    let psnr = psnr.as_f64().expect("lossy PSNR is a number");
    assert!(psnr > 10.0 && psnr < 60.0, "unexpected PSNR {psnr}");
}

#[test]
fn test_full_stats_psnr_lossless_is_null() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 200, 100);
    let output = dir.path().join("out.tiff");
    let options = ConvertOptions {
        stats: StatsLevel::Full,
        ..Default::default()
    };
    convert(&input, Some(&output), &options).unwrap();

    let value = description_json(&output);
    let stats = &value["large_image_converter"]["conversion_stats"];
    assert!(stats.get("psnr").is_some(), "psnr key present");
    assert!(stats["psnr"].is_null(), "lossless PSNR serializes as null");
}

// =============================================================================
// JPEG 2000
// =============================================================================

#[test]
fn test_jp2k_compression_tag() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 200, 150);
    let output = dir.path().join("out.tiff");
    convert(&input, Some(&output), &options_with(Codec::Jp2k)).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    assert_eq!(
        tag_uint(&mut reader, &ifds[0], TiffTag::Compression),
        Some(33005)
    );
}

#[test]
fn test_jp2k_rate_targets_shrink_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = super::test_utils::make_smooth_png(dir.path(), "smooth.png", 400, 300);

    let plain = dir.path().join("plain.tiff");
    convert(&input, Some(&plain), &options_with(Codec::Jp2k)).unwrap();

    let with_psnr = dir.path().join("psnr.tiff");
    let options = ConvertOptions {
        compression: Codec::Jp2k,
        psnr: Some(50.0),
        ..Default::default()
    };
    convert(&input, Some(&with_psnr), &options).unwrap();

    let with_cr = dir.path().join("cr.tiff");
    let options = ConvertOptions {
        compression: Codec::Jp2k,
        cr: Some(100.0),
        ..Default::default()
    };
    convert(&input, Some(&with_cr), &options).unwrap();

    let size = |p: &std::path::Path| std::fs::metadata(p).unwrap().len();
    assert!(size(&with_psnr) < size(&plain), "psnr target must shrink output");
    assert!(size(&with_cr) < size(&plain), "cr target must shrink output");
    assert_ne!(size(&with_cr), size(&with_psnr));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrency_output_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 600, 400);

    let serial = dir.path().join("serial.tiff");
    let options = ConvertOptions {
        concurrency: 1,
        ..Default::default()
    };
    convert(&input, Some(&serial), &options).unwrap();

    let parallel = dir.path().join("parallel.tiff");
    let options = ConvertOptions {
        concurrency: 4,
        ..Default::default()
    };
    convert(&input, Some(&parallel), &options).unwrap();

    assert_eq!(
        std::fs::read(&serial).unwrap(),
        std::fs::read(&parallel).unwrap(),
        "tile order must not depend on worker count"
    );
}
