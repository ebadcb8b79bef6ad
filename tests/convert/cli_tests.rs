//! CLI option mapping and end-to-end dispatch.
//!
//! The binary itself is a thin wrapper: parse, map options, call
//! [`pyratiff::convert`], translate the result into an exit code. These
//! tests drive the same path through [`Cli::parse_from`].

use clap::Parser;

use pyratiff::{convert, Cli, ConvertError, SourceError, TiffTag};

use super::test_utils::{make_png, make_text_file, read_ifds, tag_uint};

fn parse(args: &[&str]) -> Cli {
    Cli::parse_from(std::iter::once("pyratiff").chain(args.iter().copied()))
}

fn run(cli: &Cli) -> Result<std::path::PathBuf, ConvertError> {
    let options = cli.to_options()?;
    convert(&cli.source, cli.output.as_deref(), &options)
}

#[test]
fn test_cli_basic_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 300, 200);
    let output = dir.path().join("out.tiff");

    let cli = parse(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    let written = run(&cli).unwrap();
    assert_eq!(written, output);
    assert!(std::fs::metadata(&output).unwrap().len() > 100);
}

#[test]
fn test_cli_zip_compression_smaller_than_default() {
    let dir = tempfile::tempdir().unwrap();
    let input = super::test_utils::make_smooth_png(dir.path(), "in.png", 512, 384);

    let lzw_out = dir.path().join("lzw.tiff");
    let cli = parse(&[input.to_str().unwrap(), lzw_out.to_str().unwrap()]);
    run(&cli).unwrap();

    let zip_out = dir.path().join("zip.tiff");
    let cli = parse(&[
        input.to_str().unwrap(),
        zip_out.to_str().unwrap(),
        "--compression",
        "zip",
    ]);
    run(&cli).unwrap();

    let (mut reader, ifds) = read_ifds(&zip_out);
    assert_eq!(tag_uint(&mut reader, &ifds[0], TiffTag::Compression), Some(8));
    assert!(
        std::fs::metadata(&zip_out).unwrap().len()
            < std::fs::metadata(&lzw_out).unwrap().len()
    );
}

#[test]
fn test_cli_missing_input_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.tiff");
    let cli = parse(&["not a file", output.to_str().unwrap()]);

    // The binary maps this to exit code 1 without an error chain
    let result = run(&cli);
    assert!(matches!(
        result,
        Err(ConvertError::Source(SourceError::NotFound(_)))
    ));
    assert!(!output.exists());
}

#[test]
fn test_cli_non_image_input_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_text_file(dir.path(), "notanimage.txt");
    let output = dir.path().join("out.tiff");

    let cli = parse(&[input.to_str().unwrap(), output.to_str().unwrap()]);
    let result = run(&cli);
    assert!(matches!(
        result,
        Err(ConvertError::Source(SourceError::UnsupportedFormat { .. }))
    ));
    assert!(!output.exists());
}

#[test]
fn test_cli_concurrency_flag() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 600, 400);
    let output = dir.path().join("out.tiff");

    let cli = parse(&[
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        "--concurrency",
        "2",
    ]);
    run(&cli).unwrap();
    assert!(std::fs::metadata(&output).unwrap().len() > 100);
}

#[test]
fn test_cli_stats_flag() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_png(dir.path(), "in.png", 200, 150);
    let output = dir.path().join("out.tiff");

    let cli = parse(&[
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        "--stats",
    ]);
    run(&cli).unwrap();

    let (mut reader, ifds) = read_ifds(&output);
    let desc = reader
        .tag_value(&ifds[0], TiffTag::ImageDescription)
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(desc.as_str().unwrap()).unwrap();
    assert!(value["large_image_converter"]["conversion_stats"].is_object());
}
