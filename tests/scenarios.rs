//! End-to-end operations through the public facade and the built-in engine.
//!
//! Fixtures are generated with the `image` crate into a temporary directory,
//! so the tests need no files checked into the repository.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use spectrum::error::names;
use spectrum::io::{Bitmap, BitmapTarget, EncodedImageSink, EncodedImageSource};
use spectrum::options::{DecodeOptions, EncodeOptions, TranscodeOptions, TransformOptions};
use spectrum::requirements::{
    CropRequirement, EncodeMode, EncodeRequirement, ResizeMode, ResizeRequirement,
    RotateRequirement,
};
use spectrum::types::{EncodedImageFormat, ImageFormat, ImagePixelSpecification, ImageSize};
use spectrum::{ImageOperations, Spectrum, wire};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn jpeg_requirement() -> EncodeRequirement {
    EncodeRequirement::for_format(EncodedImageFormat::JPEG)
}

#[test]
fn unchanged_jpeg_is_copied_verbatim() {
    let tmp = TempDir::new().unwrap();
    let input = write_jpeg(tmp.path(), "in.jpg", 320, 200);
    let output = tmp.path().join("out.jpg");
    let spectrum = Spectrum::default();

    let result = spectrum
        .transcode(
            EncodedImageSource::from_path(&input).unwrap(),
            EncodedImageSink::from_path(&output).unwrap(),
            &TranscodeOptions::builder(jpeg_requirement()).build(),
            &"copy scenario",
        )
        .unwrap();

    assert!(result.is_successful());
    assert_eq!(result.rule_name(), Some("copy"));
    assert_eq!(fs::read(&output).unwrap(), fs::read(&input).unwrap());
    assert_eq!(result.total_bytes_read, result.total_bytes_written);
}

#[test]
fn exact_crop_sets_output_size() {
    let tmp = TempDir::new().unwrap();
    let input = write_jpeg(tmp.path(), "in.jpg", 800, 530);
    let output = tmp.path().join("cropped.jpg");
    let options = TranscodeOptions::builder(jpeg_requirement())
        .crop(CropRequirement::absolute(100, 50, 300, 150, true).unwrap())
        .build();

    let result = Spectrum::default()
        .transcode(
            EncodedImageSource::from_path(&input).unwrap(),
            EncodedImageSink::from_path(&output).unwrap(),
            &options,
            &"crop scenario",
        )
        .unwrap();

    let spec = result.output_image_specification.unwrap();
    assert_eq!(spec.size, ImageSize::new(200, 100).unwrap());
    assert_eq!(spec.format, ImageFormat::from(EncodedImageFormat::JPEG));
    let written = image::open(&output).unwrap();
    assert_eq!((written.width(), written.height()), (200, 100));
}

/// Yields a few bytes, then fails.
struct BreakingReader {
    remaining: usize,
}

impl Read for BreakingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::other("connection reset after 10 bytes"));
        }
        let n = buf.len().min(self.remaining);
        buf[..n].fill(0xFF);
        self.remaining -= n;
        Ok(n)
    }
}

#[test]
fn broken_stream_surfaces_its_failure() {
    let mut reader = BreakingReader { remaining: 10 };
    let err = Spectrum::default()
        .decode(
            EncodedImageSource::from_reader(&mut reader),
            &mut BitmapTarget::new(),
            &DecodeOptions::default(),
            &"broken stream",
        )
        .unwrap_err();

    assert!(err.is(names::IO_FAILURE));
    assert_eq!(
        err.cause().unwrap().to_string(),
        "connection reset after 10 bytes"
    );
}

#[test]
fn resize_requirement_survives_the_boundary() {
    let resize =
        ResizeRequirement::new(ResizeMode::Exact, ImageSize::new(480, 320).unwrap()).unwrap();
    assert_eq!(resize.mode(), ResizeMode::Exact);
    assert_eq!(resize.target_size(), ImageSize::new(480, 320).unwrap());
    let back: ResizeRequirement = wire::from_json(&wire::to_json(&resize).unwrap()).unwrap();
    assert_eq!(back, resize);
}

#[test]
fn encode_requirements_compare_structurally() {
    let a = EncodeRequirement::new(EncodedImageFormat::JPEG, 42, EncodeMode::Lossy).unwrap();
    let b = EncodeRequirement::new(EncodedImageFormat::JPEG, 42, EncodeMode::Lossy).unwrap();
    let c = EncodeRequirement::new(EncodedImageFormat::JPEG, 43, EncodeMode::Lossy).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn png_to_webp_resized_and_rotated() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "in.png", 400, 200);
    let options = TranscodeOptions::builder(
        EncodeRequirement::new(EncodedImageFormat::WEBP, 0, EncodeMode::Lossless).unwrap(),
    )
    .resize(ResizeRequirement::fit_into_square(100).unwrap())
    .rotate(RotateRequirement::new(90))
    .build();
    let mut out = Vec::new();

    let result = Spectrum::default()
        .transcode(
            EncodedImageSource::from_path(&input).unwrap(),
            EncodedImageSink::from_writer(&mut out),
            &options,
            &"webp",
        )
        .unwrap();

    assert_eq!(result.rule_name(), Some("image_rs"));
    let spec = result.output_image_specification.unwrap();
    assert_eq!(spec.size, ImageSize::new(50, 100).unwrap());
    assert_eq!(result.total_bytes_written, out.len() as u64);
    assert_eq!(
        image::guess_format(&out).unwrap(),
        image::ImageFormat::WebP
    );
}

#[test]
fn decode_then_encode_round_trip() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "in.png", 8, 4);
    let spectrum = Spectrum::default();

    let mut target = BitmapTarget::new();
    let decoded = spectrum
        .decode(
            EncodedImageSource::from_path(&input).unwrap(),
            &mut target,
            &DecodeOptions::builder()
                .output_pixel_specification(ImagePixelSpecification::Bgra)
                .build(),
            &"decode",
        )
        .unwrap();
    assert_eq!(decoded.output_image_specification.unwrap().format, ImageFormat::Bitmap);
    let bitmap = target.take().unwrap();
    assert_eq!(bitmap.pixel_specification(), ImagePixelSpecification::Bgra);
    assert_eq!(&bitmap.pixels()[..4], &[30, 20, 10, 255]);

    let output = tmp.path().join("again.png");
    let encoded = spectrum
        .encode(
            &bitmap,
            EncodedImageSink::from_path(&output).unwrap(),
            &EncodeOptions::builder(EncodeRequirement::for_format(EncodedImageFormat::PNG)).build(),
            &"encode",
        )
        .unwrap();
    assert!(encoded.is_successful());
    let again = image::open(&output).unwrap().to_rgba8();
    assert_eq!(again.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
}

#[test]
fn transform_converts_layout() {
    let bitmap = Bitmap::new(
        ImageSize::new(2, 1).unwrap(),
        ImagePixelSpecification::Rgb,
        vec![255, 0, 0, 0, 0, 255],
    )
    .unwrap();
    let mut target = BitmapTarget::new();
    let options = TransformOptions::builder()
        .output_pixel_specification(ImagePixelSpecification::Bgr)
        .rotate(RotateRequirement::new(0).with_flips(true, false))
        .build();

    let result = Spectrum::default()
        .transform(&bitmap, &mut target, &options, &"transform")
        .unwrap();

    assert!(result.is_successful());
    let out = target.take().unwrap();
    assert_eq!(out.pixels(), &[255, 0, 0, 0, 0, 255]);
}

#[test]
fn gif_needs_the_plugin() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "in.png", 16, 16);
    let options =
        TranscodeOptions::builder(EncodeRequirement::for_format(EncodedImageFormat::GIF)).build();

    let mut out = Vec::new();
    let result = Spectrum::default()
        .transcode(
            EncodedImageSource::from_path(&input).unwrap(),
            EncodedImageSink::from_writer(&mut out),
            &options,
            &"gif",
        )
        .unwrap();
    assert_eq!(result.rule_name(), Some("image_rs"));
    assert_eq!(image::guess_format(&out).unwrap(), image::ImageFormat::Gif);

    let bare = Spectrum::new(
        spectrum::config::Configuration::empty(),
        Vec::new(),
        std::sync::Arc::new(spectrum::logging::NoopLogger),
    );
    let err = bare
        .transcode(
            EncodedImageSource::from_path(&input).unwrap(),
            EncodedImageSink::owning(Vec::new()),
            &options,
            &"gif without plugin",
        )
        .unwrap_err();
    assert!(err.is(names::NO_MATCHING_RULE));
}

#[test]
fn odd_angle_has_no_rule() {
    let tmp = TempDir::new().unwrap();
    let input = write_jpeg(tmp.path(), "in.jpg", 40, 30);
    let options = TranscodeOptions::builder(jpeg_requirement())
        .rotate(RotateRequirement::new(45))
        .build();

    let err = Spectrum::default()
        .transcode(
            EncodedImageSource::from_path(&input).unwrap(),
            EncodedImageSink::owning(io::sink()),
            &options,
            &"rotate 45",
        )
        .unwrap_err();

    assert!(err.is(names::NO_MATCHING_RULE));
    assert!(err.message().contains("characteristic_matcher_rotate_unsupported"));
    assert!(err.description().unwrap().starts_with("no_matching_rule#"));
}
