//! Pure Rust reference engine built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Rules
//!
//! | Rule | Picked when | Does |
//! |---|---|---|
//! | `copy` | same encoded format in and out, no transformations, mode not lossy | copies the input bytes verbatim |
//! | `image_rs` | anything else the formats allow | decode, crop → resize → rotate/flip, encode |
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format detection | `image::guess_format` (magic bytes) |
//! | Decode (JPEG, PNG, WebP) | `image` crate decoders |
//! | Decode / encode (GIF) | [`GifPlugin`](crate::plugins::GifPlugin) |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resize | `DynamicImage::resize_exact`, `Lanczos3` (magic kernel) or `CatmullRom` (bicubic) |
//! | Rotate / flip | `DynamicImage::rotate90` … `fliph` / `flipv` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder`, quality default 80 |
//! | Encode → PNG | `image::codecs::png::PngEncoder`, compression level → preset |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder`, lossless only |
//!
//! Of the configuration knobs, the engine honours the background color (used
//! when flattening alpha for JPEG), the sampling method and the PNG compression
//! level. The remaining JPEG, PNG interlacing and WebP tuning knobs have no
//! counterpart in the `image` encoders and are ignored.

use super::calculations::{calculate_crop_rect, calculate_resize_dimensions};
use super::handle::EngineContext;
use super::pixels;
use super::rules::{CropSupport, ResizeSupport, RotateSupport, Rule, RuleMatcher, RuleQuery};
use super::ImageEngine;
use crate::config::{Configuration, SamplingMethod};
use crate::error::{EngineError, SpectrumError, engine_error, names};
use crate::io::{Bitmap, BitmapTarget, EncodedImageSink, EncodedImageSource};
use crate::options::{Options, Transformations};
use crate::plugins::{self, SpectrumPlugin};
use crate::requirements::{EncodeMode, EncodeRequirement};
use crate::result::SpectrumResult;
use crate::types::{
    EncodedImageFormat, ImageColor, ImageFormat, ImageOrientation, ImagePixelSpecification,
    ImageSize, ImageSpecification,
};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::io::{self, Cursor, Write};
use std::sync::Arc;
use tracing::debug;

/// JPEG quality used when the requirement leaves it unset.
const DEFAULT_JPEG_QUALITY: u8 = 80;

pub const COPY_RULE: &str = "copy";
pub const IMAGE_RULE: &str = "image_rs";

/// Pure Rust engine using the `image` crate ecosystem.
///
/// See the [module docs](self) for the rule table and crate mapping.
#[derive(Debug)]
pub struct RustEngine {
    configuration: Configuration,
    plugins: Vec<Arc<dyn SpectrumPlugin>>,
    matcher: RuleMatcher,
}

impl RustEngine {
    pub fn new(context: &EngineContext) -> Self {
        let formats = plugins::supported_formats(&context.plugins);
        let encoded: Vec<ImageFormat> =
            formats.iter().filter(|f| f.is_encoded()).cloned().collect();
        let rules = vec![
            Rule {
                allowed_input_formats: encoded,
                requires_equal_formats: true,
                is_passthrough: true,
                ..Rule::new(COPY_RULE)
            },
            Rule {
                allowed_input_formats: formats.clone(),
                allowed_output_formats: formats,
                crop_support: CropSupport::Exact,
                resize_support: ResizeSupport::Exact,
                rotate_support: RotateSupport::MultipleOf90Flip,
                ..Rule::new(IMAGE_RULE)
            },
        ];
        Self {
            configuration: Configuration::stock().merge(&context.configuration),
            plugins: context.plugins.clone(),
            matcher: RuleMatcher::new(rules),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        self.matcher.rules()
    }

    fn configuration_for(&self, options: &Options) -> Configuration {
        self.configuration.merged_with(options.configuration.as_ref())
    }

    fn plugin_for(&self, format: &EncodedImageFormat) -> Option<&Arc<dyn SpectrumPlugin>> {
        self.plugins.iter().find(|plugin| plugin.supports(format))
    }

    fn select_rule(
        &self,
        input_format: &ImageFormat,
        output_format: &ImageFormat,
        options: &Options,
    ) -> Result<&Rule, SpectrumError> {
        let rule = self.matcher.find_first_matching(&RuleQuery {
            input_format,
            output_format,
            encode_requirement: options.encode_requirement.as_ref(),
            transformations: &options.transformations,
        })?;
        debug!(rule = %rule.name, input = %input_format, output = %output_format, "rule selected");
        Ok(rule)
    }

    /// Identifies the encoded format from the leading bytes.
    fn detect_format(&self, data: &[u8]) -> Result<EncodedImageFormat, SpectrumError> {
        let format = match image::guess_format(data) {
            Ok(image::ImageFormat::Jpeg) => EncodedImageFormat::JPEG,
            Ok(image::ImageFormat::Png) => EncodedImageFormat::PNG,
            Ok(image::ImageFormat::WebP) => EncodedImageFormat::WEBP,
            Ok(image::ImageFormat::Gif) => EncodedImageFormat::GIF,
            Ok(other) => {
                return Err(engine_error!(
                    names::UNSUPPORTED_INPUT_FORMAT,
                    "unsupported input format {other:?}"
                ));
            }
            Err(e) => {
                return Err(engine_error!(
                    names::UNSUPPORTED_INPUT_FORMAT,
                    "unrecognised input format"
                )
                .caused_by(e));
            }
        };
        if !plugins::is_format_supported(&ImageFormat::from(format.clone()), &self.plugins) {
            return Err(engine_error!(
                names::UNSUPPORTED_INPUT_FORMAT,
                "no codec registered for {format}"
            ));
        }
        Ok(format)
    }

    /// Reads size and pixel layout from the header without decoding pixels.
    fn probe(
        &self,
        data: &[u8],
        format: &EncodedImageFormat,
    ) -> Result<ImageSpecification, EngineError> {
        let decoder = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .into_decoder()
            .map_err(|e| codec_failure("failed to read image header", e))?;
        let (width, height) = decoder.dimensions();
        let size = image_size(width, height)?;
        let color = decoder.color_type();
        Ok(ImageSpecification::new(
            size,
            ImageFormat::from(format.clone()),
            pixel_specification_for(color.has_color(), color.has_alpha()),
        ))
    }

    fn decode_image(
        &self,
        format: &EncodedImageFormat,
        data: &[u8],
    ) -> Result<DynamicImage, EngineError> {
        if let Some(plugin) = self.plugin_for(format) {
            return plugin.decode(format, data);
        }
        image::load_from_memory(data)
            .map_err(|e| codec_failure("failed to decode image", e).into())
    }

    /// Writes `image` to `out` as `requirement` asks, returning the layout
    /// that was stored.
    fn encode_image(
        &self,
        image: &DynamicImage,
        requirement: &EncodeRequirement,
        configuration: &Configuration,
        out: &mut dyn Write,
    ) -> Result<ImagePixelSpecification, EngineError> {
        let format = requirement.format();
        let mode = requirement.mode();

        if *format == EncodedImageFormat::JPEG {
            ensure_mode(format, mode, EncodeMode::Lossless)?;
            let quality = requirement.quality_or(DEFAULT_JPEG_QUALITY);
            let (flat, spec) = if image.color().has_color() || image.color().has_alpha() {
                let rgb = flatten_alpha(image, configuration.background_color());
                (DynamicImage::ImageRgb8(rgb), ImagePixelSpecification::Rgb)
            } else {
                (DynamicImage::ImageLuma8(image.to_luma8()), ImagePixelSpecification::Gray)
            };
            flat.write_with_encoder(JpegEncoder::new_with_quality(out, quality))
                .map_err(|e| codec_failure("JPEG encode failed", e))?;
            return Ok(spec);
        }

        if *format == EncodedImageFormat::PNG {
            ensure_mode(format, mode, EncodeMode::Lossy)?;
            let compression = png_compression(configuration.effective_compression_level());
            let (normalised, spec) = to_8bit(image);
            normalised
                .write_with_encoder(PngEncoder::new_with_quality(
                    out,
                    compression,
                    PngFilter::Adaptive,
                ))
                .map_err(|e| codec_failure("PNG encode failed", e))?;
            return Ok(spec);
        }

        if *format == EncodedImageFormat::WEBP {
            ensure_mode(format, mode, EncodeMode::Lossy)?;
            let (normalised, spec) = if image.color().has_alpha() {
                (DynamicImage::ImageRgba8(image.to_rgba8()), ImagePixelSpecification::Rgba)
            } else {
                (DynamicImage::ImageRgb8(image.to_rgb8()), ImagePixelSpecification::Rgb)
            };
            normalised
                .write_with_encoder(WebPEncoder::new_lossless(out))
                .map_err(|e| codec_failure("WebP encode failed", e))?;
            return Ok(spec);
        }

        match self.plugin_for(format) {
            Some(plugin) => plugin.encode(image, requirement, configuration, out),
            None => Err(engine_error!(
                names::UNSUPPORTED_OUTPUT_FORMAT,
                "no encoder for {format}"
            )
            .into()),
        }
    }

    /// Encodes `image` into the sink, returning the output specification and
    /// the number of bytes written.
    fn write_encoded(
        &self,
        image: &DynamicImage,
        options: &Options,
        sink: &mut EncodedImageSink<'_>,
    ) -> Result<(ImageSpecification, u64), EngineError> {
        let requirement = required_encoding(options)?;
        let configuration = self.configuration_for(options);
        let mut out = CountingWriter::new(sink.writer());
        let spec = self.encode_image(image, requirement, &configuration, &mut out)?;
        out.flush()?;
        let output = ImageSpecification::new(
            image_size(image.width(), image.height())?,
            ImageFormat::from(requirement.format().clone()),
            spec,
        );
        Ok((output, out.count))
    }
}

impl ImageEngine for RustEngine {
    fn name(&self) -> &str {
        "rust"
    }

    fn decode(
        &self,
        source: &mut EncodedImageSource<'_>,
        target: &mut BitmapTarget,
        options: &Options,
    ) -> Result<SpectrumResult, EngineError> {
        let data = read_source(source)?;
        let format = self.detect_format(&data)?;
        let input = self.probe(&data, &format)?;
        let rule = self.select_rule(&input.format, &ImageFormat::Bitmap, options)?;

        let configuration = self.configuration_for(options);
        let image = self.decode_image(&format, &data)?;
        let image = apply_transformations(
            image,
            &options.transformations,
            input.orientation,
            &configuration,
        )?;
        let spec = options.output_pixel_specification.unwrap_or_default();
        let bitmap = pixels::to_bitmap(&image, spec)?;
        let output = bitmap_specification(&bitmap);
        target.set(bitmap)?;

        Ok(SpectrumResult::new(
            rule.name.clone(),
            Some(input),
            Some(output),
            data.len() as u64,
            0,
        ))
    }

    fn encode(
        &self,
        bitmap: &Bitmap,
        sink: &mut EncodedImageSink<'_>,
        options: &Options,
    ) -> Result<SpectrumResult, EngineError> {
        let requirement = required_encoding(options)?;
        let output_format = ImageFormat::from(requirement.format().clone());
        let rule = self.select_rule(&ImageFormat::Bitmap, &output_format, options)?;

        let input = bitmap_specification(bitmap);
        let image = pixels::from_bitmap(bitmap)?;
        let image = apply_transformations(
            image,
            &options.transformations,
            input.orientation,
            &self.configuration_for(options),
        )?;
        let (output, written) = self.write_encoded(&image, options, sink)?;

        Ok(SpectrumResult::new(rule.name.clone(), Some(input), Some(output), 0, written))
    }

    fn transcode(
        &self,
        source: &mut EncodedImageSource<'_>,
        sink: &mut EncodedImageSink<'_>,
        options: &Options,
    ) -> Result<SpectrumResult, EngineError> {
        let data = read_source(source)?;
        let format = self.detect_format(&data)?;
        let input = self.probe(&data, &format)?;
        let requirement = required_encoding(options)?;
        let output_format = ImageFormat::from(requirement.format().clone());
        let rule = self.select_rule(&input.format, &output_format, options)?;

        if rule.is_passthrough {
            let mut out = CountingWriter::new(sink.writer());
            out.write_all(&data)?;
            out.flush()?;
            return Ok(SpectrumResult::new(
                rule.name.clone(),
                Some(input.clone()),
                Some(input),
                data.len() as u64,
                out.count,
            ));
        }

        let image = self.decode_image(&format, &data)?;
        let image = apply_transformations(
            image,
            &options.transformations,
            input.orientation,
            &self.configuration_for(options),
        )?;
        let (output, written) = self.write_encoded(&image, options, sink)?;

        Ok(SpectrumResult::new(
            rule.name.clone(),
            Some(input),
            Some(output),
            data.len() as u64,
            written,
        ))
    }

    fn transform(
        &self,
        bitmap: &Bitmap,
        target: &mut BitmapTarget,
        options: &Options,
    ) -> Result<SpectrumResult, EngineError> {
        let rule = self.select_rule(&ImageFormat::Bitmap, &ImageFormat::Bitmap, options)?;

        let input = bitmap_specification(bitmap);
        let image = pixels::from_bitmap(bitmap)?;
        let image = apply_transformations(
            image,
            &options.transformations,
            input.orientation,
            &self.configuration_for(options),
        )?;
        let spec = options
            .output_pixel_specification
            .unwrap_or(bitmap.pixel_specification());
        let output_bitmap = pixels::to_bitmap(&image, spec)?;
        let output = bitmap_specification(&output_bitmap);
        target.set(output_bitmap)?;

        Ok(SpectrumResult::new(rule.name.clone(), Some(input), Some(output), 0, 0))
    }
}

/// Counts the bytes passing through to the wrapped writer.
struct CountingWriter<'a, W: ?Sized> {
    inner: &'a mut W,
    count: u64,
}

impl<'a, W: Write + ?Sized> CountingWriter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write + ?Sized> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn read_source(source: &mut EncodedImageSource<'_>) -> Result<Vec<u8>, EngineError> {
    let mut data = Vec::new();
    source.reader().read_to_end(&mut data)?;
    if data.is_empty() {
        return Err(engine_error!(names::EMPTY_INPUT_SOURCE, "input source is empty").into());
    }
    Ok(data)
}

fn required_encoding(options: &Options) -> Result<&EncodeRequirement, SpectrumError> {
    options.encode_requirement.as_ref().ok_or_else(|| {
        engine_error!(
            names::UNSUPPORTED_OUTPUT_FORMAT,
            "operation has no encode requirement"
        )
    })
}

fn codec_failure(context: &str, error: image::ImageError) -> SpectrumError {
    engine_error!(names::CODEC_FAILURE, "{context}: {error}").caused_by(error)
}

fn image_size(width: u32, height: u32) -> Result<ImageSize, SpectrumError> {
    ImageSize::new(width, height).map_err(|e| engine_error!(names::CODEC_FAILURE, "{e}"))
}

fn ensure_mode(
    format: &EncodedImageFormat,
    requested: EncodeMode,
    unsupported: EncodeMode,
) -> Result<(), SpectrumError> {
    if requested == unsupported {
        return Err(engine_error!(
            names::UNSUPPORTED_OUTPUT_FORMAT,
            "{format} cannot be encoded in {requested:?} mode"
        ));
    }
    Ok(())
}

fn pixel_specification_for(has_color: bool, has_alpha: bool) -> ImagePixelSpecification {
    match (has_color, has_alpha) {
        (true, true) => ImagePixelSpecification::Rgba,
        (true, false) => ImagePixelSpecification::Rgb,
        (false, true) => ImagePixelSpecification::GrayA,
        (false, false) => ImagePixelSpecification::Gray,
    }
}

fn bitmap_specification(bitmap: &Bitmap) -> ImageSpecification {
    ImageSpecification::new(bitmap.size(), ImageFormat::Bitmap, bitmap.pixel_specification())
}

/// Narrows any image to one of the four 8-bit layouts the encoders take.
fn to_8bit(image: &DynamicImage) -> (DynamicImage, ImagePixelSpecification) {
    let color = image.color();
    let spec = pixel_specification_for(color.has_color(), color.has_alpha());
    let converted = match spec {
        ImagePixelSpecification::Rgba => DynamicImage::ImageRgba8(image.to_rgba8()),
        ImagePixelSpecification::Rgb => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImagePixelSpecification::GrayA => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        _ => DynamicImage::ImageLuma8(image.to_luma8()),
    };
    (converted, spec)
}

/// Composites the image over `background`, dropping alpha.
fn flatten_alpha(image: &DynamicImage, background: ImageColor) -> RgbImage {
    let rgba = image.to_rgba8();
    let bg = [background.red, background.green, background.blue];
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8, back: u8| {
            let (c, back, a) = (u32::from(c), u32::from(back), u32::from(a));
            ((c * a + back * (255 - a) + 127) / 255) as u8
        };
        image::Rgb([blend(r, bg[0]), blend(g, bg[1]), blend(b, bg[2])])
    })
}

/// zlib level 0..=9 to the `image` crate's presets.
fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn resize_filter(method: SamplingMethod) -> FilterType {
    match method {
        SamplingMethod::Bicubic => FilterType::CatmullRom,
        SamplingMethod::MagicKernel => FilterType::Lanczos3,
    }
}

/// Transforms stored pixels so they display upright.
fn apply_orientation(image: DynamicImage, orientation: ImageOrientation) -> DynamicImage {
    match orientation {
        ImageOrientation::Up => image,
        ImageOrientation::UpMirrored => image.fliph(),
        ImageOrientation::Bottom => image.rotate180(),
        ImageOrientation::BottomMirrored => image.flipv(),
        ImageOrientation::LeftMirrored => image.rotate90().fliph(),
        ImageOrientation::Right => image.rotate90(),
        ImageOrientation::RightMirrored => image.rotate270().fliph(),
        ImageOrientation::Left => image.rotate270(),
    }
}

/// Applies crop, then resize, then rotation and flips.
fn apply_transformations(
    mut image: DynamicImage,
    transformations: &Transformations,
    orientation: ImageOrientation,
    configuration: &Configuration,
) -> Result<DynamicImage, SpectrumError> {
    if let Some(crop) = &transformations.crop {
        let rect = calculate_crop_rect((image.width(), image.height()), crop)?;
        image = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    }

    if let Some(resize) = &transformations.resize {
        let target = resize.target_size();
        let (width, height) = calculate_resize_dimensions(
            (image.width(), image.height()),
            resize.mode(),
            (target.width(), target.height()),
        );
        if (width, height) != (image.width(), image.height()) {
            let filter = resize_filter(configuration.effective_sampling_method());
            image = image.resize_exact(width, height, filter);
        }
    }

    if let Some(rotate) = &transformations.rotate {
        if rotate.force_up_orientation {
            image = apply_orientation(image, orientation);
        }
        image = match rotate.sanitised_degrees() {
            0 => image,
            90 => image.rotate90(),
            180 => image.rotate180(),
            270 => image.rotate270(),
            other => {
                return Err(engine_error!(
                    names::NO_MATCHING_RULE,
                    "rotation of {other} degrees is not a multiple of 90"
                ));
            }
        };
        if rotate.flip_horizontally {
            image = image.fliph();
        }
        if rotate.flip_vertically {
            image = image.flipv();
        }
    }

    Ok(image)
}
