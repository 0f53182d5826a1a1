//! Codec plugins.
//!
//! The reference engine decodes and encodes JPEG, PNG and WebP itself. Any
//! other encoded format is handled by the first registered plugin that
//! advertises it, and the facade's capability query reports the union of
//! both sets.

use crate::config::Configuration;
use crate::error::{EngineError, engine_error, names};
use crate::requirements::{EncodeMode, EncodeRequirement};
use crate::types::{EncodedImageFormat, ImageFormat, ImagePixelSpecification};
use image::DynamicImage;
use image::codecs::gif::{GifDecoder, GifEncoder};
use std::fmt;
use std::io::{Cursor, Write};
use std::sync::Arc;

/// Encoded formats available without any plugin.
pub const BUILTIN_FORMATS: &[EncodedImageFormat] = &[
    EncodedImageFormat::JPEG,
    EncodedImageFormat::PNG,
    EncodedImageFormat::WEBP,
];

/// Raw bitmaps, the built-in encoded formats and everything `plugins`
/// advertise, without duplicates.
pub fn supported_formats(plugins: &[Arc<dyn SpectrumPlugin>]) -> Vec<ImageFormat> {
    let mut formats = vec![ImageFormat::Bitmap];
    let advertised = plugins.iter().flat_map(|plugin| plugin.formats());
    for format in BUILTIN_FORMATS.iter().cloned().chain(advertised) {
        let format = ImageFormat::from(format);
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}

/// Whether `format` can be read or written given `plugins`.
pub fn is_format_supported(format: &ImageFormat, plugins: &[Arc<dyn SpectrumPlugin>]) -> bool {
    match format {
        ImageFormat::Bitmap => true,
        ImageFormat::Encoded(encoded) => {
            BUILTIN_FORMATS.contains(encoded) || plugins.iter().any(|p| p.supports(encoded))
        }
    }
}

/// A codec for one or more encoded formats.
pub trait SpectrumPlugin: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Encoded formats this plugin can decode and encode.
    fn formats(&self) -> Vec<EncodedImageFormat>;

    fn decode(&self, format: &EncodedImageFormat, data: &[u8]) -> Result<DynamicImage, EngineError>;

    /// Writes `image` to `out` and reports the pixel layout that was stored.
    fn encode(
        &self,
        image: &DynamicImage,
        requirement: &EncodeRequirement,
        configuration: &Configuration,
        out: &mut dyn Write,
    ) -> Result<ImagePixelSpecification, EngineError>;

    fn supports(&self, format: &EncodedImageFormat) -> bool {
        self.formats().contains(format)
    }
}

/// Single-frame GIF via `image::codecs::gif`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GifPlugin;

impl GifPlugin {
    /// Fastest quantiser setting accepted by the GIF encoder.
    const SPEED_FASTEST: i32 = 30;
    const SPEED_DEFAULT: i32 = 10;

    /// Higher quality maps to a slower, more accurate quantiser.
    fn speed_for_quality(requirement: &EncodeRequirement) -> i32 {
        if !requirement.has_quality() {
            return Self::SPEED_DEFAULT;
        }
        let quality = i32::from(requirement.quality());
        Self::SPEED_FASTEST - (quality - 1) * (Self::SPEED_FASTEST - 1) / 99
    }
}

impl SpectrumPlugin for GifPlugin {
    fn name(&self) -> &str {
        "gif"
    }

    fn formats(&self) -> Vec<EncodedImageFormat> {
        vec![EncodedImageFormat::GIF]
    }

    fn decode(
        &self,
        _format: &EncodedImageFormat,
        data: &[u8],
    ) -> Result<DynamicImage, EngineError> {
        let decoder = GifDecoder::new(Cursor::new(data)).map_err(EngineError::failed)?;
        DynamicImage::from_decoder(decoder).map_err(EngineError::failed)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        requirement: &EncodeRequirement,
        _configuration: &Configuration,
        out: &mut dyn Write,
    ) -> Result<ImagePixelSpecification, EngineError> {
        if requirement.mode() == EncodeMode::Lossless {
            return Err(engine_error!(
                names::UNSUPPORTED_OUTPUT_FORMAT,
                "gif cannot be encoded losslessly"
            )
            .into());
        }
        let mut encoder = GifEncoder::new_with_speed(out, Self::speed_for_quality(requirement));
        encoder
            .encode_frame(image::Frame::new(image.to_rgba8()))
            .map_err(EngineError::failed)?;
        Ok(ImagePixelSpecification::Rgba)
    }
}
