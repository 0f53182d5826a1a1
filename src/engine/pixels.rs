//! Conversion between `image::DynamicImage` and [`Bitmap`] layouts.
//!
//! Every layout is 8 bits per channel. Colour layouts go through RGBA, gray
//! layouts through luma + alpha, and the bytes of each pixel are then written
//! in the order [`ImagePixelSpecification::channels`] dictates.

use crate::error::{SpectrumError, engine_error, names};
use crate::io::Bitmap;
use crate::types::{Channel, ColorModel, ImagePixelSpecification, ImageSize};
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

/// Slot of a channel inside an `[r, g, b, a]` (or `[l, l, l, a]`) pixel.
fn slot(channel: Channel) -> usize {
    match channel {
        Channel::Red | Channel::Gray => 0,
        Channel::Green => 1,
        Channel::Blue => 2,
        Channel::Alpha => 3,
    }
}

/// Lays out `image` as `spec` pixels.
pub fn to_bitmap(
    image: &DynamicImage,
    spec: ImagePixelSpecification,
) -> Result<Bitmap, SpectrumError> {
    let size = ImageSize::new(image.width(), image.height())
        .map_err(|e| engine_error!(names::INVALID_BITMAP, "decoded image too large: {e}"))?;
    let channels = spec.channels();
    let mut pixels = Vec::with_capacity(size.pixel_count() * channels.len());

    if spec.color_model() == ColorModel::Gray {
        for px in image.to_luma_alpha8().pixels() {
            let [l, a] = px.0;
            let quad = [l, l, l, a];
            pixels.extend(channels.iter().map(|&c| quad[slot(c)]));
        }
    } else {
        for px in image.to_rgba8().pixels() {
            pixels.extend(channels.iter().map(|&c| px.0[slot(c)]));
        }
    }

    Bitmap::new(size, spec, pixels).map_err(|e| engine_error!(names::INVALID_BITMAP, "{e}"))
}

/// Reads a bitmap back into an image, keeping alpha only when the layout has it.
pub fn from_bitmap(bitmap: &Bitmap) -> Result<DynamicImage, SpectrumError> {
    let spec = bitmap.pixel_specification();
    let channels = spec.channels();
    let (width, height) = (bitmap.size().width(), bitmap.size().height());

    let quads = bitmap.pixels().chunks_exact(channels.len()).map(|px| {
        let mut quad = [0u8, 0, 0, u8::MAX];
        for (&channel, &value) in channels.iter().zip(px) {
            if channel == Channel::Gray {
                quad[..3].fill(value);
            } else {
                quad[slot(channel)] = value;
            }
        }
        quad
    });

    let image = match (spec.color_model(), spec.has_alpha()) {
        (ColorModel::Gray, false) => {
            let raw = quads.map(|q| q[0]).collect();
            GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8)
        }
        (ColorModel::Gray, true) => {
            let raw = quads.flat_map(|q| [q[0], q[3]]).collect();
            GrayAlphaImage::from_raw(width, height, raw).map(DynamicImage::ImageLumaA8)
        }
        (_, false) => {
            let raw = quads.flat_map(|q| [q[0], q[1], q[2]]).collect();
            RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8)
        }
        (_, true) => {
            let raw = quads.flatten().collect();
            RgbaImage::from_raw(width, height, raw).map(DynamicImage::ImageRgba8)
        }
    };

    image.ok_or_else(|| {
        engine_error!(
            names::INVALID_BITMAP,
            "bitmap of {} bytes does not fill {}x{} {:?}",
            bitmap.pixels().len(),
            width,
            height,
            spec
        )
    })
}
