//! Operation options.
//!
//! [`Options`] is the common shape every operation carries. Four wrappers
//! narrow it to what a single operation needs:
//!
//! | Type | Always carries | Never carries |
//! |---|---|---|
//! | [`DecodeOptions`] | output pixel specification (default RGBA) | encode requirement |
//! | [`EncodeOptions`] | encode requirement | |
//! | [`TranscodeOptions`] | encode requirement | |
//! | [`TransformOptions`] | output pixel specification (default RGBA) | encode requirement |
//!
//! Each is built through a builder. Setters take already-validated values
//! (requirements validate themselves on construction); `build()` only
//! assembles. Whether the engine can honour a combination, e.g. a pixel
//! specification a format cannot hold, is decided at execution time.
//!
//! Equality is structural and survives the wire: deserializing a serialized
//! options value yields an equal value, and the per-type shape is re-checked.

use crate::config::Configuration;
use crate::error::ValidationError;
use crate::requirements::{
    CropRequirement, EncodeRequirement, ResizeMode, ResizeRequirement, RotateRequirement,
};
use crate::types::{ImageMetadata, ImagePixelSpecification, ImageSize};
use serde::{Deserialize, Serialize};

/// Requested geometric changes, applied as crop → resize → rotate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Transformations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate: Option<RotateRequirement>,
}

impl Transformations {
    pub fn is_empty(&self) -> bool {
        self.resize.is_none() && self.crop.is_none() && self.rotate.is_none()
    }
}

/// The options common to all operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encode_requirement: Option<EncodeRequirement>,
    #[serde(skip_serializing_if = "Transformations::is_empty")]
    pub transformations: Transformations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImageMetadata>,
    /// Per-operation override of the engine's global configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Configuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_pixel_specification: Option<ImagePixelSpecification>,
}

impl Options {
    fn require_pixel_specification(mut self, kind: &'static str) -> Result<Self, ValidationError> {
        if self.encode_requirement.is_some() {
            return Err(ValidationError::Unsupported {
                kind,
                value: "options must not carry an encode requirement".to_string(),
            });
        }
        self.output_pixel_specification
            .get_or_insert_with(ImagePixelSpecification::default);
        Ok(self)
    }

    fn split_encode_requirement(
        mut self,
        kind: &'static str,
    ) -> Result<(EncodeRequirement, Self), ValidationError> {
        match self.encode_requirement.take() {
            Some(requirement) => Ok((requirement, self)),
            None => Err(ValidationError::Unsupported {
                kind,
                value: "options must carry an encode requirement".to_string(),
            }),
        }
    }
}

/// Builder state shared by the four option builders.
#[derive(Debug, Clone, Default)]
struct Parts {
    resize: Option<ResizeRequirement>,
    crop: Option<CropRequirement>,
    rotate: Option<RotateRequirement>,
    metadata: Option<ImageMetadata>,
    configuration: Option<Configuration>,
}

impl Parts {
    fn into_options(
        self,
        encode_requirement: Option<EncodeRequirement>,
        output_pixel_specification: Option<ImagePixelSpecification>,
    ) -> Options {
        Options {
            encode_requirement,
            transformations: Transformations {
                resize: self.resize,
                crop: self.crop,
                rotate: self.rotate,
            },
            metadata: self.metadata,
            configuration: self.configuration,
            output_pixel_specification,
        }
    }
}

/// Setters every builder has.
macro_rules! common_setters {
    () => {
        pub fn resize(mut self, resize: ResizeRequirement) -> Self {
            self.parts.resize = Some(resize);
            self
        }

        pub fn crop(mut self, crop: CropRequirement) -> Self {
            self.parts.crop = Some(crop);
            self
        }

        pub fn rotate(mut self, rotate: RotateRequirement) -> Self {
            self.parts.rotate = Some(rotate);
            self
        }

        /// Shorthand for [`resize`](Self::resize) with a new requirement.
        pub fn resize_to(self, mode: ResizeMode, size: ImageSize) -> Result<Self, ValidationError> {
            Ok(self.resize(ResizeRequirement::new(mode, size)?))
        }

        /// Shorthand for [`crop`](Self::crop) with pixel bounds.
        pub fn crop_absolute_to_origin(
            self,
            left: u32,
            top: u32,
            right: u32,
            bottom: u32,
            must_be_exact: bool,
        ) -> Result<Self, ValidationError> {
            Ok(self.crop(CropRequirement::absolute(left, top, right, bottom, must_be_exact)?))
        }

        pub fn rotate_by(
            self,
            degrees: i32,
            flip_horizontally: bool,
            flip_vertically: bool,
            force_up_orientation: bool,
        ) -> Self {
            self.rotate(RotateRequirement {
                degrees,
                flip_horizontally,
                flip_vertically,
                force_up_orientation,
            })
        }

        pub fn metadata(mut self, metadata: ImageMetadata) -> Self {
            self.parts.metadata = Some(metadata);
            self
        }

        /// Per-operation configuration override.
        pub fn configuration(mut self, configuration: Configuration) -> Self {
            self.parts.configuration = Some(configuration);
            self
        }
    };
}

/// Accessors every specialised options type has.
macro_rules! common_accessors {
    ($name:ident) => {
        impl $name {
            pub fn transformations(&self) -> &Transformations {
                &self.base.transformations
            }

            pub fn configuration(&self) -> Option<&Configuration> {
                self.base.configuration.as_ref()
            }

            pub fn metadata(&self) -> Option<&ImageMetadata> {
                self.base.metadata.as_ref()
            }
        }

        impl From<$name> for Options {
            fn from(value: $name) -> Options {
                value.to_options()
            }
        }
    };
}

/// Options for decoding an encoded image into a bitmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Options", into = "Options")]
pub struct DecodeOptions {
    base: Options,
}

common_accessors!(DecodeOptions);

impl DecodeOptions {
    pub fn builder() -> DecodeOptionsBuilder {
        DecodeOptionsBuilder::default()
    }

    pub fn output_pixel_specification(&self) -> ImagePixelSpecification {
        self.base.output_pixel_specification.unwrap_or_default()
    }

    pub fn to_options(&self) -> Options {
        self.base.clone()
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TryFrom<Options> for DecodeOptions {
    type Error = ValidationError;

    fn try_from(options: Options) -> Result<Self, Self::Error> {
        options
            .require_pixel_specification("decode options")
            .map(|base| Self { base })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodeOptionsBuilder {
    parts: Parts,
    output_pixel_specification: Option<ImagePixelSpecification>,
}

impl DecodeOptionsBuilder {
    common_setters!();

    pub fn output_pixel_specification(mut self, spec: ImagePixelSpecification) -> Self {
        self.output_pixel_specification = Some(spec);
        self
    }

    pub fn build(self) -> DecodeOptions {
        let spec = self.output_pixel_specification.unwrap_or_default();
        DecodeOptions {
            base: self.parts.into_options(None, Some(spec)),
        }
    }
}

/// Options for encoding a bitmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Options", into = "Options")]
pub struct EncodeOptions {
    encode_requirement: EncodeRequirement,
    base: Options,
}

common_accessors!(EncodeOptions);

impl EncodeOptions {
    pub fn builder(encode_requirement: EncodeRequirement) -> EncodeOptionsBuilder {
        EncodeOptionsBuilder {
            parts: Parts::default(),
            encode_requirement,
        }
    }

    pub fn to_options(&self) -> Options {
        Options {
            encode_requirement: Some(self.encode_requirement.clone()),
            ..self.base.clone()
        }
    }

    pub fn encode_requirement(&self) -> &EncodeRequirement {
        &self.encode_requirement
    }
}

impl TryFrom<Options> for EncodeOptions {
    type Error = ValidationError;

    fn try_from(options: Options) -> Result<Self, Self::Error> {
        options
            .split_encode_requirement("encode options")
            .map(|(encode_requirement, base)| Self {
                encode_requirement,
                base,
            })
    }
}

#[derive(Debug, Clone)]
pub struct EncodeOptionsBuilder {
    parts: Parts,
    encode_requirement: EncodeRequirement,
}

impl EncodeOptionsBuilder {
    common_setters!();

    pub fn build(self) -> EncodeOptions {
        EncodeOptions {
            encode_requirement: self.encode_requirement,
            base: self.parts.into_options(None, None),
        }
    }
}

/// Options for re-encoding an encoded image, optionally transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Options", into = "Options")]
pub struct TranscodeOptions {
    encode_requirement: EncodeRequirement,
    base: Options,
}

common_accessors!(TranscodeOptions);

impl TranscodeOptions {
    pub fn builder(encode_requirement: EncodeRequirement) -> TranscodeOptionsBuilder {
        TranscodeOptionsBuilder {
            parts: Parts::default(),
            encode_requirement,
        }
    }

    pub fn to_options(&self) -> Options {
        Options {
            encode_requirement: Some(self.encode_requirement.clone()),
            ..self.base.clone()
        }
    }

    pub fn encode_requirement(&self) -> &EncodeRequirement {
        &self.encode_requirement
    }
}

impl TryFrom<Options> for TranscodeOptions {
    type Error = ValidationError;

    fn try_from(options: Options) -> Result<Self, Self::Error> {
        options
            .split_encode_requirement("transcode options")
            .map(|(encode_requirement, base)| Self {
                encode_requirement,
                base,
            })
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeOptionsBuilder {
    parts: Parts,
    encode_requirement: EncodeRequirement,
}

impl TranscodeOptionsBuilder {
    common_setters!();

    pub fn build(self) -> TranscodeOptions {
        TranscodeOptions {
            encode_requirement: self.encode_requirement,
            base: self.parts.into_options(None, None),
        }
    }
}

/// Options for transforming a bitmap into another bitmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Options", into = "Options")]
pub struct TransformOptions {
    base: Options,
}

common_accessors!(TransformOptions);

impl TransformOptions {
    pub fn builder() -> TransformOptionsBuilder {
        TransformOptionsBuilder::default()
    }

    pub fn output_pixel_specification(&self) -> ImagePixelSpecification {
        self.base.output_pixel_specification.unwrap_or_default()
    }

    pub fn to_options(&self) -> Options {
        self.base.clone()
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TryFrom<Options> for TransformOptions {
    type Error = ValidationError;

    fn try_from(options: Options) -> Result<Self, Self::Error> {
        options
            .require_pixel_specification("transform options")
            .map(|base| Self { base })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformOptionsBuilder {
    parts: Parts,
    output_pixel_specification: Option<ImagePixelSpecification>,
}

impl TransformOptionsBuilder {
    common_setters!();

    pub fn output_pixel_specification(mut self, spec: ImagePixelSpecification) -> Self {
        self.output_pixel_specification = Some(spec);
        self
    }

    pub fn build(self) -> TransformOptions {
        let spec = self.output_pixel_specification.unwrap_or_default();
        TransformOptions {
            base: self.parts.into_options(None, Some(spec)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::EncodeMode;
    use crate::types::EncodedImageFormat;

    fn jpeg_lossy(quality: u32) -> EncodeRequirement {
        EncodeRequirement::new(EncodedImageFormat::JPEG, quality, EncodeMode::Lossy).unwrap()
    }

    fn resize(w: u32, h: u32) -> ResizeRequirement {
        ResizeRequirement::new(ResizeMode::Exact, ImageSize::new(w, h).unwrap()).unwrap()
    }

    #[test]
    fn decode_defaults_to_rgba() {
        let options = DecodeOptions::builder().build();
        assert_eq!(options.output_pixel_specification(), ImagePixelSpecification::Rgba);
        assert_eq!(
            options.to_options().output_pixel_specification,
            Some(ImagePixelSpecification::Rgba)
        );
        assert!(options.to_options().encode_requirement.is_none());
    }

    #[test]
    fn transform_keeps_chosen_pixel_specification() {
        let options = TransformOptions::builder()
            .output_pixel_specification(ImagePixelSpecification::Gray)
            .resize(resize(10, 10))
            .build();
        assert_eq!(options.output_pixel_specification(), ImagePixelSpecification::Gray);
        assert_eq!(options.transformations().resize, Some(resize(10, 10)));
    }

    #[test]
    fn transcode_carries_requirement_and_transformations() {
        let crop = CropRequirement::absolute(0, 0, 10, 10, true).unwrap();
        let options = TranscodeOptions::builder(jpeg_lossy(80))
            .crop(crop)
            .rotate(RotateRequirement::new(90))
            .build();
        assert_eq!(options.encode_requirement(), &jpeg_lossy(80));
        assert_eq!(options.transformations().crop, Some(crop));
        assert!(options.transformations().resize.is_none());
    }

    #[test]
    fn shorthand_setters_match_requirement_setters() {
        let shorthand = TranscodeOptions::builder(jpeg_lossy(70))
            .resize_to(ResizeMode::Exact, ImageSize::new(4, 4).unwrap())
            .unwrap()
            .crop_absolute_to_origin(1, 2, 30, 40, false)
            .unwrap()
            .rotate_by(270, true, false, true)
            .build();
        let mut rotate = RotateRequirement::new(270).with_flips(true, false);
        rotate.force_up_orientation = true;
        let explicit = TranscodeOptions::builder(jpeg_lossy(70))
            .resize(resize(4, 4))
            .crop(CropRequirement::absolute(1, 2, 30, 40, false).unwrap())
            .rotate(rotate)
            .build();
        assert_eq!(shorthand, explicit);
    }

    #[test]
    fn shorthand_setters_validate() {
        let zero = ImageSize::new(0, 0).unwrap();
        assert!(DecodeOptions::builder().resize_to(ResizeMode::Exact, zero).is_err());
        assert!(
            TransformOptions::builder()
                .crop_absolute_to_origin(10, 0, 10, 5, true)
                .is_err()
        );
    }

    #[test]
    fn options_equality_is_structural() {
        let a = EncodeOptions::builder(jpeg_lossy(42)).resize(resize(4, 4)).build();
        let b = EncodeOptions::builder(jpeg_lossy(42)).resize(resize(4, 4)).build();
        let c = EncodeOptions::builder(jpeg_lossy(43)).resize(resize(4, 4)).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn configuration_override_is_carried() {
        let graphics = Configuration::for_image_containing_graphics();
        let options = DecodeOptions::builder().configuration(graphics.clone()).build();
        assert_eq!(options.configuration(), Some(&graphics));
        assert_eq!(options.to_options().configuration, Some(graphics));
    }

    #[test]
    fn wire_shape_is_rechecked() {
        let decode = serde_json::to_value(DecodeOptions::default()).unwrap();
        let as_encode = serde_json::from_value::<EncodeOptions>(decode.clone());
        assert!(as_encode.is_err());
        assert_eq!(
            serde_json::from_value::<DecodeOptions>(decode).unwrap(),
            DecodeOptions::default()
        );

        let transcode = serde_json::to_value(TranscodeOptions::builder(jpeg_lossy(1)).build()).unwrap();
        assert!(serde_json::from_value::<TransformOptions>(transcode).is_err());
    }

    #[test]
    fn missing_pixel_specification_defaults_on_the_wire() {
        let options: TransformOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.output_pixel_specification(), ImagePixelSpecification::Rgba);
    }

    #[test]
    fn transformations_is_empty() {
        assert!(Transformations::default().is_empty());
        let with_rotate = Transformations {
            rotate: Some(RotateRequirement::new(180)),
            ..Transformations::default()
        };
        assert!(!with_rotate.is_empty());
    }
}
