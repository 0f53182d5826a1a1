use super::{ImageChromaSamplingMode, ImageFormat, ImageOrientation, ImagePixelSpecification, ImageSize};
use serde::{Deserialize, Serialize};

/// Image metadata carried alongside an operation.
///
/// Opaque and currently without payload: any two instances compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageMetadata {}

impl ImageMetadata {
    pub fn new() -> Self {
        Self {}
    }
}

/// Full description of an image, as reported for an operation's input and
/// output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSpecification {
    pub size: ImageSize,
    pub format: ImageFormat,
    pub pixel_specification: ImagePixelSpecification,
    #[serde(default)]
    pub orientation: ImageOrientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroma_sampling_mode: Option<ImageChromaSamplingMode>,
    #[serde(default)]
    pub metadata: ImageMetadata,
}

impl ImageSpecification {
    /// Specification with upright orientation, no chroma mode and empty
    /// metadata.
    pub fn new(
        size: ImageSize,
        format: ImageFormat,
        pixel_specification: ImagePixelSpecification,
    ) -> Self {
        Self {
            size,
            format,
            pixel_specification,
            orientation: ImageOrientation::Up,
            chroma_sampling_mode: None,
            metadata: ImageMetadata::new(),
        }
    }

    pub fn with_orientation(mut self, orientation: ImageOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_chroma_sampling_mode(mut self, mode: ImageChromaSamplingMode) -> Self {
        self.chroma_sampling_mode = Some(mode);
        self
    }
}
