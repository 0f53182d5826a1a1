//! In-memory pixel layouts.
//!
//! A layout is described by four attributes (color model, bytes per pixel,
//! alpha placement, component order). Only nine combinations are valid; they
//! are the variants of [`ImagePixelSpecification`]. Building a specification
//! from attributes and reading the attributes back is a total round trip.

use super::wire_code_enum;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Components of a color model and how they are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColorModel {
    Rgb,
    Gray,
    Cmyk,
    YCbCr,
    YCbCrK,
}

impl ColorModel {
    pub const ALL: &'static [ColorModel] = &[
        ColorModel::Rgb,
        ColorModel::Gray,
        ColorModel::Cmyk,
        ColorModel::YCbCr,
        ColorModel::YCbCrK,
    ];

    pub fn identifier(self) -> &'static str {
        match self {
            ColorModel::Rgb => "rgb",
            ColorModel::Gray => "gray",
            ColorModel::Cmyk => "cmyk",
            ColorModel::YCbCr => "ycbcr",
            ColorModel::YCbCrK => "ycbcrk",
        }
    }

    /// Number of color components, alpha excluded.
    pub fn color_components(self) -> u8 {
        match self {
            ColorModel::Gray => 1,
            ColorModel::Rgb | ColorModel::YCbCr => 3,
            ColorModel::Cmyk | ColorModel::YCbCrK => 4,
        }
    }

    pub fn supports_extra_alpha_channel(self) -> bool {
        matches!(self, ColorModel::Rgb | ColorModel::Gray)
    }
}

impl TryFrom<&str> for ColorModel {
    type Error = ValidationError;

    fn try_from(identifier: &str) -> Result<Self, Self::Error> {
        ColorModel::ALL
            .iter()
            .copied()
            .find(|model| model.identifier() == identifier)
            .ok_or_else(|| ValidationError::Unsupported {
                kind: "color model",
                value: identifier.to_string(),
            })
    }
}

impl TryFrom<String> for ColorModel {
    type Error = ValidationError;

    fn try_from(identifier: String) -> Result<Self, Self::Error> {
        ColorModel::try_from(identifier.as_str())
    }
}

impl From<ColorModel> for String {
    fn from(model: ColorModel) -> String {
        model.identifier().to_string()
    }
}

wire_code_enum! {
    /// Placement and meaning of an optional alpha channel.
    pub enum AlphaInfo as "alpha info" {
        None = 0,
        First = 1,
        Last = 2,
        SkipFirst = 3,
        SkipLast = 4,
        PremultipliedFirst = 5,
        PremultipliedLast = 6,
    }
}

impl AlphaInfo {
    pub fn has_alpha(self) -> bool {
        !matches!(self, AlphaInfo::None)
    }
}

wire_code_enum! {
    /// Memory order of the components, e.g. BGR instead of RGB.
    pub enum ComponentsOrder as "components order" {
        Natural = 0,
        Reversed = 1,
    }
}

/// A single byte of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Gray,
    Alpha,
}

/// The supported in-memory pixel layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PixelAttributes", into = "PixelAttributes")]
pub enum ImagePixelSpecification {
    Rgb,
    Rgba,
    Gray,
    GrayA,
    AGray,
    Argb,
    Bgr,
    Bgra,
    Abgr,
}

/// The attribute tuple of a pixel specification, as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelAttributes {
    pub color_model: ColorModel,
    pub bytes_per_pixel: u8,
    pub alpha_info: AlphaInfo,
    pub components_order: ComponentsOrder,
}

impl ImagePixelSpecification {
    pub const ALL: &'static [ImagePixelSpecification] = &[
        ImagePixelSpecification::Rgb,
        ImagePixelSpecification::Rgba,
        ImagePixelSpecification::Gray,
        ImagePixelSpecification::GrayA,
        ImagePixelSpecification::AGray,
        ImagePixelSpecification::Argb,
        ImagePixelSpecification::Bgr,
        ImagePixelSpecification::Bgra,
        ImagePixelSpecification::Abgr,
    ];

    pub fn attributes(self) -> PixelAttributes {
        use AlphaInfo as A;
        use ColorModel as M;
        use ComponentsOrder as O;
        let (color_model, bytes_per_pixel, alpha_info, components_order) = match self {
            Self::Rgb => (M::Rgb, 3, A::None, O::Natural),
            Self::Rgba => (M::Rgb, 4, A::Last, O::Natural),
            Self::Gray => (M::Gray, 1, A::None, O::Natural),
            Self::GrayA => (M::Gray, 2, A::Last, O::Natural),
            Self::AGray => (M::Gray, 2, A::First, O::Natural),
            Self::Argb => (M::Rgb, 4, A::First, O::Natural),
            Self::Bgr => (M::Rgb, 3, A::None, O::Reversed),
            Self::Bgra => (M::Rgb, 4, A::First, O::Reversed),
            Self::Abgr => (M::Rgb, 4, A::Last, O::Reversed),
        };
        PixelAttributes {
            color_model,
            bytes_per_pixel,
            alpha_info,
            components_order,
        }
    }

    /// Finds the specification matching all four attributes.
    pub fn from_attributes(attributes: PixelAttributes) -> Result<Self, ValidationError> {
        Self::ALL
            .iter()
            .copied()
            .find(|spec| spec.attributes() == attributes)
            .ok_or_else(|| ValidationError::Unsupported {
                kind: "pixel specification",
                value: format!("{attributes:?}"),
            })
    }

    pub fn color_model(self) -> ColorModel {
        self.attributes().color_model
    }

    pub fn bytes_per_pixel(self) -> usize {
        usize::from(self.attributes().bytes_per_pixel)
    }

    pub fn alpha_info(self) -> AlphaInfo {
        self.attributes().alpha_info
    }

    pub fn components_order(self) -> ComponentsOrder {
        self.attributes().components_order
    }

    pub fn has_alpha(self) -> bool {
        self.alpha_info().has_alpha()
    }

    /// Byte layout of one pixel: the natural component order with alpha at its
    /// position, reversed as a whole for [`ComponentsOrder::Reversed`].
    pub fn channels(self) -> Vec<Channel> {
        let attributes = self.attributes();
        let colors: &[Channel] = match attributes.color_model {
            ColorModel::Gray => &[Channel::Gray],
            _ => &[Channel::Red, Channel::Green, Channel::Blue],
        };
        let mut layout = Vec::with_capacity(self.bytes_per_pixel());
        if matches!(attributes.alpha_info, AlphaInfo::First) {
            layout.push(Channel::Alpha);
        }
        layout.extend_from_slice(colors);
        if matches!(attributes.alpha_info, AlphaInfo::Last) {
            layout.push(Channel::Alpha);
        }
        if attributes.components_order == ComponentsOrder::Reversed {
            layout.reverse();
        }
        layout
    }
}

impl Default for ImagePixelSpecification {
    fn default() -> Self {
        Self::Rgba
    }
}

impl TryFrom<PixelAttributes> for ImagePixelSpecification {
    type Error = ValidationError;

    fn try_from(attributes: PixelAttributes) -> Result<Self, Self::Error> {
        Self::from_attributes(attributes)
    }
}

impl From<ImagePixelSpecification> for PixelAttributes {
    fn from(spec: ImagePixelSpecification) -> Self {
        spec.attributes()
    }
}

impl std::str::FromStr for ImagePixelSpecification {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rgb" => Ok(Self::Rgb),
            "rgba" => Ok(Self::Rgba),
            "gray" => Ok(Self::Gray),
            "gray_a" => Ok(Self::GrayA),
            "a_gray" => Ok(Self::AGray),
            "argb" => Ok(Self::Argb),
            "bgr" => Ok(Self::Bgr),
            "bgra" => Ok(Self::Bgra),
            "abgr" => Ok(Self::Abgr),
            other => Err(ValidationError::Unsupported {
                kind: "pixel specification",
                value: other.to_string(),
            }),
        }
    }
}
