//! Immutable value types describing images.
//!
//! Every type here is validated when it is constructed and never mutates
//! afterwards. Enumerations that cross the engine boundary carry a numeric wire
//! code; parsing an unknown code is a [`ValidationError`], never a panic.
//!
//! | Type | Wire form |
//! |---|---|
//! | [`ImageSize`] | `{"width": u32, "height": u32}`, both in `[0, 65536]` |
//! | [`ImageColor`] | `{"red": u8, "green": u8, "blue": u8}` |
//! | [`ImageOrientation`] | EXIF code `1..=8` |
//! | [`ImageChromaSamplingMode`] | `0..=4` |
//! | [`ImagePixelSpecification`] | color model identifier, bytes per pixel, alpha code, order code |
//! | [`ImageFormat`] | `{"identifier": "...", "encoded": bool}` |
//! | [`ImageSpecification`] | all of the above plus [`ImageMetadata`] |

use crate::error::ValidationError;

mod format;
mod pixel;
mod size;
mod specification;

pub use format::{EncodedImageFormat, ImageFormat};
pub use pixel::{
    AlphaInfo, Channel, ColorModel, ComponentsOrder, ImagePixelSpecification, PixelAttributes,
};
pub use size::{ImageColor, ImageSize};
pub use specification::{ImageMetadata, ImageSpecification};

/// Declares a closed enumeration with a `u8` wire code.
///
/// Generates `TryFrom<u8>` (unknown codes are a [`ValidationError`]),
/// `From<Enum> for u8` and serde support through those conversions.
macro_rules! wire_code_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident as $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $code,)+
        }

        impl $name {
            /// All variants, in wire-code order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// The numeric wire code.
            pub fn code(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = $crate::error::ValidationError;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err($crate::error::ValidationError::unknown_code($kind, other)),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.code()
            }
        }
    };
}
pub(crate) use wire_code_enum;

wire_code_enum! {
    /// EXIF orientation: how the stored pixels must be transformed to reach the
    /// intended representation.
    pub enum ImageOrientation as "orientation" {
        Up = 1,
        UpMirrored = 2,
        Bottom = 3,
        BottomMirrored = 4,
        LeftMirrored = 5,
        Right = 6,
        RightMirrored = 7,
        Left = 8,
    }
}

impl Default for ImageOrientation {
    fn default() -> Self {
        Self::Up
    }
}

wire_code_enum! {
    /// Ratio of luma to chroma samples kept by an encoded format.
    pub enum ImageChromaSamplingMode as "chroma sampling mode" {
        /// 4:4:4, luma and chroma at the same resolution.
        S444 = 0,
        /// 4:2:0, one chroma sample per 2x2 luma block.
        S420 = 1,
        /// 4:2:2, one chroma sample per two horizontal luma samples.
        S422 = 2,
        /// 4:1:1, one chroma sample per four horizontal luma samples.
        S411 = 3,
        /// 4:4:0, one chroma sample per two vertical luma samples.
        S440 = 4,
    }
}

/// Checks `value` against the inclusive range `[min, max]`.
pub(crate) fn ensure_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::out_of_range(field, value, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_codes_round_trip() {
        for &orientation in ImageOrientation::ALL {
            assert_eq!(ImageOrientation::try_from(orientation.code()), Ok(orientation));
        }
        assert_eq!(ImageOrientation::Left.code(), 8);
        assert_eq!(ImageOrientation::default(), ImageOrientation::Up);
    }

    #[test]
    fn orientation_rejects_codes_outside_exif_range() {
        assert!(ImageOrientation::try_from(0).is_err());
        assert!(matches!(
            ImageOrientation::try_from(9),
            Err(ValidationError::UnknownCode { code: 9, .. })
        ));
    }

    #[test]
    fn chroma_sampling_codes() {
        assert_eq!(ImageChromaSamplingMode::ALL.len(), 5);
        assert_eq!(ImageChromaSamplingMode::try_from(1), Ok(ImageChromaSamplingMode::S420));
        assert!(ImageChromaSamplingMode::try_from(5).is_err());
    }

    #[test]
    fn wire_enums_serialize_as_codes() {
        let json = serde_json::to_string(&ImageOrientation::Right).unwrap();
        assert_eq!(json, "6");
        let parsed: ImageChromaSamplingMode = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, ImageChromaSamplingMode::S440);
        assert!(serde_json::from_str::<ImageOrientation>("12").is_err());
    }
}
