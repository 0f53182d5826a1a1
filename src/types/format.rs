use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

const BITMAP_IDENTIFIER: &str = "bitmap";

/// An encoded (compressed, container) image format such as JPEG.
///
/// Identified by a lowercase string so plugins can introduce formats the
/// crate does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedImageFormat(Cow<'static, str>);

impl EncodedImageFormat {
    pub const JPEG: EncodedImageFormat = EncodedImageFormat(Cow::Borrowed("jpeg"));
    pub const PNG: EncodedImageFormat = EncodedImageFormat(Cow::Borrowed("png"));
    pub const WEBP: EncodedImageFormat = EncodedImageFormat(Cow::Borrowed("webp"));
    pub const GIF: EncodedImageFormat = EncodedImageFormat(Cow::Borrowed("gif"));
    pub const HEIF: EncodedImageFormat = EncodedImageFormat(Cow::Borrowed("heif"));

    /// Creates a format from its identifier. The identifier is lowercased;
    /// empty identifiers and the raw `bitmap` sentinel are rejected.
    pub fn new(identifier: impl AsRef<str>) -> Result<Self, ValidationError> {
        let identifier = identifier.as_ref().trim().to_ascii_lowercase();
        if identifier.is_empty() || identifier == BITMAP_IDENTIFIER {
            return Err(ValidationError::Unsupported {
                kind: "encoded image format",
                value: identifier,
            });
        }
        Ok(match identifier.as_str() {
            "jpeg" | "jpg" => Self::JPEG,
            "png" => Self::PNG,
            "webp" => Self::WEBP,
            "gif" => Self::GIF,
            "heif" | "heic" => Self::HEIF,
            _ => Self(Cow::Owned(identifier)),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncodedImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for EncodedImageFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for EncodedImageFormat {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ImageFormat::Encoded(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EncodedImageFormat {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ImageFormat::deserialize(deserializer)? {
            ImageFormat::Encoded(format) => Ok(format),
            ImageFormat::Bitmap => Err(serde::de::Error::custom(
                "expected an encoded image format, got bitmap",
            )),
        }
    }
}

/// Either raw pixel data or an encoded format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FormatRecord", into = "FormatRecord")]
pub enum ImageFormat {
    /// Uncompressed, contiguous pixel data.
    Bitmap,
    Encoded(EncodedImageFormat),
}

#[derive(Serialize, Deserialize)]
struct FormatRecord {
    identifier: String,
    encoded: bool,
}

impl ImageFormat {
    pub fn identifier(&self) -> &str {
        match self {
            ImageFormat::Bitmap => BITMAP_IDENTIFIER,
            ImageFormat::Encoded(format) => format.identifier(),
        }
    }

    pub fn is_encoded(&self) -> bool {
        matches!(self, ImageFormat::Encoded(_))
    }

    pub fn as_encoded(&self) -> Option<&EncodedImageFormat> {
        match self {
            ImageFormat::Encoded(format) => Some(format),
            ImageFormat::Bitmap => None,
        }
    }

    /// Parses an identifier: `bitmap` is the raw format, anything else encoded.
    pub fn from_identifier(identifier: &str) -> Result<Self, ValidationError> {
        if identifier.eq_ignore_ascii_case(BITMAP_IDENTIFIER) {
            Ok(ImageFormat::Bitmap)
        } else {
            EncodedImageFormat::new(identifier).map(ImageFormat::Encoded)
        }
    }
}

impl From<EncodedImageFormat> for ImageFormat {
    fn from(format: EncodedImageFormat) -> Self {
        ImageFormat::Encoded(format)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl TryFrom<FormatRecord> for ImageFormat {
    type Error = ValidationError;

    fn try_from(record: FormatRecord) -> Result<Self, Self::Error> {
        match (record.encoded, record.identifier.as_str()) {
            (false, BITMAP_IDENTIFIER) => Ok(ImageFormat::Bitmap),
            (true, identifier) => EncodedImageFormat::new(identifier).map(ImageFormat::Encoded),
            (false, other) => Err(ValidationError::Unsupported {
                kind: "raw image format",
                value: other.to_string(),
            }),
        }
    }
}

impl From<ImageFormat> for FormatRecord {
    fn from(format: ImageFormat) -> Self {
        FormatRecord {
            identifier: format.identifier().to_string(),
            encoded: format.is_encoded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_identifiers_map_to_constants() {
        assert_eq!(EncodedImageFormat::new("JPG").unwrap(), EncodedImageFormat::JPEG);
        assert_eq!(EncodedImageFormat::new("webp").unwrap(), EncodedImageFormat::WEBP);
        assert_eq!(EncodedImageFormat::new("avif").unwrap().identifier(), "avif");
    }

    #[test]
    fn encoded_format_rejects_bitmap_and_empty() {
        assert!(EncodedImageFormat::new("bitmap").is_err());
        assert!(EncodedImageFormat::new("  ").is_err());
    }

    #[test]
    fn bitmap_is_not_encoded() {
        assert!(!ImageFormat::Bitmap.is_encoded());
        assert!(ImageFormat::from(EncodedImageFormat::PNG).is_encoded());
        assert_eq!(ImageFormat::Bitmap.identifier(), "bitmap");
        assert_eq!(ImageFormat::from_identifier("Bitmap").unwrap(), ImageFormat::Bitmap);
    }

    #[test]
    fn wire_form_carries_encoded_flag() {
        let json = serde_json::to_value(ImageFormat::from(EncodedImageFormat::GIF)).unwrap();
        assert_eq!(json, serde_json::json!({"identifier": "gif", "encoded": true}));
        let bitmap: ImageFormat =
            serde_json::from_value(serde_json::json!({"identifier": "bitmap", "encoded": false}))
                .unwrap();
        assert_eq!(bitmap, ImageFormat::Bitmap);
        assert!(
            serde_json::from_value::<ImageFormat>(
                serde_json::json!({"identifier": "jpeg", "encoded": false})
            )
            .is_err()
        );
    }

    #[test]
    fn encoded_format_refuses_bitmap_on_the_wire() {
        let json = serde_json::json!({"identifier": "bitmap", "encoded": false});
        assert!(serde_json::from_value::<EncodedImageFormat>(json).is_err());
    }
}
