use super::ensure_range;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSize")]
pub struct ImageSize {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct RawSize {
    width: i64,
    height: i64,
}

impl ImageSize {
    /// Largest accepted value for either dimension.
    pub const MAX_DIMENSION: u32 = 65536;

    pub const EMPTY: ImageSize = ImageSize {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Result<Self, ValidationError> {
        Self::checked(i64::from(width), i64::from(height))
    }

    /// Validates signed dimensions, as they may arrive from the wire.
    pub fn checked(width: i64, height: i64) -> Result<Self, ValidationError> {
        let max = i64::from(Self::MAX_DIMENSION);
        ensure_range("width", width, 0, max)?;
        ensure_range("height", height, 0, max)?;
        Ok(Self {
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width and height swapped, as after a quarter turn.
    pub fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl TryFrom<RawSize> for ImageSize {
    type Error = ValidationError;

    fn try_from(raw: RawSize) -> Result<Self, Self::Error> {
        Self::checked(raw.width, raw.height)
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ImageColor {
    pub const WHITE: ImageColor = ImageColor::new(255, 255, 255);
    pub const BLACK: ImageColor = ImageColor::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Validates wider integer channels, e.g. parsed from user input.
    pub fn checked(red: i64, green: i64, blue: i64) -> Result<Self, ValidationError> {
        ensure_range("red", red, 0, 255)?;
        ensure_range("green", green, 0, 255)?;
        ensure_range("blue", blue, 0, 255)?;
        Ok(Self::new(red as u8, green as u8, blue as u8))
    }
}
