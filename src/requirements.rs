//! Declarative transformation intents attached to an operation.
//!
//! A requirement says *what* the output must look like, never *how* to get
//! there; the engine picks a rule that satisfies it.
//!
//! | Requirement | Intent | Constructor checks |
//! |---|---|---|
//! | [`ResizeRequirement`] | scale down to a target box | target width and height > 0 |
//! | [`CropRequirement`] | cut a region, absolute pixels or relative ratios | `left < right`, `top < bottom`, ratios in `[0, 1]` |
//! | [`RotateRequirement`] | rotate and/or flip | none (multiples of 90 are checked by the engine) |
//! | [`EncodeRequirement`] | target format, quality, lossy/lossless | quality `0` (unset) or `1..=100` |
//!
//! Resizing never upscales and never changes the aspect ratio; the engine
//! enforces both.

use crate::error::ValidationError;
use crate::types::{EncodedImageFormat, ImageSize, wire_code_enum};
use serde::{Deserialize, Serialize};
use std::fmt;

wire_code_enum! {
    /// How strictly the resize target has to be met.
    pub enum ResizeMode as "resize mode" {
        /// Output matches the target box (within aspect-ratio limits).
        Exact = 0,
        /// Output fits inside the target box.
        ExactOrSmaller = 1,
        /// Output covers the target box.
        ExactOrLarger = 2,
    }
}

/// Scale the image towards `target_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ResizeRecord", into = "ResizeRecord")]
pub struct ResizeRequirement {
    mode: ResizeMode,
    target_size: ImageSize,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct ResizeRecord {
    mode: ResizeMode,
    target_size: ImageSize,
}

impl ResizeRequirement {
    pub fn new(mode: ResizeMode, target_size: ImageSize) -> Result<Self, ValidationError> {
        if target_size.is_empty() {
            return Err(ValidationError::InvalidBounds(format!(
                "resize target must be non-empty, got {target_size}"
            )));
        }
        Ok(Self { mode, target_size })
    }

    /// Resize so that the longer edge is at most `side` pixels.
    pub fn fit_into_square(side: u32) -> Result<Self, ValidationError> {
        Self::new(ResizeMode::ExactOrSmaller, ImageSize::new(side, side)?)
    }

    pub fn mode(&self) -> ResizeMode {
        self.mode
    }

    pub fn target_size(&self) -> ImageSize {
        self.target_size
    }
}

impl TryFrom<ResizeRecord> for ResizeRequirement {
    type Error = ValidationError;

    fn try_from(record: ResizeRecord) -> Result<Self, Self::Error> {
        Self::new(record.mode, record.target_size)
    }
}

impl From<ResizeRequirement> for ResizeRecord {
    fn from(requirement: ResizeRequirement) -> Self {
        ResizeRecord {
            mode: requirement.mode,
            target_size: requirement.target_size,
        }
    }
}

/// The region a [`CropRequirement`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CropRegion {
    /// Pixel offsets from the top-left corner; `right`/`bottom` are exclusive.
    AbsoluteToOrigin {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
    /// Ratios of the image width/height, each in `[0, 1]`.
    RelativeToOrigin {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    },
}

/// Keep only `region` of the image.
///
/// When `must_be_exact` is false the engine may return a slightly larger
/// region (e.g. aligned to JPEG blocks).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CropRecord", into = "CropRecord")]
pub struct CropRequirement {
    region: CropRegion,
    must_be_exact: bool,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct CropRecord {
    region: CropRegion,
    must_be_exact: bool,
}

impl CropRequirement {
    pub fn absolute(
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        must_be_exact: bool,
    ) -> Result<Self, ValidationError> {
        if left >= right || top >= bottom {
            return Err(ValidationError::InvalidBounds(format!(
                "crop requires left < right and top < bottom, got ({left}, {top}, {right}, {bottom})"
            )));
        }
        Ok(Self {
            region: CropRegion::AbsoluteToOrigin {
                left,
                top,
                right,
                bottom,
            },
            must_be_exact,
        })
    }

    pub fn relative(
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        must_be_exact: bool,
    ) -> Result<Self, ValidationError> {
        for (field, value) in [("left", left), ("top", top), ("right", right), ("bottom", bottom)]
        {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::RatioOutOfRange { field, value });
            }
        }
        if left >= right || top >= bottom {
            return Err(ValidationError::InvalidBounds(format!(
                "crop requires left < right and top < bottom, got ({left}, {top}, {right}, {bottom})"
            )));
        }
        Ok(Self {
            region: CropRegion::RelativeToOrigin {
                left,
                top,
                right,
                bottom,
            },
            must_be_exact,
        })
    }

    pub fn region(&self) -> CropRegion {
        self.region
    }

    pub fn must_be_exact(&self) -> bool {
        self.must_be_exact
    }
}

impl TryFrom<CropRecord> for CropRequirement {
    type Error = ValidationError;

    fn try_from(record: CropRecord) -> Result<Self, Self::Error> {
        match record.region {
            CropRegion::AbsoluteToOrigin {
                left,
                top,
                right,
                bottom,
            } => Self::absolute(left, top, right, bottom, record.must_be_exact),
            CropRegion::RelativeToOrigin {
                left,
                top,
                right,
                bottom,
            } => Self::relative(left, top, right, bottom, record.must_be_exact),
        }
    }
}

impl From<CropRequirement> for CropRecord {
    fn from(requirement: CropRequirement) -> Self {
        CropRecord {
            region: requirement.region,
            must_be_exact: requirement.must_be_exact,
        }
    }
}

/// Rotate clockwise by `degrees`, then flip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RotateRequirement {
    pub degrees: i32,
    pub flip_horizontally: bool,
    pub flip_vertically: bool,
    /// Apply the orientation stored in the input's metadata so the output is
    /// upright.
    pub force_up_orientation: bool,
}

impl RotateRequirement {
    pub fn new(degrees: i32) -> Self {
        Self {
            degrees,
            ..Self::default()
        }
    }

    pub fn force_up_orientation() -> Self {
        Self {
            force_up_orientation: true,
            ..Self::default()
        }
    }

    pub fn with_flips(mut self, horizontally: bool, vertically: bool) -> Self {
        self.flip_horizontally = horizontally;
        self.flip_vertically = vertically;
        self
    }

    /// Degrees folded into `[0, 360)`.
    pub fn sanitised_degrees(&self) -> i32 {
        self.degrees.rem_euclid(360)
    }

    /// True when applying this requirement leaves the image untouched.
    pub fn is_noop(&self) -> bool {
        self.sanitised_degrees() == 0
            && !self.flip_horizontally
            && !self.flip_vertically
            && !self.force_up_orientation
    }
}

wire_code_enum! {
    /// Whether the encoder may discard information.
    pub enum EncodeMode as "encode mode" {
        Lossless = 0,
        Lossy = 1,
        Any = 2,
    }
}

impl Default for EncodeMode {
    fn default() -> Self {
        Self::Any
    }
}

/// Target encoding of an operation's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EncodeRecord", into = "EncodeRecord")]
pub struct EncodeRequirement {
    format: EncodedImageFormat,
    quality: u8,
    mode: EncodeMode,
}

#[derive(Clone, Serialize, Deserialize)]
struct EncodeRecord {
    format: EncodedImageFormat,
    #[serde(default)]
    quality: i64,
    #[serde(default)]
    mode: EncodeMode,
}

impl EncodeRequirement {
    /// Quality value meaning "let the encoder decide".
    pub const QUALITY_UNSET: u8 = 0;
    pub const QUALITY_MIN: u8 = 1;
    pub const QUALITY_MAX: u8 = 100;

    pub fn new(
        format: EncodedImageFormat,
        quality: u32,
        mode: EncodeMode,
    ) -> Result<Self, ValidationError> {
        Self::checked(format, i64::from(quality), mode)
    }

    /// Any mode, quality unset.
    pub fn for_format(format: EncodedImageFormat) -> Self {
        Self {
            format,
            quality: Self::QUALITY_UNSET,
            mode: EncodeMode::Any,
        }
    }

    fn checked(
        format: EncodedImageFormat,
        quality: i64,
        mode: EncodeMode,
    ) -> Result<Self, ValidationError> {
        if !(0..=i64::from(Self::QUALITY_MAX)).contains(&quality) {
            return Err(ValidationError::out_of_range(
                "quality",
                quality,
                0,
                i64::from(Self::QUALITY_MAX),
            ));
        }
        Ok(Self {
            format,
            quality: quality as u8,
            mode,
        })
    }

    pub fn format(&self) -> &EncodedImageFormat {
        &self.format
    }

    /// Raw quality, `0` when unset.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn quality_or(&self, default: u8) -> u8 {
        if self.has_quality() {
            self.quality
        } else {
            default
        }
    }

    pub fn has_quality(&self) -> bool {
        self.quality != Self::QUALITY_UNSET
    }

    pub fn mode(&self) -> EncodeMode {
        self.mode
    }
}

impl fmt::Display for EncodeRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}", self.format, self.mode)?;
        if self.has_quality() {
            write!(f, ", q{}", self.quality)?;
        }
        f.write_str(")")
    }
}

impl TryFrom<EncodeRecord> for EncodeRequirement {
    type Error = ValidationError;

    fn try_from(record: EncodeRecord) -> Result<Self, Self::Error> {
        Self::checked(record.format, record.quality, record.mode)
    }
}

impl From<EncodeRequirement> for EncodeRecord {
    fn from(requirement: EncodeRequirement) -> Self {
        EncodeRecord {
            format: requirement.format,
            quality: i64::from(requirement.quality),
            mode: requirement.mode,
        }
    }
}
