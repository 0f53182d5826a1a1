//! Rule selection.
//!
//! A [`Rule`] is a concrete processing pipeline plus a declaration of what it
//! can do. The [`RuleMatcher`] walks its rules in order and returns the first
//! one every requirement matcher accepts.
//!
//! | Matcher | Rejects a rule when | Reason |
//! |---|---|---|
//! | equal formats | rule needs input == output and they differ | `characteristic_matcher_equal_input_output_format_false` |
//! | input format | input format not in the rule's allow list | `characteristic_matcher_input_format_unsupported` |
//! | output format | output format not in the rule's allow list | `characteristic_matcher_output_format_unsupported` |
//! | passthrough | rule copies bytes and the encode mode is lossy | `characteristic_matcher_passthrough_denied` |
//! | crop | crop requested beyond the rule's support | `characteristic_matcher_crop_unsupported` |
//! | resize | resize requested beyond the rule's support | `characteristic_matcher_resize_unsupported` |
//! | rotate | rotation requested beyond the rule's support | `characteristic_matcher_rotate_unsupported` |
//!
//! When nothing matches the error is named `no_matching_rule` and lists the
//! first rejection reason of every rule.

use crate::error::{SpectrumError, engine_error, names};
use crate::options::Transformations;
use crate::requirements::{
    CropRequirement, EncodeMode, EncodeRequirement, ResizeMode, ResizeRequirement,
    RotateRequirement,
};
use crate::types::ImageFormat;

pub mod reasons {
    pub const EQUAL_FORMATS_FALSE: &str = "characteristic_matcher_equal_input_output_format_false";
    pub const INPUT_FORMAT_UNSUPPORTED: &str = "characteristic_matcher_input_format_unsupported";
    pub const OUTPUT_FORMAT_UNSUPPORTED: &str = "characteristic_matcher_output_format_unsupported";
    pub const PASSTHROUGH_DENIED: &str = "characteristic_matcher_passthrough_denied";
    pub const CROP_UNSUPPORTED: &str = "characteristic_matcher_crop_unsupported";
    pub const RESIZE_UNSUPPORTED: &str = "characteristic_matcher_resize_unsupported";
    pub const ROTATE_UNSUPPORTED: &str = "characteristic_matcher_rotate_unsupported";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropSupport {
    None,
    Exact,
    /// Only crops that need not be exact.
    Approximate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeSupport {
    None,
    Exact,
    ExactOrSmaller,
    ExactOrLarger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateSupport {
    None,
    MultipleOf90,
    MultipleOf180,
    /// Any multiple of 90 plus flips and orientation normalisation.
    MultipleOf90Flip,
}

/// What a processing pipeline can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    /// Empty means any format.
    pub allowed_input_formats: Vec<ImageFormat>,
    /// Empty means any format.
    pub allowed_output_formats: Vec<ImageFormat>,
    pub requires_equal_formats: bool,
    /// Copies input bytes to the output without re-encoding.
    pub is_passthrough: bool,
    pub crop_support: CropSupport,
    pub resize_support: ResizeSupport,
    pub rotate_support: RotateSupport,
}

impl Rule {
    /// A rule accepting any format and supporting nothing beyond it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed_input_formats: Vec::new(),
            allowed_output_formats: Vec::new(),
            requires_equal_formats: false,
            is_passthrough: false,
            crop_support: CropSupport::None,
            resize_support: ResizeSupport::None,
            rotate_support: RotateSupport::None,
        }
    }
}

/// The characteristics of one requested operation.
#[derive(Debug, Clone, Copy)]
pub struct RuleQuery<'a> {
    pub input_format: &'a ImageFormat,
    pub output_format: &'a ImageFormat,
    pub encode_requirement: Option<&'a EncodeRequirement>,
    pub transformations: &'a Transformations,
}

/// Returns the rejection reason, if any.
pub type RequirementMatcher = fn(&Rule, &RuleQuery<'_>) -> Result<(), &'static str>;

fn matches_format_allowed(allowed: &[ImageFormat], format: &ImageFormat) -> bool {
    allowed.is_empty() || allowed.contains(format)
}

pub fn matches_equal_formats(rule: &Rule, query: &RuleQuery<'_>) -> Result<(), &'static str> {
    if rule.requires_equal_formats && query.input_format != query.output_format {
        return Err(reasons::EQUAL_FORMATS_FALSE);
    }
    Ok(())
}

pub fn matches_input_format(rule: &Rule, query: &RuleQuery<'_>) -> Result<(), &'static str> {
    if !matches_format_allowed(&rule.allowed_input_formats, query.input_format) {
        return Err(reasons::INPUT_FORMAT_UNSUPPORTED);
    }
    Ok(())
}

pub fn matches_output_format(rule: &Rule, query: &RuleQuery<'_>) -> Result<(), &'static str> {
    if !matches_format_allowed(&rule.allowed_output_formats, query.output_format) {
        return Err(reasons::OUTPUT_FORMAT_UNSUPPORTED);
    }
    Ok(())
}

pub fn matches_passthrough(rule: &Rule, query: &RuleQuery<'_>) -> Result<(), &'static str> {
    let lossy = query
        .encode_requirement
        .is_some_and(|requirement| requirement.mode() == EncodeMode::Lossy);
    if rule.is_passthrough && lossy {
        return Err(reasons::PASSTHROUGH_DENIED);
    }
    Ok(())
}

fn supports_crop(support: CropSupport, crop: &CropRequirement) -> bool {
    match support {
        CropSupport::None => false,
        CropSupport::Exact => true,
        CropSupport::Approximate => !crop.must_be_exact(),
    }
}

pub fn matches_crop(rule: &Rule, query: &RuleQuery<'_>) -> Result<(), &'static str> {
    match &query.transformations.crop {
        Some(crop) if !supports_crop(rule.crop_support, crop) => Err(reasons::CROP_UNSUPPORTED),
        _ => Ok(()),
    }
}

fn supports_resize(support: ResizeSupport, resize: &ResizeRequirement) -> bool {
    match support {
        ResizeSupport::None => false,
        ResizeSupport::Exact => true,
        ResizeSupport::ExactOrSmaller => resize.mode() == ResizeMode::ExactOrSmaller,
        ResizeSupport::ExactOrLarger => resize.mode() == ResizeMode::ExactOrLarger,
    }
}

pub fn matches_resize(rule: &Rule, query: &RuleQuery<'_>) -> Result<(), &'static str> {
    match &query.transformations.resize {
        Some(resize) if !supports_resize(rule.resize_support, resize) => {
            Err(reasons::RESIZE_UNSUPPORTED)
        }
        _ => Ok(()),
    }
}

fn supports_rotate(support: RotateSupport, rotate: &RotateRequirement) -> bool {
    let flips = rotate.flip_horizontally || rotate.flip_vertically;
    let multiple_of_90 = rotate.degrees % 90 == 0;
    let multiple_of_180 = rotate.degrees % 180 == 0;
    match support {
        RotateSupport::None => rotate.is_noop(),
        // Orientation from metadata may imply a flip.
        RotateSupport::MultipleOf90 => multiple_of_90 && !flips && !rotate.force_up_orientation,
        RotateSupport::MultipleOf180 => multiple_of_180 && !flips && !rotate.force_up_orientation,
        RotateSupport::MultipleOf90Flip => multiple_of_90,
    }
}

pub fn matches_rotate(rule: &Rule, query: &RuleQuery<'_>) -> Result<(), &'static str> {
    match &query.transformations.rotate {
        Some(rotate) if !supports_rotate(rule.rotate_support, rotate) => {
            Err(reasons::ROTATE_UNSUPPORTED)
        }
        _ => Ok(()),
    }
}

/// The matchers every engine applies, in evaluation order.
pub const DEFAULT_MATCHERS: &[RequirementMatcher] = &[
    matches_equal_formats,
    matches_input_format,
    matches_output_format,
    matches_passthrough,
    matches_crop,
    matches_resize,
    matches_rotate,
];

/// Picks the first rule satisfying every matcher.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
    matchers: Vec<RequirementMatcher>,
}

impl RuleMatcher {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self::with_matchers(rules, DEFAULT_MATCHERS.to_vec())
    }

    pub fn with_matchers(rules: Vec<Rule>, matchers: Vec<RequirementMatcher>) -> Self {
        Self { rules, matchers }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn first_rejection(&self, rule: &Rule, query: &RuleQuery<'_>) -> Option<&'static str> {
        self.matchers
            .iter()
            .find_map(|matcher| matcher(rule, query).err())
    }

    pub fn find_first_matching(&self, query: &RuleQuery<'_>) -> Result<&Rule, SpectrumError> {
        let mut rejections = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            match self.first_rejection(rule, query) {
                None => return Ok(rule),
                Some(reason) => rejections.push(format!("{}: {reason}", rule.name)),
            }
        }
        Err(engine_error!(
            names::NO_MATCHING_RULE,
            "no rule for {} -> {} ({})",
            query.input_format,
            query.output_format,
            rejections.join(", ")
        ))
    }
}
