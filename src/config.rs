//! Engine configuration.
//!
//! A flat bag of optional codec-tuning knobs. Every field is independently
//! optional: an unset field inherits from the layer below. Two layers exist:
//!
//! ```text
//! spectrum.toml / Configuration passed to Spectrum::new   ← global defaults
//! Options::configuration                                 ← per-operation override
//! ```
//!
//! The engine resolves the effective configuration of each call as
//! `global.merge(override)`; fields still unset after merging fall back to the
//! stock values in [`Configuration::stock`].
//!
//! ## Configuration File
//!
//! ```toml
//! # All options are optional - stock defaults shown below
//!
//! default_background_color = { red = 255, green = 255, blue = 255 }
//! interpret_metadata = true
//! sampling_method = 2                              # 1 = bicubic, 2 = magic kernel
//! propagate_chroma_sampling_mode_from_source = true
//! # chroma_sampling_mode_override = 0             # 0 = 4:4:4 ... 4 = 4:4:0
//!
//! use_trellis = true             # JPEG
//! use_progressive = true
//! use_optimize_scan = false
//! use_compatible_dc_scan_opt = true
//! use_psnr_quant_table = false
//!
//! use_interlacing = false        # PNG
//! compression_level = 6          # 0 (none) ..= 9 (best)
//!
//! webp_method = 3                # 0 (fastest) ..= 6 (best)
//! webp_image_hint = 0            # 0 default, 1 picture, 2 photo, 3 graph
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::error::ValidationError;
use crate::types::{ImageChromaSamplingMode, ImageColor, ensure_range, wire_code_enum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(#[from] ValidationError),
}

wire_code_enum! {
    /// Resampling method used when scaling.
    pub enum SamplingMethod as "sampling method" {
        Bicubic = 1,
        MagicKernel = 2,
    }
}

wire_code_enum! {
    /// Content hint passed to the WebP encoder.
    pub enum WebpImageHint as "webp image hint" {
        Default = 0,
        /// Digital picture, like a portrait or an indoor shot.
        Picture = 1,
        /// Outdoor photograph with natural lighting.
        Photo = 2,
        /// Discrete tone image (graph, map-tile etc).
        Graph = 3,
    }
}

/// Codec-tuning knobs. See the [module docs](self) for layering.
///
/// Values are range-checked wherever a configuration is created: by the
/// [builder](ConfigurationBuilder), by TOML loading and by deserialization.
/// Fields are read through accessors so no other path exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawConfiguration")]
pub struct Configuration {
    #[serde(skip_serializing_if = "Option::is_none")]
    default_background_color: Option<ImageColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interpret_metadata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sampling_method: Option<SamplingMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    propagate_chroma_sampling_mode_from_source: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chroma_sampling_mode_override: Option<ImageChromaSamplingMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    use_trellis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_progressive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_optimize_scan: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_compatible_dc_scan_opt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_psnr_quant_table: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    use_interlacing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression_level: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    webp_method: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webp_image_hint: Option<WebpImageHint>,
}

/// Unchecked deserialization shape of [`Configuration`].
#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfiguration {
    default_background_color: Option<ImageColor>,
    interpret_metadata: Option<bool>,
    sampling_method: Option<SamplingMethod>,
    propagate_chroma_sampling_mode_from_source: Option<bool>,
    chroma_sampling_mode_override: Option<ImageChromaSamplingMode>,
    use_trellis: Option<bool>,
    use_progressive: Option<bool>,
    use_optimize_scan: Option<bool>,
    use_compatible_dc_scan_opt: Option<bool>,
    use_psnr_quant_table: Option<bool>,
    use_interlacing: Option<bool>,
    compression_level: Option<u8>,
    webp_method: Option<u8>,
    webp_image_hint: Option<WebpImageHint>,
}

impl TryFrom<RawConfiguration> for Configuration {
    type Error = ValidationError;

    fn try_from(raw: RawConfiguration) -> Result<Self, Self::Error> {
        let config = Configuration {
            default_background_color: raw.default_background_color,
            interpret_metadata: raw.interpret_metadata,
            sampling_method: raw.sampling_method,
            propagate_chroma_sampling_mode_from_source: raw
                .propagate_chroma_sampling_mode_from_source,
            chroma_sampling_mode_override: raw.chroma_sampling_mode_override,
            use_trellis: raw.use_trellis,
            use_progressive: raw.use_progressive,
            use_optimize_scan: raw.use_optimize_scan,
            use_compatible_dc_scan_opt: raw.use_compatible_dc_scan_opt,
            use_psnr_quant_table: raw.use_psnr_quant_table,
            use_interlacing: raw.use_interlacing,
            compression_level: raw.compression_level,
            webp_method: raw.webp_method,
            webp_image_hint: raw.webp_image_hint,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Plain getters, one per field.
macro_rules! field_accessors {
    ($($(#[$doc:meta])* $field:ident: $ty:ty),* $(,)?) => {
        impl Configuration {
            $(
                $(#[$doc])*
                pub fn $field(&self) -> Option<$ty> {
                    self.$field
                }
            )*
        }
    };
}

field_accessors! {
    /// Color transparent images are flattened onto when the output has no
    /// alpha channel.
    default_background_color: ImageColor,
    /// Honour orientation and other metadata found in the input.
    interpret_metadata: bool,
    sampling_method: SamplingMethod,
    /// Keep the input's chroma sampling (e.g. 4:4:4) when re-encoding.
    propagate_chroma_sampling_mode_from_source: bool,
    /// Forces a chroma sampling mode on lossy output.
    chroma_sampling_mode_override: ImageChromaSamplingMode,
    use_trellis: bool,
    use_progressive: bool,
    use_optimize_scan: bool,
    /// Restrict DC scan optimisation to decoders that cannot handle split DC
    /// scans.
    use_compatible_dc_scan_opt: bool,
    /// Use the quantisation table tuned for PSNR instead of the default one.
    use_psnr_quant_table: bool,
    use_interlacing: bool,
    /// zlib level, `0..=9`.
    compression_level: u8,
    /// Speed/size tradeoff, `0..=6`.
    webp_method: u8,
    webp_image_hint: WebpImageHint,
}

impl Configuration {
    pub const COMPRESSION_LEVEL_NONE: u8 = 0;
    pub const COMPRESSION_LEVEL_BEST_SPEED: u8 = 1;
    pub const COMPRESSION_LEVEL_DEFAULT: u8 = 6;
    pub const COMPRESSION_LEVEL_BEST_COMPRESSION: u8 = 9;
    pub const WEBP_METHOD_MAX: u8 = 6;

    /// A configuration with every field unset.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every field set to the value used when nothing overrides it.
    pub fn stock() -> Self {
        Self {
            default_background_color: Some(ImageColor::WHITE),
            interpret_metadata: Some(true),
            sampling_method: Some(SamplingMethod::MagicKernel),
            propagate_chroma_sampling_mode_from_source: Some(true),
            chroma_sampling_mode_override: None,
            use_trellis: Some(true),
            use_progressive: Some(true),
            use_optimize_scan: Some(false),
            use_compatible_dc_scan_opt: Some(true),
            use_psnr_quant_table: Some(false),
            use_interlacing: Some(false),
            compression_level: Some(Self::COMPRESSION_LEVEL_DEFAULT),
            webp_method: Some(3),
            webp_image_hint: Some(WebpImageHint::Default),
        }
    }

    /// Tuned for images with sharp edges and flat colors: trellis
    /// quantisation, 4:4:4 chroma and the PSNR quantisation table.
    pub fn for_image_containing_graphics() -> Self {
        Self {
            use_trellis: Some(true),
            chroma_sampling_mode_override: Some(ImageChromaSamplingMode::S444),
            use_psnr_quant_table: Some(true),
            ..Self::default()
        }
    }

    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Returns a new configuration where every field set in `overlay` wins.
    pub fn merge(&self, overlay: &Configuration) -> Configuration {
        Configuration {
            default_background_color: overlay
                .default_background_color
                .or(self.default_background_color),
            interpret_metadata: overlay.interpret_metadata.or(self.interpret_metadata),
            sampling_method: overlay.sampling_method.or(self.sampling_method),
            propagate_chroma_sampling_mode_from_source: overlay
                .propagate_chroma_sampling_mode_from_source
                .or(self.propagate_chroma_sampling_mode_from_source),
            chroma_sampling_mode_override: overlay
                .chroma_sampling_mode_override
                .or(self.chroma_sampling_mode_override),
            use_trellis: overlay.use_trellis.or(self.use_trellis),
            use_progressive: overlay.use_progressive.or(self.use_progressive),
            use_optimize_scan: overlay.use_optimize_scan.or(self.use_optimize_scan),
            use_compatible_dc_scan_opt: overlay
                .use_compatible_dc_scan_opt
                .or(self.use_compatible_dc_scan_opt),
            use_psnr_quant_table: overlay.use_psnr_quant_table.or(self.use_psnr_quant_table),
            use_interlacing: overlay.use_interlacing.or(self.use_interlacing),
            compression_level: overlay.compression_level.or(self.compression_level),
            webp_method: overlay.webp_method.or(self.webp_method),
            webp_image_hint: overlay.webp_image_hint.or(self.webp_image_hint),
        }
    }

    /// Merges an optional per-operation override onto `self`.
    pub fn merged_with(&self, overlay: Option<&Configuration>) -> Configuration {
        match overlay {
            Some(overlay) => self.merge(overlay),
            None => self.clone(),
        }
    }

    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(level) = self.compression_level {
            ensure_range(
                "compression_level",
                i64::from(level),
                0,
                i64::from(Self::COMPRESSION_LEVEL_BEST_COMPRESSION),
            )?;
        }
        if let Some(method) = self.webp_method {
            ensure_range("webp_method", i64::from(method), 0, i64::from(Self::WEBP_METHOD_MAX))?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    pub fn background_color(&self) -> ImageColor {
        self.default_background_color.unwrap_or(ImageColor::WHITE)
    }

    pub fn effective_sampling_method(&self) -> SamplingMethod {
        self.sampling_method.unwrap_or(SamplingMethod::MagicKernel)
    }

    pub fn effective_compression_level(&self) -> u8 {
        self.compression_level
            .unwrap_or(Self::COMPRESSION_LEVEL_DEFAULT)
    }

    pub fn effective_use_interlacing(&self) -> bool {
        self.use_interlacing.unwrap_or(false)
    }
}

/// Stepwise construction of a [`Configuration`].
///
/// Range-checked setters return `Result`; [`build`](Self::build) never fails.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    configuration: Configuration,
}

impl ConfigurationBuilder {
    pub fn default_background_color(mut self, color: ImageColor) -> Self {
        self.configuration.default_background_color = Some(color);
        self
    }

    pub fn interpret_metadata(mut self, value: bool) -> Self {
        self.configuration.interpret_metadata = Some(value);
        self
    }

    pub fn sampling_method(mut self, method: SamplingMethod) -> Self {
        self.configuration.sampling_method = Some(method);
        self
    }

    pub fn propagate_chroma_sampling_mode_from_source(mut self, value: bool) -> Self {
        self.configuration.propagate_chroma_sampling_mode_from_source = Some(value);
        self
    }

    pub fn chroma_sampling_mode_override(mut self, mode: ImageChromaSamplingMode) -> Self {
        self.configuration.chroma_sampling_mode_override = Some(mode);
        self
    }

    pub fn use_trellis(mut self, value: bool) -> Self {
        self.configuration.use_trellis = Some(value);
        self
    }

    pub fn use_progressive(mut self, value: bool) -> Self {
        self.configuration.use_progressive = Some(value);
        self
    }

    pub fn use_optimize_scan(mut self, value: bool) -> Self {
        self.configuration.use_optimize_scan = Some(value);
        self
    }

    pub fn use_compatible_dc_scan_opt(mut self, value: bool) -> Self {
        self.configuration.use_compatible_dc_scan_opt = Some(value);
        self
    }

    pub fn use_psnr_quant_table(mut self, value: bool) -> Self {
        self.configuration.use_psnr_quant_table = Some(value);
        self
    }

    pub fn use_interlacing(mut self, value: bool) -> Self {
        self.configuration.use_interlacing = Some(value);
        self
    }

    pub fn compression_level(mut self, level: u8) -> Result<Self, ValidationError> {
        ensure_range(
            "compression_level",
            i64::from(level),
            0,
            i64::from(Configuration::COMPRESSION_LEVEL_BEST_COMPRESSION),
        )?;
        self.configuration.compression_level = Some(level);
        Ok(self)
    }

    pub fn webp_method(mut self, method: u8) -> Result<Self, ValidationError> {
        ensure_range(
            "webp_method",
            i64::from(method),
            0,
            i64::from(Configuration::WEBP_METHOD_MAX),
        )?;
        self.configuration.webp_method = Some(method);
        Ok(self)
    }

    pub fn webp_image_hint(mut self, hint: WebpImageHint) -> Self {
        self.configuration.webp_image_hint = Some(hint);
        self
    }

    pub fn build(self) -> Configuration {
        self.configuration
    }
}

/// Parse a TOML document into a validated [`Configuration`].
pub fn parse_config(content: &str) -> Result<Configuration, ConfigError> {
    let raw: RawConfiguration = toml::from_str(content)?;
    Ok(Configuration::try_from(raw)?)
}

/// Load the global configuration from a TOML file.
///
/// Rejects unknown keys and validates the result.
pub fn load_config(path: &Path) -> Result<Configuration, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load `path` if it exists, otherwise return an empty configuration.
pub fn load_config_or_empty(path: &Path) -> Result<Configuration, ConfigError> {
    if !path.exists() {
        return Ok(Configuration::empty());
    }
    load_config(path)
}

/// Returns a fully-commented stock `spectrum.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Spectrum Configuration
# ======================
#
# Global defaults for the image engine. Every key is optional: delete any key
# to fall back to the built-in value shown here. Options passed with a single
# operation override these values.
#
# Unknown keys are rejected.

# ---------------------------------------------------------------------------
# General
# ---------------------------------------------------------------------------

# Color transparent images are flattened onto when the output format has no
# alpha channel (e.g. PNG with alpha -> JPEG).
default_background_color = { red = 255, green = 255, blue = 255 }

# Honour metadata (such as EXIF orientation) found in the input.
interpret_metadata = true

# Resampling used when scaling: 1 = bicubic, 2 = magic kernel.
sampling_method = 2

# Keep the input's chroma sampling (e.g. 4:4:4) when re-encoding JPEG.
propagate_chroma_sampling_mode_from_source = true

# Force a chroma sampling mode for lossy output:
# 0 = 4:4:4, 1 = 4:2:0, 2 = 4:2:2, 3 = 4:1:1, 4 = 4:4:0.
# chroma_sampling_mode_override = 0

# ---------------------------------------------------------------------------
# JPEG
# ---------------------------------------------------------------------------

use_trellis = true
use_progressive = true
use_optimize_scan = false
use_compatible_dc_scan_opt = true
use_psnr_quant_table = false

# ---------------------------------------------------------------------------
# PNG
# ---------------------------------------------------------------------------

use_interlacing = false

# zlib compression level: 0 (none), 1 (fastest) ..= 9 (smallest).
compression_level = 6

# ---------------------------------------------------------------------------
# WebP
# ---------------------------------------------------------------------------

# Speed/size tradeoff: 0 (fastest) ..= 6 (smallest).
webp_method = 3

# Content hint: 0 = default, 1 = picture, 2 = photo, 3 = graph.
webp_image_hint = 0
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_configuration_has_no_fields_set() {
        let config = Configuration::empty();
        assert!(config.is_empty());
        assert_eq!(config.background_color(), ImageColor::WHITE);
        assert_eq!(config.effective_compression_level(), 6);
    }

    #[test]
    fn graphics_preset() {
        let config = Configuration::for_image_containing_graphics();
        assert_eq!(config.use_trellis, Some(true));
        assert_eq!(
            config.chroma_sampling_mode_override,
            Some(ImageChromaSamplingMode::S444)
        );
        assert_eq!(config.use_psnr_quant_table, Some(true));
        assert!(config.use_progressive.is_none());
    }

    #[test]
    fn merge_overlay_wins_and_base_is_preserved() {
        let base = Configuration::builder()
            .use_progressive(true)
            .compression_level(3)
            .unwrap()
            .build();
        let overlay = Configuration::builder().compression_level(9).unwrap().build();
        let merged = base.merge(&overlay);
        assert_eq!(merged.compression_level, Some(9));
        assert_eq!(merged.use_progressive, Some(true));
        assert!(merged.use_trellis.is_none());
    }

    #[test]
    fn merged_with_none_is_identity() {
        let base = Configuration::for_image_containing_graphics();
        assert_eq!(base.merged_with(None), base);
    }

    #[test]
    fn compression_level_boundaries() {
        assert!(Configuration::builder().compression_level(0).is_ok());
        assert!(Configuration::builder().compression_level(9).is_ok());
        assert!(matches!(
            Configuration::builder().compression_level(10),
            Err(ValidationError::OutOfRange { field: "compression_level", .. })
        ));
    }

    #[test]
    fn webp_method_boundaries() {
        assert!(Configuration::builder().webp_method(6).is_ok());
        assert!(Configuration::builder().webp_method(7).is_err());
    }

    #[test]
    fn validate_catches_out_of_range_fields() {
        let config = Configuration {
            compression_level: Some(12),
            ..Configuration::default()
        };
        assert!(config.validate().is_err());
        assert!(Configuration::stock().validate().is_ok());
    }

    #[test]
    fn sampling_method_and_hint_codes() {
        assert_eq!(SamplingMethod::try_from(1), Ok(SamplingMethod::Bicubic));
        assert!(SamplingMethod::try_from(0).is_err());
        assert_eq!(WebpImageHint::try_from(3), Ok(WebpImageHint::Graph));
        assert!(WebpImageHint::try_from(4).is_err());
    }

    #[test]
    fn stock_toml_parses_to_stock_configuration() {
        let parsed = parse_config(stock_config_toml()).unwrap();
        assert_eq!(parsed, Configuration::stock());
    }

    #[test]
    fn load_config_reads_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spectrum.toml");
        fs::write(&path, "use_interlacing = true\ncompression_level = 9\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.use_interlacing, Some(true));
        assert_eq!(config.compression_level, Some(9));
        // Unspecified values stay unset
        assert!(config.use_trellis.is_none());
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_config("use_trelis = true\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn out_of_range_value_in_file_is_validation_error() {
        let result = parse_config("compression_level = 11\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn deserializing_checks_ranges() {
        let err = serde_json::from_str::<Configuration>(r#"{"compression_level":42,"webp_method":99}"#)
            .unwrap_err();
        assert!(err.to_string().contains("compression_level"));
        assert!(serde_json::from_str::<Configuration>(r#"{"webp_method":7}"#).is_err());
        assert!(serde_json::from_str::<Configuration>(r#"{"use_trelis":true}"#).is_err());

        let config: Configuration = serde_json::from_str(r#"{"webp_method":6}"#).unwrap();
        assert_eq!(config.webp_method(), Some(6));
        assert!(config.compression_level().is_none());
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spectrum.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn missing_file_is_empty_configuration() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_or_empty(&tmp.path().join("absent.toml")).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn json_round_trip_minimal_and_maximal() {
        for config in [Configuration::empty(), Configuration::stock()] {
            let json = serde_json::to_string(&config).unwrap();
            let back: Configuration = serde_json::from_str(&json).unwrap();
            assert_eq!(back, config);
        }
    }
}
