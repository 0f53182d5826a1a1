use crate::types::ImageSpecification;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a facade operation.
///
/// [`is_successful`](Self::is_successful) is authoritative: a result is
/// successful exactly when the engine names the rule it ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpectrumResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image_specification: Option<ImageSpecification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_image_specification: Option<ImageSpecification>,
    pub total_bytes_read: u64,
    pub total_bytes_written: u64,
}

impl SpectrumResult {
    pub fn new(
        rule_name: impl Into<String>,
        input_image_specification: Option<ImageSpecification>,
        output_image_specification: Option<ImageSpecification>,
        total_bytes_read: u64,
        total_bytes_written: u64,
    ) -> Self {
        Self {
            rule_name: Some(rule_name.into()),
            input_image_specification,
            output_image_specification,
            total_bytes_read,
            total_bytes_written,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.rule_name.as_deref().is_some_and(|name| !name.is_empty())
    }

    pub fn rule_name(&self) -> Option<&str> {
        self.rule_name.as_deref()
    }
}

impl fmt::Display for SpectrumResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule_name {
            Some(rule) if !rule.is_empty() => write!(f, "rule {rule}")?,
            _ => f.write_str("unsuccessful")?,
        }
        if let Some(output) = &self.output_image_specification {
            write!(f, ", {} {}", output.format, output.size)?;
        }
        write!(
            f,
            ", {} bytes read, {} bytes written",
            self.total_bytes_read, self.total_bytes_written
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageFormat, ImagePixelSpecification, ImageSize};

    #[test]
    fn success_requires_rule_name() {
        assert!(SpectrumResult::new("copy", None, None, 10, 10).is_successful());
        assert!(!SpectrumResult::default().is_successful());
    }

    #[test]
    fn empty_rule_name_is_not_successful() {
        let result = SpectrumResult {
            rule_name: Some(String::new()),
            total_bytes_read: 100,
            ..SpectrumResult::default()
        };
        assert!(!result.is_successful());
    }

    #[test]
    fn display_summarises_output() {
        let output = ImageSpecification::new(
            ImageSize::new(200, 100).unwrap(),
            ImageFormat::Bitmap,
            ImagePixelSpecification::Rgba,
        );
        let result = SpectrumResult::new("image_rs", None, Some(output), 512, 80_000);
        assert_eq!(
            result.to_string(),
            "rule image_rs, bitmap 200x100, 512 bytes read, 80000 bytes written"
        );
    }
}
