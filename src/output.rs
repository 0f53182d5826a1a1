//! CLI output formatting.
//!
//! Output leads with what happened to an image (the rule that ran and the
//! resulting image) and shows paths and byte counts as indented context.
//!
//! # Output Format
//!
//! ## Single operation
//!
//! ```text
//! photo.jpg → photo-small.jpg
//!     Rule: image_rs
//!     Input: jpeg 800x530 Rgb
//!     Output: jpeg 200x100 Rgb
//!     Bytes: 48211 read, 6120 written
//! ```
//!
//! ## Failure
//!
//! ```text
//! photo.gif → photo.webp
//!     Error: unsupported_input_format: no codec for gif input
//!     Location: spectrum::engine::rust_engine:212
//!     Cause: ...
//! ```
//!
//! ## Batch
//!
//! ```text
//! Batch (3 images)
//!     001 a.jpg → out/a.webp (image_rs, 64x64)
//!     002 b.png → out/b.webp (image_rs, 128x96)
//!     003 c.txt failed: unsupported_input_format
//! Transcoded 2 of 3 images
//! ```
//!
//! # Architecture
//!
//! Every `format_*` function returns `Vec<String>` and has no side effects;
//! the `print_*` wrappers write the lines to stdout.

use crate::error::SpectrumError;
use crate::result::SpectrumResult;
use crate::types::{ImageFormat, ImageSpecification};
use std::error::Error as _;

/// Progress of a batch run, sent from worker threads to the printer.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        image_count: usize,
    },
    Transcoded {
        index: usize,
        source: String,
        target: String,
        result: SpectrumResult,
    },
    Failed {
        index: usize,
        source: String,
        error: String,
    },
}

/// 1-based positional index, zero-padded to three digits.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Four spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_specification(spec: &ImageSpecification) -> String {
    format!(
        "{} {} {:?}",
        spec.format, spec.size, spec.pixel_specification
    )
}

/// `"input → output"` header, or just the input when there is no output path.
fn header(input: &str, output: Option<&str>) -> String {
    match output {
        Some(output) => format!("{} \u{2192} {}", input, output),
        None => input.to_string(),
    }
}

/// Lines describing a successful operation.
pub fn format_result(input: &str, output: Option<&str>, result: &SpectrumResult) -> Vec<String> {
    let mut lines = vec![header(input, output)];
    lines.push(format!(
        "{}Rule: {}",
        indent(1),
        result.rule_name().unwrap_or("(none)")
    ));
    if let Some(spec) = &result.input_image_specification {
        lines.push(format!("{}Input: {}", indent(1), format_specification(spec)));
    }
    if let Some(spec) = &result.output_image_specification {
        lines.push(format!("{}Output: {}", indent(1), format_specification(spec)));
    }
    lines.push(format!(
        "{}Bytes: {} read, {} written",
        indent(1),
        result.total_bytes_read,
        result.total_bytes_written
    ));
    lines
}

/// Lines describing a failed operation, including its cause chain.
pub fn format_error(input: &str, output: Option<&str>, error: &SpectrumError) -> Vec<String> {
    let mut lines = vec![header(input, output)];
    match error.name() {
        Some(name) => lines.push(format!("{}Error: {}: {}", indent(1), name, error.message())),
        None => lines.push(format!("{}Error: {}", indent(1), error.message())),
    }
    if let Some(location) = error.location() {
        lines.push(format!("{}Location: {}", indent(1), location));
    }
    let mut cause = error.source();
    while let Some(err) = cause {
        lines.push(format!("{}Cause: {}", indent(1), err));
        cause = err.source();
    }
    lines
}

/// The capability list printed by `spectrum formats`.
pub fn format_formats(formats: &[ImageFormat]) -> Vec<String> {
    let mut lines = vec!["Formats".to_string()];
    for format in formats {
        if format.is_encoded() {
            lines.push(format!("{}{}", indent(1), format));
        } else {
            lines.push(format!("{}{} (raw pixels)", indent(1), format));
        }
    }
    lines
}

pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Started { image_count } => vec![format!("Batch ({} images)", image_count)],
        BatchEvent::Transcoded {
            index,
            source,
            target,
            result,
        } => {
            let detail = match &result.output_image_specification {
                Some(spec) => format!("{}, {}", result.rule_name().unwrap_or("?"), spec.size),
                None => result.rule_name().unwrap_or("?").to_string(),
            };
            vec![format!(
                "{}{} {} \u{2192} {} ({})",
                indent(1),
                format_index(*index),
                source,
                target,
                detail
            )]
        }
        BatchEvent::Failed {
            index,
            source,
            error,
        } => vec![format!(
            "{}{} {} failed: {}",
            indent(1),
            format_index(*index),
            source,
            error
        )],
    }
}

pub fn format_batch_summary(succeeded: usize, total: usize) -> String {
    format!("Transcoded {} of {} images", succeeded, total)
}

pub fn print_result(input: &str, output: Option<&str>, result: &SpectrumResult) {
    for line in format_result(input, output, result) {
        println!("{}", line);
    }
}

/// Errors go to stderr, like the rest of the diagnostics.
pub fn print_error(input: &str, output: Option<&str>, error: &SpectrumError) {
    for line in format_error(input, output, error) {
        eprintln!("{}", line);
    }
}

pub fn print_formats(formats: &[ImageFormat]) {
    for line in format_formats(formats) {
        println!("{}", line);
    }
}
