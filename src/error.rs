//! Error taxonomy.
//!
//! Three layers, matching where a failure is detected:
//!
//! | Type | Raised by | Crosses the facade? |
//! |---|---|---|
//! | [`ValidationError`] | value-object constructors, builder setters, wire-code parsers | no, returned to the caller that built the bad value |
//! | [`EngineError`] | an [`ImageEngine`](crate::engine::ImageEngine) implementation | no, normalised by the facade |
//! | [`SpectrumError`] | the [`Spectrum`](crate::Spectrum) facade | yes, the single error every operation returns |
//!
//! Construction-time validation errors fail immediately at the call site and are
//! never reported through the logger.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed cause carried by a [`SpectrumError`].
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// Well-known [`SpectrumError::name`] values.
///
/// Names group similar failures together so callers can match on them without
/// parsing messages.
pub mod names {
    /// The input stream yielded no bytes.
    pub const EMPTY_INPUT_SOURCE: &str = "empty_input_source";
    /// No rule of the engine can satisfy the requested operation.
    pub const NO_MATCHING_RULE: &str = "no_matching_rule";
    /// The input could not be identified as a supported encoded format.
    pub const UNSUPPORTED_INPUT_FORMAT: &str = "unsupported_input_format";
    /// The requested output format (or mode) cannot be produced.
    pub const UNSUPPORTED_OUTPUT_FORMAT: &str = "unsupported_output_format";
    /// An absolute crop reaches outside of the image.
    pub const CROP_OUT_OF_BOUNDS: &str = "crop_out_of_bounds";
    /// A bitmap handed to the engine is inconsistent or was already filled.
    pub const INVALID_BITMAP: &str = "invalid_bitmap";
    /// The codec failed while decoding or encoding pixel data.
    pub const CODEC_FAILURE: &str = "codec_failure";
    /// Reading the source or writing the sink failed.
    pub const IO_FAILURE: &str = "io_failure";
    /// The engine could not be loaded.
    pub const ENGINE_UNAVAILABLE: &str = "engine_unavailable";
}

/// Invariant violation detected while constructing a value object.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{field} must be a ratio within [0, 1], got {value}")]
    RatioOutOfRange { field: &'static str, value: f32 },
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("unsupported {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: i64 },
    #[error("unsupported {kind}: {value}")]
    Unsupported { kind: &'static str, value: String },
    #[error("bitmap buffer holds {actual} bytes, expected {expected}")]
    BitmapLength { expected: usize, actual: usize },
}

impl ValidationError {
    pub(crate) fn out_of_range(field: &'static str, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    pub(crate) fn unknown_code(kind: &'static str, code: impl Into<i64>) -> Self {
        Self::UnknownCode {
            kind,
            code: code.into(),
        }
    }
}

/// The structured error returned by every facade operation.
///
/// All four fields are independently observable for programmatic matching.
/// [`description`](Self::description) is the human-readable superset; for
/// engine-raised errors it reads `name#message-location`.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct SpectrumError {
    name: Option<String>,
    message: String,
    location: Option<String>,
    description: Option<String>,
    #[source]
    cause: Option<Cause>,
}

impl SpectrumError {
    /// Creates an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
            location: None,
            description: None,
            cause: None,
        }
    }

    /// Creates an error with a message and a wrapped cause.
    pub fn with_cause(message: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self {
            cause: Some(cause.into()),
            ..Self::new(message)
        }
    }

    /// Wraps an arbitrary failure: the message is the failure's own message
    /// and the failure becomes the cause.
    pub fn from_failure(failure: impl Into<Cause>) -> Self {
        let cause = failure.into();
        Self::with_cause(cause.to_string(), cause)
    }

    /// Creates a named error raised at `location`, the way engines report.
    pub fn engine(
        name: impl Into<String>,
        message: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let message = message.into();
        let location = location.into();
        let description = format!("{name}#{message}-{location}");
        Self {
            name: Some(name),
            message,
            location: Some(location),
            description: Some(description),
            cause: None,
        }
    }

    /// Attaches a cause to an existing error.
    pub fn caused_by(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Name that groups similar errors together (see [`names`]).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Where the error was raised, e.g. `rules::find_first_matching`.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// True when [`name`](Self::name) equals `name`.
    pub fn is(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

/// Failure reported by an engine implementation.
///
/// Structured errors are forwarded to the caller unchanged; everything else is
/// wrapped into a [`SpectrumError`] by the facade.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(Cause),
}

impl EngineError {
    /// Wraps any error type as a generic engine failure.
    pub fn failed(error: impl Into<Cause>) -> Self {
        Self::Failed(error.into())
    }
}

impl From<EngineError> for SpectrumError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Spectrum(e) => e,
            EngineError::Io(e) => {
                let mut wrapped = SpectrumError::from_failure(e);
                wrapped.name = Some(names::IO_FAILURE.to_string());
                wrapped
            }
            EngineError::Failed(e) => SpectrumError::from_failure(e),
        }
    }
}

/// Shorthand for a located, named engine error.
macro_rules! engine_error {
    ($name:expr, $($arg:tt)+) => {
        $crate::error::SpectrumError::engine(
            $name,
            format!($($arg)+),
            concat!(module_path!(), ":", line!()),
        )
    };
}
pub(crate) use engine_error;
