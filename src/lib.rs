//! # Spectrum
//!
//! Typed image operations over a pluggable codec engine. Callers describe
//! *what* should happen to an image (decode, encode, transcode, transform,
//! plus resize/crop/rotate requirements and codec tuning) as immutable values;
//! the [`Spectrum`] facade hands that description to an engine, which picks a
//! concrete processing *rule* and reports what it did.
//!
//! ```no_run
//! use spectrum::io::{EncodedImageSink, EncodedImageSource};
//! use spectrum::options::TranscodeOptions;
//! use spectrum::requirements::{CropRequirement, EncodeMode, EncodeRequirement};
//! use spectrum::types::EncodedImageFormat;
//! use spectrum::{ImageOperations, Spectrum};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spectrum = Spectrum::default();
//! let options = TranscodeOptions::builder(EncodeRequirement::new(
//!     EncodedImageFormat::JPEG,
//!     80,
//!     EncodeMode::Lossy,
//! )?)
//! .crop(CropRequirement::absolute(100, 50, 300, 150, true)?)
//! .build();
//! let result = spectrum.transcode(
//!     EncodedImageSource::from_path("in.jpg")?,
//!     EncodedImageSink::from_path("out.jpg")?,
//!     &options,
//!     &"readme",
//! )?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Primitive values: sizes, colors, orientations, pixel specifications, formats |
//! | [`requirements`] | Resize, crop, rotate and encode requirements, validated on construction |
//! | [`config`] | Optional codec tuning, layered from `spectrum.toml` down to a single call |
//! | [`options`] | `Options` and the four per-operation option types with their builders |
//! | [`io`] | Encoded sources and sinks, bitmaps and bitmap targets |
//! | [`result`] | `SpectrumResult`, the outcome of an operation |
//! | [`error`] | Validation errors, the structured `SpectrumError`, engine errors |
//! | [`logging`] | The logger contract plus no-op and `tracing` implementations |
//! | [`engine`] | The engine trait, the rule-based `RustEngine` and the lazy engine handle |
//! | [`plugins`] | Extra codecs (GIF) and the format capability registry |
//! | [`wire`] | JSON form of every value crossing the engine boundary |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Validate on Construction
//!
//! Every constructor and builder setter checks its own invariants and returns a
//! [`error::ValidationError`] immediately. Those errors never reach the facade:
//! by the time an operation runs, its options are well-formed, and anything
//! that still fails (no rule fits, a stream breaks) is a runtime condition
//! reported as a [`SpectrumError`].
//!
//! ## One Error Type at the Boundary
//!
//! Engines may fail however they like ([`error::EngineError`]); the facade
//! forwards named errors unchanged and wraps everything else with the original
//! failure as `source()`. Callers match on [`SpectrumError::name`] against the
//! constants in [`error::names`].
//!
//! ## Exactly-Once Logging
//!
//! Each call produces one `on_start`, at most one `on_error` and one
//! `on_finish`, in that order, even when the engine cannot be loaded or
//! panics. See [`logging`].
//!
//! ## Ownership Decides Closing
//!
//! Streams created by Spectrum (`from_path`, `from_bytes`, `owning`) belong to
//! the operation and are closed when it ends. Streams borrowed from the caller
//! (`from_reader`, `from_writer`) are never closed. The borrow checker enforces
//! the second half.
//!
//! ## Engines Are Loaded, Not Assumed
//!
//! The facade holds an [`engine::EngineHandle`] rather than an engine. The
//! handle loads lazily, at most once, reloads an engine that reports itself
//! invalid, and can be released. The loader is pluggable, which is how tests
//! substitute a mock engine.

pub mod config;
pub mod engine;
pub mod error;
mod facade;
pub mod io;
pub mod logging;
pub mod options;
pub mod output;
pub mod plugins;
pub mod requirements;
pub mod result;
mod task;
pub mod types;
pub mod wire;

pub use error::SpectrumError;
pub use facade::{ImageOperations, Spectrum};
