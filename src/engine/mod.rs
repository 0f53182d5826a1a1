//! Execution engines.
//!
//! The [`ImageEngine`] trait is the boundary the [`Spectrum`](crate::Spectrum)
//! facade dispatches to: one method per operation kind, each receiving the
//! resolved [`Options`], its input and output resources, and returning a
//! [`SpectrumResult`] or an [`EngineError`].
//!
//! | Operation | Input | Output |
//! |---|---|---|
//! | decode | [`EncodedImageSource`] | [`BitmapTarget`] |
//! | encode | [`Bitmap`] | [`EncodedImageSink`] |
//! | transcode | [`EncodedImageSource`] | [`EncodedImageSink`] |
//! | transform | [`Bitmap`] | [`BitmapTarget`] |
//!
//! The shipped implementation is [`RustEngine`], built on the `image` crate
//! and selecting a processing [`rules::Rule`] per call. Engines are created
//! lazily through an [`EngineHandle`] so a facade can be constructed before
//! the engine is known to be loadable.

pub mod calculations;
mod handle;
mod pixels;
pub mod rules;
mod rust_engine;

pub use handle::{EngineContext, EngineHandle, EngineLoader};
pub use rust_engine::RustEngine;

use crate::error::EngineError;
use crate::io::{Bitmap, BitmapTarget, EncodedImageSink, EncodedImageSource};
use crate::options::Options;
use crate::result::SpectrumResult;

/// An engine able to execute the four operation kinds.
///
/// Engines are shared between threads; every call carries its own resources.
pub trait ImageEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the engine can still accept work. A handle holding an invalid
    /// engine reloads it before the next dispatch.
    fn is_valid(&self) -> bool {
        true
    }

    fn decode(
        &self,
        source: &mut EncodedImageSource<'_>,
        target: &mut BitmapTarget,
        options: &Options,
    ) -> Result<SpectrumResult, EngineError>;

    fn encode(
        &self,
        bitmap: &Bitmap,
        sink: &mut EncodedImageSink<'_>,
        options: &Options,
    ) -> Result<SpectrumResult, EngineError>;

    fn transcode(
        &self,
        source: &mut EncodedImageSource<'_>,
        sink: &mut EncodedImageSink<'_>,
        options: &Options,
    ) -> Result<SpectrumResult, EngineError>;

    fn transform(
        &self,
        bitmap: &Bitmap,
        target: &mut BitmapTarget,
        options: &Options,
    ) -> Result<SpectrumResult, EngineError>;
}
