//! The `Spectrum` facade.
//!
//! Every operation runs through the same lifecycle:
//!
//! ```text
//! logger.on_start ──> load engine ──> execute task once ──┬─> on_finish(result)
//!                          │                              │
//!                          └──────── error ───────────────┴─> on_error ─> on_finish(None)
//! ```
//!
//! Errors from the engine are normalised into [`SpectrumError`]: structured
//! errors pass through unchanged, anything else is wrapped with the original
//! failure as cause. A panic in the loader or the engine becomes an unnamed
//! error. Owned streams are closed on every path; borrowed ones are left to
//! the caller.

use crate::config::Configuration;
use crate::engine::{EngineContext, EngineHandle, EngineLoader};
use crate::error::SpectrumError;
use crate::io::{Bitmap, BitmapTarget, EncodedImageSink, EncodedImageSource};
use crate::logging::{NoopLogger, SpectrumLogger};
use crate::options::{DecodeOptions, EncodeOptions, TranscodeOptions, TransformOptions};
use crate::plugins::{self, SpectrumPlugin};
use crate::result::SpectrumResult;
use crate::task::SpectrumTask;
use crate::types::ImageFormat;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// The operations a Spectrum instance offers.
///
/// `caller_context` identifies the call site. It is handed to the logger and
/// otherwise ignored.
pub trait ImageOperations {
    /// Decodes an encoded image into a bitmap.
    fn decode(
        &self,
        source: EncodedImageSource<'_>,
        target: &mut BitmapTarget,
        options: &DecodeOptions,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError>;

    /// Encodes a bitmap.
    fn encode(
        &self,
        bitmap: &Bitmap,
        sink: EncodedImageSink<'_>,
        options: &EncodeOptions,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError>;

    /// Re-encodes an encoded image, applying any transformations on the way.
    fn transcode(
        &self,
        source: EncodedImageSource<'_>,
        sink: EncodedImageSink<'_>,
        options: &TranscodeOptions,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError>;

    /// Transforms a bitmap into another bitmap.
    fn transform(
        &self,
        bitmap: &Bitmap,
        target: &mut BitmapTarget,
        options: &TransformOptions,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError>;

    fn is_image_format_supported(&self, format: &ImageFormat) -> bool;
}

/// Image processing facade. Cheap to share: wrap it in an [`Arc`] and call it
/// from as many threads as needed.
pub struct Spectrum {
    handle: EngineHandle,
    logger: Arc<dyn SpectrumLogger>,
}

impl Spectrum {
    /// Facade over the built-in engine.
    pub fn new(
        configuration: Configuration,
        plugins: Vec<Arc<dyn SpectrumPlugin>>,
        logger: Arc<dyn SpectrumLogger>,
    ) -> Self {
        Self {
            handle: EngineHandle::new(EngineContext::new(configuration, plugins)),
            logger,
        }
    }

    /// Facade over an engine produced by `loader`.
    pub fn with_loader(
        context: EngineContext,
        loader: impl EngineLoader + 'static,
        logger: Arc<dyn SpectrumLogger>,
    ) -> Self {
        Self {
            handle: EngineHandle::with_loader(context, loader),
            logger,
        }
    }

    /// Loads the engine if necessary and reports whether that worked.
    pub fn is_available(&self) -> bool {
        self.handle.is_available()
    }

    /// Drops the loaded engine; the next operation loads a new one.
    pub fn release(&self) {
        self.handle.release();
    }

    /// Formats accepted by [`is_image_format_supported`](ImageOperations::is_image_format_supported).
    pub fn supported_formats(&self) -> Vec<ImageFormat> {
        plugins::supported_formats(&self.handle.context().plugins)
    }

    fn execute(
        &self,
        task: SpectrumTask<'_, '_, '_>,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError> {
        let context = self.logger.on_start(task.options(), caller_context);
        match self.dispatch(task) {
            Ok(result) => {
                self.logger.on_finish(context, Some(&result));
                Ok(result)
            }
            Err(err) => {
                self.logger.on_error(context, &err);
                self.logger.on_finish(context, None);
                Err(err)
            }
        }
    }

    /// Loads the engine and runs the task on it, both under one panic guard.
    /// Dropping an unexecuted task closes its owned streams, so an early
    /// return needs no cleanup.
    fn dispatch(&self, task: SpectrumTask<'_, '_, '_>) -> Result<SpectrumResult, SpectrumError> {
        let kind = task.kind();
        let run = || -> Result<SpectrumResult, SpectrumError> {
            let engine = self.handle.engine()?;
            task.execute(engine.as_ref()).map_err(SpectrumError::from)
        };
        match panic::catch_unwind(AssertUnwindSafe(run)) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(kind, "{kind} panicked: {message}");
                Err(SpectrumError::new(format!("{kind} panicked: {message}")))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Default for Spectrum {
    /// Stock configuration, the GIF plugin, no logging.
    fn default() -> Self {
        Self::new(
            Configuration::stock(),
            vec![Arc::new(plugins::GifPlugin)],
            Arc::new(NoopLogger),
        )
    }
}

impl fmt::Debug for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spectrum")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl ImageOperations for Spectrum {
    fn decode(
        &self,
        source: EncodedImageSource<'_>,
        target: &mut BitmapTarget,
        options: &DecodeOptions,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError> {
        let task = SpectrumTask::Decode {
            source,
            target,
            options: options.to_options(),
        };
        self.execute(task, caller_context)
    }

    fn encode(
        &self,
        bitmap: &Bitmap,
        sink: EncodedImageSink<'_>,
        options: &EncodeOptions,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError> {
        let task = SpectrumTask::Encode {
            bitmap,
            sink,
            options: options.to_options(),
        };
        self.execute(task, caller_context)
    }

    fn transcode(
        &self,
        source: EncodedImageSource<'_>,
        sink: EncodedImageSink<'_>,
        options: &TranscodeOptions,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError> {
        let task = SpectrumTask::Transcode {
            source,
            sink,
            options: options.to_options(),
        };
        self.execute(task, caller_context)
    }

    fn transform(
        &self,
        bitmap: &Bitmap,
        target: &mut BitmapTarget,
        options: &TransformOptions,
        caller_context: &dyn fmt::Debug,
    ) -> Result<SpectrumResult, SpectrumError> {
        let task = SpectrumTask::Transform {
            bitmap,
            target,
            options: options.to_options(),
        };
        self.execute(task, caller_context)
    }

    fn is_image_format_supported(&self, format: &ImageFormat) -> bool {
        plugins::is_format_supported(format, &self.handle.context().plugins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ImageEngine;
    use crate::engine::tests::{MockBehavior, MockEngine, RecordedOp};
    use crate::error::{EngineError, names};
    use crate::logging::tests::{LogEvent, RecordingLogger};
    use crate::options::Options;
    use crate::requirements::EncodeRequirement;
    use crate::types::{EncodedImageFormat, ImagePixelSpecification, ImageSize};
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type LoadResult = Result<Arc<dyn ImageEngine>, SpectrumError>;

    fn spectrum_with(mock: Arc<MockEngine>) -> (Spectrum, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::default());
        let spectrum = Spectrum::with_loader(
            EngineContext::default(),
            move |_: &EngineContext| -> LoadResult {
                Ok(Arc::clone(&mock) as Arc<dyn ImageEngine>)
            },
            Arc::clone(&logger) as Arc<dyn SpectrumLogger>,
        );
        (spectrum, logger)
    }

    fn transcode_options() -> TranscodeOptions {
        TranscodeOptions::builder(EncodeRequirement::for_format(EncodedImageFormat::JPEG)).build()
    }

    fn start(context: &dyn fmt::Debug) -> LogEvent {
        LogEvent::Start {
            caller_context: format!("{context:?}"),
        }
    }

    /// Reader that yields `limit` bytes and then fails.
    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::other("stream broke after 10 bytes"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(0xAB);
            self.remaining -= n;
            Ok(n)
        }
    }

    /// Counts drops, i.e. closes.
    struct ClosingReader {
        inner: FailingReader,
        closed: Arc<AtomicUsize>,
    }

    impl Read for ClosingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Drop for ClosingReader {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn success_logs_start_then_finish() {
        let mock = Arc::new(MockEngine::succeeding("copy"));
        let (spectrum, logger) = spectrum_with(Arc::clone(&mock));
        let options = transcode_options();

        let result = spectrum
            .transcode(
                EncodedImageSource::from_bytes(vec![1, 2, 3]),
                EncodedImageSink::owning(Vec::new()),
                &options,
                &"thumbnail",
            )
            .unwrap();

        assert!(result.is_successful());
        assert_eq!(
            logger.events(),
            vec![start(&"thumbnail"), LogEvent::Finish { successful: Some(true) }]
        );
        assert_eq!(
            mock.get_operations(),
            vec![RecordedOp::Transcode(options.to_options())]
        );
    }

    #[test]
    fn structured_error_is_forwarded_unchanged() {
        let mock = Arc::new(MockEngine::new(MockBehavior::Structured {
            name: names::NO_MATCHING_RULE.into(),
            message: "nothing fits".into(),
        }));
        let (spectrum, logger) = spectrum_with(mock);
        let bitmap = Bitmap::new(
            ImageSize::new(1, 1).unwrap(),
            ImagePixelSpecification::Rgb,
            vec![1, 2, 3],
        )
        .unwrap();
        let options =
            EncodeOptions::builder(EncodeRequirement::for_format(EncodedImageFormat::PNG)).build();

        let err = spectrum
            .encode(&bitmap, EncodedImageSink::owning(Vec::new()), &options, &1)
            .unwrap_err();

        assert!(err.is(names::NO_MATCHING_RULE));
        assert_eq!(err.message(), "nothing fits");
        assert_eq!(err.location(), Some("mock"));
        assert_eq!(
            err.description(),
            Some("no_matching_rule#nothing fits-mock")
        );
        assert_eq!(
            logger.events(),
            vec![
                start(&1),
                LogEvent::Error {
                    name: Some(names::NO_MATCHING_RULE.into()),
                    message: "nothing fits".into(),
                },
                LogEvent::Finish { successful: None },
            ]
        );
    }

    #[test]
    fn generic_failure_is_wrapped() {
        let mock = Arc::new(MockEngine::new(MockBehavior::Failed("codec exploded".into())));
        let (spectrum, logger) = spectrum_with(mock);
        let bitmap = Bitmap::new(
            ImageSize::new(1, 1).unwrap(),
            ImagePixelSpecification::Gray,
            vec![7],
        )
        .unwrap();

        let err = spectrum
            .transform(
                &bitmap,
                &mut BitmapTarget::new(),
                &TransformOptions::default(),
                &"t",
            )
            .unwrap_err();

        assert_eq!(err.name(), None);
        assert_eq!(err.message(), "codec exploded");
        assert_eq!(err.cause().unwrap().to_string(), "codec exploded");
        let events = logger.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], LogEvent::Error { name: None, .. }));
        assert_eq!(events[2], LogEvent::Finish { successful: None });
    }

    #[test]
    fn failing_stream_reports_cause_once() {
        let mock = Arc::new(MockEngine::succeeding("image_rs"));
        let (spectrum, logger) = spectrum_with(mock);
        let mut reader = FailingReader { remaining: 10 };

        let err = spectrum
            .decode(
                EncodedImageSource::from_reader(&mut reader),
                &mut BitmapTarget::new(),
                &DecodeOptions::default(),
                &"decode",
            )
            .unwrap_err();

        assert!(err.is(names::IO_FAILURE));
        assert_eq!(err.message(), "stream broke after 10 bytes");
        assert_eq!(
            err.cause().unwrap().to_string(),
            "stream broke after 10 bytes"
        );
        let events = logger.events();
        let errors = events
            .iter()
            .filter(|e| matches!(e, LogEvent::Error { .. }))
            .count();
        assert_eq!(errors, 1);
        assert_eq!(events.last(), Some(&LogEvent::Finish { successful: None }));
    }

    #[test]
    fn unavailable_engine_still_closes_owned_source() {
        let logger = Arc::new(RecordingLogger::default());
        let spectrum = Spectrum::with_loader(
            EngineContext::default(),
            |_: &EngineContext| -> LoadResult { Err(SpectrumError::new("no engine today")) },
            Arc::clone(&logger) as Arc<dyn SpectrumLogger>,
        );
        let closed = Arc::new(AtomicUsize::new(0));
        let source = EncodedImageSource::owning(ClosingReader {
            inner: FailingReader { remaining: 0 },
            closed: Arc::clone(&closed),
        });

        let err = spectrum
            .decode(source, &mut BitmapTarget::new(), &DecodeOptions::default(), &())
            .unwrap_err();

        assert!(err.is(names::ENGINE_UNAVAILABLE));
        assert!(!spectrum.is_available());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(logger.events().len(), 3);
    }

    #[test]
    fn owned_source_closed_once_on_failure() {
        let mock = Arc::new(MockEngine::succeeding("copy"));
        let (spectrum, _logger) = spectrum_with(mock);
        let closed = Arc::new(AtomicUsize::new(0));
        let source = EncodedImageSource::owning(ClosingReader {
            inner: FailingReader { remaining: 3 },
            closed: Arc::clone(&closed),
        });

        assert!(
            spectrum
                .transcode(
                    source,
                    EncodedImageSink::owning(Vec::new()),
                    &transcode_options(),
                    &()
                )
                .is_err()
        );
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn borrowed_source_is_never_closed() {
        let mock = Arc::new(MockEngine::succeeding("copy"));
        let (spectrum, _logger) = spectrum_with(mock);
        let closed = Arc::new(AtomicUsize::new(0));
        let mut reader = ClosingReader {
            inner: FailingReader { remaining: 3 },
            closed: Arc::clone(&closed),
        };

        let _ = spectrum.transcode(
            EncodedImageSource::from_reader(&mut reader),
            EncodedImageSink::owning(Vec::new()),
            &transcode_options(),
            &(),
        );
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        drop(reader);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    struct PanickingEngine;

    impl ImageEngine for PanickingEngine {
        fn name(&self) -> &str {
            "panicking"
        }

        fn decode(
            &self,
            _source: &mut EncodedImageSource<'_>,
            _target: &mut BitmapTarget,
            _options: &Options,
        ) -> Result<SpectrumResult, EngineError> {
            panic!("decoder state corrupted")
        }

        fn encode(
            &self,
            _bitmap: &Bitmap,
            _sink: &mut EncodedImageSink<'_>,
            _options: &Options,
        ) -> Result<SpectrumResult, EngineError> {
            panic!("encoder state corrupted")
        }

        fn transcode(
            &self,
            _source: &mut EncodedImageSource<'_>,
            _sink: &mut EncodedImageSink<'_>,
            _options: &Options,
        ) -> Result<SpectrumResult, EngineError> {
            panic!("transcoder state corrupted")
        }

        fn transform(
            &self,
            _bitmap: &Bitmap,
            _target: &mut BitmapTarget,
            _options: &Options,
        ) -> Result<SpectrumResult, EngineError> {
            panic!("transformer state corrupted")
        }
    }

    #[test]
    fn panicking_engine_still_finishes_logging() {
        let logger = Arc::new(RecordingLogger::default());
        let spectrum = Spectrum::with_loader(
            EngineContext::default(),
            |_: &EngineContext| -> LoadResult { Ok(Arc::new(PanickingEngine)) },
            Arc::clone(&logger) as Arc<dyn SpectrumLogger>,
        );
        let closed = Arc::new(AtomicUsize::new(0));
        let source = EncodedImageSource::owning(ClosingReader {
            inner: FailingReader { remaining: 3 },
            closed: Arc::clone(&closed),
        });

        let err = spectrum
            .decode(source, &mut BitmapTarget::new(), &DecodeOptions::default(), &())
            .unwrap_err();

        assert_eq!(err.message(), "decode panicked: decoder state corrupted");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(logger.events().last(), Some(&LogEvent::Finish { successful: None }));
    }

    #[test]
    fn panicking_loader_still_finishes_logging() {
        let logger = Arc::new(RecordingLogger::default());
        let spectrum = Spectrum::with_loader(
            EngineContext::default(),
            |_: &EngineContext| -> LoadResult { panic!("loader exploded") },
            Arc::clone(&logger) as Arc<dyn SpectrumLogger>,
        );
        let closed = Arc::new(AtomicUsize::new(0));
        let source = EncodedImageSource::owning(ClosingReader {
            inner: FailingReader { remaining: 3 },
            closed: Arc::clone(&closed),
        });

        let err = spectrum
            .transcode(
                source,
                EncodedImageSink::owning(Vec::new()),
                &transcode_options(),
                &"load",
            )
            .unwrap_err();

        assert_eq!(err.message(), "transcode panicked: loader exploded");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        let events = logger.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], start(&"load"));
        assert!(matches!(events[1], LogEvent::Error { name: None, .. }));
        assert_eq!(events[2], LogEvent::Finish { successful: None });
    }

    #[test]
    fn format_support_includes_plugins() {
        let spectrum = Spectrum::default();
        assert!(spectrum.is_image_format_supported(&ImageFormat::Bitmap));
        assert!(spectrum.is_image_format_supported(&EncodedImageFormat::JPEG.into()));
        assert!(spectrum.is_image_format_supported(&EncodedImageFormat::GIF.into()));
        assert!(!spectrum.is_image_format_supported(&EncodedImageFormat::HEIF.into()));

        let bare = Spectrum::new(Configuration::empty(), Vec::new(), Arc::new(NoopLogger));
        assert!(!bare.is_image_format_supported(&EncodedImageFormat::GIF.into()));
        assert_eq!(bare.supported_formats().len(), 4);
    }

    #[test]
    fn release_reloads_on_next_use() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let spectrum = Spectrum::with_loader(
            EngineContext::default(),
            move |_: &EngineContext| -> LoadResult {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MockEngine::succeeding("copy")))
            },
            Arc::new(NoopLogger),
        );
        assert!(spectrum.is_available());
        spectrum.release();
        assert!(spectrum.is_available());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
