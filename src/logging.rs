//! Operation logging.
//!
//! The facade drives a [`SpectrumLogger`] through the same lifecycle for every
//! call:
//!
//! ```text
//! on_start(options, caller_context) -> LoggingContext
//!     [on_error(context, error)]        at most once, only on failure
//! on_finish(context, result)            exactly once, always last
//! ```
//!
//! Hooks run synchronously on the calling thread. A shared [`Spectrum`]
//! instance may be used from several threads at once, so implementations must
//! tolerate concurrent calls.
//!
//! [`Spectrum`]: crate::Spectrum

use crate::error::SpectrumError;
use crate::options::Options;
use crate::result::SpectrumResult;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Level;

/// Correlation token handed from `on_start` to the later hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LoggingContext(pub Option<u64>);

impl LoggingContext {
    pub const NONE: LoggingContext = LoggingContext(None);

    pub fn request_id(&self) -> Option<u64> {
        self.0
    }
}

/// Observer of operation lifecycles.
pub trait SpectrumLogger: Send + Sync {
    fn on_start(&self, options: &Options, caller_context: &dyn fmt::Debug) -> LoggingContext;

    fn on_error(&self, context: LoggingContext, error: &SpectrumError);

    /// `result` is `None` when the operation failed.
    fn on_finish(&self, context: LoggingContext, result: Option<&SpectrumResult>);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl SpectrumLogger for NoopLogger {
    fn on_start(&self, _options: &Options, _caller_context: &dyn fmt::Debug) -> LoggingContext {
        LoggingContext::NONE
    }

    fn on_error(&self, _context: LoggingContext, _error: &SpectrumError) {}

    fn on_finish(&self, _context: LoggingContext, _result: Option<&SpectrumResult>) {}
}

/// Emits one `tracing` event per hook, tagged with a process-unique request id.
#[derive(Debug, Clone, Copy)]
pub struct TracingLogger {
    level: Level,
    error_level: Level,
}

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// `tracing::event!` needs a constant level; dispatch on the runtime value.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::event!(Level::ERROR, $($arg)+)
        } else if level == Level::WARN {
            tracing::event!(Level::WARN, $($arg)+)
        } else if level == Level::INFO {
            tracing::event!(Level::INFO, $($arg)+)
        } else if level == Level::DEBUG {
            tracing::event!(Level::DEBUG, $($arg)+)
        } else {
            tracing::event!(Level::TRACE, $($arg)+)
        }
    }};
}

impl TracingLogger {
    pub fn new(level: Level, error_level: Level) -> Self {
        Self { level, error_level }
    }

    pub fn with_level(level: Level) -> Self {
        Self::new(level, Level::WARN)
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new(Level::DEBUG, Level::WARN)
    }
}

impl SpectrumLogger for TracingLogger {
    fn on_start(&self, options: &Options, caller_context: &dyn fmt::Debug) -> LoggingContext {
        let request_id = REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let options = crate::wire::to_json(options).unwrap_or_else(|e| format!("<{e}>"));
        event_at!(
            self.level,
            request_id,
            %options,
            caller_context = ?caller_context,
            "spectrum operation started"
        );
        LoggingContext(Some(request_id))
    }

    fn on_error(&self, context: LoggingContext, error: &SpectrumError) {
        let request_id = context.0.unwrap_or_default();
        let cause = error.cause().map(|c| c.to_string()).unwrap_or_default();
        event_at!(
            self.error_level,
            request_id,
            name = error.name().unwrap_or(""),
            location = error.location().unwrap_or(""),
            %cause,
            "spectrum operation failed: {}",
            error.message()
        );
    }

    fn on_finish(&self, context: LoggingContext, result: Option<&SpectrumResult>) {
        let request_id = context.0.unwrap_or_default();
        match result {
            Some(result) => event_at!(
                self.level,
                request_id,
                %result,
                "spectrum operation finished"
            ),
            None => event_at!(
                self.level,
                request_id,
                "spectrum operation finished without result"
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// One recorded hook invocation.
    #[derive(Debug, Clone, PartialEq)]
    pub enum LogEvent {
        Start { caller_context: String },
        Error { name: Option<String>, message: String },
        Finish { successful: Option<bool> },
    }

    /// Records every hook in order.
    #[derive(Default)]
    pub struct RecordingLogger {
        pub events: Mutex<Vec<LogEvent>>,
        next: AtomicU64,
    }

    impl RecordingLogger {
        pub fn events(&self) -> Vec<LogEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SpectrumLogger for RecordingLogger {
        fn on_start(&self, _options: &Options, caller_context: &dyn fmt::Debug) -> LoggingContext {
            self.events.lock().unwrap().push(LogEvent::Start {
                caller_context: format!("{caller_context:?}"),
            });
            LoggingContext(Some(self.next.fetch_add(1, Ordering::SeqCst)))
        }

        fn on_error(&self, _context: LoggingContext, error: &SpectrumError) {
            self.events.lock().unwrap().push(LogEvent::Error {
                name: error.name().map(str::to_string),
                message: error.message().to_string(),
            });
        }

        fn on_finish(&self, _context: LoggingContext, result: Option<&SpectrumResult>) {
            self.events.lock().unwrap().push(LogEvent::Finish {
                successful: result.map(SpectrumResult::is_successful),
            });
        }
    }

    #[test]
    fn tracing_logger_assigns_increasing_request_ids() {
        let logger = TracingLogger::default();
        let options = Options::default();
        let first = logger.on_start(&options, &"caller");
        let second = logger.on_start(&options, &"caller");
        assert!(second.request_id().unwrap() > first.request_id().unwrap());
        logger.on_error(second, &SpectrumError::new("boom"));
        logger.on_finish(second, None);
    }

    #[test]
    fn noop_logger_returns_empty_context() {
        let context = NoopLogger.on_start(&Options::default(), &42);
        assert_eq!(context, LoggingContext::NONE);
        assert!(context.request_id().is_none());
    }

    #[test]
    fn tracing_logger_levels() {
        let logger = TracingLogger::with_level(Level::INFO);
        assert_eq!(logger.level, Level::INFO);
        assert_eq!(logger.error_level, Level::WARN);
    }
}
