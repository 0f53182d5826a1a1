//! Lazily loaded engine behind a lock, shared by every operation of a facade.

use super::{ImageEngine, RustEngine};
use crate::config::Configuration;
use crate::error::{SpectrumError, engine_error, names};
use crate::plugins::SpectrumPlugin;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Everything an engine needs to start: the global configuration and the
/// registered plugins. Created once and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct EngineContext {
    pub configuration: Configuration,
    pub plugins: Vec<Arc<dyn SpectrumPlugin>>,
}

impl EngineContext {
    pub fn new(configuration: Configuration, plugins: Vec<Arc<dyn SpectrumPlugin>>) -> Self {
        Self {
            configuration,
            plugins,
        }
    }
}

/// Creates engines from a context.
///
/// Implemented for closures, so tests and embedders can swap the engine:
///
/// ```
/// # use spectrum::engine::{EngineContext, EngineHandle, ImageEngine, RustEngine};
/// # use std::sync::Arc;
/// # use spectrum::error::SpectrumError;
/// let handle = EngineHandle::with_loader(
///     EngineContext::default(),
///     |ctx: &EngineContext| -> Result<Arc<dyn ImageEngine>, SpectrumError> {
///         Ok(Arc::new(RustEngine::new(ctx)))
///     },
/// );
/// assert!(handle.is_available());
/// ```
pub trait EngineLoader: Send + Sync {
    fn load(&self, context: &EngineContext) -> Result<Arc<dyn ImageEngine>, SpectrumError>;
}

impl<F> EngineLoader for F
where
    F: Fn(&EngineContext) -> Result<Arc<dyn ImageEngine>, SpectrumError> + Send + Sync,
{
    fn load(&self, context: &EngineContext) -> Result<Arc<dyn ImageEngine>, SpectrumError> {
        self(context)
    }
}

fn load_rust_engine(context: &EngineContext) -> Result<Arc<dyn ImageEngine>, SpectrumError> {
    Ok(Arc::new(RustEngine::new(context)))
}

/// Lazily loaded, shareable engine.
///
/// The engine is loaded on first use, at most once per successful load. Each
/// dispatch rechecks validity under the lock; a failed load is not remembered,
/// so the next call tries again.
pub struct EngineHandle {
    context: EngineContext,
    loader: Box<dyn EngineLoader>,
    engine: Mutex<Option<Arc<dyn ImageEngine>>>,
}

impl EngineHandle {
    /// Handle loading the built-in [`RustEngine`].
    pub fn new(context: EngineContext) -> Self {
        Self::with_loader(context, load_rust_engine)
    }

    pub fn with_loader(context: EngineContext, loader: impl EngineLoader + 'static) -> Self {
        Self {
            context,
            loader: Box::new(loader),
            engine: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn ImageEngine>>> {
        // A panic while loading leaves at worst an empty slot.
        self.engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the loaded engine, loading (or reloading) it if needed.
    pub fn engine(&self) -> Result<Arc<dyn ImageEngine>, SpectrumError> {
        let mut slot = self.slot();
        if let Some(engine) = slot.as_ref() {
            if engine.is_valid() {
                return Ok(Arc::clone(engine));
            }
            warn!(engine = engine.name(), "engine no longer valid, reloading");
            *slot = None;
        }

        let engine = self.loader.load(&self.context).map_err(|e| {
            if e.name().is_some() {
                e
            } else {
                engine_error!(names::ENGINE_UNAVAILABLE, "failed to load engine: {}", e.message())
                    .caused_by(e)
            }
        })?;
        debug!(engine = engine.name(), "engine loaded");
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Forces loading and reports whether it succeeded.
    pub fn is_available(&self) -> bool {
        self.engine().is_ok()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot().is_some()
    }

    /// Drops the engine. The next dispatch loads a fresh one.
    pub fn release(&self) {
        if let Some(engine) = self.slot().take() {
            debug!(engine = engine.name(), "engine released");
        }
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("context", &self.context)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
