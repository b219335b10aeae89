//! Engine context
//!
//! A [`Context`] ties one [`Engine`] to the handle table, the observer bridge
//! and the dispatcher that serve every stream created against it. Most
//! applications use the process-wide default set up with [`initialize`];
//! explicit contexts are handy for tests and for hosting several engines.

use crate::config::{BridgeConfig, DispatchMode};
use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use crate::handle::NativeHandle;
use crate::observer::{EventSink, ObserverBridge};
use crate::stream::StreamInner;
use crate::table::HandleTable;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Process-wide default context
static CONTEXT: OnceLock<RwLock<Option<Context>>> = OnceLock::new();

fn global() -> &'static RwLock<Option<Context>> {
    CONTEXT.get_or_init(|| RwLock::new(None))
}

/// Outcome of shutting a context down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Streams still live at shutdown, i.e. never disposed nor dropped
    pub leaked: Vec<NativeHandle>,
}

impl ShutdownReport {
    /// Whether every stream was disposed before shutdown
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
    }
}

struct ContextInner {
    config: BridgeConfig,
    engine: Arc<dyn Engine>,
    streams: Arc<HandleTable<StreamInner>>,
    bridge: ObserverBridge,
    dispatcher: Dispatcher,
    alive: AtomicBool,
}

impl ContextInner {
    fn shutdown(&self) -> ShutdownReport {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return ShutdownReport::default();
        }

        self.dispatcher.shutdown();

        let leaked = self.streams.drain();
        if self.config.warn_on_leak {
            for handle in &leaked {
                warn!("MediaStream {} was never disposed", handle);
            }
        }

        info!(
            "Engine context shut down ({} leaked streams)",
            leaked.len()
        );

        ShutdownReport { leaked }
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to an engine context; cheap to clone
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a context for `engine`
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the dispatcher cannot be started.
    pub fn new(engine: Arc<dyn Engine>, config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let streams = Arc::new(HandleTable::new());
        let bridge = ObserverBridge::new(Arc::clone(&streams), Arc::clone(&engine));
        let dispatcher = Dispatcher::start(bridge.clone(), &config)?;

        info!(
            "Engine context initialized ({:?} dispatch)",
            config.dispatch_mode
        );

        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                engine,
                streams,
                bridge,
                dispatcher,
                alive: AtomicBool::new(true),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.inner.engine
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.inner.dispatcher.mode()
    }

    /// Whether the context is still usable (not shut down)
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Number of streams currently registered
    pub fn stream_count(&self) -> usize {
        self.inner.streams.len()
    }

    /// Whether a stream is registered for `handle`
    pub fn has_stream(&self, handle: NativeHandle) -> bool {
        self.inner.streams.contains(handle)
    }

    /// Deliver queued events on the calling thread; see [`DispatchMode::Manual`]
    pub fn dispatch_pending(&self) -> usize {
        self.inner.dispatcher.dispatch_pending()
    }

    /// Block until every event queued so far has been delivered
    pub fn flush(&self) -> Result<()> {
        self.inner.dispatcher.flush()
    }

    /// Wait until every event queued so far has been delivered
    pub async fn flush_async(&self) -> Result<()> {
        self.inner.dispatcher.flush_async().await
    }

    /// Tear the context down
    ///
    /// Stops event delivery and empties the handle table. Streams still live
    /// are reported as leaked; disposing them later skips the native release.
    /// Calling this again returns an empty report.
    pub fn shutdown(&self) -> ShutdownReport {
        self.inner.shutdown()
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(Error::EngineUnavailable(
                "engine context has been shut down".to_string(),
            ))
        }
    }

    pub(crate) fn streams(&self) -> &HandleTable<StreamInner> {
        &self.inner.streams
    }

    pub(crate) fn bridge(&self) -> &ObserverBridge {
        &self.inner.bridge
    }

    pub(crate) fn event_sink(&self) -> EventSink {
        self.inner.dispatcher.sink()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("dispatch_mode", &self.dispatch_mode())
            .field("alive", &self.is_alive())
            .field("streams", &self.stream_count())
            .finish()
    }
}

/// Initialize the process-wide context
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] if a live context is installed.
pub fn initialize(engine: Arc<dyn Engine>, config: BridgeConfig) -> Result<Context> {
    let mut slot = global().write();
    if slot.as_ref().is_some_and(Context::is_alive) {
        return Err(Error::AlreadyInitialized);
    }

    let context = Context::new(engine, config)?;
    *slot = Some(context.clone());
    Ok(context)
}

/// The process-wide context
///
/// # Errors
///
/// Returns [`Error::EngineUnavailable`] if none is initialized or it has
/// been shut down.
pub fn current() -> Result<Context> {
    global()
        .read()
        .as_ref()
        .filter(|context| context.is_alive())
        .cloned()
        .ok_or_else(|| Error::EngineUnavailable("engine context not initialized".to_string()))
}

/// Whether a live process-wide context is installed
pub fn is_initialized() -> bool {
    current().is_ok()
}

/// Shut the process-wide context down and uninstall it
///
/// Returns `None` if none was installed.
pub fn shutdown() -> Option<ShutdownReport> {
    let context = global().write().take()?;
    Some(context.shutdown())
}
