//! MediaStream bridge test harness
//!
//! Wraps a [`FakeEngine`] and a [`Context`] built on it, plus helpers to
//! record what stream callbacks observed.
//!
//! Basic usage pattern:
//!
//! 1. Create a `BridgeHarness` with the dispatch mode under test
//! 2. Create streams with `harness.stream()`
//! 3. Play the remote side through `harness.engine`
//! 4. Call `harness.settle()` before asserting on callbacks

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use remotemedia_mediastream::testing::FakeEngine;
use remotemedia_mediastream::{
    BridgeConfig, Context, DispatchMode, MediaStream, TrackEvent, TrackRef,
};

/// Initialize tracing once for a test binary
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug,remotemedia_mediastream=trace")
        .with_test_writer()
        .try_init();
}

/// Engine double plus a context bound to it
pub struct BridgeHarness {
    pub engine: Arc<FakeEngine>,
    pub context: Context,
}

impl BridgeHarness {
    pub fn new(mode: DispatchMode) -> Self {
        Self::with_config(BridgeConfig::with_mode(mode))
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        init_test_tracing();
        let engine = FakeEngine::new();
        let context = Context::new(engine.clone(), config).expect("context");
        Self { engine, context }
    }

    pub fn stream(&self) -> MediaStream {
        MediaStream::new_in(&self.context).expect("stream")
    }

    /// Wait until every queued event has been delivered
    pub fn settle(&self) {
        self.context.flush().expect("flush");
    }
}

/// Which callback fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    Added(TrackRef),
    Removed(TrackRef),
}

/// Shared log of callback invocations, in delivery order
#[derive(Clone, Default)]
pub struct CallbackLog {
    entries: Arc<Mutex<Vec<Observed>>>,
    threads: Arc<Mutex<Vec<Option<String>>>>,
}

impl CallbackLog {
    /// Install both callbacks on `stream`
    pub fn attach(&self, stream: &MediaStream) {
        let log = self.clone();
        stream.set_on_add_track(move |event: &TrackEvent| log.push(Observed::Added(event.track)));
        let log = self.clone();
        stream.set_on_remove_track(move |event: &TrackEvent| {
            log.push(Observed::Removed(event.track))
        });
    }

    fn push(&self, observed: Observed) {
        self.entries.lock().push(observed);
        self.threads
            .lock()
            .push(std::thread::current().name().map(str::to_string));
    }

    pub fn entries(&self) -> Vec<Observed> {
        self.entries.lock().clone()
    }

    /// Name of the thread each callback ran on
    pub fn threads(&self) -> Vec<Option<String>> {
        self.threads.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
