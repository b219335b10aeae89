//! C ABI adapter for the RemoteMedia MediaStream bridge
//!
//! The native WebRTC engine exposes its MediaStream entry points as a
//! [`EngineVTable`] of `extern "C"` functions. [`NativeEngine`] implements
//! the bridge's [`Engine`](remotemedia_mediastream::Engine) trait on top of
//! it; observer notifications come back through the trampolines in
//! [`callbacks`], which only post to the bridge's event queue.
//!
//! # Usage
//!
//! ```ignore
//! use remotemedia_mediastream::{context, BridgeConfig};
//! use remotemedia_mediastream_ffi::{init_tracing, EngineVTable, NativeEngine};
//!
//! init_tracing();
//! let engine = unsafe { NativeEngine::new(vtable_from_host) };
//! context::initialize(Arc::new(engine), BridgeConfig::from_env()?)?;
//! ```

#![warn(clippy::all)]

pub mod callbacks;
mod engine;
pub mod vtable;

pub use engine::NativeEngine;
pub use vtable::{EngineVTable, TrackCallbackFn};

/// Install a `tracing` subscriber honouring `RUST_LOG`, defaulting to `info`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// C entry point for [`init_tracing`]
#[no_mangle]
pub extern "C" fn remotemedia_mediastream_init_tracing() {
    init_tracing();
}

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
