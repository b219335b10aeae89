//! MediaStream handle bridge for RemoteMedia
//!
//! Binds MediaStream objects owned by a native WebRTC engine to owned Rust
//! wrappers. The engine only ever hands out opaque handles; this crate keeps
//! a registry mapping those handles back to their wrappers so native
//! callbacks can find the stream they are about.
//!
//! # Features
//!
//! - **Handle registry**: one live wrapper per native handle, weakly held
//! - **Deterministic release**: explicit `dispose()`, with drop as the fallback
//! - **Observer bridge**: engine-side track additions/removals reach the
//!   stream's callbacks and broadcast subscribers
//! - **Designated dispatch**: native callbacks only enqueue; delivery happens
//!   on a dispatcher thread, a tokio task, or wherever the app pumps it
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  Application                                           │
//! │  ↓ MediaStream::new / add_track / tracks / dispose     │
//! │  MediaStream ──owns──▶ StreamInner (state, cache, cbs) │
//! │  ↑ weak                                                │
//! │  HandleTable (NativeHandle → Weak<StreamInner>)        │
//! │  ↑ lookup                                              │
//! │  ObserverBridge ◀── Dispatcher ◀── EventSink           │
//! │                     (FIFO queue)      ↑ any thread     │
//! │  Engine trait ────────────────────────┘                │
//! │  ↓                                                     │
//! │  Native WebRTC engine (C ABI, see mediastream-ffi)     │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use remotemedia_mediastream::{context, BridgeConfig, MediaStream};
//!
//! context::initialize(engine, BridgeConfig::load(None::<&str>)?)?;
//!
//! let stream = MediaStream::new()?;
//! stream.set_on_add_track(|event| println!("remote added {}", event.track));
//! stream.add_track(&local_audio)?;
//!
//! for track in stream.tracks()? {
//!     println!("{}", track);
//! }
//!
//! stream.dispose();
//! let report = context::shutdown();
//! ```

#![warn(clippy::all)]

// Public modules
pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod observer;
pub mod stream;
pub mod table;
pub mod track;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Internal modules
mod dispatch;

// Re-exports for public API
pub use config::{BridgeConfig, ConfigError, DispatchMode};
pub use context::{Context, ShutdownReport};
pub use engine::Engine;
pub use error::{Error, Result};
pub use events::{StreamEvent, TrackEvent};
pub use handle::NativeHandle;
pub use observer::EventSink;
pub use stream::{MediaStream, StreamState, TrackCallback, Tracks};
pub use table::HandleTable;
pub use track::{TrackIter, TrackKind, TrackRef};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
