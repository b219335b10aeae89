//! Boundary to the native WebRTC engine
//!
//! Everything this crate needs from the engine goes through [`Engine`]. The
//! engine owns the real MediaStream and track objects; this side only ever
//! holds their handles.
//!
//! All calls are synchronous and return once the engine has acknowledged
//! them. Notifications flow the other way through the [`EventSink`] handed
//! to [`Engine::register_observer`], from whatever thread the engine likes.

use crate::handle::NativeHandle;
use crate::observer::EventSink;
use crate::track::TrackKind;
use crate::Result;

/// Native engine operations used by the stream bridge
///
/// Implementations must tolerate calls from several application threads.
/// They must not call back into [`MediaStream`](crate::MediaStream) methods
/// from inside these calls; notifications go through the sink.
pub trait Engine: Send + Sync {
    /// Create a native stream labelled `label`
    fn create_stream(&self, label: &str) -> Result<NativeHandle>;

    /// Release a native stream
    fn delete_stream(&self, stream: NativeHandle);

    /// Identity string of a stream
    fn stream_id(&self, stream: NativeHandle) -> Result<String>;

    /// Attach `track` to `stream`; `false` if the engine refused
    fn add_track(&self, stream: NativeHandle, track: NativeHandle) -> bool;

    /// Detach `track` from `stream`; `false` if it was not attached
    fn remove_track(&self, stream: NativeHandle, track: NativeHandle) -> bool;

    /// Current tracks of `stream` with the given kind
    fn tracks(&self, stream: NativeHandle, kind: TrackKind) -> Vec<NativeHandle>;

    /// Kind of a track, `None` if the engine no longer knows it
    fn track_kind(&self, track: NativeHandle) -> Option<TrackKind>;

    /// Start delivering add/remove notifications for `stream` to `sink`
    fn register_observer(&self, stream: NativeHandle, sink: EventSink) -> Result<()>;

    /// Stop delivering notifications for `stream`
    fn unregister_observer(&self, stream: NativeHandle);
}
