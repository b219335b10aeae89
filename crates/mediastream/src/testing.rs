//! In-memory engine for tests
//!
//! [`FakeEngine`] keeps streams and tracks in a map, records every call it
//! receives, and lets a test play the remote side: `remote_add_track` and
//! `remote_remove_track` change membership and fire the registered observer
//! from a foreign thread, the way a real engine's signaling thread would.

use crate::engine::Engine;
use crate::handle::NativeHandle;
use crate::observer::EventSink;
use crate::track::{TrackKind, TrackRef};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One call received by a [`FakeEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateStream(NativeHandle),
    DeleteStream(NativeHandle),
    StreamId(NativeHandle),
    AddTrack(NativeHandle, NativeHandle),
    RemoveTrack(NativeHandle, NativeHandle),
    Tracks(NativeHandle, TrackKind),
    RegisterObserver(NativeHandle),
    UnregisterObserver(NativeHandle),
}

impl EngineCall {
    /// Stream the call was about
    pub fn stream(&self) -> NativeHandle {
        match self {
            EngineCall::CreateStream(s)
            | EngineCall::DeleteStream(s)
            | EngineCall::StreamId(s)
            | EngineCall::AddTrack(s, _)
            | EngineCall::RemoveTrack(s, _)
            | EngineCall::Tracks(s, _)
            | EngineCall::RegisterObserver(s)
            | EngineCall::UnregisterObserver(s) => *s,
        }
    }
}

struct FakeStream {
    label: String,
    tracks: Vec<NativeHandle>,
}

#[derive(Default)]
struct FakeState {
    streams: HashMap<NativeHandle, FakeStream>,
    track_kinds: HashMap<NativeHandle, TrackKind>,
    observers: HashMap<NativeHandle, EventSink>,
    calls: Vec<EngineCall>,
    fail_register_observer: bool,
}

/// Engine double backed by in-memory maps
pub struct FakeEngine {
    state: Mutex<FakeState>,
    next_handle: AtomicU64,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            next_handle: AtomicU64::new(0x1000),
        })
    }

    fn allocate(&self) -> NativeHandle {
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        NativeHandle::new(raw).unwrap_or_else(|| unreachable!("handle counter starts above zero"))
    }

    /// Create a free-standing track the engine knows the kind of
    pub fn create_track(&self, kind: TrackKind) -> TrackRef {
        let handle = self.allocate();
        self.state.lock().track_kinds.insert(handle, kind);
        TrackRef::new(handle, kind)
    }

    /// Make the engine forget a track's kind, as if it was released
    pub fn forget_track(&self, track: NativeHandle) {
        self.state.lock().track_kinds.remove(&track);
    }

    /// Create a stream on the engine side, as a remote peer would
    ///
    /// Not recorded as a call; wrap it with `MediaStream::wrap`.
    pub fn adopt_stream(&self, label: &str) -> NativeHandle {
        let handle = self.allocate();
        self.state.lock().streams.insert(
            handle,
            FakeStream {
                label: label.to_string(),
                tracks: Vec::new(),
            },
        );
        handle
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_for_stream(&self, stream: NativeHandle) -> Vec<EngineCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.stream() == stream)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn has_stream(&self, stream: NativeHandle) -> bool {
        self.state.lock().streams.contains_key(&stream)
    }

    pub fn stream_count(&self) -> usize {
        self.state.lock().streams.len()
    }

    pub fn has_observer(&self, stream: NativeHandle) -> bool {
        self.state.lock().observers.contains_key(&stream)
    }

    /// Sink registered for `stream`, to fire events after the fact
    pub fn sink_for(&self, stream: NativeHandle) -> Option<EventSink> {
        self.state.lock().observers.get(&stream).cloned()
    }

    /// Engine-side membership of `stream`, in insertion order
    pub fn stream_tracks(&self, stream: NativeHandle) -> Vec<NativeHandle> {
        self.state
            .lock()
            .streams
            .get(&stream)
            .map(|s| s.tracks.clone())
            .unwrap_or_default()
    }

    /// Make the next `register_observer` calls fail
    pub fn set_fail_register_observer(&self, fail: bool) {
        self.state.lock().fail_register_observer = fail;
    }

    /// The remote side added `track`; fires the observer if armed
    ///
    /// Returns whether membership changed.
    pub fn remote_add_track(&self, stream: NativeHandle, track: NativeHandle) -> bool {
        let (changed, sink) = {
            let mut state = self.state.lock();
            let changed = match state.streams.get_mut(&stream) {
                Some(s) if !s.tracks.contains(&track) => {
                    s.tracks.push(track);
                    true
                }
                _ => false,
            };
            (changed, state.observers.get(&stream).cloned())
        };
        if let Some(sink) = sink {
            fire_from_engine_thread(move || sink.on_add_track(stream, track));
        }
        changed
    }

    /// The remote side removed `track`; fires the observer if armed
    pub fn remote_remove_track(&self, stream: NativeHandle, track: NativeHandle) -> bool {
        let (changed, sink) = {
            let mut state = self.state.lock();
            let changed = match state.streams.get_mut(&stream) {
                Some(s) => {
                    let before = s.tracks.len();
                    s.tracks.retain(|t| *t != track);
                    s.tracks.len() != before
                }
                None => false,
            };
            (changed, state.observers.get(&stream).cloned())
        };
        if let Some(sink) = sink {
            fire_from_engine_thread(move || sink.on_remove_track(stream, track));
        }
        changed
    }
}

/// Run `fire` on a separate thread and wait for it to return
fn fire_from_engine_thread<F: FnOnce() + Send + 'static>(fire: F) {
    let worker = std::thread::Builder::new()
        .name("fake-engine-signaling".to_string())
        .spawn(fire);
    match worker {
        Ok(handle) => {
            let _ = handle.join();
        }
        Err(e) => panic!("failed to spawn fake engine thread: {}", e),
    }
}

impl Engine for FakeEngine {
    fn create_stream(&self, label: &str) -> Result<NativeHandle> {
        let handle = self.allocate();
        let mut state = self.state.lock();
        state.streams.insert(
            handle,
            FakeStream {
                label: label.to_string(),
                tracks: Vec::new(),
            },
        );
        state.calls.push(EngineCall::CreateStream(handle));
        Ok(handle)
    }

    fn delete_stream(&self, stream: NativeHandle) {
        let mut state = self.state.lock();
        state.streams.remove(&stream);
        state.observers.remove(&stream);
        state.calls.push(EngineCall::DeleteStream(stream));
    }

    fn stream_id(&self, stream: NativeHandle) -> Result<String> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::StreamId(stream));
        state
            .streams
            .get(&stream)
            .map(|s| s.label.clone())
            .ok_or_else(|| Error::Engine(format!("unknown stream {}", stream)))
    }

    fn add_track(&self, stream: NativeHandle, track: NativeHandle) -> bool {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::AddTrack(stream, track));
        if !state.track_kinds.contains_key(&track) {
            return false;
        }
        match state.streams.get_mut(&stream) {
            Some(s) if !s.tracks.contains(&track) => {
                s.tracks.push(track);
                true
            }
            _ => false,
        }
    }

    fn remove_track(&self, stream: NativeHandle, track: NativeHandle) -> bool {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::RemoveTrack(stream, track));
        match state.streams.get_mut(&stream) {
            Some(s) => {
                let before = s.tracks.len();
                s.tracks.retain(|t| *t != track);
                s.tracks.len() != before
            }
            None => false,
        }
    }

    fn tracks(&self, stream: NativeHandle, kind: TrackKind) -> Vec<NativeHandle> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::Tracks(stream, kind));
        let Some(s) = state.streams.get(&stream) else {
            return Vec::new();
        };
        s.tracks
            .iter()
            .copied()
            .filter(|t| state.track_kinds.get(t) == Some(&kind))
            .collect()
    }

    fn track_kind(&self, track: NativeHandle) -> Option<TrackKind> {
        self.state.lock().track_kinds.get(&track).copied()
    }

    fn register_observer(&self, stream: NativeHandle, sink: EventSink) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::RegisterObserver(stream));
        if state.fail_register_observer {
            return Err(Error::Engine(format!(
                "observer registration refused for {}",
                stream
            )));
        }
        state.observers.insert(stream, sink);
        Ok(())
    }

    fn unregister_observer(&self, stream: NativeHandle) {
        let mut state = self.state.lock();
        state.observers.remove(&stream);
        state.calls.push(EngineCall::UnregisterObserver(stream));
    }
}
