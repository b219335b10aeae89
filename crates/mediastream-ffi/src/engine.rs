//! [`Engine`] implementation over an [`EngineVTable`]

use crate::callbacks::{on_add_track_trampoline, on_remove_track_trampoline};
use crate::vtable::{EngineVTable, TRACK_KIND_AUDIO, TRACK_KIND_UNKNOWN, TRACK_KIND_VIDEO};
use parking_lot::Mutex;
use remotemedia_mediastream::{Engine, Error, EventSink, NativeHandle, Result, TrackKind};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use tracing::warn;

fn kind_to_raw(kind: TrackKind) -> i32 {
    match kind {
        TrackKind::Audio => TRACK_KIND_AUDIO,
        TrackKind::Video => TRACK_KIND_VIDEO,
    }
}

fn kind_from_raw(raw: i32) -> Option<TrackKind> {
    match raw {
        TRACK_KIND_AUDIO => Some(TrackKind::Audio),
        TRACK_KIND_VIDEO => Some(TrackKind::Video),
        TRACK_KIND_UNKNOWN => None,
        other => {
            warn!("Engine reported unknown track kind {}", other);
            None
        }
    }
}

/// Native engine reached through a C function table
pub struct NativeEngine {
    vtable: EngineVTable,
    /// Sinks whose addresses the engine holds, keyed by stream
    sinks: Mutex<HashMap<NativeHandle, Box<EventSink>>>,
}

// SAFETY: the vtable contract requires every entry point, and `user_data`,
// to be usable from any thread.
unsafe impl Send for NativeEngine {}
unsafe impl Sync for NativeEngine {}

impl NativeEngine {
    /// Wrap a native function table
    ///
    /// # Safety
    ///
    /// Every function in `vtable` must honour the documented contract for as
    /// long as the returned engine lives, and `user_data` must stay valid
    /// for that long.
    pub unsafe fn new(vtable: EngineVTable) -> Self {
        Self {
            vtable,
            sinks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of streams with an armed observer
    pub fn observer_count(&self) -> usize {
        self.sinks.lock().len()
    }
}

impl Engine for NativeEngine {
    fn create_stream(&self, label: &str) -> Result<NativeHandle> {
        let label = CString::new(label)
            .map_err(|_| Error::Engine("stream label contains a NUL byte".to_string()))?;
        // SAFETY: label outlives the call
        let raw = unsafe { (self.vtable.create_stream)(self.vtable.user_data, label.as_ptr()) };
        NativeHandle::new(raw).ok_or_else(|| Error::Engine("engine failed to create stream".to_string()))
    }

    fn delete_stream(&self, stream: NativeHandle) {
        unsafe { (self.vtable.delete_stream)(self.vtable.user_data, stream.as_raw()) }
    }

    fn stream_id(&self, stream: NativeHandle) -> Result<String> {
        let ptr = unsafe { (self.vtable.stream_id)(self.vtable.user_data, stream.as_raw()) };
        if ptr.is_null() {
            return Err(Error::Engine(format!("engine has no id for stream {}", stream)));
        }
        // SAFETY: non-null, NUL-terminated, owned by us until free_string
        let id = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { (self.vtable.free_string)(self.vtable.user_data, ptr) };
        Ok(id)
    }

    fn add_track(&self, stream: NativeHandle, track: NativeHandle) -> bool {
        unsafe { (self.vtable.add_track)(self.vtable.user_data, stream.as_raw(), track.as_raw()) }
    }

    fn remove_track(&self, stream: NativeHandle, track: NativeHandle) -> bool {
        unsafe {
            (self.vtable.remove_track)(self.vtable.user_data, stream.as_raw(), track.as_raw())
        }
    }

    fn tracks(&self, stream: NativeHandle, kind: TrackKind) -> Vec<NativeHandle> {
        let mut len = 0usize;
        let ptr = unsafe {
            (self.vtable.get_tracks)(
                self.vtable.user_data,
                stream.as_raw(),
                kind_to_raw(kind),
                &mut len,
            )
        };
        if ptr.is_null() {
            return Vec::new();
        }

        // SAFETY: the engine returned `len` initialized handles at `ptr`
        let raw = unsafe { std::slice::from_raw_parts(ptr, len) };
        let tracks = raw.iter().copied().filter_map(NativeHandle::new).collect();
        unsafe { (self.vtable.free_tracks)(self.vtable.user_data, ptr, len) };
        tracks
    }

    fn track_kind(&self, track: NativeHandle) -> Option<TrackKind> {
        let raw = unsafe { (self.vtable.track_kind)(self.vtable.user_data, track.as_raw()) };
        kind_from_raw(raw)
    }

    fn register_observer(&self, stream: NativeHandle, sink: EventSink) -> Result<()> {
        // Stored first: the engine may fire before register returns
        let sink_ptr = match self.sinks.lock().entry(stream) {
            // The engine may still hold the registered sink pointer
            Entry::Occupied(_) => {
                return Err(Error::Engine(format!(
                    "observer already registered for stream {}",
                    stream
                )));
            }
            Entry::Vacant(slot) => {
                let boxed = slot.insert(Box::new(sink));
                &**boxed as *const EventSink as *mut c_void
            }
        };

        let armed = unsafe {
            (self.vtable.register_observer)(
                self.vtable.user_data,
                stream.as_raw(),
                on_add_track_trampoline,
                on_remove_track_trampoline,
                sink_ptr,
            )
        };
        if !armed {
            self.sinks.lock().remove(&stream);
            return Err(Error::Engine(format!(
                "engine refused observer registration for stream {}",
                stream
            )));
        }
        Ok(())
    }

    fn unregister_observer(&self, stream: NativeHandle) {
        unsafe { (self.vtable.unregister_observer)(self.vtable.user_data, stream.as_raw()) };
        // No callback can be running with this sink any more
        self.sinks.lock().remove(&stream);
    }
}
