//! C engine double for FFI tests
//!
//! Implements every [`EngineVTable`] entry point as an `extern "C"` function
//! over a Rust-side state struct, allocating returned strings and track
//! buffers with `libc::malloc` the way a C engine would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use parking_lot::Mutex;

use remotemedia_mediastream_ffi::vtable::{
    EngineVTable, TrackCallbackFn, TRACK_KIND_AUDIO, TRACK_KIND_UNKNOWN, TRACK_KIND_VIDEO,
};

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

struct Observer {
    on_add: TrackCallbackFn,
    on_remove: TrackCallbackFn,
    sink: usize,
}

#[derive(Default)]
struct CState {
    next_handle: u64,
    streams: HashMap<u64, (String, Vec<u64>)>,
    kinds: HashMap<u64, i32>,
    observers: HashMap<u64, Observer>,
    refuse_observers: bool,
    live_allocations: isize,
    deleted: Vec<u64>,
}

/// Engine state behind the `user_data` pointer
#[derive(Default)]
pub struct CEngine {
    state: Mutex<CState>,
}

impl CEngine {
    pub fn new() -> Box<Self> {
        let engine = Box::<Self>::default();
        engine.state.lock().next_handle = 0x100;
        engine
    }

    /// Function table pointing at this engine; `self` must outlive its users
    pub fn vtable(&self) -> EngineVTable {
        EngineVTable {
            user_data: self as *const CEngine as *mut c_void,
            create_stream: c_create_stream,
            delete_stream: c_delete_stream,
            stream_id: c_stream_id,
            free_string: c_free_string,
            add_track: c_add_track,
            remove_track: c_remove_track,
            get_tracks: c_get_tracks,
            free_tracks: c_free_tracks,
            track_kind: c_track_kind,
            register_observer: c_register_observer,
            unregister_observer: c_unregister_observer,
        }
    }

    pub fn create_track(&self, kind: i32) -> u64 {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.kinds.insert(handle, kind);
        handle
    }

    pub fn refuse_observers(&self, refuse: bool) {
        self.state.lock().refuse_observers = refuse;
    }

    pub fn has_observer(&self, stream: u64) -> bool {
        self.state.lock().observers.contains_key(&stream)
    }

    pub fn deleted(&self) -> Vec<u64> {
        self.state.lock().deleted.clone()
    }

    /// Strings and buffers handed out and not yet freed
    pub fn live_allocations(&self) -> isize {
        self.state.lock().live_allocations
    }

    /// Remote peer added `track`: update membership, fire from a native thread
    pub fn remote_add(&self, stream: u64, track: u64) {
        let observer = {
            let mut state = self.state.lock();
            if let Some((_, tracks)) = state.streams.get_mut(&stream) {
                tracks.push(track);
            }
            state.observers.get(&stream).map(|o| (o.on_add, o.sink))
        };
        if let Some((callback, sink)) = observer {
            fire(callback, sink, stream, track);
        }
    }

    pub fn remote_remove(&self, stream: u64, track: u64) {
        let observer = {
            let mut state = self.state.lock();
            if let Some((_, tracks)) = state.streams.get_mut(&stream) {
                tracks.retain(|t| *t != track);
            }
            state.observers.get(&stream).map(|o| (o.on_remove, o.sink))
        };
        if let Some((callback, sink)) = observer {
            fire(callback, sink, stream, track);
        }
    }
}

fn fire(callback: TrackCallbackFn, sink: usize, stream: u64, track: u64) {
    std::thread::Builder::new()
        .name("c-engine-signaling".to_string())
        .spawn(move || unsafe { callback(sink as *mut c_void, stream, track) })
        .unwrap()
        .join()
        .unwrap();
}

unsafe fn engine<'a>(user_data: *mut c_void) -> &'a CEngine {
    &*(user_data as *const CEngine)
}

unsafe extern "C" fn c_create_stream(user_data: *mut c_void, label: *const c_char) -> u64 {
    let label = CStr::from_ptr(label).to_string_lossy().into_owned();
    let mut state = engine(user_data).state.lock();
    state.next_handle += 1;
    let handle = state.next_handle;
    state.streams.insert(handle, (label, Vec::new()));
    handle
}

unsafe extern "C" fn c_delete_stream(user_data: *mut c_void, stream: u64) {
    let mut state = engine(user_data).state.lock();
    state.streams.remove(&stream);
    state.observers.remove(&stream);
    state.deleted.push(stream);
}

unsafe extern "C" fn c_stream_id(user_data: *mut c_void, stream: u64) -> *mut c_char {
    let mut state = engine(user_data).state.lock();
    let Some((label, _)) = state.streams.get(&stream) else {
        return std::ptr::null_mut();
    };
    let bytes = label.as_bytes();
    let ptr = libc::malloc(bytes.len() + 1) as *mut u8;
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
    *ptr.add(bytes.len()) = 0;
    state.live_allocations += 1;
    ptr as *mut c_char
}

unsafe extern "C" fn c_free_string(user_data: *mut c_void, s: *mut c_char) {
    libc::free(s as *mut c_void);
    engine(user_data).state.lock().live_allocations -= 1;
}

unsafe extern "C" fn c_add_track(user_data: *mut c_void, stream: u64, track: u64) -> bool {
    let mut state = engine(user_data).state.lock();
    if !state.kinds.contains_key(&track) {
        return false;
    }
    match state.streams.get_mut(&stream) {
        Some((_, tracks)) if !tracks.contains(&track) => {
            tracks.push(track);
            true
        }
        _ => false,
    }
}

unsafe extern "C" fn c_remove_track(user_data: *mut c_void, stream: u64, track: u64) -> bool {
    let mut state = engine(user_data).state.lock();
    match state.streams.get_mut(&stream) {
        Some((_, tracks)) => {
            let before = tracks.len();
            tracks.retain(|t| *t != track);
            tracks.len() != before
        }
        None => false,
    }
}

unsafe extern "C" fn c_get_tracks(
    user_data: *mut c_void,
    stream: u64,
    kind: i32,
    out_len: *mut usize,
) -> *mut u64 {
    let mut state = engine(user_data).state.lock();
    let matching: Vec<u64> = match state.streams.get(&stream) {
        Some((_, tracks)) => tracks
            .iter()
            .copied()
            .filter(|t| state.kinds.get(t) == Some(&kind))
            .collect(),
        None => Vec::new(),
    };
    *out_len = matching.len();
    if matching.is_empty() {
        return std::ptr::null_mut();
    }
    let ptr = libc::malloc(matching.len() * std::mem::size_of::<u64>()) as *mut u64;
    std::ptr::copy_nonoverlapping(matching.as_ptr(), ptr, matching.len());
    state.live_allocations += 1;
    ptr
}

unsafe extern "C" fn c_free_tracks(user_data: *mut c_void, tracks: *mut u64, _len: usize) {
    libc::free(tracks as *mut c_void);
    engine(user_data).state.lock().live_allocations -= 1;
}

unsafe extern "C" fn c_track_kind(user_data: *mut c_void, track: u64) -> i32 {
    let state = engine(user_data).state.lock();
    match state.kinds.get(&track) {
        Some(&kind) if kind == TRACK_KIND_AUDIO || kind == TRACK_KIND_VIDEO => kind,
        _ => TRACK_KIND_UNKNOWN,
    }
}

unsafe extern "C" fn c_register_observer(
    user_data: *mut c_void,
    stream: u64,
    on_add: TrackCallbackFn,
    on_remove: TrackCallbackFn,
    sink: *mut c_void,
) -> bool {
    let mut state = engine(user_data).state.lock();
    if state.refuse_observers {
        return false;
    }
    state.observers.insert(
        stream,
        Observer {
            on_add,
            on_remove,
            sink: sink as usize,
        },
    );
    true
}

unsafe extern "C" fn c_unregister_observer(user_data: *mut c_void, stream: u64) {
    engine(user_data).state.lock().observers.remove(&stream);
}
