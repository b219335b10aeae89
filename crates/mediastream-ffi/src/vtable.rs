//! C function table exposed by the native engine

use std::ffi::{c_char, c_void};

/// `track_kind` result for audio tracks
pub const TRACK_KIND_AUDIO: i32 = 0;
/// `track_kind` result for video tracks
pub const TRACK_KIND_VIDEO: i32 = 1;
/// `track_kind` result for tracks the engine does not know
pub const TRACK_KIND_UNKNOWN: i32 = -1;

/// Native add/remove notification entry point
///
/// `sink` is the opaque pointer passed to `register_observer`; `stream` and
/// `track` are native handles.
pub type TrackCallbackFn = unsafe extern "C" fn(sink: *mut c_void, stream: u64, track: u64);

/// Engine entry points, each taking `user_data` as first argument
///
/// Handles are non-zero `u64`s; zero means failure or "none". Every function
/// must be callable from any thread.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EngineVTable {
    pub user_data: *mut c_void,

    /// Create a stream labelled with the NUL-terminated `label`; 0 on failure
    pub create_stream: unsafe extern "C" fn(user_data: *mut c_void, label: *const c_char) -> u64,

    pub delete_stream: unsafe extern "C" fn(user_data: *mut c_void, stream: u64),

    /// Identity string of a stream, released with `free_string`; null on failure
    pub stream_id: unsafe extern "C" fn(user_data: *mut c_void, stream: u64) -> *mut c_char,

    pub free_string: unsafe extern "C" fn(user_data: *mut c_void, s: *mut c_char),

    pub add_track: unsafe extern "C" fn(user_data: *mut c_void, stream: u64, track: u64) -> bool,

    pub remove_track:
        unsafe extern "C" fn(user_data: *mut c_void, stream: u64, track: u64) -> bool,

    /// Tracks of `kind` in `stream`; the buffer is released with `free_tracks`
    pub get_tracks: unsafe extern "C" fn(
        user_data: *mut c_void,
        stream: u64,
        kind: i32,
        out_len: *mut usize,
    ) -> *mut u64,

    pub free_tracks: unsafe extern "C" fn(user_data: *mut c_void, tracks: *mut u64, len: usize),

    /// One of the `TRACK_KIND_*` constants
    pub track_kind: unsafe extern "C" fn(user_data: *mut c_void, track: u64) -> i32,

    /// Arm notifications; the engine calls `on_add`/`on_remove` with `sink`
    /// until `unregister_observer` returns
    pub register_observer: unsafe extern "C" fn(
        user_data: *mut c_void,
        stream: u64,
        on_add: TrackCallbackFn,
        on_remove: TrackCallbackFn,
        sink: *mut c_void,
    ) -> bool,

    /// Disarm notifications; no callback for `stream` is running or will start
    /// after return
    pub unregister_observer: unsafe extern "C" fn(user_data: *mut c_void, stream: u64),
}
