//! `extern "C"` trampolines handed to the engine as observer callbacks
//!
//! They run on engine threads, so they do as little as possible: validate
//! the arguments, post to the [`EventSink`] and return. A panic never
//! unwinds into the engine.

use remotemedia_mediastream::{EventSink, NativeHandle};
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, warn};

/// Native "track added" callback
///
/// # Safety
///
/// `sink` must be null or the pointer given to `register_observer`, still
/// registered.
pub unsafe extern "C" fn on_add_track_trampoline(sink: *mut c_void, stream: u64, track: u64) {
    forward("add", sink, stream, track, EventSink::on_add_track);
}

/// Native "track removed" callback
///
/// # Safety
///
/// Same contract as [`on_add_track_trampoline`].
pub unsafe extern "C" fn on_remove_track_trampoline(sink: *mut c_void, stream: u64, track: u64) {
    forward("remove", sink, stream, track, EventSink::on_remove_track);
}

fn forward(
    what: &str,
    sink: *mut c_void,
    stream: u64,
    track: u64,
    post: fn(&EventSink, NativeHandle, NativeHandle),
) {
    if sink.is_null() {
        warn!("Native {} track callback with null sink, ignoring", what);
        return;
    }
    let (Some(stream), Some(track)) = (NativeHandle::new(stream), NativeHandle::new(track)) else {
        warn!(
            "Native {} track callback with zero handle (stream={:#x}, track={:#x}), ignoring",
            what, stream, track
        );
        return;
    };

    let result = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: non-null and owned by the engine adapter while registered
        let sink = unsafe { &*(sink as *const EventSink) };
        post(sink, stream, track);
    }));
    if result.is_err() {
        error!(
            "Panic while posting native {} track event for stream {}",
            what, stream
        );
    }
}
