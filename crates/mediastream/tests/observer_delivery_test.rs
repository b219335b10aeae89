//! Observer delivery integration tests
//!
//! Native callbacks arrive on an engine thread; these tests check that user
//! code only ever runs on the designated execution context, in order.

mod harness;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use harness::{BridgeHarness, CallbackLog, Observed};
use remotemedia_mediastream::{
    BridgeConfig, Context, DispatchMode, Error, MediaStream, StreamEvent, TrackKind,
};
use remotemedia_mediastream::testing::FakeEngine;
use tokio::sync::broadcast::error::RecvError;

// =============================================================================
// Thread mode
// =============================================================================

#[test]
fn test_callbacks_run_on_dispatcher_thread() {
    let mut config = BridgeConfig::with_mode(DispatchMode::Thread);
    config.dispatcher_thread_name = "test-dispatch".to_string();
    let h = BridgeHarness::with_config(config);
    let stream = h.stream();
    let handle = stream.handle().unwrap();
    let log = CallbackLog::default();
    log.attach(&stream);

    let track = h.engine.create_track(TrackKind::Audio);
    h.engine.remote_add_track(handle, track.handle());
    h.engine.remote_remove_track(handle, track.handle());
    h.settle();

    assert_eq!(
        log.entries(),
        vec![Observed::Added(track), Observed::Removed(track)]
    );
    assert!(log
        .threads()
        .iter()
        .all(|name| name.as_deref() == Some("test-dispatch")));
}

#[test]
fn test_per_stream_order_is_preserved() {
    let h = BridgeHarness::new(DispatchMode::Thread);
    let first = h.stream();
    let second = h.stream();
    let first_log = CallbackLog::default();
    let second_log = CallbackLog::default();
    first_log.attach(&first);
    second_log.attach(&second);

    let tracks: Vec<_> = (0..20)
        .map(|i| {
            let kind = if i % 2 == 0 { TrackKind::Audio } else { TrackKind::Video };
            h.engine.create_track(kind)
        })
        .collect();

    let first_handle = first.handle().unwrap();
    let second_handle = second.handle().unwrap();
    for track in &tracks {
        h.engine.remote_add_track(first_handle, track.handle());
        h.engine.remote_add_track(second_handle, track.handle());
    }
    for track in tracks.iter().rev() {
        h.engine.remote_remove_track(first_handle, track.handle());
    }
    h.settle();

    let expected_first: Vec<Observed> = tracks
        .iter()
        .map(|t| Observed::Added(*t))
        .chain(tracks.iter().rev().map(|t| Observed::Removed(*t)))
        .collect();
    let expected_second: Vec<Observed> = tracks.iter().map(|t| Observed::Added(*t)).collect();

    assert_eq!(first_log.entries(), expected_first);
    assert_eq!(second_log.entries(), expected_second);
    assert!(first.cached_tracks().unwrap().is_empty());
    assert_eq!(second.cached_tracks().unwrap().len(), tracks.len());
}

#[test]
fn test_panicking_callback_does_not_stop_delivery() {
    let h = BridgeHarness::new(DispatchMode::Thread);
    let stream = h.stream();
    let handle = stream.handle().unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    stream.set_on_add_track(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first callback blows up");
        }
    });

    let a = h.engine.create_track(TrackKind::Audio);
    let b = h.engine.create_track(TrackKind::Audio);
    h.engine.remote_add_track(handle, a.handle());
    h.engine.remote_add_track(handle, b.handle());
    h.settle();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(stream.cached_tracks().unwrap(), vec![a, b]);
}

#[test]
fn test_dispose_from_callback() {
    let h = BridgeHarness::new(DispatchMode::Thread);
    let stream = Arc::new(h.stream());
    let handle = stream.handle().unwrap();

    let weak = Arc::downgrade(&stream);
    stream.set_on_add_track(move |_| {
        if let Some(stream) = weak.upgrade() {
            stream.dispose();
        }
    });

    let a = h.engine.create_track(TrackKind::Video);
    let b = h.engine.create_track(TrackKind::Video);
    h.engine.remote_add_track(handle, a.handle());
    let late = h.engine.sink_for(handle);
    h.settle();

    assert!(stream.is_disposed());
    assert!(!h.engine.has_stream(handle));

    // Anything raised afterwards finds no stream
    if let Some(sink) = late {
        sink.on_add_track(handle, b.handle());
    }
    h.settle();
    assert!(matches!(stream.cached_tracks(), Err(Error::Disposed)));
}

#[test]
fn test_cleared_callback_stops_firing() {
    let h = BridgeHarness::new(DispatchMode::Manual);
    let stream = h.stream();
    let handle = stream.handle().unwrap();
    let log = CallbackLog::default();
    log.attach(&stream);

    let a = h.engine.create_track(TrackKind::Audio);
    h.engine.remote_add_track(handle, a.handle());
    h.settle();
    stream.clear_on_add_track();
    stream.clear_on_remove_track();

    let b = h.engine.create_track(TrackKind::Audio);
    h.engine.remote_add_track(handle, b.handle());
    h.engine.remote_remove_track(handle, a.handle());
    h.settle();

    assert_eq!(log.entries(), vec![Observed::Added(a)]);
    assert_eq!(stream.cached_tracks().unwrap(), vec![b]);
}

#[test]
fn test_shutdown_drops_events_queued_behind_running_callback() {
    let h = BridgeHarness::new(DispatchMode::Thread);
    let stream = h.stream();
    let handle = stream.handle().unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let counter = fired.clone();
    stream.set_on_add_track(move |_| {
        let _ = entered_tx.send(());
        std::thread::sleep(Duration::from_millis(200));
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let a = h.engine.create_track(TrackKind::Audio);
    let b = h.engine.create_track(TrackKind::Video);
    h.engine.remote_add_track(handle, a.handle());
    h.engine.remote_add_track(handle, b.handle());

    // First callback is running; the second event is still queued
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    h.context.shutdown();

    assert!(!h.context.is_alive());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(stream.cached_tracks().unwrap(), vec![a]);
}

#[test]
fn test_flush_after_shutdown_returns() {
    let h = BridgeHarness::new(DispatchMode::Thread);
    h.context.shutdown();
    assert!(h.context.flush().is_ok());
}

// =============================================================================
// Manual mode
// =============================================================================

#[test]
fn test_manual_mode_delivers_only_when_pumped() {
    let h = BridgeHarness::new(DispatchMode::Manual);
    let stream = h.stream();
    let handle = stream.handle().unwrap();
    let log = CallbackLog::default();
    log.attach(&stream);

    let track = h.engine.create_track(TrackKind::Video);
    h.engine.remote_add_track(handle, track.handle());
    assert!(log.entries().is_empty());

    let test_thread = std::thread::current().name().map(str::to_string);
    assert_eq!(h.context.dispatch_pending(), 1);
    assert_eq!(log.entries(), vec![Observed::Added(track)]);
    assert_eq!(log.threads(), vec![test_thread]);
    assert_eq!(h.context.dispatch_pending(), 0);
}

// =============================================================================
// Tokio mode and subscriptions
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_mode_delivers_to_subscribers() {
    harness::init_test_tracing();
    let engine = FakeEngine::new();
    let context = Context::new(engine.clone(), BridgeConfig::with_mode(DispatchMode::Tokio)).unwrap();
    assert_eq!(context.dispatch_mode(), DispatchMode::Tokio);

    let stream = MediaStream::new_in(&context).unwrap();
    let handle = stream.handle().unwrap();
    let mut events = stream.subscribe();

    let track = engine.create_track(TrackKind::Audio);
    engine.remote_add_track(handle, track.handle());
    engine.remote_remove_track(handle, track.handle());
    context.flush_async().await.unwrap();

    let added = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(added, StreamEvent::TrackAdded(remotemedia_mediastream::TrackEvent {
        stream: handle,
        track,
    }));
    let removed = events.recv().await.unwrap();
    assert!(!removed.is_added());
    assert_eq!(removed.track_event().track, track);

    stream.dispose();
    assert!(context.shutdown().is_clean());
}

#[test]
fn test_tokio_mode_requires_runtime() {
    let engine = FakeEngine::new();
    let result = Context::new(engine, BridgeConfig::with_mode(DispatchMode::Tokio));
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn test_slow_subscriber_lags() {
    let mut config = BridgeConfig::with_mode(DispatchMode::Manual);
    config.event_channel_capacity = 2;
    let h = BridgeHarness::with_config(config);
    let stream = h.stream();
    let handle = stream.handle().unwrap();
    let mut events = stream.subscribe();

    for _ in 0..4 {
        let track = h.engine.create_track(TrackKind::Video);
        h.engine.remote_add_track(handle, track.handle());
    }
    h.context.flush_async().await.unwrap();

    assert!(matches!(events.recv().await, Err(RecvError::Lagged(2))));
    assert!(events.recv().await.unwrap().is_added());
    assert_eq!(stream.cached_tracks().unwrap().len(), 4);
}
