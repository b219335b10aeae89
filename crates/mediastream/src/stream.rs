//! MediaStream wrapper
//!
//! A [`MediaStream`] owns one native stream handle. While live it is
//! registered in its context's handle table and has an engine observer
//! armed, so tracks the engine adds or removes on its own reach the stream's
//! callbacks and subscribers.
//!
//! Lifecycle: `Live` from the moment the constructor returns, `Disposed`
//! after [`MediaStream::dispose`] or drop. Disposal unregisters the
//! observer, releases the native handle, removes the table entry and marks
//! the stream disposed, in that order. When the context has already been
//! shut down the two native calls are skipped.
//!
//! # Example
//!
//! ```no_run
//! use remotemedia_mediastream::{MediaStream, TrackKind};
//!
//! # fn example() -> remotemedia_mediastream::Result<()> {
//! let stream = MediaStream::new()?;
//! stream.set_on_add_track(|event| {
//!     println!("engine added {}", event.track);
//! });
//!
//! for track in stream.tracks_of_kind(TrackKind::Video)? {
//!     println!("video track {}", track.handle());
//! }
//!
//! stream.dispose();
//! # Ok(())
//! # }
//! ```

use crate::cache::TrackCache;
use crate::context::{self, Context};
use crate::engine::Engine;
use crate::events::{NativeEventKind, StreamEvent, TrackEvent};
use crate::handle::NativeHandle;
use crate::track::{TrackIter, TrackKind, TrackRef};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::iter::Chain;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// User callback for track notifications
pub type TrackCallback = Arc<dyn Fn(&TrackEvent) + Send + Sync>;

/// All tracks of a stream, audio first
pub type Tracks = Chain<TrackIter, TrackIter>;

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Live,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisposeReason {
    Explicit,
    Dropped,
}

struct StreamSlot {
    /// `None` once released
    handle: Option<NativeHandle>,
    disposed: bool,
    cache: TrackCache,
}

#[derive(Default)]
struct Callbacks {
    on_add_track: Option<TrackCallback>,
    on_remove_track: Option<TrackCallback>,
}

/// Shared state of a stream; the handle table points here weakly
pub(crate) struct StreamInner {
    context: Context,
    slot: Mutex<StreamSlot>,
    callbacks: Mutex<Callbacks>,
    events: broadcast::Sender<StreamEvent>,
}

impl StreamInner {
    /// Run `f` against the engine with the live handle, under the slot lock
    ///
    /// Holding the lock across the engine call keeps disposal from
    /// releasing the handle underneath it.
    fn with_live<R>(
        &self,
        f: impl FnOnce(&dyn Engine, NativeHandle, &mut TrackCache) -> Result<R>,
    ) -> Result<R> {
        let mut slot = self.slot.lock();
        if slot.disposed {
            return Err(Error::Disposed);
        }
        let handle = slot.handle.ok_or(Error::Disposed)?;
        self.context.ensure_alive()?;
        f(self.context.engine().as_ref(), handle, &mut slot.cache)
    }

    /// Apply an engine-reported track change; runs on the dispatcher
    pub(crate) fn apply_observed(
        &self,
        kind: NativeEventKind,
        track: NativeHandle,
        engine: &dyn Engine,
    ) {
        let (event, callback) = {
            let mut slot = self.slot.lock();
            let Some(stream) = slot.handle.filter(|_| !slot.disposed) else {
                trace!("Stream disposed, dropping {:?} of track {}", kind, track);
                return;
            };
            if !self.context.is_alive() {
                trace!("Context shut down, dropping {:?} of track {}", kind, track);
                return;
            }

            match kind {
                NativeEventKind::AddTrack => {
                    let Some(track_kind) = engine
                        .track_kind(track)
                        .or_else(|| slot.cache.get(track).map(|t| t.kind()))
                    else {
                        warn!(
                            "Track {} added to stream {} has no known kind, ignoring",
                            track, stream
                        );
                        return;
                    };
                    let track = TrackRef::new(track, track_kind);
                    slot.cache.insert(track);
                    (
                        StreamEvent::TrackAdded(TrackEvent { stream, track }),
                        self.callbacks.lock().on_add_track.clone(),
                    )
                }
                NativeEventKind::RemoveTrack => {
                    let track = match slot.cache.remove(track) {
                        Some(cached) => cached,
                        None => match engine.track_kind(track) {
                            Some(track_kind) => TrackRef::new(track, track_kind),
                            None => {
                                warn!(
                                    "Track {} removed from stream {} has no known kind, ignoring",
                                    track, stream
                                );
                                return;
                            }
                        },
                    };
                    (
                        StreamEvent::TrackRemoved(TrackEvent { stream, track }),
                        self.callbacks.lock().on_remove_track.clone(),
                    )
                }
            }
        };

        // No lock held: callbacks may call back into the stream
        if let Some(callback) = callback {
            callback(event.track_event());
        }
        let _ = self.events.send(event);
    }

    fn dispose(&self, reason: DisposeReason) {
        let mut slot = self.slot.lock();
        if slot.disposed {
            return;
        }

        if let Some(handle) = slot.handle.take() {
            if reason == DisposeReason::Dropped {
                debug!("Reclaiming MediaStream {} dropped without dispose", handle);
            }

            if self.context.is_alive() {
                self.context.bridge().unregister(handle);
                self.context.engine().delete_stream(handle);
            } else {
                debug!(
                    "Engine context already shut down, skipping native release of {}",
                    handle
                );
            }
            self.context.streams().remove(handle);
            info!("Disposed MediaStream {}", handle);
        }

        slot.cache.clear();
        slot.disposed = true;
        drop(slot);

        // Captured values are dropped outside the lock
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        drop(callbacks);
    }
}

/// Owned wrapper around a native MediaStream
///
/// Not `Clone`: the wrapper owns the native handle and releases it when
/// disposed or dropped. Share it behind an `Arc` if needed.
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

impl MediaStream {
    /// Create a new native stream in the process-wide context
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineUnavailable`] if no context is initialized.
    pub fn new() -> Result<Self> {
        let context = context::current()?;
        Self::new_in(&context)
    }

    /// Create a new native stream in `context`, labelled with a fresh UUID
    pub fn new_in(context: &Context) -> Result<Self> {
        context.ensure_alive()?;
        let label = Uuid::new_v4().to_string();
        let handle = context.engine().create_stream(&label)?;
        debug!("Engine created stream {} ('{}')", handle, label);
        Self::register(context, handle, true)
    }

    /// Take ownership of a stream the engine already created
    ///
    /// Used when the engine hands a stream over asynchronously, e.g. a
    /// remote stream announced by a peer connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateHandle`] if `handle` is already wrapped.
    /// On failure the native stream is left to the caller.
    pub fn wrap(context: &Context, handle: NativeHandle) -> Result<Self> {
        context.ensure_alive()?;
        Self::register(context, handle, false)
    }

    /// `created` is set when the native stream was created for this wrapper
    /// and must be released if registration fails.
    fn register(context: &Context, handle: NativeHandle, created: bool) -> Result<Self> {
        let (events, _) = broadcast::channel(context.config().event_channel_capacity);
        let inner = Arc::new(StreamInner {
            context: context.clone(),
            slot: Mutex::new(StreamSlot {
                handle: Some(handle),
                disposed: false,
                cache: TrackCache::new(),
            }),
            callbacks: Mutex::new(Callbacks::default()),
            events,
        });

        if let Err(e) = context.streams().add(handle, &inner) {
            // Someone else owns the handle; leave it alone
            inner.slot.lock().disposed = true;
            return Err(e);
        }

        if let Err(e) = context.bridge().register(handle, context.event_sink()) {
            warn!("Failed to arm observer for stream {}: {}", handle, e);
            context.streams().remove(handle);
            if created {
                context.engine().delete_stream(handle);
            }
            let mut slot = inner.slot.lock();
            slot.handle = None;
            slot.disposed = true;
            return Err(e);
        }

        info!("Registered MediaStream {}", handle);
        Ok(Self { inner })
    }

    /// Identity string reported by the engine
    pub fn id(&self) -> Result<String> {
        self.inner.with_live(|engine, stream, _| engine.stream_id(stream))
    }

    /// Native handle of the stream
    pub fn handle(&self) -> Result<NativeHandle> {
        let slot = self.inner.slot.lock();
        match slot.handle {
            Some(handle) if !slot.disposed => Ok(handle),
            _ => Err(Error::Disposed),
        }
    }

    /// Add a track to the stream
    ///
    /// Returns the engine's answer. Does not fire `on_add_track`; only
    /// engine-reported additions do.
    pub fn add_track(&self, track: &TrackRef) -> Result<bool> {
        self.inner.with_live(|engine, stream, cache| {
            let inserted = cache.insert(*track);
            let attached = engine.add_track(stream, track.handle());
            // A refusal for a track the engine already holds keeps it cached
            if !attached
                && inserted
                && !engine.tracks(stream, track.kind()).contains(&track.handle())
            {
                cache.remove(track.handle());
            }
            debug!(
                "add_track {} on stream {} -> {}",
                track, stream, attached
            );
            Ok(attached)
        })
    }

    /// Remove a track from the stream
    ///
    /// Removing a track that is not part of the stream returns `Ok(false)`.
    pub fn remove_track(&self, track: &TrackRef) -> Result<bool> {
        self.inner.with_live(|engine, stream, cache| {
            cache.remove(track.handle());
            let detached = engine.remove_track(stream, track.handle());
            debug!(
                "remove_track {} on stream {} -> {}",
                track, stream, detached
            );
            Ok(detached)
        })
    }

    /// Tracks of `kind`, queried fresh from the engine
    pub fn tracks_of_kind(&self, kind: TrackKind) -> Result<TrackIter> {
        self.inner.with_live(|engine, stream, _| {
            Ok(TrackIter::new(engine.tracks(stream, kind), kind))
        })
    }

    pub fn audio_tracks(&self) -> Result<TrackIter> {
        self.tracks_of_kind(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> Result<TrackIter> {
        self.tracks_of_kind(TrackKind::Video)
    }

    /// Every track of the stream, audio followed by video
    pub fn tracks(&self) -> Result<Tracks> {
        self.inner.with_live(|engine, stream, _| {
            let audio = TrackIter::new(engine.tracks(stream, TrackKind::Audio), TrackKind::Audio);
            let video = TrackIter::new(engine.tracks(stream, TrackKind::Video), TrackKind::Video);
            Ok(audio.chain(video))
        })
    }

    /// Tracks this wrapper believes the stream holds, ordered by handle
    pub fn cached_tracks(&self) -> Result<Vec<TrackRef>> {
        let slot = self.inner.slot.lock();
        if slot.disposed {
            return Err(Error::Disposed);
        }
        Ok(slot.cache.snapshot())
    }

    /// Called on the dispatcher for every engine-reported track addition
    pub fn set_on_add_track<F>(&self, callback: F)
    where
        F: Fn(&TrackEvent) + Send + Sync + 'static,
    {
        self.inner.callbacks.lock().on_add_track = Some(Arc::new(callback));
    }

    /// Called on the dispatcher for every engine-reported track removal
    pub fn set_on_remove_track<F>(&self, callback: F)
    where
        F: Fn(&TrackEvent) + Send + Sync + 'static,
    {
        self.inner.callbacks.lock().on_remove_track = Some(Arc::new(callback));
    }

    pub fn clear_on_add_track(&self) {
        let previous = self.inner.callbacks.lock().on_add_track.take();
        drop(previous);
    }

    pub fn clear_on_remove_track(&self) {
        let previous = self.inner.callbacks.lock().on_remove_track.take();
        drop(previous);
    }

    /// Subscribe to engine-reported track changes
    ///
    /// Events are published on the dispatcher right after the callbacks.
    /// Slow receivers observe `RecvError::Lagged` once they fall more than
    /// `event_channel_capacity` events behind.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> StreamState {
        if self.inner.slot.lock().disposed {
            StreamState::Disposed
        } else {
            StreamState::Live
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == StreamState::Disposed
    }

    /// The context this stream belongs to
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Release the native stream; safe to call any number of times
    pub fn dispose(&self) {
        self.inner.dispose(DisposeReason::Explicit);
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.inner.dispose(DisposeReason::Dropped);
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("MediaStream")
            .field("handle", &slot.handle)
            .field("disposed", &slot.disposed)
            .field("cached_tracks", &slot.cache.len())
            .finish()
    }
}
