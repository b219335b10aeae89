//! Observer bridge: native callbacks → stream wrappers
//!
//! The engine reports track changes with nothing but a pair of handles and
//! on a thread it controls. [`EventSink`] is the entry point it calls: it
//! captures the pair, posts it to the dispatcher queue and returns. The
//! dispatcher later hands the event to [`ObserverBridge::deliver`], which
//! resolves the stream through the handle table and applies the change on
//! the designated execution context.

use crate::dispatch::Envelope;
use crate::engine::Engine;
use crate::events::{NativeEvent, NativeEventKind};
use crate::handle::NativeHandle;
use crate::stream::StreamInner;
use crate::table::HandleTable;
use crate::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Inbound entry point for native add/remove track callbacks
///
/// Cheap to clone and safe to call from any thread. Calls never block and
/// never run user code.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }

    /// The engine added `track` to `stream`
    pub fn on_add_track(&self, stream: NativeHandle, track: NativeHandle) {
        self.post(NativeEvent {
            kind: NativeEventKind::AddTrack,
            stream,
            track,
        });
    }

    /// The engine removed `track` from `stream`
    pub fn on_remove_track(&self, stream: NativeHandle, track: NativeHandle) {
        self.post(NativeEvent {
            kind: NativeEventKind::RemoveTrack,
            stream,
            track,
        });
    }

    /// Whether the dispatcher behind this sink has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn post(&self, event: NativeEvent) {
        if self.tx.send(Envelope::Event(event)).is_err() {
            trace!(
                "Dispatcher stopped, dropping {:?} for stream {}",
                event.kind,
                event.stream
            );
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Arms engine observers and routes their events to the owning stream
#[derive(Clone)]
pub(crate) struct ObserverBridge {
    streams: Arc<HandleTable<StreamInner>>,
    engine: Arc<dyn Engine>,
}

impl ObserverBridge {
    pub fn new(streams: Arc<HandleTable<StreamInner>>, engine: Arc<dyn Engine>) -> Self {
        Self { streams, engine }
    }

    /// Arm add/remove notification for `stream`
    pub fn register(&self, stream: NativeHandle, sink: EventSink) -> Result<()> {
        self.engine.register_observer(stream, sink)?;
        trace!("Observer registered for stream {}", stream);
        Ok(())
    }

    /// Disarm notification for `stream`
    pub fn unregister(&self, stream: NativeHandle) {
        self.engine.unregister_observer(stream);
        trace!("Observer unregistered for stream {}", stream);
    }

    /// Apply a captured native event; runs on the dispatcher
    ///
    /// Events for streams that are no longer in the table are dropped: the
    /// stream was disposed between the engine raising the event and its
    /// delivery, and there is nobody left to notify.
    pub fn deliver(&self, event: NativeEvent) {
        match self.streams.get(event.stream) {
            Ok(stream) => stream.apply_observed(event.kind, event.track, self.engine.as_ref()),
            Err(e) => trace!("{}, dropping {:?} of track {}", e, event.kind, event.track),
        }
    }
}
