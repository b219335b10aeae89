//! Event types delivered to stream observers

use crate::handle::NativeHandle;
use crate::track::TrackRef;

/// Payload of a track add/remove notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEvent {
    /// Stream the track was added to or removed from
    pub stream: NativeHandle,
    /// The affected track
    pub track: TrackRef,
}

/// Notification published to stream subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    TrackAdded(TrackEvent),
    TrackRemoved(TrackEvent),
}

impl StreamEvent {
    pub fn track_event(&self) -> &TrackEvent {
        match self {
            StreamEvent::TrackAdded(e) | StreamEvent::TrackRemoved(e) => e,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, StreamEvent::TrackAdded(_))
    }
}

/// Which native callback fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NativeEventKind {
    AddTrack,
    RemoveTrack,
}

/// Raw native callback captured for delivery on the dispatcher
#[derive(Debug, Clone, Copy)]
pub(crate) struct NativeEvent {
    pub kind: NativeEventKind,
    pub stream: NativeHandle,
    pub track: NativeHandle,
}
