//! Track references and kinds

use crate::handle::NativeHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    /// Kind name as the engine reports it
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lightweight reference to a native track
///
/// Two `TrackRef`s are equal when they carry the same handle, whatever the
/// kind recorded alongside it.
#[derive(Debug, Clone, Copy)]
pub struct TrackRef {
    handle: NativeHandle,
    kind: TrackKind,
}

impl TrackRef {
    pub fn new(handle: NativeHandle, kind: TrackKind) -> Self {
        Self { handle, kind }
    }

    pub fn audio(handle: NativeHandle) -> Self {
        Self::new(handle, TrackKind::Audio)
    }

    pub fn video(handle: NativeHandle) -> Self {
        Self::new(handle, TrackKind::Video)
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }
}

impl PartialEq for TrackRef {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for TrackRef {}

impl Hash for TrackRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} track {}", self.kind, self.handle)
    }
}

/// Lazily produced sequence of tracks returned by a stream query
///
/// Holds the handle snapshot the engine returned at query time. Single pass;
/// query the stream again for a fresh view.
#[derive(Debug)]
pub struct TrackIter {
    handles: std::vec::IntoIter<NativeHandle>,
    kind: TrackKind,
}

impl TrackIter {
    pub(crate) fn new(handles: Vec<NativeHandle>, kind: TrackKind) -> Self {
        Self {
            handles: handles.into_iter(),
            kind,
        }
    }

    /// Kind of every track this iterator yields
    pub fn kind(&self) -> TrackKind {
        self.kind
    }
}

impl Iterator for TrackIter {
    type Item = TrackRef;

    fn next(&mut self) -> Option<Self::Item> {
        self.handles
            .next()
            .map(|handle| TrackRef::new(handle, self.kind))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.handles.size_hint()
    }
}

impl ExactSizeIterator for TrackIter {}

impl std::iter::FusedIterator for TrackIter {}
