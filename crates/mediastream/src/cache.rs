//! Local track cache for a stream
//!
//! Tracks membership changes made through the stream API and those observed
//! from the engine. The engine stays authoritative for enumeration; the
//! cache is what the stream itself believes it holds.

use crate::handle::NativeHandle;
use crate::track::TrackRef;
use std::collections::HashMap;
use tracing::debug;

/// Set of tracks keyed by native handle
#[derive(Debug, Default)]
pub struct TrackCache {
    tracks: HashMap<NativeHandle, TrackRef>,
}

impl TrackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a track; returns `false` if it was already present
    pub fn insert(&mut self, track: TrackRef) -> bool {
        if self.tracks.contains_key(&track.handle()) {
            return false;
        }
        self.tracks.insert(track.handle(), track);
        debug!("Cached {} (total: {})", track, self.tracks.len());
        true
    }

    /// Remove a track by handle; returns the cached entry if it was present
    pub fn remove(&mut self, handle: NativeHandle) -> Option<TrackRef> {
        let removed = self.tracks.remove(&handle);
        if let Some(track) = &removed {
            debug!("Uncached {} (remaining: {})", track, self.tracks.len());
        }
        removed
    }

    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.tracks.contains_key(&handle)
    }

    pub fn get(&self, handle: NativeHandle) -> Option<TrackRef> {
        self.tracks.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Cached tracks ordered by handle
    pub fn snapshot(&self) -> Vec<TrackRef> {
        let mut tracks: Vec<TrackRef> = self.tracks.values().copied().collect();
        tracks.sort_by_key(|t| t.handle());
        tracks
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}
