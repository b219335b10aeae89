//! Handle table: native handle → owning wrapper
//!
//! The table is the directory the observer bridge uses to turn a bare handle
//! delivered by the engine back into the wrapper that owns it. Entries hold
//! the wrapper weakly; the wrapper owns itself and removes its entry on
//! disposal.

use crate::handle::NativeHandle;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Thread-safe map from native handle to a weakly held wrapper
///
/// Every operation takes the one internal lock; no caller ever holds it
/// across a call into the engine or into user code.
pub struct HandleTable<T> {
    entries: Mutex<HashMap<NativeHandle, Weak<T>>>,
}

impl<T> HandleTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register `wrapper` under `handle`
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateHandle`] if a live wrapper is already
    /// registered for `handle`. An entry whose wrapper has been dropped does
    /// not count as live and is replaced.
    pub fn add(&self, handle: NativeHandle, wrapper: &Arc<T>) -> Result<()> {
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.get(&handle) {
            if existing.strong_count() > 0 {
                return Err(Error::DuplicateHandle(handle));
            }
            debug!("Replacing stale handle table entry {}", handle);
        }

        entries.insert(handle, Arc::downgrade(wrapper));
        Ok(())
    }

    /// Remove the entry for `handle`; returns whether one was present
    pub fn remove(&self, handle: NativeHandle) -> bool {
        self.entries.lock().remove(&handle).is_some()
    }

    /// Look up the live wrapper for `handle`
    pub fn lookup(&self, handle: NativeHandle) -> Option<Arc<T>> {
        self.entries.lock().get(&handle).and_then(Weak::upgrade)
    }

    /// Look up the live wrapper for `handle`, failing with [`Error::NotFound`]
    pub fn get(&self, handle: NativeHandle) -> Result<Arc<T>> {
        self.lookup(handle).ok_or(Error::NotFound(handle))
    }

    /// Check whether an entry exists for `handle`
    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.entries.lock().contains_key(&handle)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of every registered handle
    pub fn handles(&self) -> Vec<NativeHandle> {
        self.entries.lock().keys().copied().collect()
    }

    /// Remove every entry, returning the handles whose wrapper was still live
    pub fn drain(&self) -> Vec<NativeHandle> {
        let mut entries = self.entries.lock();
        let mut live: Vec<NativeHandle> = entries
            .drain()
            .filter(|(_, wrapper)| wrapper.strong_count() > 0)
            .map(|(handle, _)| handle)
            .collect();
        live.sort();
        live
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
