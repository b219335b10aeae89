//! Opaque native handles
//!
//! A [`NativeHandle`] names a resource living inside the native engine. It is
//! an integer, never dereferenced on this side. Zero is the "released"
//! sentinel on the wire and is not representable as a `NativeHandle`; a
//! released slot is `Option::<NativeHandle>::None`.

use crate::{Error, Result};
use std::fmt;
use std::num::NonZeroU64;

/// Opaque, non-zero identifier of a native resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    /// Wrap a raw handle value, returning `None` for the zero sentinel
    #[inline]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Wrap a raw handle value, failing with [`Error::InvalidHandle`] on zero
    pub fn from_raw(raw: u64) -> Result<Self> {
        Self::new(raw).ok_or(Error::InvalidHandle)
    }

    /// The raw value handed across the native boundary
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

impl From<NativeHandle> for u64 {
    fn from(handle: NativeHandle) -> Self {
        handle.as_raw()
    }
}

impl TryFrom<u64> for NativeHandle {
    type Error = Error;

    fn try_from(raw: u64) -> Result<Self> {
        Self::from_raw(raw)
    }
}
