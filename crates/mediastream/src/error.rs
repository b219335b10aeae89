//! Error types for the MediaStream bridge

use crate::config::ConfigError;
use crate::handle::NativeHandle;

/// Result type alias using the bridge Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in MediaStream bridge operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted on a stream after it was disposed
    #[error("This instance has been disposed")]
    Disposed,

    /// Engine context not initialized or already shut down
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A live wrapper is already registered for this handle
    #[error("Duplicate handle: {0}")]
    DuplicateHandle(NativeHandle),

    /// Handle lookup miss
    #[error("Handle not found: {0}")]
    NotFound(NativeHandle),

    /// Zero handle where a live one is required
    #[error("Invalid handle: native handles must be non-zero")]
    InvalidHandle,

    /// Process-wide context initialized twice
    #[error("Engine context already initialized")]
    AlreadyInitialized,

    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failure reported by the native engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// Operation timeout
    #[error("Operation timeout: {0}")]
    OperationTimeout(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if the caller can recover from this error
    ///
    /// `Disposed` and `EngineUnavailable` are expected outcomes of racing
    /// against teardown; the caller decides what to do with them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Disposed | Error::EngineUnavailable(_) | Error::NotFound(_)
        )
    }

    /// Check if this error signals a broken internal invariant
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DuplicateHandle(_))
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_) | Error::Config(_))
    }
}
