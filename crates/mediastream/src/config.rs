//! Configuration for the MediaStream bridge
//!
//! Configuration can be loaded from a TOML file and/or environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Where observer events are delivered to user code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Dedicated dispatcher thread (default)
    #[default]
    Thread,
    /// Application drains the queue itself via `Context::dispatch_pending`
    Manual,
    /// Task on the tokio runtime current at context creation
    Tokio,
}

impl FromStr for DispatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" => Ok(DispatchMode::Thread),
            "manual" => Ok(DispatchMode::Manual),
            "tokio" => Ok(DispatchMode::Tokio),
            other => Err(ConfigError::Parse(format!(
                "unknown dispatch mode '{}' (expected thread, manual or tokio)",
                other
            ))),
        }
    }
}

/// Main configuration for an engine context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Execution context for event delivery
    #[serde(default)]
    pub dispatch_mode: DispatchMode,

    /// Name of the dispatcher thread in `thread` mode
    #[serde(default = "default_thread_name")]
    pub dispatcher_thread_name: String,

    /// Capacity of each stream's event subscription channel
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,

    /// Upper bound on a blocking `flush` in milliseconds
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,

    /// Log a warning for every stream still live at shutdown
    #[serde(default = "default_warn_on_leak")]
    pub warn_on_leak: bool,
}

fn default_thread_name() -> String {
    "mediastream-dispatch".to_string()
}

fn default_event_capacity() -> usize {
    64
}

fn default_flush_timeout_ms() -> u64 {
    5000
}

fn default_warn_on_leak() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dispatch_mode: DispatchMode::default(),
            dispatcher_thread_name: default_thread_name(),
            event_channel_capacity: default_event_capacity(),
            flush_timeout_ms: default_flush_timeout_ms(),
            warn_on_leak: default_warn_on_leak(),
        }
    }
}

impl BridgeConfig {
    /// Configuration with the given dispatch mode and defaults elsewhere
    pub fn with_mode(dispatch_mode: DispatchMode) -> Self {
        Self {
            dispatch_mode,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: BridgeConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    ///
    /// Unparseable numeric and boolean values are ignored; an unknown
    /// dispatch mode is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BridgeConfig::default();

        if let Some(mode) = lookup("MEDIASTREAM_DISPATCH_MODE") {
            config.dispatch_mode = mode.parse()?;
        }
        if let Some(name) = lookup("MEDIASTREAM_DISPATCH_THREAD") {
            config.dispatcher_thread_name = name;
        }
        if let Some(capacity) = lookup("MEDIASTREAM_EVENT_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                config.event_channel_capacity = c;
            }
        }
        if let Some(timeout) = lookup("MEDIASTREAM_FLUSH_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                config.flush_timeout_ms = t;
            }
        }
        if let Some(warn) = lookup("MEDIASTREAM_WARN_ON_LEAK") {
            if let Ok(w) = warn.parse() {
                config.warn_on_leak = w;
            }
        }

        Ok(config)
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            if p.as_ref().exists() {
                return Self::from_file(p);
            }
        }
        Self::from_env()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `event_channel_capacity` is zero
    /// - `dispatcher_thread_name` is empty
    /// - `flush_timeout_ms` is zero
    pub fn validate(&self) -> crate::Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::InvalidConfig(
                "event_channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.dispatcher_thread_name.trim().is_empty() {
            return Err(crate::Error::InvalidConfig(
                "dispatcher_thread_name cannot be empty".to_string(),
            ));
        }
        if self.flush_timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "flush_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
