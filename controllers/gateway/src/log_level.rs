//! Runtime log level control.

use crds::LogLevel;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::error::ControllerError;

/// Applies a control-plane log level to the running process.
pub trait LogLevelSetter: Send + Sync {
    fn set_level(&self, level: LogLevel) -> Result<(), ControllerError>;
}

/// Swaps the global `EnvFilter` through its reload handle.
pub struct ReloadLogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl ReloadLogLevel {
    /// Wraps the handle of the installed filter layer.
    pub fn new(handle: reload::Handle<EnvFilter, Registry>) -> Self {
        Self { handle }
    }
}

impl LogLevelSetter for ReloadLogLevel {
    fn set_level(&self, level: LogLevel) -> Result<(), ControllerError> {
        self.handle
            .reload(EnvFilter::new(level.as_directive()))
            .map_err(|e| ControllerError::LogLevel(e.to_string()))
    }
}
