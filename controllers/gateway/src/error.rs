//! Controller-specific error types.

use thiserror::Error;
use kube::Error as KubeError;
use watch_engine::{CacheError, WatchError};

/// Errors that can occur in the gateway controller process.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Watch registration failed
    #[error("Watch registration failed: {0}")]
    Watch(#[from] WatchError),

    /// Cache read failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// A watch stopped while the controller was running
    #[error("Watch {registration} stopped: {reason}")]
    WatchStopped { registration: String, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The log filter could not be swapped
    #[error("Failed to set log level: {0}")]
    LogLevel(String),

    /// The event consumer task failed
    #[error("Event dispatcher failed: {0}")]
    Dispatcher(String),
}
