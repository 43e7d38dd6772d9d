//! Engine error types.
//!
//! `WatchError` is surfaced to the process's top-level caller. Nothing in
//! this crate retries; transport retries belong to the cache layer.

use thiserror::Error;
use kube::Error as KubeError;

use crate::kind::ResourceKind;
use crate::snapshot::NamespacedName;

/// Errors raised while building or registering watches.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Two descriptors resolve to the same registration name
    #[error("duplicate registration name {name:?} (kind {kind})")]
    DuplicateRegistrationName { name: String, kind: ResourceKind },

    /// Two indices on the same field of one kind
    #[error("duplicate field index {field:?} for kind {kind} (registration {name:?})")]
    DuplicateFieldIndex {
        kind: ResourceKind,
        field: String,
        name: String,
    },

    /// Malformed `namespace/name` identifier
    #[error("invalid namespaced name {0:?}: expected <namespace>/<name>")]
    InvalidNamespacedName(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The cache layer rejected a watch or an index
    #[error("cannot register watch for {kind} (registration {name:?}): {source}")]
    Registration {
        kind: ResourceKind,
        name: String,
        #[source]
        source: CacheError,
    },

    /// Initial read of the control resource failed
    #[error("error reading initial state of {kind} {key}: {source}")]
    InitialState {
        kind: ResourceKind,
        key: NamespacedName,
        #[source]
        source: CacheError,
    },
}

impl WatchError {
    /// Configuration errors are detected before any call into the cache layer.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            WatchError::DuplicateRegistrationName { .. }
                | WatchError::DuplicateFieldIndex { .. }
                | WatchError::InvalidNamespacedName(_)
                | WatchError::InvalidConfig(_)
        )
    }

    /// Kind of the descriptor that failed, if any.
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            WatchError::DuplicateRegistrationName { kind, .. }
            | WatchError::DuplicateFieldIndex { kind, .. }
            | WatchError::Registration { kind, .. }
            | WatchError::InitialState { kind, .. } => Some(*kind),
            WatchError::InvalidNamespacedName(_) | WatchError::InvalidConfig(_) => None,
        }
    }
}

/// Errors returned by the cache/client layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// The API server does not serve the kind (CRD not installed, wrong version)
    #[error("kind {kind} is not served by the API server: {source}")]
    KindNotServed {
        kind: ResourceKind,
        #[source]
        source: KubeError,
    },

    /// Rejected by the cache for another reason
    #[error("rejected: {0}")]
    Rejected(String),
}
