//! Cache/client collaborator interface.
//!
//! The engine never talks to the API server directly. Everything goes through
//! `ClusterCache`, which owns watch transport, reconnects, resyncs and the
//! index store. `KubeCache` is the production implementation; tests use
//! `MockClusterCache`.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::CacheError;
use crate::event::RawEvent;
use crate::index::FieldIndex;
use crate::kind::ResourceKind;
use crate::snapshot::{NamespacedName, Snapshot};

/// Stream of unfiltered events for one watch. Dropping it stops the watch.
pub type RawEventStream = BoxStream<'static, RawEvent>;

/// Parameters of one watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchRequest {
    /// Registration name, for logging by the cache.
    pub registration_name: String,
    /// Fetch metadata only.
    pub metadata_only: bool,
    /// Body fields to project into snapshots.
    pub projected_fields: Vec<&'static str>,
    /// Objects the watch is scoped to; empty means all.
    pub namespaced_names: Vec<NamespacedName>,
}

/// Operations the engine and the consumer need from the cache layer.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait]
pub trait ClusterCache: Send + Sync {
    /// Cached object, `None` when not present.
    async fn get(&self, kind: ResourceKind, key: &NamespacedName) -> Result<Option<Snapshot>, CacheError>;

    /// Cached objects of `kind`, optionally restricted to one namespace.
    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<Snapshot>, CacheError>;

    /// Reads an object straight from the API server, bypassing the cache.
    async fn read_uncached(
        &self,
        kind: ResourceKind,
        key: &NamespacedName,
        projected_fields: &[&'static str],
    ) -> Result<Option<Snapshot>, CacheError>;

    /// Installs an index. Called before the kind's watch is opened.
    fn add_index(&self, kind: ResourceKind, index: &FieldIndex) -> Result<(), CacheError>;

    /// Objects whose index `field` contains `value`.
    fn by_index(&self, kind: ResourceKind, field: &str, value: &str) -> Vec<Snapshot>;

    /// Opens a watch. The returned stream must not deliver anything until it
    /// is polled.
    async fn watch(&self, kind: ResourceKind, request: WatchRequest) -> Result<RawEventStream, CacheError>;
}
