//! Mock ClusterCache for unit testing
//!
//! Stores objects in memory and hands out watch streams fed by the test.
//! Kinds can be marked as rejected to simulate a kind missing from the API
//! server, and the uncached read can be made to fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::cache::{ClusterCache, RawEventStream, WatchRequest};
use crate::error::CacheError;
use crate::event::RawEvent;
use crate::index::FieldIndex;
use crate::kind::ResourceKind;
use crate::snapshot::{NamespacedName, Snapshot};

struct Feed {
    registration_name: String,
    tx: mpsc::UnboundedSender<RawEvent>,
}

#[derive(Default)]
struct MockState {
    objects: BTreeMap<(ResourceKind, NamespacedName), Snapshot>,
    uncached: HashMap<(ResourceKind, NamespacedName), Snapshot>,
    rejected: HashSet<ResourceKind>,
    fail_uncached_read: Option<String>,
    uncached_reads: usize,
    indices: HashMap<ResourceKind, Vec<FieldIndex>>,
    feeds: HashMap<ResourceKind, Vec<Feed>>,
    requests: Vec<(ResourceKind, WatchRequest)>,
}

/// Mock cache for testing
#[derive(Clone, Default)]
pub struct MockClusterCache {
    state: Arc<Mutex<MockState>>,
}

impl MockClusterCache {
    /// Create a new mock cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the cached store (for test setup)
    pub fn add_object(&self, kind: ResourceKind, snapshot: Snapshot) {
        let key = (kind, snapshot.namespaced_name.clone());
        self.state.lock().unwrap().objects.insert(key, snapshot);
    }

    /// Add an object visible to uncached reads only (for test setup)
    pub fn add_uncached_object(&self, kind: ResourceKind, snapshot: Snapshot) {
        let key = (kind, snapshot.namespaced_name.clone());
        self.state.lock().unwrap().uncached.insert(key, snapshot);
    }

    /// Make `watch` fail for `kind`
    pub fn reject_kind(&self, kind: ResourceKind) {
        self.state.lock().unwrap().rejected.insert(kind);
    }

    /// Make `read_uncached` fail with `message`
    pub fn fail_uncached_reads(&self, message: impl Into<String>) {
        self.state.lock().unwrap().fail_uncached_read = Some(message.into());
    }

    /// Number of `read_uncached` calls so far
    pub fn uncached_reads(&self) -> usize {
        self.state.lock().unwrap().uncached_reads
    }

    /// Watch requests received, in order
    pub fn requests(&self) -> Vec<(ResourceKind, WatchRequest)> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Fields with an installed index for `kind`
    pub fn index_fields(&self, kind: ResourceKind) -> Vec<&'static str> {
        self.state
            .lock()
            .unwrap()
            .indices
            .get(&kind)
            .map(|indices| indices.iter().map(FieldIndex::field).collect())
            .unwrap_or_default()
    }

    /// Watch streams still held by someone
    pub fn live_watches(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .feeds
            .values()
            .flatten()
            .filter(|feed| !feed.tx.is_closed())
            .count()
    }

    /// Push an event into every live watch of `kind`. Returns how many
    /// watches accepted it.
    pub fn emit(&self, kind: ResourceKind, event: RawEvent) -> usize {
        let mut state = self.state.lock().unwrap();
        let Some(feeds) = state.feeds.get_mut(&kind) else {
            return 0;
        };
        feeds.retain(|feed| !feed.tx.is_closed());
        feeds
            .iter()
            .filter(|feed| feed.tx.send(event.clone()).is_ok())
            .count()
    }

    /// Push an event into the watch registered as `registration_name`.
    pub fn emit_to(&self, registration_name: &str, event: RawEvent) -> bool {
        let state = self.state.lock().unwrap();
        state
            .feeds
            .values()
            .flatten()
            .find(|feed| feed.registration_name == registration_name)
            .is_some_and(|feed| feed.tx.send(event).is_ok())
    }

    /// End every watch stream, as if the cache stopped.
    pub fn close_all(&self) {
        self.state.lock().unwrap().feeds.clear();
    }
}

#[async_trait]
impl ClusterCache for MockClusterCache {
    async fn get(&self, kind: ResourceKind, key: &NamespacedName) -> Result<Option<Snapshot>, CacheError> {
        Ok(self.state.lock().unwrap().objects.get(&(kind, key.clone())).cloned())
    }

    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<Snapshot>, CacheError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .iter()
            .filter(|((k, key), _)| *k == kind && namespace.is_none_or(|ns| key.namespace == ns))
            .map(|(_, snapshot)| snapshot.clone())
            .collect())
    }

    async fn read_uncached(
        &self,
        kind: ResourceKind,
        key: &NamespacedName,
        _projected_fields: &[&'static str],
    ) -> Result<Option<Snapshot>, CacheError> {
        let mut state = self.state.lock().unwrap();
        state.uncached_reads += 1;
        if let Some(message) = &state.fail_uncached_read {
            return Err(CacheError::Rejected(message.clone()));
        }
        Ok(state.uncached.get(&(kind, key.clone())).cloned())
    }

    fn add_index(&self, kind: ResourceKind, index: &FieldIndex) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();
        let indices = state.indices.entry(kind).or_default();
        if indices.iter().any(|existing| existing.field() == index.field()) {
            return Err(CacheError::Rejected(format!("index {} already exists", index.field())));
        }
        indices.push(index.clone());
        Ok(())
    }

    fn by_index(&self, kind: ResourceKind, field: &str, value: &str) -> Vec<Snapshot> {
        let state = self.state.lock().unwrap();
        let Some(index) = state
            .indices
            .get(&kind)
            .and_then(|indices| indices.iter().find(|index| index.field() == field))
        else {
            return Vec::new();
        };
        state
            .objects
            .iter()
            .filter(|((k, _), snapshot)| *k == kind && index.keys(snapshot).iter().any(|key| key == value))
            .map(|(_, snapshot)| snapshot.clone())
            .collect()
    }

    async fn watch(&self, kind: ResourceKind, request: WatchRequest) -> Result<RawEventStream, CacheError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push((kind, request.clone()));
        if state.rejected.contains(&kind) {
            return Err(CacheError::Rejected(format!("no kind {kind} is registered in the scheme")));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.feeds.entry(kind).or_default().push(Feed {
            registration_name: request.registration_name,
            tx,
        });

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }
}
