//! kube-rs backed cache.
//!
//! Kinds are resolved through API discovery, so a kind whose CRD is not
//! installed is rejected at registration time. Watches run on
//! `kube_runtime::watcher` with its default backoff; the translator turns
//! watcher events into added/updated/deleted events with the previous
//! snapshot attached, and writes through to a shared store that backs `get`,
//! `list` and the field indices.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::ready;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{Api, ApiResource, DynamicObject};
use kube::discovery::{self, Scope};
use kube::Client;
use kube_runtime::watcher::{self, metadata_watcher, watcher};
use kube_runtime::WatchStreamExt;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{ClusterCache, RawEventStream, WatchRequest};
use crate::error::CacheError;
use crate::event::RawEvent;
use crate::index::FieldIndex;
use crate::kind::ResourceKind;
use crate::snapshot::{NamespacedName, Snapshot};

#[derive(Clone)]
struct Resolved {
    resource: ApiResource,
    namespaced: bool,
}

type Stores = Arc<RwLock<HashMap<ResourceKind, KindStore>>>;

/// `ClusterCache` over a live API server.
pub struct KubeCache {
    client: Client,
    namespace: Option<String>,
    resolved: Mutex<HashMap<ResourceKind, Resolved>>,
    stores: Stores,
}

impl KubeCache {
    /// Watches every namespace when `namespace` is `None`.
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self {
            client,
            namespace,
            resolved: Mutex::new(HashMap::new()),
            stores: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn resolve(&self, kind: ResourceKind) -> Result<Resolved, CacheError> {
        let cached = self.resolved.lock().get(&kind).cloned();
        if let Some(resolved) = cached {
            return Ok(resolved);
        }

        let (resource, capabilities) = discovery::pinned_kind(&self.client, &kind.gvk())
            .await
            .map_err(|source| CacheError::KindNotServed { kind, source })?;
        let resolved = Resolved {
            resource,
            namespaced: matches!(capabilities.scope, Scope::Namespaced),
        };
        debug!(%kind, plural = %resolved.resource.plural, namespaced = resolved.namespaced, "resolved kind");
        self.resolved.lock().insert(kind, resolved.clone());
        Ok(resolved)
    }

    fn api(&self, resolved: &Resolved, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) if resolved.namespaced => {
                Api::namespaced_with(self.client.clone(), ns, &resolved.resource)
            }
            _ => Api::all_with(self.client.clone(), &resolved.resource),
        }
    }
}

#[async_trait]
impl ClusterCache for KubeCache {
    async fn get(&self, kind: ResourceKind, key: &NamespacedName) -> Result<Option<Snapshot>, CacheError> {
        Ok(self
            .stores
            .read()
            .get(&kind)
            .and_then(|store| store.objects.get(key).cloned()))
    }

    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<Snapshot>, CacheError> {
        Ok(self
            .stores
            .read()
            .get(&kind)
            .map(|store| store.list(namespace))
            .unwrap_or_default())
    }

    async fn read_uncached(
        &self,
        kind: ResourceKind,
        key: &NamespacedName,
        projected_fields: &[&'static str],
    ) -> Result<Option<Snapshot>, CacheError> {
        let resolved = self.resolve(kind).await?;
        let namespace = (!key.namespace.is_empty()).then_some(key.namespace.as_str());
        let api = self.api(&resolved, namespace);
        let object = api.get_opt(&key.name).await?;
        Ok(object.map(|obj| Snapshot::from_dynamic(&obj, projected_fields)))
    }

    fn add_index(&self, kind: ResourceKind, index: &FieldIndex) -> Result<(), CacheError> {
        self.stores.write().entry(kind).or_default().add_index(index.clone())
    }

    fn by_index(&self, kind: ResourceKind, field: &str, value: &str) -> Vec<Snapshot> {
        self.stores
            .read()
            .get(&kind)
            .map(|store| store.by_index(field, value))
            .unwrap_or_default()
    }

    async fn watch(&self, kind: ResourceKind, request: WatchRequest) -> Result<RawEventStream, CacheError> {
        let resolved = self.resolve(kind).await?;
        let scope = WatchScope::new(
            self.namespace.as_deref(),
            resolved.namespaced,
            &request.namespaced_names,
        );
        let api = self.api(&resolved, scope.namespace.as_deref());

        let mut config = watcher::Config::default();
        if let Some(selector) = &scope.field_selector {
            config = config.fields(selector);
        }

        let registration = request.registration_name.clone();
        let log_errors = move |result: Result<watcher::Event<Snapshot>, watcher::Error>| {
            ready(match result {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(%kind, registration = %registration, "watch error, backing off: {}", err);
                    None
                }
            })
        };

        let events: BoxStream<'static, watcher::Event<Snapshot>> = if request.metadata_only {
            metadata_watcher(api, config)
                .default_backoff()
                .map(|result| result.map(|event| map_event(event, |obj| Snapshot::from_meta(&obj.metadata))))
                .filter_map(log_errors)
                .boxed()
        } else {
            let fields = request.projected_fields.clone();
            watcher(api, config)
                .default_backoff()
                .map(move |result| result.map(|event| map_event(event, |obj| Snapshot::from_dynamic(obj, &fields))))
                .filter_map(log_errors)
                .boxed()
        };

        info!(%kind, registration = %request.registration_name, metadata_only = request.metadata_only, "opened watch");
        let holder: Arc<str> = Arc::from(request.registration_name.as_str());
        let mut translator = Translator::new(kind, holder, self.stores.clone());
        Ok(events
            .flat_map(move |event| futures::stream::iter(translator.translate(event)))
            .boxed())
    }
}

/// Where a watch lists from and how it is narrowed.
#[derive(Debug, PartialEq, Eq)]
struct WatchScope {
    namespace: Option<String>,
    field_selector: Option<String>,
}

impl WatchScope {
    /// A watch scoped to one object lists in that object's namespace, which
    /// may lie outside the configured watch namespace.
    fn new(watch_namespace: Option<&str>, namespaced: bool, names: &[NamespacedName]) -> Self {
        match names {
            [only] => Self {
                namespace: (namespaced && !only.namespace.is_empty()).then(|| only.namespace.clone()),
                field_selector: Some(format!("metadata.name={}", only.name)),
            },
            _ => Self {
                namespace: watch_namespace.filter(|_| namespaced).map(str::to_string),
                field_selector: None,
            },
        }
    }
}

fn map_event<K>(event: watcher::Event<K>, snapshot: impl Fn(&K) -> Snapshot) -> watcher::Event<Snapshot> {
    match event {
        watcher::Event::Apply(obj) => watcher::Event::Apply(snapshot(&obj)),
        watcher::Event::Delete(obj) => watcher::Event::Delete(snapshot(&obj)),
        watcher::Event::Init => watcher::Event::Init,
        watcher::Event::InitApply(obj) => watcher::Event::InitApply(snapshot(&obj)),
        watcher::Event::InitDone => watcher::Event::InitDone,
    }
}

/// Cached objects and index entries of one kind.
///
/// Each watch of the kind holds its own view of an object; `objects` is the
/// merge of those views, so a metadata-only watch never strips fields
/// projected by another watch, and an object stays cached while any watch
/// still holds it.
#[derive(Default)]
struct KindStore {
    objects: HashMap<NamespacedName, Snapshot>,
    views: HashMap<NamespacedName, HashMap<Arc<str>, Snapshot>>,
    indices: Vec<FieldIndex>,
    entries: HashMap<&'static str, HashMap<String, BTreeSet<NamespacedName>>>,
}

impl KindStore {
    fn add_index(&mut self, index: FieldIndex) -> Result<(), CacheError> {
        if self.indices.iter().any(|existing| existing.field() == index.field()) {
            return Err(CacheError::Rejected(format!("index {} already exists", index.field())));
        }
        let entries = self.entries.entry(index.field()).or_default();
        for snapshot in self.objects.values() {
            for key in index.keys(snapshot) {
                entries.entry(key).or_default().insert(snapshot.namespaced_name.clone());
            }
        }
        self.indices.push(index);
        Ok(())
    }

    /// Records `holder`'s view of an object.
    fn upsert(&mut self, holder: &Arc<str>, snapshot: Snapshot) {
        let views = self.views.entry(snapshot.namespaced_name.clone()).or_default();
        views.insert(holder.clone(), snapshot.clone());
        let merged = merge_views(
            snapshot,
            views.iter().filter(|(h, _)| h != &holder).map(|(_, view)| view),
        );
        self.put(merged);
    }

    /// Drops `holder`'s view. The object leaves the cache with its last view.
    fn release(&mut self, holder: &str, key: &NamespacedName) {
        let Some(views) = self.views.get_mut(key) else {
            return;
        };
        views.remove(holder);
        let mut remaining: Vec<Snapshot> = views.values().cloned().collect();
        match remaining.pop() {
            None => {
                self.views.remove(key);
                self.remove(key);
            }
            Some(base) => self.put(merge_views(base, remaining.iter())),
        }
    }

    fn put(&mut self, snapshot: Snapshot) {
        self.remove(&snapshot.namespaced_name);
        for index in &self.indices {
            let entries = self.entries.entry(index.field()).or_default();
            for key in index.keys(&snapshot) {
                entries.entry(key).or_default().insert(snapshot.namespaced_name.clone());
            }
        }
        self.objects.insert(snapshot.namespaced_name.clone(), snapshot);
    }

    fn remove(&mut self, key: &NamespacedName) {
        let Some(old) = self.objects.remove(key) else {
            return;
        };
        for index in &self.indices {
            let Some(entries) = self.entries.get_mut(index.field()) else {
                continue;
            };
            for value in index.keys(&old) {
                if let Some(names) = entries.get_mut(&value) {
                    names.remove(key);
                    if names.is_empty() {
                        entries.remove(&value);
                    }
                }
            }
        }
    }

    fn list(&self, namespace: Option<&str>) -> Vec<Snapshot> {
        self.objects
            .values()
            .filter(|s| namespace.is_none_or(|ns| s.namespaced_name.namespace == ns))
            .cloned()
            .collect()
    }

    fn by_index(&self, field: &str, value: &str) -> Vec<Snapshot> {
        self.entries
            .get(field)
            .and_then(|entries| entries.get(value))
            .map(|names| names.iter().filter_map(|name| self.objects.get(name).cloned()).collect())
            .unwrap_or_default()
    }
}

/// `base` plus any field only the other views project.
fn merge_views<'a>(mut base: Snapshot, others: impl Iterator<Item = &'a Snapshot>) -> Snapshot {
    for other in others {
        for (pointer, value) in &other.fields {
            base.fields
                .entry(pointer.clone())
                .or_insert_with(|| value.clone());
        }
    }
    base
}

/// Per-watch translation of watcher events. Keeps its own view of the
/// previous snapshots so two watches of one kind never observe each other's
/// writes to the shared store.
struct Translator {
    kind: ResourceKind,
    registration: Arc<str>,
    stores: Stores,
    known: HashMap<NamespacedName, Snapshot>,
    relist: Option<HashSet<NamespacedName>>,
}

impl Translator {
    fn new(kind: ResourceKind, registration: Arc<str>, stores: Stores) -> Self {
        Self {
            kind,
            registration,
            stores,
            known: HashMap::new(),
            relist: None,
        }
    }

    fn translate(&mut self, event: watcher::Event<Snapshot>) -> Vec<RawEvent> {
        match event {
            watcher::Event::Init => {
                self.relist = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(snapshot) => {
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(snapshot.namespaced_name.clone());
                }
                vec![self.apply(snapshot)]
            }
            watcher::Event::InitDone => {
                let Some(seen) = self.relist.take() else {
                    return Vec::new();
                };
                let gone: Vec<NamespacedName> = self
                    .known
                    .keys()
                    .filter(|name| !seen.contains(*name))
                    .cloned()
                    .collect();
                gone.iter().filter_map(|name| self.forget(name)).map(RawEvent::deleted).collect()
            }
            watcher::Event::Apply(snapshot) => vec![self.apply(snapshot)],
            watcher::Event::Delete(snapshot) => {
                self.forget(&snapshot.namespaced_name);
                vec![RawEvent::deleted(snapshot)]
            }
        }
    }

    fn apply(&mut self, snapshot: Snapshot) -> RawEvent {
        self.stores
            .write()
            .entry(self.kind)
            .or_default()
            .upsert(&self.registration, snapshot.clone());
        match self.known.insert(snapshot.namespaced_name.clone(), snapshot.clone()) {
            Some(previous) => RawEvent::updated(previous, snapshot),
            None => RawEvent::added(snapshot),
        }
    }

    fn forget(&mut self, name: &NamespacedName) -> Option<Snapshot> {
        if let Some(store) = self.stores.write().get_mut(&self.kind) {
            store.release(&self.registration, name);
        }
        self.known.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::index::{endpoint_slice_indices, SERVICE_NAME_INDEX_FIELD, SERVICE_NAME_LABEL};

    fn slice(name: &str, service: &str, resource_version: &str) -> Snapshot {
        Snapshot::new(NamespacedName::new("default", name))
            .with_label(SERVICE_NAME_LABEL, service)
            .with_resource_version(resource_version)
    }

    fn stores_with_index() -> Stores {
        let stores: Stores = Arc::default();
        stores
            .write()
            .entry(ResourceKind::EndpointSlice)
            .or_default()
            .add_index(endpoint_slice_indices().remove(0))
            .unwrap();
        stores
    }

    #[test]
    fn test_apply_then_update_attaches_previous() {
        let stores = stores_with_index();
        let mut translator = Translator::new(ResourceKind::EndpointSlice, "endpoints".into(), stores);

        let added = translator.translate(watcher::Event::Apply(slice("coffee-1", "coffee", "1")));
        assert_eq!(added, vec![RawEvent::added(slice("coffee-1", "coffee", "1"))]);

        let updated = translator.translate(watcher::Event::Apply(slice("coffee-1", "coffee", "2")));
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].event_kind, EventKind::Updated);
        assert_eq!(updated[0].previous.as_ref().unwrap().resource_version.as_deref(), Some("1"));
    }

    #[test]
    fn test_relist_emits_deletes_for_vanished_objects() {
        let stores = stores_with_index();
        let mut translator = Translator::new(ResourceKind::EndpointSlice, "endpoints".into(), stores.clone());
        translator.translate(watcher::Event::Apply(slice("coffee-1", "coffee", "1")));
        translator.translate(watcher::Event::Apply(slice("tea-1", "tea", "1")));

        assert!(translator.translate(watcher::Event::Init).is_empty());
        translator.translate(watcher::Event::InitApply(slice("coffee-1", "coffee", "1")));
        let done = translator.translate(watcher::Event::InitDone);

        assert_eq!(done, vec![RawEvent::deleted(slice("tea-1", "tea", "1"))]);
        let store = stores.read();
        let store = store.get(&ResourceKind::EndpointSlice).unwrap();
        assert!(store.by_index(SERVICE_NAME_INDEX_FIELD, "tea").is_empty());
        assert_eq!(store.by_index(SERVICE_NAME_INDEX_FIELD, "coffee").len(), 1);
    }

    #[test]
    fn test_index_follows_label_changes() {
        let stores = stores_with_index();
        let mut translator = Translator::new(ResourceKind::EndpointSlice, "endpoints".into(), stores.clone());
        translator.translate(watcher::Event::Apply(slice("shared-1", "coffee", "1")));
        translator.translate(watcher::Event::Apply(slice("shared-1", "tea", "2")));

        let store = stores.read();
        let store = store.get(&ResourceKind::EndpointSlice).unwrap();
        assert!(store.by_index(SERVICE_NAME_INDEX_FIELD, "coffee").is_empty());
        assert_eq!(
            store.by_index(SERVICE_NAME_INDEX_FIELD, "tea")[0].namespaced_name,
            NamespacedName::new("default", "shared-1")
        );
    }

    #[test]
    fn test_delete_removes_from_store() {
        let stores = stores_with_index();
        let mut translator = Translator::new(ResourceKind::EndpointSlice, "endpoints".into(), stores.clone());
        translator.translate(watcher::Event::Apply(slice("coffee-1", "coffee", "1")));
        let deleted = translator.translate(watcher::Event::Delete(slice("coffee-1", "coffee", "1")));

        assert_eq!(deleted[0].event_kind, EventKind::Deleted);
        assert!(stores.read().get(&ResourceKind::EndpointSlice).unwrap().list(None).is_empty());
    }

    #[test]
    fn test_duplicate_index_rejected_by_store() {
        let mut store = KindStore::default();
        store.add_index(endpoint_slice_indices().remove(0)).unwrap();
        assert!(store.add_index(endpoint_slice_indices().remove(0)).is_err());
    }

    #[test]
    fn test_single_name_watch_uses_its_own_namespace() {
        let control = NamespacedName::new("gateway-system", "gateway-config");
        let scope = WatchScope::new(Some("apps"), true, std::slice::from_ref(&control));
        assert_eq!(
            scope,
            WatchScope {
                namespace: Some("gateway-system".to_string()),
                field_selector: Some("metadata.name=gateway-config".to_string()),
            }
        );
    }

    #[test]
    fn test_unfiltered_watch_uses_watch_namespace() {
        assert_eq!(
            WatchScope::new(Some("apps"), true, &[]),
            WatchScope {
                namespace: Some("apps".to_string()),
                field_selector: None,
            }
        );
        assert_eq!(
            WatchScope::new(None, true, &[]),
            WatchScope {
                namespace: None,
                field_selector: None,
            }
        );
    }

    #[test]
    fn test_cluster_scoped_watch_ignores_namespaces() {
        assert_eq!(
            WatchScope::new(Some("apps"), false, &[]).namespace,
            None
        );
        let scope = WatchScope::new(Some("apps"), false, &[NamespacedName::cluster_scoped("nginx")]);
        assert_eq!(scope.namespace, None);
        assert_eq!(scope.field_selector.as_deref(), Some("metadata.name=nginx"));
    }

    #[test]
    fn test_same_kind_watches_share_store_without_clobbering() {
        let stores: Stores = Arc::default();
        let mut projecting = Translator::new(ResourceKind::Service, "user-service".into(), stores.clone());
        let mut metadata = Translator::new(ResourceKind::Service, "service-meta".into(), stores.clone());
        let key = NamespacedName::new("default", "coffee");
        let ports = serde_json::json!([{"port": 80}]);

        projecting.translate(watcher::Event::Apply(
            Snapshot::new(key.clone()).with_field("/spec/ports", ports.clone()),
        ));
        metadata.translate(watcher::Event::Apply(Snapshot::new(key.clone()).with_resource_version("2")));

        let cached = |stores: &Stores| {
            stores
                .read()
                .get(&ResourceKind::Service)
                .and_then(|store| store.objects.get(&key).cloned())
        };
        let merged = cached(&stores).unwrap();
        assert_eq!(merged.field("/spec/ports"), Some(&ports));
        assert_eq!(merged.resource_version.as_deref(), Some("2"));

        // A relist of one watch that misses the object leaves it cached for the other
        metadata.translate(watcher::Event::Init);
        let gone = metadata.translate(watcher::Event::InitDone);
        assert_eq!(gone.len(), 1);
        assert!(cached(&stores).is_some());

        projecting.translate(watcher::Event::Delete(Snapshot::new(key.clone())));
        assert!(cached(&stores).is_none());
    }

    #[test]
    fn test_list_filters_namespace() {
        let mut store = KindStore::default();
        let holder: Arc<str> = "watch".into();
        store.upsert(&holder, Snapshot::new(NamespacedName::new("a", "one")));
        store.upsert(&holder, Snapshot::new(NamespacedName::new("b", "two")));
        assert_eq!(store.list(Some("a")).len(), 1);
        assert_eq!(store.list(None).len(), 2);
    }
}
