//! Event dispatcher.
//!
//! The single consumer of the fan-in channel. Every event is logged with its
//! identity; changes to the control resource are applied to the process log
//! level, and Service changes are resolved to their EndpointSlices through
//! the service-name index.

use std::sync::Arc;

use crds::LogLevel;
use tracing::{debug, error, info, warn};
use watch_engine::index::SERVICE_NAME_INDEX_FIELD;
use watch_engine::table::CONTROL_LOG_LEVEL_FIELD;
use watch_engine::{ChangeEvent, ClusterCache, EventKind, EventReceiver, InitialState, NamespacedName, ResourceKind, Snapshot};

use crate::error::ControllerError;
use crate::log_level::LogLevelSetter;

/// Counters reported when the channel closes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events received
    pub events: usize,
    /// Events whose handling failed
    pub errors: usize,
}

/// Single consumer of the fan-in channel.
pub struct Dispatcher {
    cache: Arc<dyn ClusterCache>,
    log_level: Arc<dyn LogLevelSetter>,
    control_resource: Option<NamespacedName>,
}

impl Dispatcher {
    /// Creates a dispatcher following `control_resource`, if any.
    pub fn new(
        cache: Arc<dyn ClusterCache>,
        log_level: Arc<dyn LogLevelSetter>,
        control_resource: Option<NamespacedName>,
    ) -> Self {
        Self {
            cache,
            log_level,
            control_resource,
        }
    }

    /// Applies the control resource read at startup. An absent resource
    /// resets the level to the default.
    pub fn apply_initial_state(&self, state: Option<&InitialState>) -> Result<(), ControllerError> {
        match state {
            Some(InitialState::Present(snapshot)) => self.apply_level(level_of(snapshot)),
            Some(InitialState::Absent) => self.apply_level(LogLevel::default()),
            None => Ok(()),
        }
    }

    /// Consumes events until every producer has stopped.
    pub async fn run(self, mut events: EventReceiver) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(event) = events.recv().await {
            stats.events += 1;
            if let Err(e) = self.handle(&event).await {
                stats.errors += 1;
                error!(kind = %event.kind, object = %event.namespaced_name, "Failed to handle event: {}", e);
            }
        }
        info!(events = stats.events, errors = stats.errors, "Event channel closed, dispatcher stopping");
        stats
    }

    /// Handles one event.
    pub async fn handle(&self, event: &ChangeEvent) -> Result<(), ControllerError> {
        debug!(
            kind = %event.kind,
            registration = %event.registration_name,
            object = %event.namespaced_name,
            event = %event.event_kind,
            "change"
        );

        match event.kind {
            ResourceKind::GatewayControlConfig => self.handle_control(event).await,
            ResourceKind::Service => {
                self.handle_service(event);
                Ok(())
            }
            ResourceKind::GatewayClass
            | ResourceKind::Gateway
            | ResourceKind::HttpRoute
            | ResourceKind::GrpcRoute
            | ResourceKind::TlsRoute
            | ResourceKind::ReferenceGrant
            | ResourceKind::BackendTlsPolicy
            | ResourceKind::Secret
            | ResourceKind::ConfigMap
            | ResourceKind::Namespace
            | ResourceKind::EndpointSlice
            | ResourceKind::CustomResourceDefinition
            | ResourceKind::ProxyConfig
            | ResourceKind::ClientSettingsPolicy
            | ResourceKind::ObservabilityPolicy
            | ResourceKind::UpstreamSettingsPolicy
            | ResourceKind::SnippetsFilter => Ok(()),
        }
    }

    async fn handle_control(&self, event: &ChangeEvent) -> Result<(), ControllerError> {
        if self.control_resource.as_ref() != Some(&event.namespaced_name) {
            warn!(object = %event.namespaced_name, "Ignoring event for unexpected control resource");
            return Ok(());
        }

        let level = match event.event_kind {
            EventKind::Deleted => LogLevel::default(),
            EventKind::Added | EventKind::Updated => self
                .cache
                .get(ResourceKind::GatewayControlConfig, &event.namespaced_name)
                .await?
                .map(|snapshot| level_of(&snapshot))
                .unwrap_or_default(),
        };
        self.apply_level(level)
    }

    fn handle_service(&self, event: &ChangeEvent) {
        let service = &event.namespaced_name;
        let slices = self
            .cache
            .by_index(ResourceKind::EndpointSlice, SERVICE_NAME_INDEX_FIELD, &service.name)
            .into_iter()
            .filter(|slice| slice.namespaced_name.namespace == service.namespace)
            .count();
        debug!(service = %service, endpoint_slices = slices, "Service endpoints resolved");
    }

    fn apply_level(&self, level: LogLevel) -> Result<(), ControllerError> {
        self.log_level.set_level(level)?;
        info!(level = level.as_directive(), "Applied control plane log level");
        Ok(())
    }
}

fn level_of(snapshot: &Snapshot) -> LogLevel {
    let Some(value) = snapshot.field(CONTROL_LOG_LEVEL_FIELD) else {
        return LogLevel::default();
    };
    serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        warn!(object = %snapshot.namespaced_name, "Invalid log level {}: {}, using default", value, e);
        LogLevel::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_level::testing::RecordingLogLevel;
    use serde_json::json;
    use watch_engine::index::SERVICE_NAME_LABEL;
    use watch_engine::{fan_in, MockClusterCache};

    fn control_name() -> NamespacedName {
        NamespacedName::new("gateway-system", "gateway-config")
    }

    fn control(level: &str) -> Snapshot {
        Snapshot::new(control_name()).with_field(CONTROL_LOG_LEVEL_FIELD, json!(level))
    }

    fn event(kind: ResourceKind, name: NamespacedName, event_kind: EventKind) -> ChangeEvent {
        ChangeEvent {
            kind,
            registration_name: kind.as_str().into(),
            namespaced_name: name,
            event_kind,
            observed_at: chrono::Utc::now(),
        }
    }

    fn dispatcher(cache: &MockClusterCache) -> (Dispatcher, Arc<RecordingLogLevel>) {
        let recorder = Arc::new(RecordingLogLevel::default());
        let dispatcher = Dispatcher::new(Arc::new(cache.clone()), recorder.clone(), Some(control_name()));
        (dispatcher, recorder)
    }

    #[test]
    fn test_initial_state_present_applies_level() {
        let (dispatcher, recorder) = dispatcher(&MockClusterCache::new());
        dispatcher
            .apply_initial_state(Some(&InitialState::Present(control("debug"))))
            .unwrap();
        assert_eq!(recorder.levels(), vec![LogLevel::Debug]);
    }

    #[test]
    fn test_initial_state_absent_applies_default() {
        let (dispatcher, recorder) = dispatcher(&MockClusterCache::new());
        dispatcher.apply_initial_state(Some(&InitialState::Absent)).unwrap();
        assert_eq!(recorder.levels(), vec![LogLevel::Info]);
    }

    #[test]
    fn test_no_control_resource_leaves_level_alone() {
        let (dispatcher, recorder) = dispatcher(&MockClusterCache::new());
        dispatcher.apply_initial_state(None).unwrap();
        assert!(recorder.levels().is_empty());
    }

    #[test]
    fn test_invalid_level_falls_back_to_default() {
        assert_eq!(level_of(&control("verbose")), LogLevel::Info);
        assert_eq!(level_of(&Snapshot::new(control_name())), LogLevel::Info);
        assert_eq!(level_of(&control("error")), LogLevel::Error);
    }

    #[tokio::test]
    async fn test_control_update_reads_cache() {
        let cache = MockClusterCache::new();
        cache.add_object(ResourceKind::GatewayControlConfig, control("error"));
        let (dispatcher, recorder) = dispatcher(&cache);

        dispatcher
            .handle(&event(ResourceKind::GatewayControlConfig, control_name(), EventKind::Updated))
            .await
            .unwrap();
        dispatcher
            .handle(&event(ResourceKind::GatewayControlConfig, control_name(), EventKind::Deleted))
            .await
            .unwrap();

        assert_eq!(recorder.levels(), vec![LogLevel::Error, LogLevel::Info]);
    }

    #[tokio::test]
    async fn test_other_control_resource_ignored() {
        let (dispatcher, recorder) = dispatcher(&MockClusterCache::new());
        dispatcher
            .handle(&event(
                ResourceKind::GatewayControlConfig,
                NamespacedName::new("other", "config"),
                EventKind::Added,
            ))
            .await
            .unwrap();
        assert!(recorder.levels().is_empty());
    }

    #[tokio::test]
    async fn test_service_event_uses_index() {
        let cache = MockClusterCache::new();
        let (dispatcher, _recorder) = dispatcher(&cache);
        for index in watch_engine::index::endpoint_slice_indices() {
            cache.add_index(ResourceKind::EndpointSlice, &index).unwrap();
        }
        cache.add_object(
            ResourceKind::EndpointSlice,
            Snapshot::new(NamespacedName::new("default", "coffee-abc")).with_label(SERVICE_NAME_LABEL, "coffee"),
        );

        dispatcher
            .handle(&event(ResourceKind::Service, NamespacedName::new("default", "coffee"), EventKind::Added))
            .await
            .unwrap();
        assert_eq!(
            cache
                .by_index(ResourceKind::EndpointSlice, SERVICE_NAME_INDEX_FIELD, "coffee")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_run_stops_when_channel_closes() {
        let cache = MockClusterCache::new();
        let (dispatcher, _recorder) = dispatcher(&cache);
        let (sink, rx) = fan_in(watch_engine::DEFAULT_CAPACITY);

        sink.send(event(ResourceKind::Gateway, NamespacedName::new("default", "gw"), EventKind::Added))
            .await
            .unwrap();
        drop(sink);

        let stats = dispatcher.run(rx).await;
        assert_eq!(stats, DispatchStats { events: 1, errors: 0 });
    }
}
