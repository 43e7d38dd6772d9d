//! Unit tests for the registration engine, run against `MockClusterCache`

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use crate::channel::{fan_in, EventReceiver, DEFAULT_CAPACITY};
    use crate::descriptor::WatchDescriptor;
    use crate::error::WatchError;
    use crate::event::{EventKind, RawEvent};
    use crate::index::SERVICE_NAME_INDEX_FIELD;
    use crate::kind::ResourceKind;
    use crate::mock::MockClusterCache;
    use crate::predicate::{predicate_fn, GenerationChanged};
    use crate::registration::{register_all, ExitReason, InitialState, Registration};
    use crate::snapshot::{NamespacedName, Snapshot};
    use crate::table::{WatchConfig, WatchDescriptorTable, CONTROL_LOG_LEVEL_FIELD, USER_SERVICE_REGISTRATION};

    fn object(name: &str, generation: i64, resource_version: &str) -> Snapshot {
        Snapshot::new(NamespacedName::new("default", name))
            .with_generation(generation)
            .with_resource_version(resource_version)
    }

    fn control_name() -> NamespacedName {
        NamespacedName::new("gateway-system", "gateway-config")
    }

    async fn register(
        table: WatchDescriptorTable,
        cache: &MockClusterCache,
    ) -> (Result<Registration, WatchError>, EventReceiver) {
        let (sink, rx) = fan_in(DEFAULT_CAPACITY);
        let result = register_all(table, Arc::new(cache.clone()), sink, CancellationToken::new()).await;
        (result, rx)
    }

    fn single(kind: ResourceKind) -> WatchDescriptorTable {
        let mut table = WatchDescriptorTable::new();
        table.push(WatchDescriptor::new(kind).with_predicate(GenerationChanged));
        table
    }

    #[tokio::test]
    async fn test_duplicate_name_opens_nothing() {
        let cache = MockClusterCache::new();
        let mut table = WatchDescriptorTable::new();
        table.push(WatchDescriptor::new(ResourceKind::Gateway));
        table.push(WatchDescriptor::new(ResourceKind::Service).named("dup"));
        table.push(WatchDescriptor::new(ResourceKind::Service).named("dup"));
        table.push_control(control_name());

        let (result, mut rx) = register(table, &cache).await;

        let err = result.unwrap_err();
        assert!(matches!(err, WatchError::DuplicateRegistrationName { ref name, .. } if name == "dup"));
        assert!(err.is_configuration_error());
        assert!(cache.requests().is_empty(), "no watch should be opened");
        assert_eq!(cache.uncached_reads(), 0, "validation runs before the initial read");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_rejected_kind_rolls_back_every_watch() {
        let cache = MockClusterCache::new();
        let kinds = &ResourceKind::ALL[..10];
        let mut table = WatchDescriptorTable::new();
        for kind in kinds {
            table.push(WatchDescriptor::new(*kind));
        }
        cache.reject_kind(kinds[4]);

        let (result, mut rx) = register(table, &cache).await;

        match result.unwrap_err() {
            WatchError::Registration { kind, name, .. } => {
                assert_eq!(kind, kinds[4]);
                assert_eq!(name, kinds[4].as_str());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cache.requests().len(), 5, "registration stops at the first failure");
        assert_eq!(cache.live_watches(), 0, "opened streams must be dropped");
        assert_eq!(cache.emit(kinds[0], RawEvent::added(object("late", 1, "1"))), 0);
        assert!(rx.recv().await.is_none(), "channel closes without any event");
    }

    #[tokio::test]
    async fn test_generation_predicate_filters_status_updates() {
        let cache = MockClusterCache::new();
        let (result, mut rx) = register(single(ResourceKind::HttpRoute), &cache).await;
        let registration = result.unwrap();

        cache.emit(
            ResourceKind::HttpRoute,
            RawEvent::updated(object("status-only", 3, "10"), object("status-only", 3, "11")),
        );
        cache.emit(
            ResourceKind::HttpRoute,
            RawEvent::updated(object("spec-change", 3, "12"), object("spec-change", 4, "13")),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.namespaced_name.name, "spec-change");
        assert_eq!(event.event_kind, EventKind::Updated);
        assert_eq!(event.kind, ResourceKind::HttpRoute);
        assert!(rx.try_recv().is_err());

        registration.watches.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_is_evaluated_without_previous() {
        let cache = MockClusterCache::new();
        let (result, mut rx) = register(single(ResourceKind::Gateway), &cache).await;
        let registration = result.unwrap();

        cache.emit(ResourceKind::Gateway, RawEvent::deleted(object("gone", 2, "5")));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_kind, EventKind::Deleted);
        assert_eq!(event.namespaced_name, NamespacedName::new("default", "gone"));

        registration.watches.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_preserve_order_within_registration() {
        let cache = MockClusterCache::new();
        let (result, mut rx) = register(single(ResourceKind::Gateway), &cache).await;
        let registration = result.unwrap();

        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.emit(ResourceKind::Gateway, RawEvent::added(object(name, i as i64, "1")));
        }

        let mut names = Vec::new();
        for _ in 0..4 {
            names.push(rx.recv().await.unwrap().namespaced_name.name);
        }
        assert_eq!(names, vec!["a", "b", "c", "d"]);

        registration.watches.shutdown().await;
    }

    #[tokio::test]
    async fn test_control_resource_read_before_watches() {
        let cache = MockClusterCache::new();
        let control = Snapshot::new(control_name())
            .with_generation(1)
            .with_field(CONTROL_LOG_LEVEL_FIELD, serde_json::json!("debug"));
        cache.add_uncached_object(ResourceKind::GatewayControlConfig, control.clone());

        let mut table = WatchDescriptorTable::new();
        table.push_control(control_name());
        let (result, _rx) = register(table, &cache).await;
        let registration = result.unwrap();

        assert_eq!(registration.initial_control_state, Some(InitialState::Present(control)));
        assert_eq!(cache.uncached_reads(), 1);

        let requests = cache.requests();
        assert_eq!(requests.len(), 1);
        let (kind, request) = &requests[0];
        assert_eq!(*kind, ResourceKind::GatewayControlConfig);
        assert_eq!(request.namespaced_names, vec![control_name()]);
        assert!(request.projected_fields.contains(&CONTROL_LOG_LEVEL_FIELD));

        registration.watches.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_control_resource_is_absent() {
        let cache = MockClusterCache::new();
        let mut table = WatchDescriptorTable::new();
        table.push_control(control_name());

        let (result, _rx) = register(table, &cache).await;
        let registration = result.unwrap();

        assert_eq!(registration.initial_control_state, Some(InitialState::Absent));
        registration.watches.shutdown().await;
    }

    #[tokio::test]
    async fn test_control_read_failure_is_fatal() {
        let cache = MockClusterCache::new();
        cache.fail_uncached_reads("connection refused");
        let mut table = WatchDescriptorTable::new();
        table.push(WatchDescriptor::new(ResourceKind::Gateway));
        table.push_control(control_name());

        let (result, _rx) = register(table, &cache).await;

        let err = result.unwrap_err();
        assert!(matches!(err, WatchError::InitialState { kind: ResourceKind::GatewayControlConfig, .. }));
        assert!(!err.is_configuration_error());
        assert!(cache.requests().is_empty());
    }

    #[tokio::test]
    async fn test_no_control_descriptor_skips_initial_read() {
        let cache = MockClusterCache::new();
        let (result, _rx) = register(single(ResourceKind::Gateway), &cache).await;
        let registration = result.unwrap();

        assert_eq!(registration.initial_control_state, None);
        assert_eq!(cache.uncached_reads(), 0);
        registration.watches.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_table_installs_indices_and_names() {
        let cache = MockClusterCache::new();
        let config = WatchConfig {
            controller_name: "gateway.microscaler.io/gateway-controller".to_string(),
            ..WatchConfig::default()
        };
        let table = WatchDescriptorTable::build(&config);
        let expected = table.len();

        let (result, mut rx) = register(table, &cache).await;
        let registration = result.unwrap();

        assert_eq!(registration.watches.running(), expected);
        assert_eq!(cache.index_fields(ResourceKind::EndpointSlice), vec![SERVICE_NAME_INDEX_FIELD]);
        assert!(
            registration
                .watches
                .names()
                .iter()
                .any(|name| &**name == USER_SERVICE_REGISTRATION)
        );

        let service = object("coffee", 1, "1").with_field("/spec/ports", serde_json::json!([{"port": 80}]));
        assert!(cache.emit_to(USER_SERVICE_REGISTRATION, RawEvent::added(service)));
        let event = rx.recv().await.unwrap();
        assert_eq!(&*event.registration_name, USER_SERVICE_REGISTRATION);
        assert_eq!(event.kind, ResourceKind::Service);

        registration.watches.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_channel_after_tasks_exit() {
        let cache = MockClusterCache::new();
        let mut table = WatchDescriptorTable::new();
        table.push(WatchDescriptor::new(ResourceKind::Gateway));
        table.push(WatchDescriptor::new(ResourceKind::HttpRoute));
        table.push(WatchDescriptor::new(ResourceKind::Secret));

        let (result, mut rx) = register(table, &cache).await;
        let registration = result.unwrap();

        let exits = registration.watches.shutdown().await;
        assert_eq!(exits.len(), 3);
        assert!(exits.iter().all(|exit| exit.reason == ExitReason::Cancelled));
        assert!(rx.recv().await.is_none());
        assert_eq!(cache.live_watches(), 0);
    }

    #[tokio::test]
    async fn test_stream_end_is_reported() {
        let cache = MockClusterCache::new();
        let (result, _rx) = register(single(ResourceKind::Gateway), &cache).await;
        let mut watches = result.unwrap().watches;

        cache.close_all();

        let exit = watches.next_exit().await.unwrap();
        assert_eq!(exit.reason, ExitReason::StreamEnded);
        assert_eq!(exit.kind, ResourceKind::Gateway);
        assert!(watches.next_exit().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_consumer_stops_watch() {
        let cache = MockClusterCache::new();
        let (result, rx) = register(single(ResourceKind::Gateway), &cache).await;
        let mut watches = result.unwrap().watches;
        drop(rx);

        cache.emit(ResourceKind::Gateway, RawEvent::added(object("orphan", 1, "1")));

        let exit = watches.next_exit().await.unwrap();
        assert_eq!(exit.reason, ExitReason::ConsumerGone);
    }

    #[tokio::test]
    async fn test_panicking_predicate_reported_as_exit() {
        let cache = MockClusterCache::new();
        let mut table = WatchDescriptorTable::new();
        table.push(
            WatchDescriptor::new(ResourceKind::Gateway)
                .with_shared_predicate(predicate_fn("explodes", |_, _| panic!("predicate failure"))),
        );
        table.push(WatchDescriptor::new(ResourceKind::HttpRoute));

        let (result, _rx) = register(table, &cache).await;
        let mut watches = result.unwrap().watches;

        cache.emit(ResourceKind::Gateway, RawEvent::added(object("gw", 1, "1")));

        let exit = watches.next_exit().await.unwrap();
        assert_eq!(exit.reason, ExitReason::Panicked);
        assert_eq!(exit.kind, ResourceKind::Gateway);
        assert_eq!(&*exit.registration_name, ResourceKind::Gateway.as_str());
        assert_eq!(watches.running(), 1);

        let exits = watches.shutdown().await;
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::Cancelled);
    }
}
