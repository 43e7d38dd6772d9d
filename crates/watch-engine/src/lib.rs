//! Watch registration and event fan-in for the gateway controller.
//!
//! Declares which Kubernetes kinds the controller observes, how each watch
//! is filtered, which indices it needs, and registers all of them against a
//! [`ClusterCache`] as one unit. Every accepted change lands on a single
//! bounded channel read by one consumer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use watch_engine::{fan_in, register_all, KubeCache, WatchConfig, WatchDescriptorTable, DEFAULT_CAPACITY};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let cache = Arc::new(KubeCache::new(client, None));
//!
//! let table = WatchDescriptorTable::build(&WatchConfig {
//!     controller_name: "gateway.microscaler.io/gateway-controller".to_string(),
//!     ..WatchConfig::default()
//! });
//! let (sink, mut events) = fan_in(DEFAULT_CAPACITY);
//! let registration = register_all(table, cache, sink, CancellationToken::new()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{} {} {}", event.kind, event.namespaced_name, event.event_kind);
//! }
//! registration.watches.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Predicates**: generation, resource version, label, annotation and
//!   field comparisons, composable with AND/OR
//! - **Field indices**: validated for uniqueness before registration
//! - **Atomic registration**: either every watch runs or none does
//! - **Initial read**: the singleton control resource is read uncached
//!   before any watch starts

pub mod cache;
pub mod channel;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod gateway_predicates;
pub mod index;
pub mod kind;
pub mod kube_cache;
pub mod predicate;
pub mod registration;
pub mod snapshot;
pub mod table;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

#[cfg(test)]
mod registration_test;

pub use cache::{ClusterCache, RawEventStream, WatchRequest};
pub use channel::{fan_in, EventReceiver, EventSink, SinkClosed, DEFAULT_CAPACITY};
pub use descriptor::WatchDescriptor;
pub use error::{CacheError, WatchError};
pub use event::{ChangeEvent, EventKind, RawEvent};
pub use index::{FieldIndex, FieldIndexRegistry};
pub use kind::ResourceKind;
pub use kube_cache::KubeCache;
pub use predicate::{Predicate, SharedPredicate};
pub use registration::{initial_state, register_all, ExitReason, InitialState, Registration, WatchExit, WatchSet};
pub use snapshot::{NamespacedName, Snapshot};
pub use table::{WatchConfig, WatchDescriptorTable};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockClusterCache;
