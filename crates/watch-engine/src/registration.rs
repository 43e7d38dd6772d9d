//! Registration engine.
//!
//! `register_all` turns a descriptor table into running watches. It is all or
//! nothing: every descriptor is validated and every watch stream opened before
//! the first watch task is spawned. On any failure the streams opened so far
//! are dropped without ever being polled, so no event reaches the channel.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::cache::{ClusterCache, RawEventStream, WatchRequest};
use crate::channel::EventSink;
use crate::error::WatchError;
use crate::event::ChangeEvent;
use crate::kind::ResourceKind;
use crate::predicate::SharedPredicate;
use crate::snapshot::{NamespacedName, Snapshot};
use crate::table::WatchDescriptorTable;

/// Result of the startup read of the singleton control resource.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialState {
    /// The resource exists.
    Present(Snapshot),
    /// The resource does not exist yet.
    Absent,
}

/// Reads `key` straight from the API server. Not-found is `Absent`, any other
/// failure is fatal.
pub async fn initial_state(
    cache: &dyn ClusterCache,
    kind: ResourceKind,
    key: &NamespacedName,
    projected_fields: &[&'static str],
) -> Result<InitialState, WatchError> {
    let snapshot = cache
        .read_uncached(kind, key, projected_fields)
        .await
        .map_err(|source| WatchError::InitialState {
            kind,
            key: key.clone(),
            source,
        })?;

    Ok(match snapshot {
        Some(snapshot) => InitialState::Present(snapshot),
        None => {
            info!(%kind, %key, "control resource not found, starting without it");
            InitialState::Absent
        }
    })
}

/// Outcome of a successful `register_all`.
#[derive(Debug)]
pub struct Registration {
    /// Running watch tasks
    pub watches: WatchSet,
    /// Set when the table watches a control resource.
    pub initial_control_state: Option<InitialState>,
}

struct PendingWatch {
    kind: ResourceKind,
    name: Arc<str>,
    predicate: Option<SharedPredicate>,
    stream: RawEventStream,
}

/// Registers every descriptor in `table` and starts one task per watch, each
/// writing into `sink`. Tasks stop when `shutdown` is cancelled.
pub async fn register_all(
    table: WatchDescriptorTable,
    cache: Arc<dyn ClusterCache>,
    sink: EventSink,
    shutdown: CancellationToken,
) -> Result<Registration, WatchError> {
    table.validate()?;

    let initial_control_state = match (table.control_resource(), table.control_descriptor()) {
        (Some(key), Some(descriptor)) => Some(
            initial_state(cache.as_ref(), descriptor.kind(), key, &descriptor.projected_fields()).await?,
        ),
        _ => None,
    };

    let mut pending = Vec::with_capacity(table.len());
    for descriptor in table.into_descriptors() {
        let kind = descriptor.kind();
        let name: Arc<str> = Arc::from(descriptor.registration_name());
        let registration_error = |source| WatchError::Registration {
            kind,
            name: name.to_string(),
            source,
        };

        for index in descriptor.field_indices() {
            cache.add_index(kind, index).map_err(registration_error)?;
        }

        let request = WatchRequest {
            registration_name: name.to_string(),
            metadata_only: descriptor.is_metadata_only(),
            projected_fields: descriptor.projected_fields(),
            namespaced_names: descriptor
                .namespaced_name_filter()
                .map(|filter| filter.allowed().to_vec())
                .unwrap_or_default(),
        };
        let stream = cache.watch(kind, request).await.map_err(registration_error)?;
        debug!(%kind, registration = %name, "watch registered");

        pending.push(PendingWatch {
            kind,
            name,
            predicate: descriptor.effective_predicate(),
            stream,
        });
    }

    let mut tasks = JoinSet::new();
    let mut names = Vec::with_capacity(pending.len());
    for watch in pending {
        names.push(watch.name.clone());
        tasks.spawn(supervise(watch, sink.clone(), shutdown.clone()));
    }
    info!(watches = names.len(), "all watches registered");

    Ok(Registration {
        watches: WatchSet {
            tasks,
            names,
            shutdown,
        },
        initial_control_state,
    })
}

/// Why a watch task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Shutdown was requested.
    Cancelled,
    /// The cache ended the stream.
    StreamEnded,
    /// The consumer dropped the receiver.
    ConsumerGone,
    /// The task panicked, for example inside a predicate.
    Panicked,
}

/// A stopped watch task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchExit {
    /// Kind of the watch
    pub kind: ResourceKind,
    /// Registration name of the watch
    pub registration_name: Arc<str>,
    /// Why it stopped
    pub reason: ExitReason,
}

/// Runs a watch and reports a panic as an exit instead of losing the task.
async fn supervise(watch: PendingWatch, sink: EventSink, shutdown: CancellationToken) -> WatchExit {
    let kind = watch.kind;
    let name = watch.name.clone();
    match AssertUnwindSafe(run_watch(watch, sink, shutdown)).catch_unwind().await {
        Ok(exit) => exit,
        Err(_) => {
            error!(%kind, registration = %name, "watch task panicked");
            WatchExit {
                kind,
                registration_name: name,
                reason: ExitReason::Panicked,
            }
        }
    }
}

async fn run_watch(watch: PendingWatch, sink: EventSink, shutdown: CancellationToken) -> WatchExit {
    let PendingWatch {
        kind,
        name,
        predicate,
        mut stream,
    } = watch;
    debug!(%kind, registration = %name, "watch task started");

    let reason = loop {
        let raw = tokio::select! {
            biased;
            () = shutdown.cancelled() => break ExitReason::Cancelled,
            next = stream.next() => match next {
                Some(raw) => raw,
                None => break ExitReason::StreamEnded,
            },
        };

        if let Some(predicate) = &predicate {
            if !predicate.evaluate(raw.previous.as_ref(), &raw.current) {
                trace!(%kind, registration = %name, object = %raw.current.namespaced_name, "filtered");
                continue;
            }
        }

        let event = ChangeEvent::from_raw(kind, name.clone(), raw);
        trace!(%kind, registration = %name, object = %event.namespaced_name, event = %event.event_kind, "emit");
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break ExitReason::Cancelled,
            sent = sink.send(event) => if sent.is_err() {
                break ExitReason::ConsumerGone;
            },
        }
    };

    match reason {
        ExitReason::Cancelled => debug!(%kind, registration = %name, "watch task stopped"),
        ExitReason::StreamEnded => warn!(%kind, registration = %name, "watch stream ended"),
        ExitReason::ConsumerGone => warn!(%kind, registration = %name, "event consumer gone, stopping watch"),
        ExitReason::Panicked => error!(%kind, registration = %name, "watch task panicked"),
    }

    WatchExit {
        kind,
        registration_name: name,
        reason,
    }
}

/// Running watch tasks. Each task holds one `EventSink` clone, so the fan-in
/// channel closes once this set has been drained.
pub struct WatchSet {
    tasks: JoinSet<WatchExit>,
    names: Vec<Arc<str>>,
    shutdown: CancellationToken,
}

impl fmt::Debug for WatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSet")
            .field("names", &self.names)
            .field("running", &self.tasks.len())
            .finish()
    }
}

impl WatchSet {
    /// Registration names, in table order.
    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    /// Tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for the next task to stop. `None` when all have stopped.
    /// Panics inside a watch are reported as `ExitReason::Panicked`; a join
    /// error only happens if the runtime itself is shutting down.
    pub async fn next_exit(&mut self) -> Option<WatchExit> {
        loop {
            match self.tasks.join_next().await? {
                Ok(exit) => return Some(exit),
                Err(err) => error!("watch task failed: {}", err),
            }
        }
    }

    /// Cancels every task and waits for all of them to stop.
    pub async fn shutdown(mut self) -> Vec<WatchExit> {
        info!(running = self.tasks.len(), "stopping watches");
        self.shutdown.cancel();
        let mut exits = Vec::with_capacity(self.tasks.len());
        while let Some(exit) = self.next_exit().await {
            exits.push(exit);
        }
        exits
    }
}
