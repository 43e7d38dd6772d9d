//! Main controller implementation.
//!
//! Builds the watch table from configuration, registers every watch against
//! the cluster cache, applies the control resource read at startup and runs
//! the dispatcher until shutdown or until a watch stops on its own.

use std::future::Future;
use std::sync::Arc;

use kube::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use watch_engine::{fan_in, register_all, ClusterCache, KubeCache, WatchDescriptorTable, WatchSet};

use crate::config::Config;
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::error::ControllerError;
use crate::log_level::LogLevelSetter;

/// Running watches plus the dispatcher task.
pub struct Controller {
    watches: WatchSet,
    dispatcher: JoinHandle<DispatchStats>,
}

impl Controller {
    /// Connects to the cluster and registers all watches.
    pub async fn new(config: Config, log_level: Arc<dyn LogLevelSetter>) -> Result<Self, ControllerError> {
        let client = Client::try_default().await?;
        let cache = Arc::new(KubeCache::new(client, config.namespace.clone()));
        Self::with_cache(config, cache, log_level).await
    }

    /// Registers all watches against `cache`.
    pub async fn with_cache(
        config: Config,
        cache: Arc<dyn ClusterCache>,
        log_level: Arc<dyn LogLevelSetter>,
    ) -> Result<Self, ControllerError> {
        let table = WatchDescriptorTable::build(&config.watch_config());
        info!(watches = table.len(), registrations = ?table.registration_names(), "Built watch table");

        let (sink, events) = fan_in(config.event_channel_capacity);
        let registration = register_all(table, cache.clone(), sink, CancellationToken::new()).await?;

        let dispatcher = Dispatcher::new(cache, log_level, config.control_config_name);
        if let Err(e) = dispatcher.apply_initial_state(registration.initial_control_state.as_ref()) {
            registration.watches.shutdown().await;
            return Err(e);
        }

        Ok(Self {
            watches: registration.watches,
            dispatcher: tokio::spawn(dispatcher.run(events)),
        })
    }

    /// Runs until Ctrl-C.
    pub async fn run(self) -> Result<(), ControllerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Runs until `signal` completes or a watch stops. Either way every watch
    /// is stopped and the dispatcher drained before returning.
    pub async fn run_until(mut self, signal: impl Future<Output = ()>) -> Result<(), ControllerError> {
        let stopped = tokio::select! {
            () = signal => {
                info!("Shutdown requested");
                None
            }
            exit = self.watches.next_exit() => Some(exit),
        };

        match &stopped {
            Some(Some(exit)) => error!(
                kind = %exit.kind,
                registration = %exit.registration_name,
                reason = ?exit.reason,
                "Watch stopped unexpectedly, shutting down"
            ),
            Some(None) => error!("No watch left running, shutting down"),
            None => {}
        }

        let exits = self.watches.shutdown().await;
        let stats = self
            .dispatcher
            .await
            .map_err(|e| ControllerError::Dispatcher(e.to_string()))?;
        info!(watches = exits.len(), events = stats.events, errors = stats.errors, "Controller stopped");

        match stopped {
            None => Ok(()),
            Some(Some(exit)) => Err(ControllerError::WatchStopped {
                registration: exit.registration_name.to_string(),
                reason: format!("{:?}", exit.reason),
            }),
            Some(None) => Err(ControllerError::WatchStopped {
                registration: "all".to_string(),
                reason: "no watch running".to_string(),
            }),
        }
    }
}
