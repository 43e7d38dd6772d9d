//! Gateway Controller
//!
//! Registers watches for every Gateway API, core and project kind the
//! controller depends on, and dispatches accepted changes from a single
//! event channel.

mod config;
mod controller;
mod dispatcher;
mod error;
mod log_level;

use std::sync::Arc;

use config::Config;
use controller::Controller;
use log_level::ReloadLogLevel;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

use crate::error::ControllerError;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, reload_handle) = reload::Layer::new(filter);
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider was already installed");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Gateway Controller");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Controller name: {}", config.controller_name);
    info!(
        "  Control config: {}",
        config
            .control_config_name
            .as_ref()
            .map_or_else(|| "none".to_string(), ToString::to_string)
    );
    info!("  Experimental features: {}", config.experimental_features);
    info!("  SnippetsFilters: {}", config.snippets_filters);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Event channel capacity: {}", config.event_channel_capacity);

    let controller = Controller::new(config, Arc::new(ReloadLogLevel::new(reload_handle))).await?;
    controller.run().await?;

    Ok(())
}
