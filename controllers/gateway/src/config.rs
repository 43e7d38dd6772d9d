//! Process configuration, read from environment variables.

use std::env;
use std::num::NonZeroUsize;

use watch_engine::{NamespacedName, WatchConfig, DEFAULT_CAPACITY};

use crate::error::ControllerError;

/// Controller name written into `GatewayClass.spec.controllerName`.
pub const DEFAULT_CONTROLLER_NAME: &str = "gateway.microscaler.io/gateway-controller";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Controller name GatewayClasses must reference
    pub controller_name: String,
    /// `namespace/name` of the GatewayControlConfig to follow
    pub control_config_name: Option<NamespacedName>,
    /// Watch experimental Gateway API kinds
    pub experimental_features: bool,
    /// Watch SnippetsFilters
    pub snippets_filters: bool,
    /// Restricts namespaced watches; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Capacity of the fan-in channel
    pub event_channel_capacity: NonZeroUsize,
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let control_config_name = get("CONTROL_CONFIG_NAME")
            .map(|value| value.parse::<NamespacedName>())
            .transpose()
            .map_err(|e| ControllerError::InvalidConfig(format!("CONTROL_CONFIG_NAME: {e}")))?;

        let event_channel_capacity = match get("EVENT_CHANNEL_CAPACITY") {
            Some(value) => value
                .parse::<NonZeroUsize>()
                .map_err(|e| ControllerError::InvalidConfig(format!("EVENT_CHANNEL_CAPACITY {value:?}: {e}")))?,
            None => DEFAULT_CAPACITY,
        };

        Ok(Self {
            controller_name: get("CONTROLLER_NAME").unwrap_or_else(|| DEFAULT_CONTROLLER_NAME.to_string()),
            control_config_name,
            experimental_features: parse_flag("EXPERIMENTAL_FEATURES", get("EXPERIMENTAL_FEATURES"))?,
            snippets_filters: parse_flag("SNIPPETS_FILTERS", get("SNIPPETS_FILTERS"))?,
            namespace: get("WATCH_NAMESPACE"),
            event_channel_capacity,
        })
    }

    /// Watch table inputs derived from this configuration.
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            experimental_features: self.experimental_features,
            snippets_filters: self.snippets_filters,
            control_resource_name: self.control_config_name.clone(),
            controller_name: self.controller_name.clone(),
        }
    }
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool, ControllerError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("false" | "0" | "no") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some(other) => Err(ControllerError::InvalidConfig(format!(
            "{key} must be true or false, got {other:?}"
        ))),
    }
}
