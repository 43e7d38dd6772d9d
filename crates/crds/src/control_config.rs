//! GatewayControlConfig CRD
//!
//! Singleton control resource for the controller process. The controller
//! watches exactly one instance, named on the command line, and reads it once
//! at startup before its caches are warm.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "gateway.microscaler.io",
    version = "v1alpha1",
    kind = "GatewayControlConfig",
    namespaced,
    status = "GatewayControlConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct GatewayControlConfigSpec {
    /// Logging settings for the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSpec {
    /// Control plane log level
    #[serde(default)]
    pub level: LogLevel,
}

/// Control plane log level.
///
/// Serializes lowercase ("info", "debug", "error").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    /// Verbose output
    Debug,
    /// Errors only
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GatewayControlConfigStatus {
    /// Whether the configuration was applied
    #[serde(default)]
    pub valid: bool,

    /// Generation last applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last time the configuration was applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parses_lowercase() {
        let level: LogLevel = serde_json::from_value(serde_json::json!("debug")).unwrap();
        assert_eq!(level, LogLevel::Debug);
        assert_eq!(level.as_directive(), "debug");
    }

    #[test]
    fn test_missing_level_defaults_to_info() {
        let logging: LoggingSpec = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(logging.level, LogLevel::Info);
    }
}
