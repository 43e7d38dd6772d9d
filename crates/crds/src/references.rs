//! Policy target references
//!
//! Follows the Gateway API `LocalPolicyTargetReference` shape: a policy
//! attaches to an object in its own namespace by group, kind and name.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference from a policy to the object it attaches to.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTargetReference {
    /// API group of the target (e.g., "gateway.networking.k8s.io")
    pub group: String,

    /// Kind of the target (e.g., "Gateway", "HTTPRoute")
    pub kind: String,

    /// Name of the target, always in the policy's namespace
    pub name: String,
}

impl PolicyTargetReference {
    /// Reference to a Gateway API object.
    pub fn gateway_api(kind: &str, name: impl Into<String>) -> Self {
        Self {
            group: "gateway.networking.k8s.io".to_string(),
            kind: kind.to_string(),
            name: name.into(),
        }
    }

    /// Reference to a core `Service` (empty group).
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            group: String::new(),
            kind: "Service".to_string(),
            name: name.into(),
        }
    }
}

/// Condition reported on policy status, one per ancestor.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCondition {
    /// Condition type (e.g., "Accepted")
    #[serde(rename = "type")]
    pub condition_type: String,

    /// "True", "False" or "Unknown"
    pub status: String,

    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation the condition was computed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Status shared by all attachment policies.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    /// Conditions per target
    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,
}
