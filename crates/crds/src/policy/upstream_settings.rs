//! UpstreamSettingsPolicy CRD
//!
//! Connection settings towards backend Services.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::references::{PolicyStatus, PolicyTargetReference};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.microscaler.io",
    version = "v1alpha1",
    kind = "UpstreamSettingsPolicy",
    namespaced,
    status = "PolicyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSettingsPolicySpec {
    /// Services the policy attaches to
    pub target_refs: Vec<PolicyTargetReference>,

    /// Shared memory zone size (e.g., "512k")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_size: Option<String>,

    /// Upstream keep-alive settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<UpstreamKeepAlive>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamKeepAlive {
    /// Idle keep-alive connections per worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<u32>,

    /// Requests served over one keep-alive connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<u32>,
}
