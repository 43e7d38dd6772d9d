//! ClientSettingsPolicy CRD
//!
//! Client request limits for a Gateway or route.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::references::{PolicyStatus, PolicyTargetReference};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.microscaler.io",
    version = "v1alpha1",
    kind = "ClientSettingsPolicy",
    namespaced,
    status = "PolicyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettingsPolicySpec {
    /// Object the policy attaches to
    pub target_ref: PolicyTargetReference,

    /// Maximum client request body size (e.g., "10m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_max_size: Option<String>,

    /// Keep-alive timeout (e.g., "75s")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive_timeout: Option<String>,
}
