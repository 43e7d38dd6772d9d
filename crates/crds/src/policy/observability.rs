//! ObservabilityPolicy CRD
//!
//! Tracing settings for routes.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::references::{PolicyStatus, PolicyTargetReference};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.microscaler.io",
    version = "v1alpha2",
    kind = "ObservabilityPolicy",
    namespaced,
    status = "PolicyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityPolicySpec {
    /// Routes the policy attaches to
    pub target_refs: Vec<PolicyTargetReference>,

    /// Tracing configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TracingSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TracingSpec {
    /// Sampling strategy
    pub strategy: TraceStrategy,

    /// Sampling ratio in percent, used with the "ratio" strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceStrategy {
    /// Sample a fixed ratio of requests
    Ratio,
    /// Follow the parent span decision
    Parent,
}
