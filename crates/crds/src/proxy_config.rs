//! ProxyConfig CRD
//!
//! Data plane settings referenced from a GatewayClass or Gateway.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "gateway.microscaler.io",
    version = "v1alpha2",
    kind = "ProxyConfig",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfigSpec {
    /// IP family the data plane listens on
    #[serde(default)]
    pub ip_family: IpFamily,

    /// Disable HTTP/2 on listeners
    #[serde(default)]
    pub disable_http2: bool,

    /// Headers used to recover the client address
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rewrite_client_ip_headers: Vec<String>,

    /// Data plane error log level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    #[default]
    Dual,
    Ipv4,
    Ipv6,
}
