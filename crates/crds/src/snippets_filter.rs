//! SnippetsFilter CRD
//!
//! Raw configuration snippets injected into the data plane. Only watched
//! when snippets filters are enabled.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.microscaler.io",
    version = "v1alpha1",
    kind = "SnippetsFilter",
    namespaced,
    status = "SnippetsFilterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct SnippetsFilterSpec {
    /// Snippets, at most one per context
    pub snippets: Vec<Snippet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    /// Configuration context the snippet is inserted into
    pub context: SnippetContext,

    /// Snippet body
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum SnippetContext {
    #[serde(rename = "main")]
    Main,
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "http.server")]
    HttpServer,
    #[serde(rename = "http.server.location")]
    HttpServerLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnippetsFilterStatus {
    /// Whether the filter was accepted
    #[serde(default)]
    pub accepted: bool,

    /// Rejection message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
