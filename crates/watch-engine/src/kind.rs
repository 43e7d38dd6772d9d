//! Resource kinds observed by the controller.
//!
//! `ResourceKind` is the discriminant carried by every `ChangeEvent`. Consumers
//! dispatch on it with `match` instead of probing the cache with one type after
//! another.

use std::fmt;

use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service};
use k8s_openapi::api::discovery::v1::EndpointSlice;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::GroupVersionKind;

/// API group of the Gateway API kinds.
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";

/// Every kind the controller knows how to watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    // Gateway API
    /// `gateway.networking.k8s.io/v1` GatewayClass
    GatewayClass,
    /// `gateway.networking.k8s.io/v1` Gateway
    Gateway,
    /// `gateway.networking.k8s.io/v1` HTTPRoute
    HttpRoute,
    /// `gateway.networking.k8s.io/v1` GRPCRoute
    GrpcRoute,
    /// `gateway.networking.k8s.io/v1alpha2` TLSRoute, experimental
    TlsRoute,
    /// `gateway.networking.k8s.io/v1beta1` ReferenceGrant
    ReferenceGrant,
    /// `gateway.networking.k8s.io/v1alpha3` BackendTLSPolicy, experimental
    BackendTlsPolicy,
    // Core and discovery
    /// Core Service
    Service,
    /// Core Secret
    Secret,
    /// Core ConfigMap
    ConfigMap,
    /// Core Namespace
    Namespace,
    /// `discovery.k8s.io/v1` EndpointSlice
    EndpointSlice,
    /// `apiextensions.k8s.io/v1` CustomResourceDefinition
    CustomResourceDefinition,
    // Project CRDs
    /// Data plane proxy settings
    ProxyConfig,
    /// Client connection policy
    ClientSettingsPolicy,
    /// Tracing policy
    ObservabilityPolicy,
    /// Upstream connection policy
    UpstreamSettingsPolicy,
    /// Singleton control resource
    GatewayControlConfig,
    /// Raw configuration snippets
    SnippetsFilter,
}

impl ResourceKind {
    /// All kinds, in declaration order.
    pub const ALL: [ResourceKind; 19] = [
        ResourceKind::GatewayClass,
        ResourceKind::Gateway,
        ResourceKind::HttpRoute,
        ResourceKind::GrpcRoute,
        ResourceKind::TlsRoute,
        ResourceKind::ReferenceGrant,
        ResourceKind::BackendTlsPolicy,
        ResourceKind::Service,
        ResourceKind::Secret,
        ResourceKind::ConfigMap,
        ResourceKind::Namespace,
        ResourceKind::EndpointSlice,
        ResourceKind::CustomResourceDefinition,
        ResourceKind::ProxyConfig,
        ResourceKind::ClientSettingsPolicy,
        ResourceKind::ObservabilityPolicy,
        ResourceKind::UpstreamSettingsPolicy,
        ResourceKind::GatewayControlConfig,
        ResourceKind::SnippetsFilter,
    ];

    /// The Kubernetes `kind` string, also the default registration name.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::GatewayClass => "GatewayClass",
            ResourceKind::Gateway => "Gateway",
            ResourceKind::HttpRoute => "HTTPRoute",
            ResourceKind::GrpcRoute => "GRPCRoute",
            ResourceKind::TlsRoute => "TLSRoute",
            ResourceKind::ReferenceGrant => "ReferenceGrant",
            ResourceKind::BackendTlsPolicy => "BackendTLSPolicy",
            ResourceKind::Service => <Service as k8s_openapi::Resource>::KIND,
            ResourceKind::Secret => <Secret as k8s_openapi::Resource>::KIND,
            ResourceKind::ConfigMap => <ConfigMap as k8s_openapi::Resource>::KIND,
            ResourceKind::Namespace => <Namespace as k8s_openapi::Resource>::KIND,
            ResourceKind::EndpointSlice => <EndpointSlice as k8s_openapi::Resource>::KIND,
            ResourceKind::CustomResourceDefinition => {
                <CustomResourceDefinition as k8s_openapi::Resource>::KIND
            }
            ResourceKind::ProxyConfig => "ProxyConfig",
            ResourceKind::ClientSettingsPolicy => "ClientSettingsPolicy",
            ResourceKind::ObservabilityPolicy => "ObservabilityPolicy",
            ResourceKind::UpstreamSettingsPolicy => "UpstreamSettingsPolicy",
            ResourceKind::GatewayControlConfig => "GatewayControlConfig",
            ResourceKind::SnippetsFilter => "SnippetsFilter",
        }
    }

    /// Group/version/kind used to resolve the API resource through discovery.
    pub fn gvk(self) -> GroupVersionKind {
        match self {
            ResourceKind::GatewayClass
            | ResourceKind::Gateway
            | ResourceKind::HttpRoute
            | ResourceKind::GrpcRoute => GroupVersionKind::gvk(GATEWAY_API_GROUP, "v1", self.as_str()),
            ResourceKind::ReferenceGrant => {
                GroupVersionKind::gvk(GATEWAY_API_GROUP, "v1beta1", self.as_str())
            }
            ResourceKind::TlsRoute => GroupVersionKind::gvk(GATEWAY_API_GROUP, "v1alpha2", self.as_str()),
            ResourceKind::BackendTlsPolicy => {
                GroupVersionKind::gvk(GATEWAY_API_GROUP, "v1alpha3", self.as_str())
            }
            ResourceKind::Service => openapi_gvk::<Service>(),
            ResourceKind::Secret => openapi_gvk::<Secret>(),
            ResourceKind::ConfigMap => openapi_gvk::<ConfigMap>(),
            ResourceKind::Namespace => openapi_gvk::<Namespace>(),
            ResourceKind::EndpointSlice => openapi_gvk::<EndpointSlice>(),
            ResourceKind::CustomResourceDefinition => openapi_gvk::<CustomResourceDefinition>(),
            ResourceKind::ProxyConfig => crd_gvk::<crds::ProxyConfig>(),
            ResourceKind::ClientSettingsPolicy => crd_gvk::<crds::ClientSettingsPolicy>(),
            ResourceKind::ObservabilityPolicy => crd_gvk::<crds::ObservabilityPolicy>(),
            ResourceKind::UpstreamSettingsPolicy => crd_gvk::<crds::UpstreamSettingsPolicy>(),
            ResourceKind::GatewayControlConfig => crd_gvk::<crds::GatewayControlConfig>(),
            ResourceKind::SnippetsFilter => crd_gvk::<crds::SnippetsFilter>(),
        }
    }
}

fn openapi_gvk<K: k8s_openapi::Resource>() -> GroupVersionKind {
    GroupVersionKind::gvk(K::GROUP, K::VERSION, K::KIND)
}

fn crd_gvk<K: kube::Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
