//! Watch descriptor table.
//!
//! Built once at startup from `WatchConfig`. The base list is fixed; feature
//! flags append to it in a fixed order so the table is deterministic.

use std::collections::HashSet;

use crate::descriptor::WatchDescriptor;
use crate::error::WatchError;
use crate::gateway_predicates::{GatewayClassControllerPredicate, ServicePortsChanged};
use crate::index::{endpoint_slice_indices, FieldIndexRegistry};
use crate::kind::ResourceKind;
use crate::predicate::{AnnotationChanged, GenerationChanged, LabelChanged, ResourceVersionChanged};
use crate::snapshot::NamespacedName;

/// Annotation carrying the Gateway API bundle version on its CRDs.
pub const BUNDLE_VERSION_ANNOTATION: &str = "gateway.networking.k8s.io/bundle-version";

/// Pointer to `GatewayControlConfig.spec.logging.level`.
pub const CONTROL_LOG_LEVEL_FIELD: &str = "/spec/logging/level";

/// Registration name of the Service watch.
pub const USER_SERVICE_REGISTRATION: &str = "user-service";

/// Flags and names the table depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchConfig {
    /// Watch alpha Gateway API kinds and ConfigMaps.
    pub experimental_features: bool,
    /// Watch SnippetsFilters.
    pub snippets_filters: bool,
    /// Singleton GatewayControlConfig to watch and read at startup.
    pub control_resource_name: Option<NamespacedName>,
    /// Controller name GatewayClasses must reference.
    pub controller_name: String,
}

/// Ordered list of descriptors.
#[derive(Debug, Clone, Default)]
pub struct WatchDescriptorTable {
    descriptors: Vec<WatchDescriptor>,
    control_resource: Option<NamespacedName>,
}

impl WatchDescriptorTable {
    /// Empty table, for callers assembling descriptors by hand.
    pub fn new() -> Self {
        Self::default()
    }

    /// The controller's table for `config`.
    pub fn build(config: &WatchConfig) -> Self {
        let mut table = Self::new();
        for descriptor in base_descriptors(config) {
            table.push(descriptor);
        }

        if config.experimental_features {
            table.push(WatchDescriptor::new(ResourceKind::BackendTlsPolicy).with_predicate(GenerationChanged));
            // ConfigMaps referenced by BackendTLSPolicies; no metadata-only predicate fits
            table.push(WatchDescriptor::new(ResourceKind::ConfigMap));
            table.push(WatchDescriptor::new(ResourceKind::TlsRoute).with_predicate(GenerationChanged));
        }

        if let Some(name) = &config.control_resource_name {
            table.push_control(name.clone());
        }

        if config.snippets_filters {
            table.push(WatchDescriptor::new(ResourceKind::SnippetsFilter).with_predicate(GenerationChanged));
        }

        table
    }

    /// Appends a descriptor.
    pub fn push(&mut self, descriptor: WatchDescriptor) {
        self.descriptors.push(descriptor);
    }

    /// Appends the singleton control resource watch. `register_all` reads the
    /// resource once before opening any watch.
    pub fn push_control(&mut self, name: NamespacedName) {
        self.descriptors.push(
            WatchDescriptor::new(ResourceKind::GatewayControlConfig)
                .with_namespaced_name_filter(name.clone())
                .with_predicate(GenerationChanged)
                .with_projected_field(CONTROL_LOG_LEVEL_FIELD),
        );
        self.control_resource = Some(name);
    }

    /// Identity of the singleton control resource, if watched.
    pub fn control_resource(&self) -> Option<&NamespacedName> {
        self.control_resource.as_ref()
    }

    /// Descriptor of the control resource, if watched.
    pub fn control_descriptor(&self) -> Option<&WatchDescriptor> {
        self.control_resource.as_ref()?;
        self.descriptors
            .iter()
            .find(|d| d.kind() == ResourceKind::GatewayControlConfig)
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &WatchDescriptor> {
        self.descriptors.iter()
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// True when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Whether any descriptor watches `kind`.
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.descriptors.iter().any(|d| d.kind() == kind)
    }

    /// Registration names in order.
    pub fn registration_names(&self) -> Vec<&str> {
        self.descriptors.iter().map(WatchDescriptor::registration_name).collect()
    }

    /// Checks name and index uniqueness across the whole table.
    pub fn validate(&self) -> Result<FieldIndexRegistry, WatchError> {
        let mut names = HashSet::new();
        let mut indices = FieldIndexRegistry::new();

        for descriptor in &self.descriptors {
            let name = descriptor.registration_name();
            if !names.insert(name) {
                return Err(WatchError::DuplicateRegistrationName {
                    name: name.to_string(),
                    kind: descriptor.kind(),
                });
            }
            for index in descriptor.field_indices() {
                indices.register_index(descriptor.kind(), index, name)?;
            }
        }

        Ok(indices)
    }

    pub(crate) fn into_descriptors(self) -> Vec<WatchDescriptor> {
        self.descriptors
    }
}

// When adding a kind here, also handle it in the consumer's dispatch.
fn base_descriptors(config: &WatchConfig) -> Vec<WatchDescriptor> {
    vec![
        WatchDescriptor::new(ResourceKind::GatewayClass)
            .with_predicate(GenerationChanged)
            .with_predicate(GatewayClassControllerPredicate::new(config.controller_name.clone())),
        WatchDescriptor::new(ResourceKind::Gateway).with_predicate(GenerationChanged),
        WatchDescriptor::new(ResourceKind::HttpRoute).with_predicate(GenerationChanged),
        // Several Service watches may exist; this one tracks user backends
        WatchDescriptor::new(ResourceKind::Service)
            .named(USER_SERVICE_REGISTRATION)
            .with_predicate(ServicePortsChanged),
        WatchDescriptor::new(ResourceKind::Secret).with_predicate(ResourceVersionChanged),
        WatchDescriptor::new(ResourceKind::EndpointSlice)
            .with_predicate(GenerationChanged)
            .with_field_indices(endpoint_slice_indices()),
        WatchDescriptor::new(ResourceKind::Namespace).with_predicate(LabelChanged),
        WatchDescriptor::new(ResourceKind::ReferenceGrant).with_predicate(GenerationChanged),
        WatchDescriptor::new(ResourceKind::CustomResourceDefinition)
            .metadata_only()
            .with_predicate(AnnotationChanged::new(BUNDLE_VERSION_ANNOTATION)),
        WatchDescriptor::new(ResourceKind::ProxyConfig).with_predicate(GenerationChanged),
        WatchDescriptor::new(ResourceKind::GrpcRoute).with_predicate(GenerationChanged),
        WatchDescriptor::new(ResourceKind::ClientSettingsPolicy).with_predicate(GenerationChanged),
        WatchDescriptor::new(ResourceKind::ObservabilityPolicy).with_predicate(GenerationChanged),
        WatchDescriptor::new(ResourceKind::UpstreamSettingsPolicy).with_predicate(GenerationChanged),
    ]
}
