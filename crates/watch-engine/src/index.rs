//! Field index registry.
//!
//! An index maps an object to a set of keys so the consumer can do reverse
//! lookups (e.g. "EndpointSlices owned by Service x"). The cache layer stores
//! the index; the registry only guarantees that each `(kind, field)` pair is
//! declared once.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::WatchError;
use crate::kind::ResourceKind;
use crate::snapshot::Snapshot;

/// Label set by the EndpointSlice controller to the owning Service name.
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";

/// Index field for EndpointSlices keyed by owning Service name.
pub const SERVICE_NAME_INDEX_FIELD: &str = "k8sServiceName";

type ExtractFn = dyn Fn(&Snapshot) -> Vec<String> + Send + Sync;

/// One secondary index over a kind.
#[derive(Clone)]
pub struct FieldIndex {
    field: &'static str,
    extract: Arc<ExtractFn>,
}

impl FieldIndex {
    /// Index on `field`, keyed by whatever `extract` returns.
    pub fn new<F>(field: &'static str, extract: F) -> Self
    where
        F: Fn(&Snapshot) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            field,
            extract: Arc::new(extract),
        }
    }

    /// Name of the indexed field.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Index keys for `snapshot`.
    pub fn keys(&self, snapshot: &Snapshot) -> Vec<String> {
        (self.extract)(snapshot)
    }
}

impl fmt::Debug for FieldIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldIndex").field("field", &self.field).finish_non_exhaustive()
    }
}

/// Indices installed on EndpointSlice watches.
pub fn endpoint_slice_indices() -> Vec<FieldIndex> {
    vec![FieldIndex::new(SERVICE_NAME_INDEX_FIELD, |snapshot| {
        snapshot
            .label(SERVICE_NAME_LABEL)
            .map(|name| vec![name.to_string()])
            .unwrap_or_default()
    })]
}

/// Tracks declared `(kind, field)` pairs.
#[derive(Debug, Default)]
pub struct FieldIndexRegistry {
    declared: HashSet<(ResourceKind, &'static str)>,
}

impl FieldIndexRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an index for `kind`. `registration` names the descriptor in
    /// the error when the pair was already declared.
    pub fn register_index(
        &mut self,
        kind: ResourceKind,
        index: &FieldIndex,
        registration: &str,
    ) -> Result<(), WatchError> {
        if !self.declared.insert((kind, index.field())) {
            return Err(WatchError::DuplicateFieldIndex {
                kind,
                field: index.field().to_string(),
                name: registration.to_string(),
            });
        }
        Ok(())
    }

    /// Whether `kind` has an index on `field`.
    pub fn contains(&self, kind: ResourceKind, field: &str) -> bool {
        self.declared.iter().any(|(k, f)| *k == kind && *f == field)
    }

    /// Number of registered indices.
    pub fn len(&self) -> usize {
        self.declared.len()
    }

    /// True when no index is registered.
    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::NamespacedName;

    #[test]
    fn test_endpoint_slice_index_extracts_service_name() {
        let index = &endpoint_slice_indices()[0];
        let slice = Snapshot::new(NamespacedName::new("default", "coffee-abc12"))
            .with_label(SERVICE_NAME_LABEL, "coffee");
        assert_eq!(index.field(), SERVICE_NAME_INDEX_FIELD);
        assert_eq!(index.keys(&slice), vec!["coffee".to_string()]);

        let orphan = Snapshot::new(NamespacedName::new("default", "orphan"));
        assert!(index.keys(&orphan).is_empty());
    }

    #[test]
    fn test_duplicate_index_is_rejected() {
        let mut registry = FieldIndexRegistry::new();
        let index = FieldIndex::new("spec.field", |_| Vec::new());

        registry.register_index(ResourceKind::EndpointSlice, &index, "EndpointSlice").unwrap();
        let err = registry
            .register_index(ResourceKind::EndpointSlice, &index, "second-slices")
            .unwrap_err();

        assert!(matches!(
            err,
            WatchError::DuplicateFieldIndex { kind: ResourceKind::EndpointSlice, ref field, ref name }
                if field == "spec.field" && name == "second-slices"
        ));
        assert!(err.is_configuration_error());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_field_on_different_kinds_is_allowed() {
        let mut registry = FieldIndexRegistry::new();
        let index = FieldIndex::new("spec.field", |_| Vec::new());

        registry.register_index(ResourceKind::EndpointSlice, &index, "EndpointSlice").unwrap();
        registry.register_index(ResourceKind::Service, &index, "user-service").unwrap();

        assert!(registry.contains(ResourceKind::Service, "spec.field"));
        assert_eq!(registry.len(), 2);
    }
}
