//! Object snapshots and identities.
//!
//! A `Snapshot` is the metadata view of an object plus a handful of body
//! fields projected at JSON pointers the descriptor asked for. Predicates only
//! ever see snapshots, never full typed objects.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use serde_json::Value;

use crate::error::WatchError;

/// Namespace and name of an object. The namespace is empty for cluster-scoped
/// objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NamespacedName {
    /// Empty for cluster-scoped objects
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl NamespacedName {
    /// Identity of a namespaced object.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a cluster-scoped object.
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    /// Identity read from object metadata.
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self {
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

impl FromStr for NamespacedName {
    type Err = WatchError;

    /// Parses `namespace/name`. Both parts are required.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(WatchError::InvalidNamespacedName(s.to_string())),
        }
    }
}

/// Metadata view of an object at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Object identity
    pub namespaced_name: NamespacedName,
    /// `metadata.generation`
    pub generation: Option<i64>,
    /// `metadata.resourceVersion`
    pub resource_version: Option<String>,
    /// Object labels
    pub labels: BTreeMap<String, String>,
    /// Object annotations
    pub annotations: BTreeMap<String, String>,
    /// Body values keyed by the JSON pointer they were read from.
    pub fields: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Empty snapshot of `namespaced_name`.
    pub fn new(namespaced_name: NamespacedName) -> Self {
        Self {
            namespaced_name,
            ..Default::default()
        }
    }

    /// Snapshot of object metadata only.
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self {
            namespaced_name: NamespacedName::from_meta(meta),
            generation: meta.generation,
            resource_version: meta.resource_version.clone(),
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
            fields: BTreeMap::new(),
        }
    }

    /// Snapshot of a dynamic object, projecting `fields` from its body.
    /// Pointers that do not resolve are left out.
    pub fn from_dynamic(obj: &DynamicObject, fields: &[&str]) -> Self {
        let mut snapshot = Self::from_meta(&obj.metadata);
        for pointer in fields {
            if let Some(value) = obj.data.pointer(pointer) {
                snapshot.fields.insert((*pointer).to_string(), value.clone());
            }
        }
        snapshot
    }

    /// Projected value at `pointer`.
    pub fn field(&self, pointer: &str) -> Option<&Value> {
        self.fields.get(pointer)
    }

    /// Label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Annotation value.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Sets the generation.
    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Sets the resource version.
    pub fn with_resource_version(mut self, resource_version: impl Into<String>) -> Self {
        self.resource_version = Some(resource_version.into());
        self
    }

    /// Adds a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Adds a projected field.
    pub fn with_field(mut self, pointer: impl Into<String>, value: Value) -> Self {
        self.fields.insert(pointer.into(), value);
        self
    }
}
