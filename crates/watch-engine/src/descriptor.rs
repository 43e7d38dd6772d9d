//! Watch descriptors.
//!
//! One descriptor per watch: the kind, how to filter it, which indices to
//! install and which body fields to project. Options are attached with
//! builder methods.

use std::sync::Arc;

use crate::index::FieldIndex;
use crate::kind::ResourceKind;
use crate::predicate::{self, NamespacedNameFilter, Predicate, SharedPredicate};
use crate::snapshot::{NamespacedName, Snapshot};

/// Declarative description of one watch.
#[derive(Debug, Clone)]
pub struct WatchDescriptor {
    kind: ResourceKind,
    name: Option<String>,
    predicates: Vec<SharedPredicate>,
    field_indices: Vec<FieldIndex>,
    namespaced_name_filter: Option<NamespacedNameFilter>,
    metadata_only: bool,
    projected_fields: Vec<&'static str>,
}

impl WatchDescriptor {
    /// Descriptor for `kind` with no options.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            name: None,
            predicates: Vec::new(),
            field_indices: Vec::new(),
            namespaced_name_filter: None,
            metadata_only: false,
            projected_fields: Vec::new(),
        }
    }

    /// Overrides the registration name. Needed when one kind is watched more
    /// than once.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a predicate. Multiple predicates are combined with AND, in the
    /// order they were added.
    pub fn with_predicate(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Adds an already shared predicate.
    pub fn with_shared_predicate(mut self, predicate: SharedPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Indices to install before the watch opens.
    pub fn with_field_indices(mut self, indices: Vec<FieldIndex>) -> Self {
        self.field_indices.extend(indices);
        self
    }

    /// Restricts the watch to one object.
    pub fn with_namespaced_name_filter(mut self, name: NamespacedName) -> Self {
        self.namespaced_name_filter = Some(NamespacedNameFilter::single(name));
        self
    }

    /// Watch object metadata only; the body is never fetched.
    pub fn metadata_only(mut self) -> Self {
        self.metadata_only = true;
        self
    }

    /// Project a body field into snapshots, for consumers that read it back
    /// from the cache.
    pub fn with_projected_field(mut self, pointer: &'static str) -> Self {
        self.projected_fields.push(pointer);
        self
    }

    /// Watched kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Explicit name, or the kind string.
    pub fn registration_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }

    /// Indices to install.
    pub fn field_indices(&self) -> &[FieldIndex] {
        &self.field_indices
    }

    /// Object filter, if any.
    pub fn namespaced_name_filter(&self) -> Option<&NamespacedNameFilter> {
        self.namespaced_name_filter.as_ref()
    }

    /// Whether only metadata is fetched.
    pub fn is_metadata_only(&self) -> bool {
        self.metadata_only
    }

    /// Whether any event can be filtered out.
    pub fn has_predicate(&self) -> bool {
        !self.predicates.is_empty() || self.namespaced_name_filter.is_some()
    }

    /// Effective predicate: the name filter first, then every predicate in
    /// order. `None` when the descriptor accepts every event.
    pub fn effective_predicate(&self) -> Option<SharedPredicate> {
        let mut all: Vec<SharedPredicate> = Vec::with_capacity(self.predicates.len() + 1);
        if let Some(filter) = &self.namespaced_name_filter {
            all.push(Arc::new(filter.clone()));
        }
        all.extend(self.predicates.iter().cloned());

        match all.len() {
            0 => None,
            1 => all.pop(),
            _ => Some(predicate::and(all)),
        }
    }

    /// Fields the cache must project: explicit ones plus those predicates read.
    pub fn projected_fields(&self) -> Vec<&'static str> {
        let mut fields = self.projected_fields.clone();
        fields.extend(self.predicates.iter().flat_map(|p| p.required_fields()));
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    /// Runs the effective predicate; descriptors without one accept everything.
    pub fn accepts(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        self.effective_predicate()
            .is_none_or(|p| p.evaluate(previous, current))
    }
}
