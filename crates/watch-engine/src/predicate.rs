//! Predicate algebra.
//!
//! A predicate decides whether a change between two snapshots is worth
//! delivering. Predicates are pure, cheap and never perform I/O: they run
//! inside the watch task, ahead of the channel send.
//!
//! The previous snapshot is absent for additions and deletions. Absence of
//! prior state counts as "changed" for every change-detection predicate.

use std::fmt;
use std::sync::Arc;

use crate::snapshot::{NamespacedName, Snapshot};

/// Filter over a pair of snapshots.
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Returns `true` when the change should be delivered.
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool;

    /// JSON pointers this predicate reads from `Snapshot::fields`.
    fn required_fields(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// Shared, immutable predicate.
pub type SharedPredicate = Arc<dyn Predicate>;

/// True iff the generation differs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationChanged;

impl Predicate for GenerationChanged {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        previous.is_none_or(|prev| prev.generation != current.generation)
    }
}

/// True iff the resource version differs. Catches status-only updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceVersionChanged;

impl Predicate for ResourceVersionChanged {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        previous.is_none_or(|prev| prev.resource_version != current.resource_version)
    }
}

/// True iff the label set differs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelChanged;

impl Predicate for LabelChanged {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        previous.is_none_or(|prev| prev.labels != current.labels)
    }
}

/// True iff the value of one annotation differs. Without a previous snapshot,
/// true iff the annotation is present.
#[derive(Debug, Clone)]
pub struct AnnotationChanged {
    key: String,
}

impl AnnotationChanged {
    /// Compares annotation `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Predicate for AnnotationChanged {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        match previous {
            Some(prev) => prev.annotation(&self.key) != current.annotation(&self.key),
            None => current.annotation(&self.key).is_some(),
        }
    }
}

/// True iff a projected body field differs.
#[derive(Debug, Clone, Copy)]
pub struct FieldChanged {
    pointer: &'static str,
}

impl FieldChanged {
    /// Compares the value at JSON pointer `pointer`.
    pub fn new(pointer: &'static str) -> Self {
        Self { pointer }
    }
}

impl Predicate for FieldChanged {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        previous.is_none_or(|prev| prev.field(self.pointer) != current.field(self.pointer))
    }

    fn required_fields(&self) -> Vec<&'static str> {
        vec![self.pointer]
    }
}

/// True iff the object's identity is in the allow-list. Used to scope a watch
/// to a singleton resource.
#[derive(Debug, Clone)]
pub struct NamespacedNameFilter {
    allowed: Vec<NamespacedName>,
}

impl NamespacedNameFilter {
    /// Accepts only `allowed`.
    pub fn new(allowed: Vec<NamespacedName>) -> Self {
        Self { allowed }
    }

    /// Accepts only `name`.
    pub fn single(name: NamespacedName) -> Self {
        Self::new(vec![name])
    }

    /// Accepted names.
    pub fn allowed(&self) -> &[NamespacedName] {
        &self.allowed
    }
}

impl Predicate for NamespacedNameFilter {
    fn evaluate(&self, _previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        self.allowed.contains(&current.namespaced_name)
    }
}

/// Conjunction. Stops at the first predicate returning `false`.
#[derive(Debug, Clone)]
pub struct And(Vec<SharedPredicate>);

impl Predicate for And {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        self.0.iter().all(|p| p.evaluate(previous, current))
    }

    fn required_fields(&self) -> Vec<&'static str> {
        collect_fields(&self.0)
    }
}

/// Disjunction. Stops at the first predicate returning `true`.
#[derive(Debug, Clone)]
pub struct Or(Vec<SharedPredicate>);

impl Predicate for Or {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        self.0.iter().any(|p| p.evaluate(previous, current))
    }

    fn required_fields(&self) -> Vec<&'static str> {
        collect_fields(&self.0)
    }
}

fn collect_fields(predicates: &[SharedPredicate]) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = predicates.iter().flat_map(|p| p.required_fields()).collect();
    fields.sort_unstable();
    fields.dedup();
    fields
}

/// Builds an `And` over `predicates`.
pub fn and(predicates: impl IntoIterator<Item = SharedPredicate>) -> SharedPredicate {
    Arc::new(And(predicates.into_iter().collect()))
}

/// Builds an `Or` over `predicates`.
pub fn or(predicates: impl IntoIterator<Item = SharedPredicate>) -> SharedPredicate {
    Arc::new(Or(predicates.into_iter().collect()))
}

/// Wraps a closure as a predicate.
pub fn predicate_fn<F>(name: &'static str, f: F) -> SharedPredicate
where
    F: Fn(Option<&Snapshot>, &Snapshot) -> bool + Send + Sync + 'static,
{
    Arc::new(FnPredicate { name, f })
}

struct FnPredicate<F> {
    name: &'static str,
    f: F,
}

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPredicate").field("name", &self.name).finish()
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(Option<&Snapshot>, &Snapshot) -> bool + Send + Sync,
{
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        (self.f)(previous, current)
    }
}
