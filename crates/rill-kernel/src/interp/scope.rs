//! Slots and namespaces.
//!
//! A slot is a heap-allocated cell holding one value. Namespaces map names
//! to slots and are shared by reference: a closure's capture set, a module
//! binding under a second prefix, and a pipeline stage's view of its frame
//! all alias the same cells, so mutations are visible in both directions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::Value;

/// A mutable cell holding a value.
///
/// Slots are owned by the namespace that declares them; captures hold
/// additional strong references, so a captured slot outlives its scope.
#[derive(Clone)]
pub struct Slot(Arc<RwLock<Value>>);

impl Slot {
    pub fn new(v: Value) -> Self {
        Self(Arc::new(RwLock::new(v)))
    }

    pub fn get(&self) -> Value {
        self.0.read().clone()
    }

    pub fn set(&self, v: Value) {
        *self.0.write() = v;
    }

    /// Two handles to the same cell?
    pub fn aliases(&self, other: &Slot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Slot({:?})", self.get())
    }
}

/// A shared mapping of names to slots.
///
/// Cloning a namespace aliases it; use [`Namespace::default`] for a fresh
/// empty one.
#[derive(Clone, Default)]
pub struct Namespace(Arc<RwLock<HashMap<String, Slot>>>);

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Slot> {
        self.0.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.read().contains_key(name)
    }

    /// Install a slot under a name, replacing any previous binding.
    pub fn bind(&self, name: impl Into<String>, slot: Slot) {
        self.0.write().insert(name.into(), slot);
    }

    /// Create a fresh slot holding `v` and bind it.
    pub fn define(&self, name: impl Into<String>, v: Value) -> Slot {
        let slot = Slot::new(v);
        self.bind(name, slot.clone());
        slot
    }

    pub fn remove(&self, name: &str) -> Option<Slot> {
        self.0.write().remove(name)
    }

    /// Snapshot of all bindings, sorted by name.
    pub fn entries(&self) -> Vec<(String, Slot)> {
        let mut out: Vec<(String, Slot)> =
            self.0.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.0.read().keys().cloned().collect();
        write!(f, "Namespace({:?})", names)
    }
}
