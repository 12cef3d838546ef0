//! Entity declarations and handles.
//!
//! An [`EntitySpec`] describes an entity before it enters the store: its
//! type, an optional explicit ID, and its initial components in declaration
//! order. Declaration order matters: it decides the order in which matching
//! systems are notified.
//!
//! Once stored, an entity is referenced through its [`Entity`] handle. The
//! handle carries no component data; the store is the only source of truth.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::EntityId;
use crate::kind::ComponentKind;

/// The declaration of an entity to be added to the store.
#[derive(Debug, Clone)]
pub struct EntitySpec<T, K> {
    /// Explicit ID. Allocated by the store when `None`.
    pub id: Option<EntityId>,
    /// The entity's type tag.
    pub kind: T,
    /// Initial components, in declaration order.
    pub components: Vec<K>,
    /// Initial payload per component. Missing entries default to `{}`.
    pub data: HashMap<K, Value>,
    /// Allocate the ID from the safe band.
    pub safe: bool,
}

impl<T, K: ComponentKind> EntitySpec<T, K> {
    /// Start declaring an entity of the given type with no components.
    #[must_use]
    pub fn new(kind: T) -> Self {
        Self {
            id: None,
            kind,
            components: Vec::new(),
            data: HashMap::new(),
            safe: false,
        }
    }

    /// Use an explicit ID instead of an allocated one.
    #[must_use]
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    /// Allocate this entity's ID from the safe band.
    #[must_use]
    pub fn safe(mut self) -> Self {
        self.safe = true;
        self
    }

    /// Declare a component with an initial payload.
    ///
    /// Declaring the same component twice keeps its first position and
    /// replaces its payload.
    #[must_use]
    pub fn with(mut self, component: K, data: Value) -> Self {
        if !self.components.contains(&component) {
            self.components.push(component);
        }
        self.data.insert(component, data);
        self
    }

    /// Declare a component with an empty payload.
    #[must_use]
    pub fn tag(mut self, component: K) -> Self {
        if !self.components.contains(&component) {
            self.components.push(component);
        }
        self
    }
}

/// Handle to an entity living in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity<T> {
    /// The entity's ID.
    pub id: EntityId,
    /// The entity's immutable type tag.
    pub kind: T,
}
