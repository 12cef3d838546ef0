//! Per-entity handles.
//!
//! [`EntityRef`] reads an entity's components; [`EntityMut`] additionally
//! routes component mutations through the engine, forced or queued.

use std::collections::HashMap;
use std::sync::Arc;

use darker_component::{ComponentKind, Entity, EntityId, EntityKind};
use serde_json::Value;

use crate::engine::Engine;
use crate::queue::{Dispatch, MutationOptions};
use crate::store::{CloneDepth, Store};

/// Read handle to a live entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'a, T, K> {
    store: &'a Store<T, K>,
    entity: Entity<T>,
}

impl<'a, T: EntityKind, K: ComponentKind> EntityRef<'a, T, K> {
    pub(crate) fn new(store: &'a Store<T, K>, entity: Entity<T>) -> Self {
        Self { store, entity }
    }

    /// The entity's ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    /// The entity's type tag.
    #[must_use]
    pub fn kind(&self) -> T {
        self.entity.kind
    }

    /// The plain handle.
    #[must_use]
    pub fn handle(&self) -> Entity<T> {
        self.entity
    }

    /// An independent copy of every payload.
    #[must_use]
    pub fn get_data(&self) -> HashMap<K, Value> {
        self.store.data(self.entity.id)
    }

    /// One payload; an empty object if the component is absent.
    #[must_use]
    pub fn get_component(&self, component: K, depth: CloneDepth) -> Arc<Value> {
        self.store.get_component(self.entity.id, component, depth)
    }

    /// Several payloads; absent components are left out.
    #[must_use]
    pub fn get_components(&self, components: &[K], depth: CloneDepth) -> HashMap<K, Arc<Value>> {
        self.store.get_components(self.entity.id, components, depth)
    }

    /// Attached components, in attachment order.
    #[must_use]
    pub fn get_component_types(&self) -> &'a [K] {
        self.store
            .component_types(self.entity.id)
            .unwrap_or_default()
    }

    /// Returns `true` if the component is attached.
    #[must_use]
    pub fn has_component(&self, component: K) -> bool {
        self.store.has_component(self.entity.id, component)
    }
}

/// Mutation handle to a live entity.
pub struct EntityMut<'a, T, K> {
    engine: &'a mut Engine<T, K>,
    entity: Entity<T>,
}

impl<'a, T: EntityKind, K: ComponentKind> EntityMut<'a, T, K> {
    pub(crate) fn new(engine: &'a mut Engine<T, K>, entity: Entity<T>) -> Self {
        Self { engine, entity }
    }

    /// The entity's ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    /// Borrow as a read handle.
    #[must_use]
    pub fn as_readonly(&self) -> EntityRef<'_, T, K> {
        EntityRef::new(&self.engine.store, self.entity)
    }

    /// Attach a component, replacing its payload if already attached.
    pub fn add_component(
        &mut self,
        options: MutationOptions,
        component: K,
        data: Value,
    ) -> Dispatch<Option<Entity<T>>> {
        self.engine
            .add_component(options, self.entity.id, component, data)
    }

    /// Merge data into a component, attaching it if missing.
    pub fn update_component(
        &mut self,
        options: MutationOptions,
        component: K,
        data: Value,
    ) -> Dispatch<Option<Entity<T>>> {
        self.engine
            .update_component(options, self.entity.id, component, data)
    }

    /// Detach a component.
    pub fn remove_component(
        &mut self,
        options: MutationOptions,
        component: K,
    ) -> Dispatch<Option<Entity<T>>> {
        self.engine
            .remove_component(options, self.entity.id, component)
    }
}
