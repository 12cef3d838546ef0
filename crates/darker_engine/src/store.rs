//! Entity/component store.
//!
//! The [`Store`] is the canonical mapping from entity ID to its type, its
//! attached components (in attachment order) and their payloads. It also
//! keeps the type → entities index. A component appears in an entity's
//! attachment list if and only if a payload exists for it.
//!
//! Payloads are held behind [`Arc`] so shallow reads can share structure with
//! the store. Writes go through [`Arc::make_mut`], so a payload handed out
//! earlier never changes under its holder.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use darker_component::{
    ComponentKind, Entity, EntityId, EntityKind, EntitySpec, IdAllocator, payload,
};
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;

/// How component payloads are copied out of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloneDepth {
    /// Share the payload with the store. Cheap; the payload is immutable.
    #[default]
    Shallow,
    /// Copy the payload into a fresh, independent allocation.
    Deep,
}

#[derive(Debug, Clone)]
struct EntityRecord<T, K> {
    kind: T,
    components: Vec<K>,
    data: HashMap<K, Arc<Value>>,
}

/// Canonical entity and component storage.
#[derive(Debug)]
pub struct Store<T, K> {
    entities: BTreeMap<EntityId, EntityRecord<T, K>>,
    by_type: HashMap<T, Vec<EntityId>>,
}

impl<T: EntityKind, K: ComponentKind> Store<T, K> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            by_type: HashMap::new(),
        }
    }

    /// Store a declared entity, allocating its ID if it has none.
    ///
    /// Declared components without data get an empty payload. Data for
    /// components that were not declared is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateEntity`] if the explicit ID is live.
    pub fn insert(
        &mut self,
        ids: &mut IdAllocator,
        spec: EntitySpec<T, K>,
    ) -> Result<Entity<T>, StoreError> {
        let EntitySpec {
            id,
            kind,
            components,
            mut data,
            safe,
        } = spec;

        let id = match id {
            Some(id) if self.entities.contains_key(&id) => {
                return Err(StoreError::DuplicateEntity(id));
            }
            Some(id) => id,
            None => ids.entity_id(safe, |id| self.entities.contains_key(&id)),
        };

        let mut order = Vec::with_capacity(components.len());
        let mut payloads = HashMap::with_capacity(components.len());
        for component in components {
            if payloads.contains_key(&component) {
                continue;
            }
            let value = data.remove(&component).unwrap_or_else(payload::empty);
            payloads.insert(component, Arc::new(value));
            order.push(component);
        }
        if !data.is_empty() {
            debug!(entity = %id, dropped = data.len(), "ignoring data for undeclared components");
        }

        self.by_type.entry(kind).or_default().push(id);
        self.entities.insert(
            id,
            EntityRecord {
                kind,
                components: order,
                data: payloads,
            },
        );
        Ok(Entity { id, kind })
    }

    /// Delete an entity and every index entry referencing it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the entity is not live.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity<T>, StoreError> {
        let record = self
            .entities
            .remove(&id)
            .ok_or(StoreError::EntityNotFound(id))?;
        if let Some(list) = self.by_type.get_mut(&record.kind) {
            list.retain(|&other| other != id);
            if list.is_empty() {
                self.by_type.remove(&record.kind);
            }
        }
        Ok(Entity {
            id,
            kind: record.kind,
        })
    }

    /// Attach a component, or overwrite its payload if already attached.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the entity is not live.
    pub fn attach(&mut self, id: EntityId, component: K, data: Value) -> Result<(), StoreError> {
        let record = self.record_mut(id)?;
        if !record.components.contains(&component) {
            record.components.push(component);
        }
        record.data.insert(component, Arc::new(data));
        Ok(())
    }

    /// Merge `data` into an attached component's payload (see
    /// [`payload::merge`]). Attaches the component if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the entity is not live.
    pub fn merge(&mut self, id: EntityId, component: K, data: Value) -> Result<(), StoreError> {
        let record = self.record_mut(id)?;
        match record.data.get_mut(&component) {
            Some(current) => payload::merge(Arc::make_mut(current), data),
            None => {
                record.components.push(component);
                record.data.insert(component, Arc::new(data));
            }
        }
        Ok(())
    }

    /// Detach a component and drop its payload.
    ///
    /// Returns `false` if the component was not attached.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntityNotFound`] if the entity is not live.
    pub fn detach(&mut self, id: EntityId, component: K) -> Result<bool, StoreError> {
        let record = self.record_mut(id)?;
        let attached = record.data.remove(&component).is_some();
        record.components.retain(|&other| other != component);
        Ok(attached)
    }

    /// Drop every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.by_type.clear();
    }

    /// Returns `true` if the entity is live.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the handle of a live entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<Entity<T>> {
        self.entities.get(&id).map(|record| Entity {
            id,
            kind: record.kind,
        })
    }

    /// Returns the attached components of an entity, in attachment order.
    #[must_use]
    pub fn component_types(&self, id: EntityId) -> Option<&[K]> {
        self.entities
            .get(&id)
            .map(|record| record.components.as_slice())
    }

    /// Returns `true` if the entity has the component attached.
    #[must_use]
    pub fn has_component(&self, id: EntityId, component: K) -> bool {
        self.entities
            .get(&id)
            .is_some_and(|record| record.data.contains_key(&component))
    }

    /// Returns a component payload, or an empty object if the entity or the
    /// component is absent.
    #[must_use]
    pub fn get_component(&self, id: EntityId, component: K, depth: CloneDepth) -> Arc<Value> {
        match self.payload(id, component) {
            Some(value) => copy(value, depth),
            None => Arc::new(payload::empty()),
        }
    }

    /// Returns the payloads of the requested components. Absent components
    /// are left out.
    #[must_use]
    pub fn get_components(
        &self,
        id: EntityId,
        components: &[K],
        depth: CloneDepth,
    ) -> HashMap<K, Arc<Value>> {
        components
            .iter()
            .filter_map(|&component| {
                self.payload(id, component)
                    .map(|value| (component, copy(value, depth)))
            })
            .collect()
    }

    /// Returns an independent copy of every payload of an entity. Empty if
    /// the entity is not live.
    #[must_use]
    pub fn data(&self, id: EntityId) -> HashMap<K, Value> {
        self.entities
            .get(&id)
            .map(|record| {
                record
                    .data
                    .iter()
                    .map(|(&component, value)| (component, Value::clone(value)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns every live entity, in ID order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity<T>> {
        self.entities
            .iter()
            .map(|(&id, record)| Entity {
                id,
                kind: record.kind,
            })
            .collect()
    }

    /// Returns the live entities of a type, in insertion order.
    #[must_use]
    pub fn entities_by_type(&self, kind: T) -> Vec<Entity<T>> {
        self.by_type
            .get(&kind)
            .map(|ids| ids.iter().map(|&id| Entity { id, kind }).collect())
            .unwrap_or_default()
    }

    /// Returns the live entities holding every listed component, in ID order.
    /// An empty list matches every entity.
    #[must_use]
    pub fn entities_with(&self, components: &[K]) -> Vec<Entity<T>> {
        self.entities
            .iter()
            .filter(|(_, record)| {
                components
                    .iter()
                    .all(|component| record.data.contains_key(component))
            })
            .map(|(&id, record)| Entity {
                id,
                kind: record.kind,
            })
            .collect()
    }

    fn payload(&self, id: EntityId, component: K) -> Option<&Arc<Value>> {
        self.entities.get(&id)?.data.get(&component)
    }

    fn record_mut(&mut self, id: EntityId) -> Result<&mut EntityRecord<T, K>, StoreError> {
        self.entities
            .get_mut(&id)
            .ok_or(StoreError::EntityNotFound(id))
    }
}

impl<T: EntityKind, K: ComponentKind> Default for Store<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

fn copy(value: &Arc<Value>, depth: CloneDepth) -> Arc<Value> {
    match depth {
        CloneDepth::Shallow => Arc::clone(value),
        CloneDepth::Deep => Arc::new(Value::clone(value)),
    }
}
