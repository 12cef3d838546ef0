//! System registry, membership index and matching order.
//!
//! The registry keeps systems in registration order. The [`Membership`]
//! index lists, per system, the entities currently satisfying it. It is
//! maintained incrementally by the engine; this module only decides *which*
//! systems a change affects and in *what order* their hooks fire.
//!
//! ## Ordering
//!
//! Each attached component gets a weight equal to the square of its position
//! in the entity's attachment order. A system's score is the sum of the
//! weights of its required components; it is undefined when one of them is
//! not attached, which doubles as the superset test.
//!
//! - additions fire in ascending score order,
//! - removals fire in descending score order,
//! - ties keep registration order.

use std::collections::HashMap;

use darker_component::{ComponentKind, EntityId, EntityKind, SystemId};
use tracing::warn;

use crate::system::{HookCall, HookContext, System};

/// Per-component weights derived from an entity's attachment order.
#[derive(Debug, Clone)]
pub struct Weights<K>(HashMap<K, u64>);

impl<K: ComponentKind> Weights<K> {
    /// Weight each component by the square of its position.
    #[must_use]
    pub fn from_order(order: &[K]) -> Self {
        Self(
            order
                .iter()
                .enumerate()
                .map(|(index, &component)| (component, (index as u64).pow(2)))
                .collect(),
        )
    }

    /// Sum of the weights of `required`, or `None` if one is not attached.
    #[must_use]
    pub fn score(&self, required: &[K]) -> Option<u64> {
        required
            .iter()
            .map(|component| self.0.get(component).copied())
            .sum()
    }
}

/// System → member entities, in the order they joined.
#[derive(Debug, Default)]
pub struct Membership {
    members: HashMap<SystemId, Vec<EntityId>>,
}

impl Membership {
    /// Start tracking a system with no members.
    pub fn track(&mut self, system: SystemId) {
        self.members.entry(system).or_default();
    }

    /// Returns `true` if `entity` is a member of `system`.
    #[must_use]
    pub fn contains(&self, system: SystemId, entity: EntityId) -> bool {
        self.members
            .get(&system)
            .is_some_and(|members| members.contains(&entity))
    }

    /// Append `entity` to `system`'s members.
    pub fn insert(&mut self, system: SystemId, entity: EntityId) {
        let members = self.members.entry(system).or_default();
        if !members.contains(&entity) {
            members.push(entity);
        }
    }

    /// Drop `entity` from `system`'s members.
    pub fn remove(&mut self, system: SystemId, entity: EntityId) {
        if let Some(members) = self.members.get_mut(&system) {
            members.retain(|&other| other != entity);
        }
    }

    /// Returns `system`'s members, empty for unknown systems.
    #[must_use]
    pub fn members(&self, system: SystemId) -> &[EntityId] {
        self.members
            .get(&system)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Forget every system.
    pub fn clear(&mut self) {
        self.members.clear();
    }
}

/// A system as held by the registry.
pub struct RegisteredSystem<T, K> {
    id: SystemId,
    name: String,
    components: Vec<K>,
    system: Box<dyn System<T, K>>,
}

impl<T: EntityKind, K: ComponentKind> RegisteredSystem<T, K> {
    /// Returns the system ID.
    #[must_use]
    pub fn id(&self) -> SystemId {
        self.id
    }

    /// Returns the system name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the required components, as declared at registration.
    #[must_use]
    pub fn components(&self) -> &[K] {
        &self.components
    }

    /// Returns the system implementation.
    #[must_use]
    pub fn system(&self) -> &dyn System<T, K> {
        self.system.as_ref()
    }

    /// Invoke one hook. A failure is logged and swallowed.
    pub fn invoke(&mut self, ctx: &mut HookContext<'_, T, K>, call: HookCall<K>) {
        if let Err(err) = call.invoke(self.system.as_mut(), ctx) {
            warn!(
                system = %self.id,
                name = %self.name,
                call = %call,
                error = %err,
                "system hook failed"
            );
        }
    }
}

impl<T, K: std::fmt::Debug> std::fmt::Debug for RegisteredSystem<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSystem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("components", &self.components)
            .finish_non_exhaustive()
    }
}

/// Registered systems, in registration order.
#[derive(Debug)]
pub struct SystemRegistry<T, K> {
    systems: Vec<RegisteredSystem<T, K>>,
}

impl<T: EntityKind, K: ComponentKind> SystemRegistry<T, K> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Append a system under the given ID and name.
    pub fn register(&mut self, id: SystemId, name: String, system: Box<dyn System<T, K>>) {
        let components = system.components().to_vec();
        self.systems.push(RegisteredSystem {
            id,
            name,
            components,
            system,
        });
    }

    /// Swap the implementation at `index`, keeping its ID and name. Returns
    /// the previous implementation.
    pub fn replace(
        &mut self,
        index: usize,
        system: Box<dyn System<T, K>>,
    ) -> Option<Box<dyn System<T, K>>> {
        let slot = self.systems.get_mut(index)?;
        slot.components = system.components().to_vec();
        Some(std::mem::replace(&mut slot.system, system))
    }

    /// Drop every system.
    pub fn clear(&mut self) {
        self.systems.clear();
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Returns `true` if a system with this ID is registered.
    #[must_use]
    pub fn contains(&self, id: SystemId) -> bool {
        self.systems.iter().any(|s| s.id == id)
    }

    /// Returns the registration index of a system.
    #[must_use]
    pub fn position(&self, id: SystemId) -> Option<usize> {
        self.systems.iter().position(|s| s.id == id)
    }

    /// Returns a system by ID.
    #[must_use]
    pub fn get(&self, id: SystemId) -> Option<&RegisteredSystem<T, K>> {
        self.systems.iter().find(|s| s.id == id)
    }

    /// Returns the first system with this name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&RegisteredSystem<T, K>> {
        self.systems.iter().find(|s| s.name == name)
    }

    /// Returns the system at a registration index.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&RegisteredSystem<T, K>> {
        self.systems.get(index)
    }

    /// Returns the system at a registration index, mutably.
    pub fn at_mut(&mut self, index: usize) -> Option<&mut RegisteredSystem<T, K>> {
        self.systems.get_mut(index)
    }

    /// Returns an iterator over all systems, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredSystem<T, K>> {
        self.systems.iter()
    }

    /// Systems that `entity` newly satisfies, in `on_add` order.
    ///
    /// Only systems not already holding the entity are considered.
    #[must_use]
    pub fn add_order(
        &self,
        membership: &Membership,
        entity: EntityId,
        weights: &Weights<K>,
    ) -> Vec<usize> {
        let mut scored: Vec<(usize, u64)> = self
            .systems
            .iter()
            .enumerate()
            .filter(|(_, s)| !membership.contains(s.id, entity))
            .filter_map(|(index, s)| weights.score(&s.components).map(|score| (index, score)))
            .collect();
        scored.sort_by_key(|&(_, score)| score);
        scored.into_iter().map(|(index, _)| index).collect()
    }

    /// Member systems that `entity` no longer satisfies, in `on_remove` order.
    ///
    /// `weights` must come from the attachment order before the change.
    /// `still_matches` tells whether a requirement set is still met; pass a
    /// closure returning `false` when the entity itself is going away.
    #[must_use]
    pub fn remove_order(
        &self,
        membership: &Membership,
        entity: EntityId,
        weights: &Weights<K>,
        still_matches: impl Fn(&[K]) -> bool,
    ) -> Vec<usize> {
        let mut scored: Vec<(usize, u64)> = self
            .systems
            .iter()
            .enumerate()
            .filter(|(_, s)| membership.contains(s.id, entity))
            .filter(|(_, s)| !still_matches(&s.components))
            .map(|(index, s)| (index, weights.score(&s.components).unwrap_or_default()))
            .collect();
        scored.sort_by(|(_, a), (_, b)| b.cmp(a));
        scored.into_iter().map(|(index, _)| index).collect()
    }

    /// Member systems requiring `component`, in registration order.
    #[must_use]
    pub fn update_targets(
        &self,
        membership: &Membership,
        entity: EntityId,
        component: K,
    ) -> Vec<usize> {
        self.systems
            .iter()
            .enumerate()
            .filter(|(_, s)| s.components.contains(&component))
            .filter(|(_, s)| membership.contains(s.id, entity))
            .map(|(index, _)| index)
            .collect()
    }
}

impl<T: EntityKind, K: ComponentKind> Default for SystemRegistry<T, K> {
    fn default() -> Self {
        Self::new()
    }
}
