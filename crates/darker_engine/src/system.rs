//! The [`System`] trait and the context its hooks run in.
//!
//! A system declares the components it requires and implements whichever
//! hooks it cares about; every hook defaults to a no-op. Hooks return
//! `anyhow::Result<()>`: an error is logged by the engine and dispatch moves
//! on to the next system.

use std::fmt;

use anyhow::Result;
use darker_component::{
    ActionId, ComponentKind, Entity, EntityId, EntityKind, EntitySpec, IdAllocator, SystemId,
};
use serde_json::Value;

use crate::queue::{Mutation, MutationQueue, Priority, QueuedAction};
use crate::registry::Membership;
use crate::store::Store;

/// A logic unit interested in entities holding a set of components.
pub trait System<T, K>: Send {
    /// A fixed ID. Allocated at registration when `None`.
    fn id(&self) -> Option<SystemId> {
        None
    }

    /// Name used for lookups and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Components an entity must hold to be a member of this system.
    fn components(&self) -> &[K];

    /// An entity became a member.
    fn on_add(&mut self, _ctx: &mut HookContext<'_, T, K>, _entity: EntityId) -> Result<()> {
        Ok(())
    }

    /// A required component of a member entity was updated.
    fn on_update(
        &mut self,
        _ctx: &mut HookContext<'_, T, K>,
        _entity: EntityId,
        _component: K,
    ) -> Result<()> {
        Ok(())
    }

    /// An entity is leaving. It is still listed as a member during the call.
    fn on_remove(&mut self, _ctx: &mut HookContext<'_, T, K>, _entity: EntityId) -> Result<()> {
        Ok(())
    }

    /// The engine was loaded, or this system was rebuilt.
    fn on_load(&mut self, _ctx: &mut HookContext<'_, T, K>) -> Result<()> {
        Ok(())
    }

    /// The engine was paused.
    fn on_pause(&mut self, _ctx: &mut HookContext<'_, T, K>) -> Result<()> {
        Ok(())
    }

    /// The engine was resumed.
    fn on_resume(&mut self, _ctx: &mut HookContext<'_, T, K>) -> Result<()> {
        Ok(())
    }

    /// The system is being torn down.
    fn on_destroy(&mut self, _ctx: &mut HookContext<'_, T, K>) -> Result<()> {
        Ok(())
    }
}

/// A single hook invocation, used for dispatch and for logging the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookCall<K> {
    /// `on_add`.
    Add(EntityId),
    /// `on_update`.
    Update(EntityId, K),
    /// `on_remove`.
    Remove(EntityId),
    /// `on_load`.
    Load,
    /// `on_pause`.
    Pause,
    /// `on_resume`.
    Resume,
    /// `on_destroy`.
    Destroy,
}

impl<K: fmt::Debug> fmt::Display for HookCall<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookCall::Add(entity) => write!(f, "onAdd({})", entity.0),
            HookCall::Update(entity, component) => {
                write!(f, "onUpdate({}, {component:?})", entity.0)
            }
            HookCall::Remove(entity) => write!(f, "onRemove({})", entity.0),
            HookCall::Load => f.write_str("onLoad()"),
            HookCall::Pause => f.write_str("onPause()"),
            HookCall::Resume => f.write_str("onResume()"),
            HookCall::Destroy => f.write_str("onDestroy()"),
        }
    }
}

impl<K: ComponentKind> HookCall<K> {
    /// Invoke the matching hook on `system`.
    ///
    /// # Errors
    ///
    /// Returns whatever the hook returned.
    pub fn invoke<T: EntityKind>(
        self,
        system: &mut dyn System<T, K>,
        ctx: &mut HookContext<'_, T, K>,
    ) -> Result<()> {
        match self {
            HookCall::Add(entity) => system.on_add(ctx, entity),
            HookCall::Update(entity, component) => system.on_update(ctx, entity, component),
            HookCall::Remove(entity) => system.on_remove(ctx, entity),
            HookCall::Load => system.on_load(ctx),
            HookCall::Pause => system.on_pause(ctx),
            HookCall::Resume => system.on_resume(ctx),
            HookCall::Destroy => system.on_destroy(ctx),
        }
    }
}

/// What a hook can see and do.
///
/// The store and the membership index are read-only. Mutations requested
/// from a hook always go through the queue, so the single flow of control
/// never re-enters the matcher while a hook is running.
pub struct HookContext<'a, T, K> {
    store: &'a Store<T, K>,
    membership: &'a Membership,
    queue: &'a mut MutationQueue<T, K>,
    ids: &'a mut IdAllocator,
}

impl<'a, T: EntityKind, K: ComponentKind> HookContext<'a, T, K> {
    pub(crate) fn new(
        store: &'a Store<T, K>,
        membership: &'a Membership,
        queue: &'a mut MutationQueue<T, K>,
        ids: &'a mut IdAllocator,
    ) -> Self {
        Self {
            store,
            membership,
            queue,
            ids,
        }
    }

    /// Read-only access to the store.
    #[must_use]
    pub fn store(&self) -> &Store<T, K> {
        self.store
    }

    /// Returns the handle of a live entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<Entity<T>> {
        self.store.entity(id)
    }

    /// Returns a system's current members, in membership order.
    #[must_use]
    pub fn members(&self, system: SystemId) -> &[EntityId] {
        self.membership.members(system)
    }

    /// Queue a mutation. Returns its action ID.
    pub fn enqueue(&mut self, mutation: Mutation<T, K>, priority: Priority) -> ActionId {
        let id = self.ids.action_id();
        self.queue.push(QueuedAction {
            id,
            priority,
            mutation,
        })
    }

    /// Queue an entity batch for addition.
    pub fn add_entity(&mut self, entities: Vec<EntitySpec<T, K>>, priority: Priority) -> ActionId {
        self.enqueue(Mutation::AddEntity(entities), priority)
    }

    /// Queue entities for removal.
    pub fn remove_entity(&mut self, ids: Vec<EntityId>, priority: Priority) -> ActionId {
        self.enqueue(Mutation::RemoveEntity(ids), priority)
    }

    /// Queue a component attachment.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        component: K,
        data: Value,
        priority: Priority,
    ) -> ActionId {
        self.enqueue(
            Mutation::AddComponent {
                entity,
                component,
                data,
            },
            priority,
        )
    }

    /// Queue a component update.
    pub fn update_component(
        &mut self,
        entity: EntityId,
        component: K,
        data: Value,
        priority: Priority,
    ) -> ActionId {
        self.enqueue(
            Mutation::UpdateComponent {
                entity,
                component,
                data,
            },
            priority,
        )
    }

    /// Queue a component removal.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        component: K,
        priority: Priority,
    ) -> ActionId {
        self.enqueue(Mutation::RemoveComponent { entity, component }, priority)
    }
}
