//! The engine context.
//!
//! [`Engine`] owns every index: the store, the system registry, the
//! membership index, the mutation queue and the identifier allocator. All
//! mutations flow through it on a single thread of control:
//!
//! 1. The store applies the state change.
//! 2. The matcher works out which systems are affected, and in which order.
//! 3. Each affected system's hook runs, with membership updated around it.
//!
//! Queued mutations take the same path later, when the tick loop drains them.

use std::time::Duration;

use darker_component::{
    ActionId, ComponentKind, Entity, EntityId, EntityKind, EntitySpec, IdAllocator, SystemId,
};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, TickObserver};
use crate::handle::{EntityMut, EntityRef};
use crate::lifecycle::LifecycleState;
use crate::queue::{
    ActionCompleted, ActionResult, Dispatch, Mutation, MutationOptions, MutationQueue,
    Priority, QueuedAction,
};
use crate::registry::{Membership, RegisteredSystem, SystemRegistry, Weights};
use crate::store::Store;
use crate::system::{HookCall, HookContext, System};
use crate::tick::TickScheduler;

/// The ECS engine: entities, systems, membership, queue and tick state.
pub struct Engine<T, K> {
    pub(crate) config: EngineConfig,
    pub(crate) ids: IdAllocator,
    pub(crate) store: Store<T, K>,
    pub(crate) registry: SystemRegistry<T, K>,
    pub(crate) membership: Membership,
    pub(crate) queue: MutationQueue<T, K>,
    pub(crate) state: LifecycleState,
    pub(crate) scheduler: Option<TickScheduler>,
    pub(crate) on_tick: Option<TickObserver<T>>,
}

impl<T: EntityKind, K: ComponentKind> Engine<T, K> {
    /// Create an empty, unloaded engine.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an empty, unloaded engine with custom settings.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ids: IdAllocator::new(),
            store: Store::new(),
            registry: SystemRegistry::new(),
            membership: Membership::default(),
            queue: MutationQueue::new(),
            state: LifecycleState::Unloaded,
            scheduler: None,
            on_tick: None,
        }
    }

    // -- Systems --

    /// Replace every registered system.
    ///
    /// Membership is rebuilt from scratch: each live entity is matched
    /// against the new systems (in ID order), firing `on_add` as usual.
    pub fn set_systems<I>(&mut self, systems: I)
    where
        I: IntoIterator<Item = Box<dyn System<T, K>>>,
    {
        self.registry.clear();
        self.membership.clear();

        let systems: Vec<_> = systems.into_iter().collect();
        let declared: Vec<SystemId> = systems.iter().filter_map(|s| s.id()).collect();

        for system in systems {
            let id = match system.id() {
                Some(id) => id,
                None => self.ids.system_id(|id| declared.contains(&id)),
            };
            if self.registry.contains(id) {
                warn!(system = %id, name = system.name(), "duplicate system id, skipping");
                continue;
            }
            let name = system.name().to_owned();
            debug!(system = %id, name = %name, "registering system");
            self.membership.track(id);
            self.registry.register(id, name, system);
        }

        let live: Vec<EntityId> = self.store.entities().iter().map(|e| e.id).collect();
        for id in live {
            self.match_added(id);
        }

        info!(systems = self.registry.len(), "systems registered");
    }

    /// Returns a system by ID.
    #[must_use]
    pub fn get_system(&self, id: SystemId) -> Option<&RegisteredSystem<T, K>> {
        self.registry.get(id)
    }

    /// Returns the registered systems, in registration order.
    pub fn systems(&self) -> impl Iterator<Item = &RegisteredSystem<T, K>> {
        self.registry.iter()
    }

    /// Returns a system's members, in the order they joined.
    #[must_use]
    pub fn system_entities(&self, id: SystemId) -> &[EntityId] {
        self.membership.members(id)
    }

    // -- Mutations --

    /// Add a batch of entities.
    pub fn add_entity(
        &mut self,
        options: MutationOptions,
        entities: Vec<EntitySpec<T, K>>,
    ) -> Dispatch<Vec<Entity<T>>> {
        if options.force {
            return Dispatch::Applied(self.apply_add_entity(entities));
        }
        Dispatch::Queued(self.enqueue(Mutation::AddEntity(entities), options.priority))
    }

    /// Remove a batch of entities. Unknown IDs are skipped.
    pub fn remove_entity(
        &mut self,
        options: MutationOptions,
        ids: Vec<EntityId>,
    ) -> Dispatch<Vec<EntityId>> {
        if options.force {
            return Dispatch::Applied(self.apply_remove_entity(ids));
        }
        Dispatch::Queued(self.enqueue(Mutation::RemoveEntity(ids), options.priority))
    }

    /// Attach a component.
    ///
    /// Members of newly matched systems see `on_add`. If the component is
    /// already attached, its payload is replaced and the systems requiring
    /// it see `on_update` instead.
    pub fn add_component(
        &mut self,
        options: MutationOptions,
        entity: EntityId,
        component: K,
        data: Value,
    ) -> Dispatch<Option<Entity<T>>> {
        if options.force {
            return Dispatch::Applied(self.apply_add_component(entity, component, data));
        }
        Dispatch::Queued(self.enqueue(
            Mutation::AddComponent {
                entity,
                component,
                data,
            },
            options.priority,
        ))
    }

    /// Merge `data` into a component, attaching it if the entity lacks it.
    pub fn update_component(
        &mut self,
        options: MutationOptions,
        entity: EntityId,
        component: K,
        data: Value,
    ) -> Dispatch<Option<Entity<T>>> {
        if options.force {
            return Dispatch::Applied(self.apply_update_component(entity, component, data));
        }
        Dispatch::Queued(self.enqueue(
            Mutation::UpdateComponent {
                entity,
                component,
                data,
            },
            options.priority,
        ))
    }

    /// Detach a component.
    pub fn remove_component(
        &mut self,
        options: MutationOptions,
        entity: EntityId,
        component: K,
    ) -> Dispatch<Option<Entity<T>>> {
        if options.force {
            return Dispatch::Applied(self.apply_remove_component(entity, component));
        }
        Dispatch::Queued(self.enqueue(
            Mutation::RemoveComponent { entity, component },
            options.priority,
        ))
    }

    // -- Queries --

    /// Returns a read handle to a live entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<EntityRef<'_, T, K>> {
        let entity = self.get_entity(id)?;
        Some(EntityRef::new(&self.store, entity))
    }

    /// Returns a mutation handle to a live entity.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<EntityMut<'_, T, K>> {
        let entity = self.get_entity(id)?;
        Some(EntityMut::new(self, entity))
    }

    /// Returns the handle of a live entity, logging a warning if it is not.
    #[must_use]
    pub fn get_entity(&self, id: EntityId) -> Option<Entity<T>> {
        let entity = self.store.entity(id);
        if entity.is_none() {
            warn!(entity = %id, "getEntity: entity not found");
        }
        entity
    }

    /// Returns every live entity, in ID order.
    #[must_use]
    pub fn entity_list(&self) -> Vec<Entity<T>> {
        self.store.entities()
    }

    /// Returns the live entities of one type.
    #[must_use]
    pub fn entity_list_by_type(&self, kind: T) -> Vec<Entity<T>> {
        self.store.entities_by_type(kind)
    }

    /// Returns the live entities holding every listed component. An empty
    /// list returns every entity.
    #[must_use]
    pub fn entity_list_by_components(&self, components: &[K]) -> Vec<Entity<T>> {
        self.store.entities_with(components)
    }

    /// Read-only access to the store.
    #[must_use]
    pub fn store(&self) -> &Store<T, K> {
        &self.store
    }

    /// Total number of queued actions.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of actions queued in one tier.
    #[must_use]
    pub fn queue_len_of(&self, priority: Priority) -> usize {
        self.queue.len_of(priority)
    }

    // -- Tick --

    /// Pop and apply the next queued action, highest tier first.
    pub fn process_next_action(&mut self) -> Option<ActionCompleted<T>> {
        let QueuedAction {
            id,
            priority,
            mutation,
        } = self.queue.pop()?;
        let kind = mutation.kind();
        debug!(action = %id, ?kind, ?priority, "draining queued action");
        let result = self.apply(mutation);
        Some(ActionCompleted {
            action_id: id,
            kind,
            result,
        })
    }

    /// Run one scheduler iteration at `now`.
    ///
    /// Drains one action if a tick is due, then calls the tick observer
    /// either way. Returns how long to wait before the next iteration,
    /// measured from when processing finished, or `None` if the engine is
    /// not running.
    pub fn tick_at(&mut self, now: Instant) -> Option<Duration> {
        if self.state != LifecycleState::Running {
            return None;
        }
        let due = self.scheduler.as_mut()?.poll(now);
        let status = if due { self.process_next_action() } else { None };
        if let Some(observer) = self.on_tick.as_mut() {
            observer(status.as_ref());
        }
        // Time spent draining counts against the next delay.
        let finished = Instant::now().max(now);
        self.scheduler
            .as_ref()
            .map(|scheduler| scheduler.next_delay(finished))
    }

    // -- Internals --

    fn enqueue(&mut self, mutation: Mutation<T, K>, priority: Priority) -> ActionId {
        let id = self.ids.action_id();
        debug!(action = %id, kind = ?mutation.kind(), ?priority, "queueing action");
        self.queue.push(QueuedAction {
            id,
            priority,
            mutation,
        })
    }

    fn apply(&mut self, mutation: Mutation<T, K>) -> ActionResult<T> {
        match mutation {
            Mutation::AddEntity(entities) => ActionResult::Added(self.apply_add_entity(entities)),
            Mutation::RemoveEntity(ids) => ActionResult::Removed(self.apply_remove_entity(ids)),
            Mutation::AddComponent {
                entity,
                component,
                data,
            } => ActionResult::ComponentAdded(self.apply_add_component(entity, component, data)),
            Mutation::UpdateComponent {
                entity,
                component,
                data,
            } => ActionResult::Updated(self.apply_update_component(entity, component, data)),
            Mutation::RemoveComponent { entity, component } => {
                ActionResult::ComponentRemoved(self.apply_remove_component(entity, component))
            }
        }
    }

    fn apply_add_entity(&mut self, entities: Vec<EntitySpec<T, K>>) -> Vec<Entity<T>> {
        let started = std::time::Instant::now();

        let mut added = Vec::with_capacity(entities.len());
        for spec in entities {
            match self.store.insert(&mut self.ids, spec) {
                Ok(entity) => added.push(entity),
                Err(err) => warn!(%err, "addEntity: skipping entity"),
            }
        }
        // Every entity of the batch is stored before any hook fires.
        for entity in &added {
            self.match_added(entity.id);
        }

        let elapsed = started.elapsed();
        if elapsed > self.config.slow_add_threshold {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                added = added.len(),
                total = self.store.len(),
                "addEntity exceeded latency threshold"
            );
        }
        added
    }

    fn apply_remove_entity(&mut self, ids: Vec<EntityId>) -> Vec<EntityId> {
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(order) = self.store.component_types(id) else {
                warn!(entity = %id, "removeEntity: entity not found");
                continue;
            };
            let weights = Weights::from_order(order);
            let systems = self
                .registry
                .remove_order(&self.membership, id, &weights, |_| false);
            self.dispatch_removals(&systems, id);

            if let Err(err) = self.store.remove(id) {
                warn!(%err, "removeEntity: store out of sync");
                continue;
            }
            removed.push(id);
        }
        removed
    }

    fn apply_update_component(
        &mut self,
        id: EntityId,
        component: K,
        data: Value,
    ) -> Option<Entity<T>> {
        let Some(entity) = self.store.entity(id) else {
            warn!(entity = %id, ?component, "updateComponent: entity not found");
            return None;
        };
        if !self.store.has_component(id, component) {
            return self.attach_component(entity, component, data);
        }
        if let Err(err) = self.store.merge(id, component, data) {
            warn!(%err, ?component, "updateComponent: store rejected update");
            return None;
        }
        for index in self.registry.update_targets(&self.membership, id, component) {
            self.dispatch(index, HookCall::Update(id, component));
        }
        Some(entity)
    }

    fn apply_add_component(
        &mut self,
        id: EntityId,
        component: K,
        data: Value,
    ) -> Option<Entity<T>> {
        let Some(entity) = self.store.entity(id) else {
            warn!(entity = %id, ?component, "addComponent: entity not found");
            return None;
        };
        if !self.store.has_component(id, component) {
            return self.attach_component(entity, component, data);
        }
        debug!(entity = %id, ?component, "addComponent: replacing attached payload");
        if let Err(err) = self.store.attach(id, component, data) {
            warn!(%err, ?component, "addComponent: store rejected component");
            return None;
        }
        for index in self.registry.update_targets(&self.membership, id, component) {
            self.dispatch(index, HookCall::Update(id, component));
        }
        Some(entity)
    }

    /// Attach a component the entity does not hold yet, then match it.
    fn attach_component(
        &mut self,
        entity: Entity<T>,
        component: K,
        data: Value,
    ) -> Option<Entity<T>> {
        if let Err(err) = self.store.attach(entity.id, component, data) {
            warn!(%err, ?component, "addComponent: store rejected component");
            return None;
        }
        self.match_added(entity.id);
        Some(entity)
    }

    fn apply_remove_component(&mut self, id: EntityId, component: K) -> Option<Entity<T>> {
        let Some(entity) = self.store.entity(id) else {
            warn!(entity = %id, ?component, "removeComponent: entity not found");
            return None;
        };
        let weights = Weights::from_order(self.store.component_types(id).unwrap_or_default());
        match self.store.detach(id, component) {
            Ok(true) => {}
            Ok(false) => {
                debug!(entity = %id, ?component, "removeComponent: component not attached");
                return Some(entity);
            }
            Err(err) => {
                warn!(%err, ?component, "removeComponent: store rejected removal");
                return None;
            }
        }

        let remaining = self.store.component_types(id).unwrap_or_default();
        let systems = self
            .registry
            .remove_order(&self.membership, id, &weights, |required| {
                required.iter().all(|c| remaining.contains(c))
            });
        self.dispatch_removals(&systems, id);
        Some(entity)
    }

    /// Join `id` to every system it newly satisfies, firing `on_add` in
    /// ascending score order.
    fn match_added(&mut self, id: EntityId) {
        let Some(order) = self.store.component_types(id) else {
            return;
        };
        let weights = Weights::from_order(order);
        for index in self.registry.add_order(&self.membership, id, &weights) {
            if let Some(system) = self.registry.at(index) {
                self.membership.insert(system.id(), id);
            }
            self.dispatch(index, HookCall::Add(id));
        }
    }

    /// Fire `on_remove` on each system, dropping `id` from its members once
    /// the hook returns.
    fn dispatch_removals(&mut self, systems: &[usize], id: EntityId) {
        for &index in systems {
            self.dispatch(index, HookCall::Remove(id));
            if let Some(system) = self.registry.at(index) {
                self.membership.remove(system.id(), id);
            }
        }
    }

    /// Invoke one hook on the system at `index`.
    pub(crate) fn dispatch(&mut self, index: usize, call: HookCall<K>) {
        let Self {
            store,
            registry,
            membership,
            queue,
            ids,
            ..
        } = self;
        let Some(system) = registry.at_mut(index) else {
            return;
        };
        let mut ctx = HookContext::new(store, membership, queue, ids);
        system.invoke(&mut ctx, call);
    }
}

impl<T: EntityKind, K: ComponentKind> Default for Engine<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug, K: std::fmt::Debug> std::fmt::Debug for Engine<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("membership", &self.membership)
            .field("queue", &self.queue)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use serde_json::json;

    use super::*;
    use crate::config::LoadConfig;
    use crate::queue::ActionKind;
    use crate::store::CloneDepth;
    use crate::testing::{Component, Kind, Recorder, TestEngine, new_log, take};

    fn spec(components: &[Component]) -> EntitySpec<Kind, Component> {
        components
            .iter()
            .fold(EntitySpec::new(Kind::Unit), |spec, &c| spec.tag(c))
    }

    fn add(engine: &mut TestEngine, components: &[Component]) -> EntityId {
        engine
            .add_entity(MutationOptions::forced(), vec![spec(components)])
            .applied()
            .and_then(|added| added.first().map(|e| e.id))
            .unwrap()
    }

    fn system_id(engine: &TestEngine, name: &str) -> SystemId {
        engine
            .systems()
            .find(|s| s.name() == name)
            .map(RegisteredSystem::id)
            .unwrap()
    }

    /// Queues a `C` update for every entity it sees.
    struct Tagger;

    impl System<Kind, Component> for Tagger {
        fn components(&self) -> &[Component] {
            &[Component::A]
        }

        fn on_add(
            &mut self,
            ctx: &mut HookContext<'_, Kind, Component>,
            entity: EntityId,
        ) -> Result<()> {
            ctx.update_component(entity, Component::C, json!({"tagged": true}), Priority::High);
            Ok(())
        }
    }

    /// Records how many entities the store held when each `on_add` fired.
    struct Census(Arc<Mutex<Vec<usize>>>);

    impl System<Kind, Component> for Census {
        fn components(&self) -> &[Component] {
            &[]
        }

        fn on_add(
            &mut self,
            ctx: &mut HookContext<'_, Kind, Component>,
            _entity: EntityId,
        ) -> Result<()> {
            self.0.lock().unwrap().push(ctx.store().len());
            Ok(())
        }
    }

    #[test]
    fn test_add_and_remove_order_are_symmetric() {
        let log = new_log();
        let mut engine = TestEngine::new();
        // Registered in the opposite order of their scores.
        engine.set_systems([
            Recorder::new("s2", &[Component::C], &log).boxed(),
            Recorder::new("s1", &[Component::B], &log).boxed(),
        ]);

        let id = add(&mut engine, &[Component::A, Component::B, Component::C]);
        assert_eq!(
            take(&log),
            vec![format!("s1:onAdd({})", id.0), format!("s2:onAdd({})", id.0)]
        );

        engine.remove_entity(MutationOptions::forced(), vec![id]);
        assert_eq!(
            take(&log),
            vec![
                format!("s2:onRemove({})", id.0),
                format!("s1:onRemove({})", id.0)
            ]
        );
    }

    #[test]
    fn test_membership_follows_component_set() {
        let log = new_log();
        let mut engine = TestEngine::new();
        engine.set_systems([
            Recorder::new("a", &[Component::A], &log).boxed(),
            Recorder::new("ab", &[Component::A, Component::B], &log).boxed(),
        ]);
        let a = system_id(&engine, "a");
        let ab = system_id(&engine, "ab");

        let id = add(&mut engine, &[Component::A]);
        assert_eq!(engine.system_entities(a), &[id]);
        assert!(engine.system_entities(ab).is_empty());
        take(&log);

        // Updating an absent component adds it.
        let updated = engine
            .update_component(MutationOptions::forced(), id, Component::B, json!({"hp": 3}))
            .applied()
            .flatten();
        assert_eq!(updated.map(|e| e.id), Some(id));
        assert_eq!(take(&log), vec![format!("ab:onAdd({})", id.0)]);
        assert_eq!(engine.system_entities(ab), &[id]);
        assert_eq!(
            *engine.store().get_component(id, Component::B, CloneDepth::Shallow),
            json!({"hp": 3})
        );

        engine.remove_component(MutationOptions::forced(), id, Component::A);
        assert_eq!(
            take(&log),
            vec![format!("ab:onRemove({})", id.0), format!("a:onRemove({})", id.0)]
        );
        assert!(engine.system_entities(a).is_empty());
        assert!(engine.system_entities(ab).is_empty());
        assert_eq!(engine.store().component_types(id), Some(&[Component::B][..]));
    }

    #[test]
    fn test_remove_component_keeps_still_matching_systems() {
        let log = new_log();
        let mut engine = TestEngine::new();
        engine.set_systems([
            Recorder::new("a", &[Component::A], &log).boxed(),
            Recorder::new("b", &[Component::B], &log).boxed(),
        ]);
        let id = add(&mut engine, &[Component::A, Component::B]);
        take(&log);

        engine.remove_component(MutationOptions::forced(), id, Component::B);
        assert_eq!(take(&log), vec![format!("b:onRemove({})", id.0)]);
        assert_eq!(engine.system_entities(system_id(&engine, "a")), &[id]);

        // Removing a component that is not attached is a no-op.
        let result = engine
            .remove_component(MutationOptions::forced(), id, Component::C)
            .applied()
            .flatten();
        assert_eq!(result.map(|e| e.id), Some(id));
        assert!(take(&log).is_empty());
    }

    #[test]
    fn test_update_merges_and_notifies_in_registration_order() {
        let log = new_log();
        let mut engine = TestEngine::new();
        engine.set_systems([
            Recorder::new("second", &[Component::A, Component::B], &log).boxed(),
            Recorder::new("other", &[Component::B], &log).boxed(),
            Recorder::new("first", &[Component::A], &log).boxed(),
        ]);
        let id = engine
            .add_entity(
                MutationOptions::forced(),
                vec![
                    EntitySpec::new(Kind::Unit)
                        .with(Component::A, json!({"x": 1, "y": 2}))
                        .tag(Component::B),
                ],
            )
            .applied()
            .and_then(|added| added.first().map(|e| e.id))
            .unwrap();
        take(&log);

        engine.update_component(MutationOptions::forced(), id, Component::A, json!({"y": 5}));
        assert_eq!(
            take(&log),
            vec![
                format!("second:onUpdate({}, A)", id.0),
                format!("first:onUpdate({}, A)", id.0),
            ]
        );
        assert_eq!(
            *engine.store().get_component(id, Component::A, CloneDepth::Deep),
            json!({"x": 1, "y": 5})
        );
    }

    #[test]
    fn test_update_on_absent_component_matches_explicit_add() {
        let run = |explicit: bool| {
            let log = new_log();
            let mut engine = TestEngine::new();
            engine.set_systems([
                Recorder::new("a", &[Component::A], &log).boxed(),
                Recorder::new("bc", &[Component::B, Component::C], &log).boxed(),
                Recorder::new("ab", &[Component::A, Component::B], &log).boxed(),
            ]);
            let id = add(&mut engine, &[Component::A, Component::C]);
            let data = json!({"hp": 3});
            let result = if explicit {
                engine.add_component(MutationOptions::forced(), id, Component::B, data)
            } else {
                engine.update_component(MutationOptions::forced(), id, Component::B, data)
            };
            assert_eq!(result.applied().flatten().map(|e| e.id), Some(id));
            let order = engine.store().component_types(id).unwrap().to_vec();
            let payload = engine
                .store()
                .get_component(id, Component::B, CloneDepth::Deep);
            (order, Value::clone(&payload), take(&log))
        };

        let added = run(true);
        let updated = run(false);
        assert_eq!(added, updated);
        assert_eq!(added.0, vec![Component::A, Component::C, Component::B]);
        assert_eq!(added.1, json!({"hp": 3}));
        // "ab" scores 0 + 4, "bc" scores 4 + 1.
        assert_eq!(
            added.2[1..],
            ["ab:onAdd(1)".to_owned(), "bc:onAdd(1)".to_owned()]
        );
    }

    #[test]
    fn test_add_component_on_attached_replaces_payload() {
        let log = new_log();
        let mut engine = TestEngine::new();
        engine.set_systems([Recorder::new("a", &[Component::A], &log).boxed()]);
        let id = engine
            .add_entity(
                MutationOptions::forced(),
                vec![EntitySpec::new(Kind::Unit).with(Component::A, json!({"x": 1, "y": 2}))],
            )
            .applied()
            .and_then(|added| added.first().map(|e| e.id))
            .unwrap();
        take(&log);

        engine.add_component(MutationOptions::forced(), id, Component::A, json!({"x": 5}));
        assert_eq!(take(&log), vec![format!("a:onUpdate({}, A)", id.0)]);
        assert_eq!(
            *engine.store().get_component(id, Component::A, CloneDepth::Shallow),
            json!({"x": 5})
        );
        assert_eq!(engine.store().component_types(id), Some(&[Component::A][..]));
    }

    #[test]
    fn test_queued_add_component() {
        let log = new_log();
        let mut engine = TestEngine::new();
        engine.set_systems([Recorder::new("b", &[Component::B], &log).boxed()]);
        let id = add(&mut engine, &[Component::A]);

        let action = {
            let mut entity = engine.entity_mut(id).unwrap();
            entity
                .add_component(MutationOptions::queued(Priority::High), Component::B, json!({}))
                .action_id()
                .unwrap()
        };
        assert!(!engine.store().has_component(id, Component::B));

        let completed = engine.process_next_action().unwrap();
        assert_eq!(completed.action_id, action);
        assert_eq!(completed.kind, ActionKind::AddComponent);
        assert_eq!(
            completed.result,
            ActionResult::ComponentAdded(Some(Entity { id, kind: Kind::Unit }))
        );
        assert_eq!(take(&log), vec![format!("b:onAdd({})", id.0)]);

        let missing = engine
            .add_component(MutationOptions::forced(), EntityId(404), Component::B, json!({}))
            .applied();
        assert_eq!(missing, Some(None));
    }

    #[test]
    fn test_remove_entity_is_idempotent() {
        let log = new_log();
        let mut engine = TestEngine::new();
        engine.set_systems([Recorder::new("a", &[Component::A], &log).boxed()]);
        let id = add(&mut engine, &[Component::A]);

        let first = engine
            .remove_entity(MutationOptions::forced(), vec![id])
            .applied();
        assert_eq!(first, Some(vec![id]));
        take(&log);

        let second = engine
            .remove_entity(MutationOptions::forced(), vec![id])
            .applied();
        assert_eq!(second, Some(Vec::new()));
        assert!(take(&log).is_empty());
        assert!(engine.entity_list().is_empty());
        assert!(engine.entity_list_by_type(Kind::Unit).is_empty());
        assert!(engine.system_entities(system_id(&engine, "a")).is_empty());
    }

    #[test]
    fn test_missing_entity_mutations_are_noops() {
        let mut engine = TestEngine::new();
        let missing = EntityId(404);
        assert!(engine.get_entity(missing).is_none());
        assert!(engine.entity(missing).is_none());
        assert!(engine.entity_mut(missing).is_none());
        let updated = engine
            .update_component(MutationOptions::forced(), missing, Component::A, json!({}))
            .applied();
        assert_eq!(updated, Some(None));
        let removed = engine
            .remove_component(MutationOptions::forced(), missing, Component::A)
            .applied();
        assert_eq!(removed, Some(None));
    }

    #[test]
    fn test_entity_list_by_components() {
        let mut engine = TestEngine::new();
        add(&mut engine, &[Component::A, Component::B]);
        add(&mut engine, &[Component::A]);
        add(&mut engine, &[Component::A]);
        add(&mut engine, &[Component::B]);
        add(&mut engine, &[]);
        add(&mut engine, &[Component::C]);

        assert_eq!(engine.entity_list_by_components(&[Component::A]).len(), 3);
        assert_eq!(engine.entity_list_by_components(&[Component::B]).len(), 2);
        assert_eq!(
            engine
                .entity_list_by_components(&[Component::A, Component::B])
                .len(),
            1
        );
        assert_eq!(engine.entity_list_by_components(&[]).len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_mutations_wait_for_a_tick() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&completed);
        let mut engine = TestEngine::new();

        let low = engine
            .add_entity(MutationOptions::queued(Priority::Low), vec![spec(&[])])
            .action_id()
            .unwrap();
        let high = engine
            .add_entity(
                MutationOptions::queued(Priority::High),
                vec![spec(&[Component::A])],
            )
            .action_id()
            .unwrap();
        assert_eq!(engine.queue_len(), 2);
        assert_eq!(engine.queue_len_of(Priority::High), 1);
        assert!(engine.entity_list().is_empty());

        // Unloaded engines do not tick.
        assert_eq!(engine.tick_at(Instant::now()), None);

        engine
            .load(
                LoadConfig::new()
                    .with_ticks_per_second(10.0)
                    .on_tick(move |status| {
                        seen.lock()
                            .unwrap()
                            .push(status.map(|s| (s.action_id, s.kind)));
                    }),
            )
            .unwrap();
        let (start, interval) = engine
            .scheduler
            .as_ref()
            .map(|s| (s.last_tick(), s.interval()))
            .unwrap();

        // Not due yet: the observer still runs, with nothing drained.
        let delay = engine.tick_at(start + interval / 2);
        assert_eq!(delay, Some(interval / 2));
        assert_eq!(engine.queue_len(), 2);

        engine.tick_at(start + interval);
        assert_eq!(engine.entity_list_by_components(&[Component::A]).len(), 1);
        assert_eq!(engine.queue_len(), 1);

        engine.tick_at(start + interval * 2);
        assert_eq!(engine.entity_list().len(), 2);
        assert_eq!(
            *completed.lock().unwrap(),
            vec![
                None,
                Some((high, ActionKind::AddEntity)),
                Some((low, ActionKind::AddEntity)),
            ]
        );
    }

    #[test]
    fn test_process_next_action_reports_result() {
        let mut engine = TestEngine::new();
        let id = add(&mut engine, &[Component::A]);
        let action = engine
            .remove_entity(MutationOptions::default(), vec![id, EntityId(99)])
            .action_id()
            .unwrap();

        let completed = engine.process_next_action().unwrap();
        assert_eq!(completed.action_id, action);
        assert_eq!(completed.kind, ActionKind::RemoveEntity);
        assert_eq!(completed.result, ActionResult::Removed(vec![id]));
        assert!(engine.process_next_action().is_none());
    }

    #[test]
    fn test_hook_failure_does_not_block_other_systems() {
        let log = new_log();
        let mut engine = TestEngine::new();
        engine.set_systems([
            Recorder::new("broken", &[Component::A], &log).failing().boxed(),
            Recorder::new("healthy", &[Component::A], &log).boxed(),
        ]);
        let id = add(&mut engine, &[Component::A]);
        assert_eq!(
            take(&log),
            vec![
                format!("broken:onAdd({})", id.0),
                format!("healthy:onAdd({})", id.0)
            ]
        );
        // Membership stands even though the hook failed.
        assert_eq!(engine.system_entities(system_id(&engine, "broken")), &[id]);
        assert_eq!(engine.system_entities(system_id(&engine, "healthy")), &[id]);
    }

    #[test]
    fn test_hooks_can_queue_mutations() {
        let mut engine = TestEngine::new();
        engine.set_systems([Box::new(Tagger) as Box<dyn System<Kind, Component>>]);
        let id = add(&mut engine, &[Component::A]);
        assert!(!engine.store().has_component(id, Component::C));
        assert_eq!(engine.queue_len_of(Priority::High), 1);

        let completed = engine.process_next_action().unwrap();
        assert_eq!(completed.kind, ActionKind::UpdateComponent);
        assert!(engine.store().has_component(id, Component::C));
    }

    #[test]
    fn test_batch_is_stored_before_hooks_fire() {
        let counts = Arc::new(Mutex::new(Vec::new()));
        let mut engine = TestEngine::new();
        engine.set_systems([
            Box::new(Census(Arc::clone(&counts))) as Box<dyn System<Kind, Component>>
        ]);
        engine.add_entity(
            MutationOptions::forced(),
            vec![spec(&[]), spec(&[]), spec(&[])],
        );
        assert_eq!(*counts.lock().unwrap(), vec![3, 3, 3]);
    }

    #[test]
    fn test_set_systems_matches_live_entities() {
        let log = new_log();
        let mut engine = TestEngine::new();
        let id = add(&mut engine, &[Component::B]);
        engine.set_systems([
            Recorder::new("a", &[Component::A], &log).boxed(),
            Recorder::new("b", &[Component::B], &log).boxed(),
        ]);
        assert_eq!(take(&log), vec![format!("b:onAdd({})", id.0)]);
    }

    #[test]
    fn test_system_ids() {
        let log = new_log();
        let mut engine = TestEngine::new();
        engine.set_systems([
            Recorder::new("auto", &[], &log).boxed(),
            Recorder::new("fixed", &[], &log).with_id(1).boxed(),
            Recorder::new("clash", &[], &log).with_id(1).boxed(),
        ]);
        let names: Vec<_> = engine.systems().map(|s| s.name().to_owned()).collect();
        assert_eq!(names, vec!["auto", "fixed"]);
        // Allocation skips declared IDs.
        assert_eq!(system_id(&engine, "auto"), SystemId(2));
        assert!(engine.get_system(SystemId(1)).is_some());
    }

    #[test]
    fn test_duplicate_explicit_id_is_skipped() {
        let mut engine = TestEngine::new();
        let added = engine
            .add_entity(
                MutationOptions::forced(),
                vec![
                    EntitySpec::new(Kind::Unit).with_id(EntityId(5)),
                    EntitySpec::new(Kind::Prop).with_id(EntityId(5)),
                    EntitySpec::new(Kind::Prop),
                ],
            )
            .applied()
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0], Entity { id: EntityId(5), kind: Kind::Unit });
        assert_eq!(engine.entity_list_by_type(Kind::Prop).len(), 1);
    }

    #[test]
    fn test_entity_handles() {
        let mut engine = TestEngine::new();
        let id = engine
            .add_entity(
                MutationOptions::forced(),
                vec![EntitySpec::new(Kind::Prop).with(Component::A, json!({"x": 1}))],
            )
            .applied()
            .and_then(|added| added.first().map(|e| e.id))
            .unwrap();

        let shallow = {
            let entity = engine.entity(id).unwrap();
            assert_eq!(entity.kind(), Kind::Prop);
            assert!(entity.has_component(Component::A));
            assert_eq!(entity.get_component_types(), &[Component::A]);
            entity.get_component(Component::A, CloneDepth::Shallow)
        };

        {
            let mut entity = engine.entity_mut(id).unwrap();
            entity.update_component(MutationOptions::forced(), Component::A, json!({"x": 2}));
            entity.update_component(MutationOptions::forced(), Component::B, json!({}));
            assert_eq!(entity.as_readonly().get_data().len(), 2);
        }

        // Earlier reads are not affected by later writes.
        assert_eq!(*shallow, json!({"x": 1}));
        let entity = engine.entity(id).unwrap();
        assert_eq!(
            *entity.get_component(Component::A, CloneDepth::Shallow),
            json!({"x": 2})
        );
        assert_eq!(
            entity
                .get_components(&[Component::A, Component::C], CloneDepth::Shallow)
                .len(),
            1
        );
    }

    #[test]
    fn test_slow_add_threshold_does_not_change_results() {
        let mut engine = TestEngine::with_config(EngineConfig {
            slow_add_threshold: Duration::ZERO,
        });
        let added = engine
            .add_entity(MutationOptions::forced(), vec![spec(&[]), spec(&[])])
            .applied()
            .unwrap();
        assert_eq!(added.len(), 2);
    }
}
