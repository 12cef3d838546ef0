//! Whole-engine lifecycle transitions.
//!
//! ```text
//! Unloaded --load--> Running <--pause/resume--> Paused
//!     ^                  |                        |
//!     +------clear/destroy-----------------------+
//! ```
//!
//! Hard reload and the debug hot swap are orthogonal: they rebuild system
//! hook bindings without touching the entity store or the state.

use darker_component::{ComponentKind, EntityId, EntityKind, SystemId};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::LoadConfig;
use crate::engine::Engine;
use crate::error::ConfigError;
use crate::registry::RegisteredSystem;
use crate::system::{HookCall, System};
use crate::tick::TickScheduler;

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Not loaded; the tick loop is stopped.
    #[default]
    Unloaded,
    /// Loaded; the tick loop drains the queue.
    Running,
    /// Loaded but paused; queued actions wait.
    Paused,
}

impl<T: EntityKind, K: ComponentKind> Engine<T, K> {
    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Start the tick loop and call every system's `on_load`.
    ///
    /// Loading an engine that is already loaded logs a warning and does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTickRate`] if the configured rate does
    /// not give a usable tick interval. The engine stays unloaded.
    pub fn load(&mut self, config: LoadConfig<T>) -> Result<(), ConfigError> {
        if self.state != LifecycleState::Unloaded {
            warn!(state = ?self.state, "load: engine already loaded");
            return Ok(());
        }
        let interval = config.settings.interval()?;

        self.scheduler = Some(TickScheduler::new(interval, Instant::now()));
        self.on_tick = config.on_tick;
        self.state = LifecycleState::Running;
        info!(
            ticks_per_second = config.settings.ticks_per_second,
            systems = self.registry.len(),
            entities = self.store.len(),
            "engine loaded"
        );

        self.broadcast(HookCall::Load);
        Ok(())
    }

    /// Pause the tick loop and call every system's `on_pause`.
    ///
    /// Returns `false`, after logging a warning, unless the engine was
    /// running.
    pub fn pause(&mut self) -> bool {
        if self.state != LifecycleState::Running {
            warn!(state = ?self.state, "pause: engine not running");
            return false;
        }
        self.state = LifecycleState::Paused;
        info!(queued = self.queue.len(), "engine paused");
        self.broadcast(HookCall::Pause);
        true
    }

    /// Resume the tick loop and call every system's `on_resume`.
    ///
    /// The tick grid restarts from now. Returns `false`, after logging a
    /// warning, unless the engine was paused.
    pub fn resume(&mut self) -> bool {
        if self.state != LifecycleState::Paused {
            warn!(state = ?self.state, "resume: engine not paused");
            return false;
        }
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.restart(Instant::now());
        }
        self.state = LifecycleState::Running;
        info!(queued = self.queue.len(), "engine resumed");
        self.broadcast(HookCall::Resume);
        true
    }

    /// Tear down and rebuild every system's hook bindings.
    ///
    /// Systems are torn down in reverse registration order (`on_remove` for
    /// each member, newest first, then `on_destroy`), then rebuilt in
    /// registration order (`on_load`, then `on_add` for each former member
    /// in its original order). Membership ends up as it was.
    pub fn hard_reload(&mut self) {
        let snapshot: Vec<(usize, Vec<EntityId>)> = self
            .registry
            .iter()
            .enumerate()
            .map(|(index, system)| (index, self.membership.members(system.id()).to_vec()))
            .collect();
        info!(systems = snapshot.len(), "hard reload");

        for (index, members) in snapshot.iter().rev() {
            self.teardown_system(*index, members);
        }
        for (index, members) in &snapshot {
            self.rebuild_system(*index, members);
        }
    }

    /// Call every system's `on_destroy` in reverse registration order, then
    /// [`clear`](Self::clear).
    pub fn destroy(&mut self) {
        for index in (0..self.registry.len()).rev() {
            self.dispatch(index, HookCall::Destroy);
        }
        self.clear();
    }

    /// Stop the tick loop and drop every system, entity, index and queued
    /// action. Identifier counters restart.
    pub fn clear(&mut self) {
        self.state = LifecycleState::Unloaded;
        self.scheduler = None;
        self.on_tick = None;
        self.registry.clear();
        self.membership.clear();
        self.store.clear();
        self.queue.clear();
        self.ids.reset();
        info!("engine cleared");
    }

    /// Debugging utilities.
    pub fn debug(&mut self) -> DebugTools<'_, T, K> {
        DebugTools { engine: self }
    }

    /// Invoke one argument-less hook on every system, in registration order.
    fn broadcast(&mut self, call: HookCall<K>) {
        for index in 0..self.registry.len() {
            self.dispatch(index, call);
        }
    }

    fn teardown_system(&mut self, index: usize, members: &[EntityId]) {
        let Some(id) = self.registry.at(index).map(RegisteredSystem::id) else {
            return;
        };
        for &entity in members.iter().rev() {
            self.dispatch(index, HookCall::Remove(entity));
            self.membership.remove(id, entity);
        }
        self.dispatch(index, HookCall::Destroy);
    }

    fn rebuild_system(&mut self, index: usize, members: &[EntityId]) {
        let Some(id) = self.registry.at(index).map(RegisteredSystem::id) else {
            return;
        };
        self.dispatch(index, HookCall::Load);
        for &entity in members {
            if !self.store.contains(entity) {
                continue;
            }
            self.membership.insert(id, entity);
            self.dispatch(index, HookCall::Add(entity));
        }
    }
}

/// Debug-only access to single systems.
pub struct DebugTools<'a, T, K> {
    engine: &'a mut Engine<T, K>,
}

impl<T: EntityKind, K: ComponentKind> DebugTools<'_, T, K> {
    /// Hot swap one system's implementation.
    ///
    /// The old implementation sees `on_remove` for each member (newest
    /// first) and `on_destroy`. The replacement built by `factory` takes the
    /// old ID and name, sees `on_load`, then `on_add` for each former member
    /// in its original order. Returns `false` if no system has this ID.
    pub fn swap_system<F>(&mut self, id: SystemId, factory: F) -> bool
    where
        F: FnOnce() -> Box<dyn System<T, K>>,
    {
        let engine = &mut *self.engine;
        let Some(index) = engine.registry.position(id) else {
            warn!(system = %id, "swapSystem: system not found");
            return false;
        };
        let members = engine.membership.members(id).to_vec();
        debug!(system = %id, members = members.len(), "swapping system");

        engine.teardown_system(index, &members);
        let replacement = factory();
        if let Some(current) = engine.registry.at(index) {
            let required = replacement.components();
            let same = required.len() == current.components().len()
                && required.iter().all(|c| current.components().contains(c));
            if !same {
                warn!(
                    system = %id,
                    old = ?current.components(),
                    new = ?required,
                    members = members.len(),
                    "swapSystem: replacement requires different components, keeping membership"
                );
            }
        }
        engine.registry.replace(index, replacement);
        engine.rebuild_system(index, &members);
        true
    }

    /// Returns the first system registered under `name`.
    #[must_use]
    pub fn get_system(&self, name: &str) -> Option<&RegisteredSystem<T, K>> {
        self.engine.registry.find_by_name(name)
    }
}
