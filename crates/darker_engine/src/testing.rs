//! Shared fixtures for the engine's unit tests.

use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use darker_component::{EntityId, SystemId};

use crate::engine::Engine;
use crate::system::{HookCall, HookContext, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Component {
    A,
    B,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kind {
    Unit,
    Prop,
}

pub(crate) type TestEngine = Engine<Kind, Component>;

/// Hook calls as `"<system>:<call>"`, e.g. `"s1:onAdd(3)"`.
pub(crate) type Log = Arc<Mutex<Vec<String>>>;

pub(crate) fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

/// A system that records every hook call and can be told to fail.
pub(crate) struct Recorder {
    pub id: Option<SystemId>,
    pub name: String,
    pub components: Vec<Component>,
    pub log: Log,
    pub fail: bool,
}

impl Recorder {
    pub(crate) fn new(name: &str, components: &[Component], log: &Log) -> Self {
        Self {
            id: None,
            name: name.to_owned(),
            components: components.to_vec(),
            log: Arc::clone(log),
            fail: false,
        }
    }

    pub(crate) fn with_id(mut self, id: u64) -> Self {
        self.id = Some(SystemId(id));
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn boxed(self) -> Box<dyn System<Kind, Component>> {
        Box::new(self)
    }

    fn record(&self, call: HookCall<Component>) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{call}", self.name));
        if self.fail {
            bail!("{} refused {call}", self.name);
        }
        Ok(())
    }
}

impl System<Kind, Component> for Recorder {
    fn id(&self) -> Option<SystemId> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn components(&self) -> &[Component] {
        &self.components
    }

    fn on_add(
        &mut self,
        _ctx: &mut HookContext<'_, Kind, Component>,
        entity: EntityId,
    ) -> Result<()> {
        self.record(HookCall::Add(entity))
    }

    fn on_update(
        &mut self,
        _ctx: &mut HookContext<'_, Kind, Component>,
        entity: EntityId,
        component: Component,
    ) -> Result<()> {
        self.record(HookCall::Update(entity, component))
    }

    fn on_remove(
        &mut self,
        ctx: &mut HookContext<'_, Kind, Component>,
        entity: EntityId,
    ) -> Result<()> {
        // Removal hooks run while the entity is still a member.
        if let Some(id) = self.id {
            assert!(ctx.members(id).contains(&entity));
        }
        self.record(HookCall::Remove(entity))
    }

    fn on_load(&mut self, _ctx: &mut HookContext<'_, Kind, Component>) -> Result<()> {
        self.record(HookCall::Load)
    }

    fn on_pause(&mut self, _ctx: &mut HookContext<'_, Kind, Component>) -> Result<()> {
        self.record(HookCall::Pause)
    }

    fn on_resume(&mut self, _ctx: &mut HookContext<'_, Kind, Component>) -> Result<()> {
        self.record(HookCall::Resume)
    }

    fn on_destroy(&mut self, _ctx: &mut HookContext<'_, Kind, Component>) -> Result<()> {
        self.record(HookCall::Destroy)
    }
}
