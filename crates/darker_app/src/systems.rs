//! Demo systems for a toy asteroid field.

use anyhow::{Context, Result};
use darker_component::EntityId;
use darker_engine::{CloneDepth, HookContext, Priority, System};
use serde_json::json;
use tracing::{debug, info};

/// Entity types of the demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Ship,
    Asteroid,
}

/// Component kinds of the demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Position,
    Velocity,
    Health,
}

pub type Ctx<'a> = HookContext<'a, Kind, Component>;

/// Moves every entity with a position and a velocity once per update.
#[derive(Debug, Default)]
pub struct Movement {
    moved: u64,
}

impl System<Kind, Component> for Movement {
    fn name(&self) -> &str {
        "movement"
    }

    fn components(&self) -> &[Component] {
        &[Component::Position, Component::Velocity]
    }

    fn on_add(&mut self, ctx: &mut Ctx<'_>, entity: EntityId) -> Result<()> {
        let velocity = ctx
            .store()
            .get_component(entity, Component::Velocity, CloneDepth::Shallow);
        let position = ctx
            .store()
            .get_component(entity, Component::Position, CloneDepth::Shallow);
        let x = position["x"].as_f64().unwrap_or_default()
            + velocity["dx"].as_f64().unwrap_or_default();
        ctx.update_component(entity, Component::Position, json!({ "x": x }), Priority::Low);
        self.moved += 1;
        Ok(())
    }

    fn on_update(
        &mut self,
        _ctx: &mut Ctx<'_>,
        entity: EntityId,
        component: Component,
    ) -> Result<()> {
        debug!(entity = %entity, ?component, "movement: component updated");
        Ok(())
    }

    fn on_destroy(&mut self, _ctx: &mut Ctx<'_>) -> Result<()> {
        info!(moved = self.moved, "movement: destroyed");
        Ok(())
    }
}

/// Removes entities whose health drops to zero.
#[derive(Debug, Default)]
pub struct Damage;

impl System<Kind, Component> for Damage {
    fn name(&self) -> &str {
        "damage"
    }

    fn components(&self) -> &[Component] {
        &[Component::Health]
    }

    fn on_update(
        &mut self,
        ctx: &mut Ctx<'_>,
        entity: EntityId,
        _component: Component,
    ) -> Result<()> {
        let health = ctx
            .store()
            .get_component(entity, Component::Health, CloneDepth::Shallow);
        let hp = health["hp"]
            .as_i64()
            .with_context(|| format!("entity {entity} has no numeric hp"))?;
        if hp <= 0 {
            info!(entity = %entity, "damage: entity destroyed");
            ctx.remove_entity(vec![entity], Priority::High);
        }
        Ok(())
    }
}

/// Logs membership changes for every entity.
#[derive(Debug, Default)]
pub struct Census {
    seen: usize,
}

impl System<Kind, Component> for Census {
    fn name(&self) -> &str {
        "census"
    }

    fn components(&self) -> &[Component] {
        &[]
    }

    fn on_add(&mut self, ctx: &mut Ctx<'_>, entity: EntityId) -> Result<()> {
        self.seen += 1;
        debug!(entity = %entity, kind = ?ctx.entity(entity).map(|e| e.kind), "census: joined");
        Ok(())
    }

    fn on_remove(&mut self, _ctx: &mut Ctx<'_>, entity: EntityId) -> Result<()> {
        debug!(entity = %entity, "census: left");
        Ok(())
    }

    fn on_load(&mut self, ctx: &mut Ctx<'_>) -> Result<()> {
        info!(entities = ctx.store().len(), "census: loaded");
        Ok(())
    }

    fn on_pause(&mut self, _ctx: &mut Ctx<'_>) -> Result<()> {
        info!(seen = self.seen, "census: paused");
        Ok(())
    }

    fn on_resume(&mut self, _ctx: &mut Ctx<'_>) -> Result<()> {
        info!(seen = self.seen, "census: resumed");
        Ok(())
    }
}
