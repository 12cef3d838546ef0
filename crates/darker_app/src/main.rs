//! # darker_app
//!
//! Demo host for the darker ECS runtime. It registers a few toy systems,
//! spawns an asteroid field through the priority queue, and lets the tick
//! loop drain it for a while before tearing everything down.
//!
//! ## Configuration
//!
//! Settings come from an optional JSON file (`--config`), then from command
//! line flags, which win:
//!
//! ```json
//! { "ticks_per_second": 30, "entities": 12 }
//! ```

mod systems;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use darker_component::EntitySpec;
use darker_engine::{
    CloneDepth, Engine, LifecycleState, LoadConfig, MutationOptions, Priority, Runtime, System,
    TickSettings,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use systems::{Census, Component, Damage, Kind, Movement};

#[derive(Parser)]
#[command(name = "darker_app", about = "Run the darker ECS demo")]
struct Args {
    /// Path to a JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scheduler iterations per second
    #[arg(short, long)]
    ticks_per_second: Option<f64>,

    /// Number of asteroids to spawn
    #[arg(short, long)]
    entities: Option<usize>,

    /// How long to run before shutting down, in seconds
    #[arg(short, long, default_value_t = 2.0)]
    run_secs: f64,
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoSettings {
    #[serde(flatten)]
    tick: TickSettings,
    entities: Option<usize>,
}

const DEFAULT_ENTITIES: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "darker_app=info,darker_engine=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut settings = match &args.config {
        Some(path) => load_settings(path)?,
        None => DemoSettings::default(),
    };
    if let Some(rate) = args.ticks_per_second {
        settings.tick.ticks_per_second = rate;
    }
    let entities = args.entities.or(settings.entities).unwrap_or(DEFAULT_ENTITIES);
    info!(
        ticks_per_second = settings.tick.ticks_per_second,
        entities,
        run_secs = args.run_secs,
        "darker demo starting"
    );

    let mut engine = Engine::new();
    engine.set_systems([
        Box::new(Movement::default()) as Box<dyn System<Kind, Component>>,
        Box::new(Damage),
        Box::new(Census::default()),
    ]);
    spawn_field(&mut engine, entities);

    let mut runtime = Runtime::new(engine);
    let config = LoadConfig::from_settings(settings.tick).on_tick(|status| {
        if let Some(completed) = status {
            debug!(action = %completed.action_id, kind = ?completed.kind, "action drained");
        }
    });
    runtime.load(config).await?;

    let run_for = Duration::from_secs_f64(args.run_secs.max(0.0));
    tokio::time::sleep(run_for / 2).await;

    runtime.pause().await;
    damage_everything(&runtime).await;
    runtime.hard_reload().await;
    runtime.resume().await;

    tokio::time::sleep(run_for / 2).await;

    {
        let engine = runtime.lock().await;
        if engine.state() != LifecycleState::Running {
            warn!(state = ?engine.state(), "engine stopped early");
        }
        info!(
            entities = engine.entity_list().len(),
            ships = engine.entity_list_by_type(Kind::Ship).len(),
            queued = engine.queue_len(),
            "demo finished"
        );
    }

    runtime.destroy().await;
    info!("darker demo shut down");
    Ok(())
}

fn load_settings(path: &Path) -> Result<DemoSettings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing settings in {}", path.display()))
}

/// Queue one ship immediately and a field of asteroids behind it.
fn spawn_field(engine: &mut Engine<Kind, Component>, count: usize) {
    let ship = EntitySpec::new(Kind::Ship)
        .safe()
        .with(Component::Position, json!({ "x": 0.0 }))
        .with(Component::Velocity, json!({ "dx": 1.0 }))
        .with(Component::Health, json!({ "hp": 10 }));
    engine.add_entity(MutationOptions::forced(), vec![ship]);

    let asteroids = (0..count)
        .map(|i| {
            EntitySpec::new(Kind::Asteroid)
                .with(Component::Position, json!({ "x": i as f64 * 10.0 }))
                .with(Component::Health, json!({ "hp": (i % 3) as i64 }))
        })
        .collect();
    engine.add_entity(MutationOptions::queued(Priority::Medium), asteroids);
}

/// Queue one point of damage for every entity with health.
async fn damage_everything(runtime: &Runtime<Kind, Component>) {
    let mut engine = runtime.lock().await;
    for entity in engine.entity_list_by_components(&[Component::Health]) {
        let hp = engine
            .store()
            .get_component(entity.id, Component::Health, CloneDepth::Shallow)["hp"]
            .as_i64()
            .unwrap_or_default();
        engine.update_component(
            MutationOptions::queued(Priority::Low),
            entity.id,
            Component::Health,
            json!({ "hp": hp - 1 }),
        );
    }
}
