//! # darker_engine
//!
//! The runtime core of the darker ECS: it decides which system cares about
//! which entity, and when a change takes effect.
//!
//! This crate provides:
//!
//! - [`Store`]: entities, their live component sets and payloads.
//! - [`System`]: the hook contract, run inside a [`HookContext`].
//! - [`SystemRegistry`] and [`Membership`]: registration order, the
//!   system/entity index and the index-squared notification order.
//! - [`MutationQueue`]: three FIFO priority tiers of deferred mutations.
//! - [`TickScheduler`]: drift-free fixed-interval timing.
//! - [`Engine`]: the context tying them together, plus the lifecycle
//!   transitions (load, pause, resume, hard reload, destroy, clear).
//! - [`Runtime`]: the `tokio` task that drives the tick loop.

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod queue;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod system;
pub mod tick;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    DEFAULT_SLOW_ADD_THRESHOLD, DEFAULT_TICKS_PER_SECOND, EngineConfig, LoadConfig,
    TickObserver, TickSettings,
};
pub use engine::Engine;
pub use error::{ConfigError, StoreError};
pub use handle::{EntityMut, EntityRef};
pub use lifecycle::{DebugTools, LifecycleState};
pub use queue::{
    ActionCompleted, ActionKind, ActionResult, Dispatch, Mutation, MutationOptions,
    MutationQueue, Priority, QueuedAction,
};
pub use registry::{Membership, RegisteredSystem, SystemRegistry, Weights};
pub use runtime::Runtime;
pub use store::{CloneDepth, Store};
pub use system::{HookCall, HookContext, System};
pub use tick::TickScheduler;
