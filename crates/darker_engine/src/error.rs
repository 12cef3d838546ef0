//! Engine error types.
//!
//! None of these reach the caller of a mutation: the engine logs store errors
//! and carries on. Only configuration errors are returned, from `load`.

use darker_component::EntityId;

/// Errors raised by the entity/component store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No live entity has this ID.
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// An explicit ID collided with a live entity.
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),
}

/// Errors raised while validating a load configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The tick rate must be a positive, finite number.
    #[error("ticks per second must be positive and finite, got {0}")]
    InvalidTickRate(f64),
}
