//! # darker_component
//!
//! The vocabulary shared by every part of the darker ECS runtime.
//!
//! This crate provides:
//!
//! - [`EntityId`], [`SystemId`], [`ActionId`]: lightweight `u64` identifiers.
//! - [`IdAllocator`]: monotonically increasing IDs per [`IdSpace`], with a
//!   high "safe" band for callers that also assign IDs by hand.
//! - [`EntitySpec`]: the declaration of an entity before it is stored.
//! - [`Entity`]: the handle returned once an entity lives in the store.
//! - [`payload`]: helpers for the opaque JSON component payloads.

pub mod entity;
pub mod id;
pub mod kind;
pub mod payload;

pub use entity::{Entity, EntitySpec};
pub use id::{ActionId, EntityId, IdAllocator, IdSpace, SAFE_ID_OFFSET, SystemId};
pub use kind::{ComponentKind, EntityKind};
