//! Marker traits for the host's entity types and component kinds.
//!
//! The core never interprets either; it only compares, hashes and logs them.
//! Hosts normally use small field-less enums.

use std::fmt::Debug;
use std::hash::Hash;

/// The classification tag of an entity (e.g. `Player`, `Mob`).
pub trait EntityKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> EntityKind for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

/// The name of a component (e.g. `Position`, `Health`).
pub trait ComponentKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> ComponentKind for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}
