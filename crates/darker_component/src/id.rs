//! Identifier types and allocation.
//!
//! Every identifier is a plain `u64` newtype. IDs are handed out by an
//! [`IdAllocator`], which keeps an independent pair of counters for each
//! [`IdSpace`]: a normal band starting at 1 and a "safe" band starting above
//! [`SAFE_ID_OFFSET`].

use serde::{Deserialize, Serialize};

/// Start of the safe identifier band.
///
/// IDs allocated with `safe = true` are always greater than this value, so a
/// host can assign small IDs by hand without colliding with allocated ones.
pub const SAFE_ID_OFFSET: u64 = 1_000_000_000;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Create an identifier from a raw `u64`.
            #[must_use]
            pub const fn from_raw(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw `u64` identifier.
            #[must_use]
            pub const fn id(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

id_type!(
    /// A unique entity identifier. Never reused while the entity is live.
    EntityId,
    "Entity"
);

id_type!(
    /// A system identifier, either declared by the system or allocated at
    /// registration.
    SystemId,
    "System"
);

id_type!(
    /// Identifier of a queued mutation action.
    ActionId,
    "Action"
);

/// The independent identifier spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdSpace {
    /// Entity IDs.
    Entity,
    /// System IDs.
    System,
    /// Internal IDs, used for queued mutation actions.
    Internal,
}

impl IdSpace {
    const fn index(self) -> usize {
        match self {
            IdSpace::Entity => 0,
            IdSpace::System => 1,
            IdSpace::Internal => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    normal: u64,
    safe: u64,
}

/// Allocates monotonically increasing IDs, one counter pair per [`IdSpace`].
#[derive(Debug, Default)]
pub struct IdAllocator {
    spaces: [Counters; 3],
}

impl IdAllocator {
    /// Creates a new allocator. Normal IDs start at 1, safe IDs at
    /// `SAFE_ID_OFFSET + 1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next raw ID in `space`.
    pub fn next(&mut self, space: IdSpace, safe: bool) -> u64 {
        self.next_free(space, safe, |_| false)
    }

    /// Allocates the next raw ID in `space`, skipping every value for which
    /// `taken` returns `true`.
    pub fn next_free(&mut self, space: IdSpace, safe: bool, taken: impl Fn(u64) -> bool) -> u64 {
        let counters = &mut self.spaces[space.index()];
        let (counter, base) = if safe {
            (&mut counters.safe, SAFE_ID_OFFSET)
        } else {
            (&mut counters.normal, 0)
        };
        loop {
            *counter += 1;
            let id = base + *counter;
            if !taken(id) {
                return id;
            }
        }
    }

    /// Allocates an entity ID that is not currently `taken`.
    pub fn entity_id(&mut self, safe: bool, taken: impl Fn(EntityId) -> bool) -> EntityId {
        EntityId(self.next_free(IdSpace::Entity, safe, |raw| taken(EntityId(raw))))
    }

    /// Allocates a system ID that is not currently `taken`.
    pub fn system_id(&mut self, taken: impl Fn(SystemId) -> bool) -> SystemId {
        SystemId(self.next_free(IdSpace::System, false, |raw| taken(SystemId(raw))))
    }

    /// Allocates an action ID.
    pub fn action_id(&mut self) -> ActionId {
        ActionId(self.next(IdSpace::Internal, false))
    }

    /// Resets every counter so allocation restarts at 1.
    pub fn reset(&mut self) {
        self.spaces = Default::default();
    }
}
