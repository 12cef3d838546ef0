//! Deferred mutations and the three-tier priority queue.
//!
//! Every mutation can either be forced (applied synchronously) or queued.
//! Queued mutations wait in one of three FIFO tiers until the scheduler
//! drains them, one per tick, highest tier first.

use std::collections::VecDeque;

use darker_component::{ActionId, ComponentKind, Entity, EntityId, EntitySpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Queue tier of a deferred mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Drained before everything else.
    High,
    /// The default tier.
    #[default]
    Medium,
    /// Drained only when the other tiers are empty.
    Low,
}

/// The kind of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Add a batch of entities.
    AddEntity,
    /// Remove a batch of entities.
    RemoveEntity,
    /// Attach a component.
    AddComponent,
    /// Update (or add) a component.
    UpdateComponent,
    /// Remove a component.
    RemoveComponent,
}

/// A mutation request.
#[derive(Debug, Clone)]
pub enum Mutation<T, K> {
    /// Add a batch of entities.
    AddEntity(Vec<EntitySpec<T, K>>),
    /// Remove a batch of entities.
    RemoveEntity(Vec<EntityId>),
    /// Attach a component, replacing its payload if already attached.
    AddComponent {
        /// Target entity.
        entity: EntityId,
        /// Target component.
        component: K,
        /// Initial payload.
        data: Value,
    },
    /// Merge data into a component, attaching it if missing.
    UpdateComponent {
        /// Target entity.
        entity: EntityId,
        /// Target component.
        component: K,
        /// Payload to merge.
        data: Value,
    },
    /// Detach a component.
    RemoveComponent {
        /// Target entity.
        entity: EntityId,
        /// Target component.
        component: K,
    },
}

impl<T, K: ComponentKind> Mutation<T, K> {
    /// Returns the kind of this mutation.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Mutation::AddEntity(_) => ActionKind::AddEntity,
            Mutation::RemoveEntity(_) => ActionKind::RemoveEntity,
            Mutation::AddComponent { .. } => ActionKind::AddComponent,
            Mutation::UpdateComponent { .. } => ActionKind::UpdateComponent,
            Mutation::RemoveComponent { .. } => ActionKind::RemoveComponent,
        }
    }
}

/// A mutation waiting in the queue.
#[derive(Debug, Clone)]
pub struct QueuedAction<T, K> {
    /// Auto-incrementing action ID.
    pub id: ActionId,
    /// The tier the action waits in.
    pub priority: Priority,
    /// The deferred mutation.
    pub mutation: Mutation<T, K>,
}

/// What applying a mutation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult<T> {
    /// The entities that were added.
    Added(Vec<Entity<T>>),
    /// The IDs that were live and have been removed.
    Removed(Vec<EntityId>),
    /// The entity that gained the component, `None` if it was not live.
    ComponentAdded(Option<Entity<T>>),
    /// The updated entity, `None` if it was not live.
    Updated(Option<Entity<T>>),
    /// The entity whose component was removed, `None` if it was not live.
    ComponentRemoved(Option<Entity<T>>),
}

/// Report of a drained action, passed to the tick observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCompleted<T> {
    /// The drained action's ID.
    pub action_id: ActionId,
    /// The drained action's kind.
    pub kind: ActionKind,
    /// What applying it produced.
    pub result: ActionResult<T>,
}

/// How a mutation call is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationOptions {
    /// Apply synchronously, bypassing the queue.
    pub force: bool,
    /// Queue tier when not forced.
    pub priority: Priority,
}

impl MutationOptions {
    /// Apply synchronously.
    #[must_use]
    pub fn forced() -> Self {
        Self {
            force: true,
            priority: Priority::default(),
        }
    }

    /// Queue at the given tier.
    #[must_use]
    pub fn queued(priority: Priority) -> Self {
        Self {
            force: false,
            priority,
        }
    }
}

/// Outcome of a mutation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch<R> {
    /// The mutation was forced; this is its result.
    Applied(R),
    /// The mutation was queued under this action ID.
    Queued(ActionId),
}

impl<R> Dispatch<R> {
    /// Returns the result of a forced mutation.
    #[must_use]
    pub fn applied(self) -> Option<R> {
        match self {
            Dispatch::Applied(result) => Some(result),
            Dispatch::Queued(_) => None,
        }
    }

    /// Returns the action ID of a queued mutation.
    #[must_use]
    pub fn action_id(&self) -> Option<ActionId> {
        match self {
            Dispatch::Applied(_) => None,
            Dispatch::Queued(id) => Some(*id),
        }
    }
}

/// Three FIFO tiers of queued actions.
#[derive(Debug)]
pub struct MutationQueue<T, K> {
    high: VecDeque<QueuedAction<T, K>>,
    medium: VecDeque<QueuedAction<T, K>>,
    low: VecDeque<QueuedAction<T, K>>,
}

impl<T, K: ComponentKind> MutationQueue<T, K> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            high: VecDeque::new(),
            medium: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    /// Append an action to the tail of its tier. Returns its ID.
    pub fn push(&mut self, action: QueuedAction<T, K>) -> ActionId {
        let id = action.id;
        self.tier_mut(action.priority).push_back(action);
        id
    }

    /// Pop the oldest action of the highest non-empty tier.
    pub fn pop(&mut self) -> Option<QueuedAction<T, K>> {
        self.high
            .pop_front()
            .or_else(|| self.medium.pop_front())
            .or_else(|| self.low.pop_front())
    }

    /// Total number of queued actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    /// Number of actions queued in one tier.
    #[must_use]
    pub fn len_of(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high.len(),
            Priority::Medium => self.medium.len(),
            Priority::Low => self.low.len(),
        }
    }

    /// Returns `true` if every tier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued action.
    pub fn clear(&mut self) {
        self.high.clear();
        self.medium.clear();
        self.low.clear();
    }

    fn tier_mut(&mut self, priority: Priority) -> &mut VecDeque<QueuedAction<T, K>> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
        }
    }
}

impl<T, K: ComponentKind> Default for MutationQueue<T, K> {
    fn default() -> Self {
        Self::new()
    }
}
