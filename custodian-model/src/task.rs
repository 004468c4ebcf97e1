//! Tasks owned by identities.

use crate::ids::{IdentityId, TaskId};

/// A task owned by an identity.
///
/// Tasks live in an external store; the identity core only ever refers to
/// them through `owner` when listing or cascading a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    /// Task id.
    pub id: TaskId,
    /// Identity whose deletion removes this task.
    pub owner: IdentityId,
    /// Free-form text.
    pub description: String,
    /// Whether the task is done.
    pub completed: bool,
}

impl Task {
    /// Create an incomplete task for `owner`.
    pub fn new(owner: IdentityId, description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            owner,
            description: description.into(),
            completed: false,
        }
    }

    /// Whether `owner` owns this task.
    pub fn is_owned_by(&self, owner: IdentityId) -> bool {
        self.owner == owner
    }
}
