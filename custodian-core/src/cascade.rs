//! Removal of owned tasks ahead of identity deletion.

use std::sync::Arc;

use custodian_model::{IdentityId, Task};
use tracing::{error, info};

use crate::error::{IdentityError, Result};
use crate::identity::IdentityRecord;
use crate::repositories::TaskStore;

/// Removes the tasks owned by an identity ahead of the identity itself.
#[derive(Clone)]
pub struct CascadeDeletionHook {
    tasks: Arc<dyn TaskStore>,
}

impl std::fmt::Debug for CascadeDeletionHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeDeletionHook")
            .field("tasks", &std::any::type_name_of_val(self.tasks.as_ref()))
            .finish()
    }
}

impl CascadeDeletionHook {
    /// Hook delegating to `tasks`.
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }

    /// Delete every task owned by `identity`, returning how many went.
    ///
    /// An error here must stop the identity from being removed.
    pub async fn before_delete(&self, identity: &IdentityRecord) -> Result<u64> {
        let identity_id = identity.id();

        match self.tasks.delete_all_owned_by(identity_id).await {
            Ok(removed) => {
                info!(identity_id = %identity_id, removed, "owned tasks removed");
                Ok(removed)
            }
            Err(source) => {
                error!(
                    identity_id = %identity_id,
                    error = %source,
                    "failed to remove owned tasks"
                );
                Err(IdentityError::CascadeFailure {
                    identity_id,
                    source,
                })
            }
        }
    }

    /// Tasks currently owned by `identity_id`.
    pub async fn owned_tasks(&self, identity_id: IdentityId) -> Result<Vec<Task>> {
        Ok(self.tasks.find_all_owned_by(identity_id).await?)
    }
}
