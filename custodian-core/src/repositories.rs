//! Storage collaborators of the identity core.
//!
//! The core never talks to a database directly. Adapters implement these
//! traits; [`crate::infrastructure::memory`] holds the in-process reference
//! implementations.

use async_trait::async_trait;
use custodian_model::{IdentityId, Task};

use crate::error::StoreError;
use crate::identity::{Email, IdentityRecord};

/// Durable identity record set.
///
/// Implementations must enforce email uniqueness themselves (a unique
/// index, or an equivalent atomic check) so that two concurrent `create` or
/// `save` calls can never both claim the same address.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Load a record, `None` if absent.
    async fn find_by_id(
        &self,
        id: IdentityId,
    ) -> Result<Option<IdentityRecord>, StoreError>;

    /// Look up by an already normalized address.
    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<IdentityRecord>, StoreError>;

    /// Insert a new record, failing with [`StoreError::DuplicateEmail`] if
    /// its address is taken.
    async fn create(&self, record: &IdentityRecord) -> Result<(), StoreError>;

    /// Replace a stored record if it is still at `record.revision()`.
    ///
    /// Returns the new revision. Fails with
    /// [`StoreError::RevisionConflict`] when another writer committed first
    /// and with [`StoreError::DuplicateEmail`] when an email change collides.
    async fn save(&self, record: &IdentityRecord) -> Result<u64, StoreError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, id: IdentityId) -> Result<bool, StoreError>;
}

/// The external task store, as far as identities are concerned.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Delete every task whose owner is `owner`, returning the count.
    async fn delete_all_owned_by(
        &self,
        owner: IdentityId,
    ) -> Result<u64, StoreError>;

    /// Tasks whose owner is `owner`.
    async fn find_all_owned_by(
        &self,
        owner: IdentityId,
    ) -> Result<Vec<Task>, StoreError>;
}
