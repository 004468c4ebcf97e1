use std::{any::type_name_of_val, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use custodian_model::IdentityId;
use tracing::debug;

use super::{IdentityLocks, IdentityRecord};
use crate::clock::Clock;
use crate::error::{IdentityError, StoreError};
use crate::repositories::IdentityStore;

/// Commits read-modify-write changes to one identity at a time.
///
/// Every mutation runs under the identity's lock, reloads the stored record,
/// applies the change, stamps `updated_at` and saves with a revision check.
/// A revision conflict (a writer in another process got there first) reloads
/// and reapplies the change, up to the configured number of attempts.
#[derive(Clone)]
pub struct IdentityWriter {
    store: Arc<dyn IdentityStore>,
    locks: Arc<IdentityLocks>,
    clock: Arc<dyn Clock>,
    retry_limit: u32,
}

impl fmt::Debug for IdentityWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityWriter")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("locks", &self.locks.len())
            .field("clock", &self.clock)
            .field("retry_limit", &self.retry_limit)
            .finish()
    }
}

impl IdentityWriter {
    /// `retry_limit` counts attempts and is at least one.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        locks: Arc<IdentityLocks>,
        clock: Arc<dyn Clock>,
        retry_limit: u32,
    ) -> Self {
        Self {
            store,
            locks,
            clock,
            retry_limit: retry_limit.max(1),
        }
    }

    /// Underlying identity store.
    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    /// Per-identity lock table.
    pub fn locks(&self) -> &IdentityLocks {
        &self.locks
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Apply `mutation` to identity `id` and persist the result.
    ///
    /// If `mutation` fails nothing is written. Returns the committed record
    /// together with the mutation's own output.
    pub async fn mutate<T, F>(
        &self,
        id: IdentityId,
        mut mutation: F,
    ) -> Result<(IdentityRecord, T), IdentityError>
    where
        F: FnMut(&mut IdentityRecord) -> Result<T, IdentityError> + Send,
        T: Send,
    {
        let _guard = self.locks.lock(id).await;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut record = self
                .store
                .find_by_id(id)
                .await?
                .ok_or(IdentityError::IdentityNotFound(id))?;

            let output = mutation(&mut record)?;
            record.touch(self.clock.now());

            match self.store.save(&record).await {
                Ok(revision) => {
                    return Ok((record.with_revision(revision), output));
                }
                Err(StoreError::RevisionConflict { expected, found })
                    if attempt < self.retry_limit =>
                {
                    debug!(
                        identity_id = %id,
                        expected,
                        found,
                        attempt,
                        "revision conflict, retrying identity mutation"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
