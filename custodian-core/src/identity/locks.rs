use std::sync::Arc;

use custodian_model::IdentityId;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-identity mutual exclusion for read-modify-write sequences.
///
/// Operations on different identities never contend; two mutations of the
/// same identity run one after the other. Entries only live while someone
/// holds or waits on them, so the table stays as small as the set of
/// identities currently being written.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    entries: DashMap<IdentityId, Arc<Mutex<()>>>,
}

/// Exclusive access to one identity. Releasing it prunes the lock entry
/// unless another task is already waiting on it.
#[derive(Debug)]
pub struct IdentityLockGuard<'a> {
    locks: &'a IdentityLocks,
    id: IdentityId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IdentityLockGuard<'_> {
    /// The identity this guard protects.
    pub fn id(&self) -> IdentityId {
        self.id
    }
}

impl Drop for IdentityLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.forget(self.id);
    }
}

impl IdentityLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn lock(&self, id: IdentityId) -> IdentityLockGuard<'_> {
        let mut held = IdentityLockGuard {
            locks: self,
            id,
            guard: None,
        };
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        held.guard = Some(entry.lock_owned().await);
        held
    }

    /// Drop the lock entry for `id` if nobody holds or waits on it.
    pub fn forget(&self, id: IdentityId) {
        self.entries
            .remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of identities with a live lock entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no identity currently has a lock entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
