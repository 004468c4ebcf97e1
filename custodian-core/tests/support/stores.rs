use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodian_core::{
    IdentityId, StoreError, Task,
    clock::Clock,
    identity::{Email, IdentityRecord},
    repositories::{IdentityStore, TaskStore},
};

/// Task store whose backend is always down.
#[derive(Debug, Default)]
pub struct UnavailableTaskStore;

#[async_trait]
impl TaskStore for UnavailableTaskStore {
    async fn delete_all_owned_by(
        &self,
        _owner: IdentityId,
    ) -> Result<u64, StoreError> {
        Err(StoreError::Backend(anyhow!("task store unavailable")))
    }

    async fn find_all_owned_by(
        &self,
        _owner: IdentityId,
    ) -> Result<Vec<Task>, StoreError> {
        Err(StoreError::Backend(anyhow!("task store unavailable")))
    }
}

/// Wraps an identity store and fails the next `n` deletes.
#[derive(Debug)]
pub struct FlakyDeleteStore<S> {
    inner: Arc<S>,
    failures_left: AtomicU32,
    delete_calls: AtomicU32,
}

impl<S> FlakyDeleteStore<S> {
    pub fn new(inner: Arc<S>, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
            delete_calls: AtomicU32::new(0),
        }
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: IdentityStore> IdentityStore for FlakyDeleteStore<S> {
    async fn find_by_id(
        &self,
        id: IdentityId,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        self.inner.find_by_email(email).await
    }

    async fn create(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        self.inner.create(record).await
    }

    async fn save(&self, record: &IdentityRecord) -> Result<u64, StoreError> {
        self.inner.save(record).await
    }

    async fn delete(&self, id: IdentityId) -> Result<bool, StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();

        if failing {
            return Err(StoreError::Backend(anyhow!("delete timed out")));
        }
        self.inner.delete(id).await
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
