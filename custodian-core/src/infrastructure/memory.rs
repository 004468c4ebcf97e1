//! In-process stores.
//!
//! Both keep their whole state behind a single lock, which makes the email
//! uniqueness check and the revision compare-and-set atomic with the write
//! that follows them.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use custodian_model::{IdentityId, Task, TaskId};
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;
use crate::identity::{Email, IdentityRecord};
use crate::repositories::{IdentityStore, TaskStore};

#[derive(Debug, Default)]
struct IdentityTable {
    records: HashMap<IdentityId, IdentityRecord>,
    by_email: HashMap<Email, IdentityId>,
}

/// Identity store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    table: RwLock<IdentityTable>,
}

impl InMemoryIdentityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.table.read().await.records.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.records.is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_id(
        &self,
        id: IdentityId,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.table.read().await.records.get(&id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .by_email
            .get(email)
            .and_then(|id| table.records.get(id))
            .cloned())
    }

    async fn create(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let mut table = self.table.write().await;

        if table.by_email.contains_key(record.email()) {
            return Err(StoreError::DuplicateEmail);
        }
        if table.records.contains_key(&record.id()) {
            return Err(StoreError::Backend(anyhow!(
                "identity {} already exists",
                record.id()
            )));
        }

        table.by_email.insert(record.email().clone(), record.id());
        table.records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn save(&self, record: &IdentityRecord) -> Result<u64, StoreError> {
        let mut table = self.table.write().await;

        let (found, previous_email) = match table.records.get(&record.id()) {
            Some(stored) => (stored.revision(), stored.email().clone()),
            None => return Err(StoreError::NotFound(record.id())),
        };

        if found != record.revision() {
            return Err(StoreError::RevisionConflict {
                expected: record.revision(),
                found,
            });
        }

        if &previous_email != record.email() {
            if let Some(owner) = table.by_email.get(record.email())
                && *owner != record.id()
            {
                return Err(StoreError::DuplicateEmail);
            }
            table.by_email.remove(&previous_email);
            table.by_email.insert(record.email().clone(), record.id());
        }

        let revision = found + 1;
        table
            .records
            .insert(record.id(), record.clone().with_revision(revision));
        Ok(revision)
    }

    async fn delete(&self, id: IdentityId) -> Result<bool, StoreError> {
        let mut table = self.table.write().await;
        match table.records.remove(&id) {
            Some(record) => {
                table.by_email.remove(record.email());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Task store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl InMemoryTaskStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task.
    pub async fn insert(&self, task: Task) {
        self.tasks.lock().await.insert(task.id, task);
    }

    /// Task by id, if present.
    pub async fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().await.get(&id).cloned()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn delete_all_owned_by(
        &self,
        owner: IdentityId,
    ) -> Result<u64, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let initial = tasks.len();
        tasks.retain(|_, task| !task.is_owned_by(owner));
        Ok((initial - tasks.len()) as u64)
    }

    async fn find_all_owned_by(
        &self,
        owner: IdentityId,
    ) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.lock().await;
        let mut owned: Vec<Task> = tasks
            .values()
            .filter(|task| task.is_owned_by(owner))
            .cloned()
            .collect();
        owned.sort_by_key(|task| task.id);
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{NewIdentity, NewIdentityRequest};
    use chrono::Utc;

    fn record(email: &str) -> IdentityRecord {
        NewIdentity::validate(&NewIdentityRequest::new(
            "Test",
            email,
            "a-valid-pw",
        ))
        .unwrap()
        .activate("$argon2id$stub".into(), Utc::now())
    }

    #[tokio::test]
    async fn create_enforces_email_uniqueness() {
        let store = InMemoryIdentityStore::new();
        store.create(&record("ada@example.com")).await.unwrap();

        let result = store.create(&record("ADA@example.com")).await;
        assert!(matches!(result, Err(StoreError::DuplicateEmail)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn save_checks_revision() {
        let store = InMemoryIdentityStore::new();
        let original = record("ada@example.com");
        store.create(&original).await.unwrap();

        let revision = store.save(&original).await.unwrap();
        assert_eq!(revision, 1);

        let stale = store.save(&original).await;
        assert!(matches!(
            stale,
            Err(StoreError::RevisionConflict { expected: 0, found: 1 })
        ));
    }

    #[tokio::test]
    async fn save_moves_email_index() {
        let store = InMemoryIdentityStore::new();
        let mut ada = record("ada@example.com");
        let grace = record("grace@example.com");
        store.create(&ada).await.unwrap();
        store.create(&grace).await.unwrap();

        ada.change_email(Email::parse("grace@example.com").unwrap());
        assert!(matches!(
            store.save(&ada).await,
            Err(StoreError::DuplicateEmail)
        ));

        ada.change_email(Email::parse("countess@example.com").unwrap());
        store.save(&ada).await.unwrap();

        let old = Email::parse("ada@example.com").unwrap();
        let new = Email::parse("countess@example.com").unwrap();
        assert!(store.find_by_email(&old).await.unwrap().is_none());
        assert_eq!(
            store.find_by_email(&new).await.unwrap().unwrap().id(),
            ada.id()
        );
    }

    #[tokio::test]
    async fn delete_frees_the_email() {
        let store = InMemoryIdentityStore::new();
        let ada = record("ada@example.com");
        store.create(&ada).await.unwrap();

        assert!(store.delete(ada.id()).await.unwrap());
        assert!(!store.delete(ada.id()).await.unwrap());
        store.create(&record("ada@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn task_cascade_only_touches_owner() {
        let tasks = InMemoryTaskStore::new();
        let owner = IdentityId::new();
        let other = IdentityId::new();
        tasks.insert(Task::new(owner, "one")).await;
        tasks.insert(Task::new(owner, "two")).await;
        let kept = Task::new(other, "three");
        tasks.insert(kept.clone()).await;

        assert_eq!(tasks.find_all_owned_by(owner).await.unwrap().len(), 2);
        assert_eq!(tasks.delete_all_owned_by(owner).await.unwrap(), 2);
        assert_eq!(tasks.len().await, 1);
        assert_eq!(tasks.get(kept.id).await, Some(kept));
    }
}
