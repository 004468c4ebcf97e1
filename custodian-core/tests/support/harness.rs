use std::sync::Arc;

use anyhow::Result;
use custodian_core::{
    IdentityService, PublicIdentity,
    clock::Clock,
    config::{CustodianConfig, HashingConfig},
    identity::{IdentityLocks, NewIdentityRequest},
    infrastructure::{InMemoryIdentityStore, InMemoryTaskStore},
    repositories::{IdentityStore, TaskStore},
};
use tracing_subscriber::EnvFilter;

pub const TEST_SECRET: &str = "integration-test-signing-secret";
pub const TEST_PASSWORD: &str = "CorrectHorseBattery1!";

/// Cheapest Argon2 settings the hasher accepts.
pub fn cheap_hashing() -> HashingConfig {
    HashingConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn test_config() -> CustodianConfig {
    CustodianConfig::new(TEST_SECRET).with_hashing(cheap_hashing())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Identity service wired to in-memory stores the test can inspect.
pub struct TestHarness {
    pub service: IdentityService,
    pub identities: Arc<InMemoryIdentityStore>,
    pub tasks: Arc<InMemoryTaskStore>,
    config: CustodianConfig,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        Self::with_config(test_config())
    }

    pub fn with_config(config: CustodianConfig) -> Result<Self> {
        init_tracing();

        let identities = Arc::new(InMemoryIdentityStore::new());
        let tasks = Arc::new(InMemoryTaskStore::new());
        let service = IdentityService::new(
            config.clone(),
            identities.clone(),
            tasks.clone(),
        )?;

        Ok(Self {
            service,
            identities,
            tasks,
            config,
        })
    }

    /// A second service over the same stores but with its own lock table,
    /// standing in for another process.
    pub fn sibling(&self) -> Result<IdentityService> {
        Ok(IdentityService::builder(
            self.config.clone(),
            self.identities.clone(),
            self.tasks.clone(),
        )
        .with_locks(Arc::new(IdentityLocks::new()))
        .build()?)
    }

    /// Service over the harness stores with a caller-chosen clock.
    pub fn with_clock(&self, clock: Arc<dyn Clock>) -> Result<IdentityService> {
        Ok(IdentityService::builder(
            self.config.clone(),
            self.identities.clone(),
            self.tasks.clone(),
        )
        .with_clock(clock)
        .build()?)
    }

    /// Service over the given stores, sharing nothing with the harness.
    pub fn service_over(
        &self,
        identities: Arc<dyn IdentityStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Result<IdentityService> {
        Ok(IdentityService::new(self.config.clone(), identities, tasks)?)
    }

    pub async fn register(&self, name: &str, email: &str) -> Result<PublicIdentity> {
        let request = NewIdentityRequest::new(name, email, TEST_PASSWORD);
        Ok(self.service.register(&request).await?)
    }
}
