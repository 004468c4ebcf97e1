//! The identity service: the entry point request handlers call.

use std::{any::type_name_of_val, fmt, sync::Arc, time::Duration};

use custodian_model::{IdentityId, PublicIdentity, Task};
use tracing::{error, info, instrument, warn};

use crate::authenticator::Authenticator;
use crate::cascade::CascadeDeletionHook;
use crate::clock::{Clock, SystemClock};
use crate::config::CustodianConfig;
use crate::credentials::CredentialStore;
use crate::error::{IdentityError, Result, StoreError};
use crate::identity::{
    Age, DeletionReceipt, Email, IdentityLocks, IdentityWriter, Name,
    NewIdentity, NewIdentityRequest, Password,
};
use crate::repositories::{IdentityStore, TaskStore};
use crate::serializer::PublicView;
use crate::tokens::{TokenLedger, TokenSigner};

/// A successful login: the public view of the identity plus its new token.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// The authenticated identity.
    pub identity: PublicIdentity,
    /// Bearer token for later requests.
    pub token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Partial profile change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New age.
    pub age: Option<i64>,
}

impl ProfileUpdate {
    /// Set the new display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the new email address.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the new age.
    pub fn age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.age.is_none()
    }
}

struct ValidatedProfile {
    name: Option<Name>,
    email: Option<Email>,
    age: Option<Age>,
}

impl ProfileUpdate {
    fn validate(&self) -> Result<ValidatedProfile> {
        Ok(ValidatedProfile {
            name: self.name.as_deref().map(Name::parse).transpose()?,
            email: self.email.as_deref().map(Email::parse).transpose()?,
            age: self.age.map(Age::new).transpose()?,
        })
    }
}

/// Owns the lifecycle of identities, their credentials and their sessions.
///
/// Records returned to callers are always [`PublicIdentity`] views; the
/// internal [`IdentityRecord`](crate::identity::IdentityRecord) never leaves
/// this type.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn IdentityStore>,
    credentials: Arc<CredentialStore>,
    writer: IdentityWriter,
    ledger: TokenLedger,
    authenticator: Authenticator,
    cascade: CascadeDeletionHook,
    clock: Arc<dyn Clock>,
    retry_limit: u32,
}

impl fmt::Debug for IdentityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityService")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("credentials", &self.credentials)
            .field("ledger", &self.ledger)
            .field("cascade", &self.cascade)
            .field("retry_limit", &self.retry_limit)
            .finish_non_exhaustive()
    }
}

/// Builder for [`IdentityService`].
pub struct IdentityServiceBuilder {
    config: CustodianConfig,
    store: Arc<dyn IdentityStore>,
    tasks: Arc<dyn TaskStore>,
    clock: Option<Arc<dyn Clock>>,
    locks: Option<Arc<IdentityLocks>>,
}

impl fmt::Debug for IdentityServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityServiceBuilder")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl IdentityServiceBuilder {
    /// Timestamp source; defaults to [`SystemClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share per-identity locks with other services in the same process.
    pub fn with_locks(mut self, locks: Arc<IdentityLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Validate the configuration and assemble the service.
    pub fn build(self) -> Result<IdentityService> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let locks = self.locks.unwrap_or_default();
        let credentials = Arc::new(CredentialStore::new(&self.config.hashing)?);
        let retry_limit = self.config.mutation_retry_limit;

        let writer = IdentityWriter::new(
            Arc::clone(&self.store),
            locks,
            Arc::clone(&clock),
            retry_limit,
        );
        let ledger = TokenLedger::new(
            TokenSigner::from_config(&self.config.tokens),
            writer.clone(),
        );
        let authenticator =
            Authenticator::new(Arc::clone(&self.store), Arc::clone(&credentials));

        Ok(IdentityService {
            store: self.store,
            credentials,
            writer,
            ledger,
            authenticator,
            cascade: CascadeDeletionHook::new(self.tasks),
            clock,
            retry_limit,
        })
    }
}

impl IdentityService {
    /// Start building a service over the given stores.
    pub fn builder(
        config: CustodianConfig,
        store: Arc<dyn IdentityStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> IdentityServiceBuilder {
        IdentityServiceBuilder {
            config,
            store,
            tasks,
            clock: None,
            locks: None,
        }
    }

    /// Service with the system clock and a private lock table.
    pub fn new(
        config: CustodianConfig,
        store: Arc<dyn IdentityStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Result<Self> {
        Self::builder(config, store, tasks).build()
    }

    /// Token ledger backing sessions.
    pub fn tokens(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Credential checker used by login.
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Validate, hash and persist a new identity.
    #[instrument(skip_all, fields(email = %request.email.trim()))]
    pub async fn register(
        &self,
        request: &NewIdentityRequest,
    ) -> Result<PublicIdentity> {
        let identity = NewIdentity::validate(request)?;
        let password_hash = Arc::clone(&self.credentials)
            .hash_blocking(identity.password.clone())
            .await?;
        let record = identity.activate(password_hash, self.clock.now());

        if let Err(err) = self.store.create(&record).await {
            if matches!(err, StoreError::DuplicateEmail) {
                info!("registration rejected, email already in use");
            }
            return Err(err.into());
        }

        info!(identity_id = %record.id(), "identity registered");
        Ok(record.to_public_view())
    }

    /// Check credentials and open a new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let record = self.authenticator.check_credentials(email, password).await?;
        let token = self.ledger.issue(record.id()).await?;

        Ok(Session {
            identity: record.to_public_view(),
            token,
        })
    }

    /// Resolve a session token to the identity it belongs to.
    pub async fn authenticate(&self, token: &str) -> Result<PublicIdentity> {
        Ok(self.ledger.validate(token).await?.to_public_view())
    }

    /// Issue a token without a password check.
    pub async fn issue_token(&self, id: IdentityId) -> Result<String> {
        self.ledger.issue(id).await
    }

    /// Revoke one token of the identity.
    pub async fn revoke_token(&self, id: IdentityId, token: &str) -> Result<()> {
        self.ledger.revoke(id, token).await
    }

    /// End the session identified by `token`.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let record = self.ledger.validate(token).await?;
        self.ledger.revoke(record.id(), token).await
    }

    /// End every session of the identity.
    pub async fn logout_all(&self, id: IdentityId) -> Result<usize> {
        self.ledger.revoke_all(id).await
    }

    /// Replace the password. Existing sessions stay valid; call
    /// [`logout_all`](Self::logout_all) as well to end them.
    pub async fn change_password(
        &self,
        id: IdentityId,
        new_password: &str,
    ) -> Result<()> {
        let password = Password::parse(new_password)?;
        let password_hash = Arc::clone(&self.credentials)
            .hash_blocking(password)
            .await?;

        self.writer
            .mutate(id, |record| {
                record.set_password_hash(password_hash.clone());
                Ok(())
            })
            .await?;

        info!(identity_id = %id, "password changed");
        Ok(())
    }

    /// Apply a partial profile change. Every field is validated before
    /// anything is written.
    pub async fn update_profile(
        &self,
        id: IdentityId,
        update: &ProfileUpdate,
    ) -> Result<PublicIdentity> {
        let profile = update.validate()?;

        let (record, ()) = self
            .writer
            .mutate(id, |record| {
                if let Some(name) = &profile.name {
                    record.rename(name.clone());
                }
                if let Some(email) = &profile.email {
                    record.change_email(email.clone());
                }
                if let Some(age) = profile.age {
                    record.set_age(age);
                }
                Ok(())
            })
            .await?;

        info!(identity_id = %id, "profile updated");
        Ok(record.to_public_view())
    }

    /// Shorthand for an age-only profile update.
    pub async fn set_age(&self, id: IdentityId, age: i64) -> Result<PublicIdentity> {
        self.update_profile(id, &ProfileUpdate::default().age(age)).await
    }

    /// Store new avatar bytes.
    pub async fn set_avatar(&self, id: IdentityId, avatar: Vec<u8>) -> Result<()> {
        let bytes = avatar.len();
        self.writer
            .mutate(id, |record| {
                record.set_avatar(Some(avatar.clone()));
                Ok(())
            })
            .await?;

        info!(identity_id = %id, bytes, "avatar stored");
        Ok(())
    }

    /// Remove the avatar.
    pub async fn clear_avatar(&self, id: IdentityId) -> Result<()> {
        self.writer
            .mutate(id, |record| {
                record.set_avatar(None);
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Raw avatar bytes. Never part of the public view.
    pub async fn avatar(&self, id: IdentityId) -> Result<Option<Vec<u8>>> {
        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(IdentityError::IdentityNotFound(id))?;
        Ok(record.avatar().map(<[u8]>::to_vec))
    }

    /// Public view of the identity, if it exists.
    pub async fn find(&self, id: IdentityId) -> Result<Option<PublicIdentity>> {
        Ok(self
            .store
            .find_by_id(id)
            .await?
            .map(|record| record.to_public_view()))
    }

    /// Look up by address; the input is normalized first.
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<PublicIdentity>> {
        let email = Email::parse(email)?;
        Ok(self
            .store
            .find_by_email(&email)
            .await?
            .map(|record| record.to_public_view()))
    }

    /// Tasks owned by the identity, resolved through the task store.
    pub async fn owned_tasks(&self, id: IdentityId) -> Result<Vec<Task>> {
        self.cascade.owned_tasks(id).await
    }

    /// Delete an identity together with the tasks it owns.
    ///
    /// Owned tasks are removed first; if that fails the identity is left in
    /// place. Removal of the identity itself is retried up to the configured
    /// limit and reported as an error if it still does not go through.
    pub async fn delete(&self, id: IdentityId) -> Result<DeletionReceipt> {
        let guard = self.writer.locks().lock(id).await;

        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(IdentityError::IdentityNotFound(id))?;

        let tasks_removed = self.cascade.before_delete(&record).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.delete(id).await {
                Ok(true) => break,
                Ok(false) => {
                    warn!(identity_id = %id, "identity vanished during deletion");
                    return Err(IdentityError::IdentityNotFound(id));
                }
                Err(err) if attempt < self.retry_limit => {
                    warn!(
                        identity_id = %id,
                        attempt,
                        error = %err,
                        "identity removal failed, retrying"
                    );
                    tokio::time::sleep(Self::retry_backoff(attempt)).await;
                }
                Err(err) => {
                    error!(
                        identity_id = %id,
                        attempt,
                        tasks_removed,
                        error = %err,
                        "identity removal failed after owned tasks were removed"
                    );
                    return Err(err.into());
                }
            }
        }

        drop(guard);

        info!(identity_id = %id, tasks_removed, "identity deleted");
        Ok(DeletionReceipt {
            identity_id: id,
            tasks_removed,
        })
    }

    fn retry_backoff(attempt: u32) -> Duration {
        Duration::from_millis(5 * u64::from(attempt))
    }
}
