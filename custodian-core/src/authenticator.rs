//! Credential checks that fail the same way for every cause.

use std::sync::Arc;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::credentials::CredentialStore;
use crate::error::{IdentityError, Result};
use crate::identity::{Email, IdentityRecord};
use crate::repositories::IdentityStore;

/// Checks an email and password pair against the identity store.
///
/// Every failure that depends on the submitted credentials is reported as
/// the same [`IdentityError::Authentication`].
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn IdentityStore>,
    credentials: Arc<CredentialStore>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("store", &std::any::type_name_of_val(self.store.as_ref()))
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl Authenticator {
    /// Authenticator over `store`, verifying with `credentials`.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self { store, credentials }
    }

    /// Returns the full internal record on success. Route it through
    /// [`PublicView`](crate::serializer::PublicView) before it leaves the
    /// process.
    pub async fn check_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityRecord> {
        let Ok(email) = Email::parse(email) else {
            debug!("credential check with malformed email");
            return Err(IdentityError::Authentication);
        };

        let Some(record) = self.store.find_by_email(&email).await? else {
            debug!("credential check for unknown email");
            return Err(IdentityError::Authentication);
        };

        let verified = Arc::clone(&self.credentials)
            .verify_blocking(
                Zeroizing::new(password.to_owned()),
                record.password_hash().to_owned(),
            )
            .await?;

        if !verified {
            warn!(identity_id = %record.id(), "password verification failed");
            return Err(IdentityError::Authentication);
        }

        debug!(identity_id = %record.id(), "credentials verified");
        Ok(record)
    }
}
