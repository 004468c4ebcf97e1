//! Error types of the identity core.

use std::fmt;

use custodian_model::IdentityId;
use thiserror::Error;

use crate::config::ConfigLoadError;
use crate::credentials::CredentialError;
use crate::tokens::TokenError;

/// Field of an identity that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Display name.
    Name,
    /// Login email.
    Email,
    /// Plaintext password.
    Password,
    /// Optional age.
    Age,
}

impl Field {
    /// Field name as used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Password => "password",
            Self::Age => "age",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed caller input, reported per field so it can be surfaced to the
/// end user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Offending field.
    pub field: Field,
    /// Human-readable, safe to show to the end user.
    pub reason: String,
}

impl ValidationError {
    /// Validation failure for `field`.
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by identity store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another identity already holds the email.
    #[error("email address is already in use")]
    DuplicateEmail,

    /// No record with this id.
    #[error("identity {0} not found")]
    NotFound(IdentityId),

    /// The stored revision moved since the record was loaded.
    #[error("revision conflict: expected {expected}, found {found}")]
    RevisionConflict {
        /// Revision the writer loaded.
        expected: u64,
        /// Revision currently stored.
        found: u64,
    },

    /// Opaque adapter failure.
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Public error taxonomy of the identity core.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Input rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Raised for unknown emails and wrong passwords alike.
    #[error("invalid operation")]
    Authentication,

    /// Bad signature, wrong subject, or no longer in the token list.
    #[error("invalid or revoked session token")]
    InvalidToken,

    /// The email belongs to another identity.
    #[error("email address is already in use")]
    DuplicateEmail,

    /// Owned tasks could not be removed. The identity is left in place.
    #[error("failed to remove tasks owned by {identity_id}")]
    CascadeFailure {
        /// Identity whose deletion was aborted.
        identity_id: IdentityId,
        /// Task store failure.
        #[source]
        source: StoreError,
    },

    /// No identity with this id.
    #[error("identity {0} not found")]
    IdentityNotFound(IdentityId),

    /// Revocation target is not in the identity's token list.
    #[error("session token not found")]
    TokenNotFound,

    /// A session token could not be signed.
    #[error("token signing failed: {0}")]
    TokenSigning(#[source] TokenError),

    /// Hashing failed or the work factor is invalid.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Store failure with no more specific mapping.
    #[error("store error: {0}")]
    Store(StoreError),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigLoadError),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => IdentityError::DuplicateEmail,
            StoreError::NotFound(id) => IdentityError::IdentityNotFound(id),
            other => IdentityError::Store(other),
        }
    }
}

impl IdentityError {
    /// The failing field, for validation errors.
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Validation(err) => Some(err.field),
            _ => None,
        }
    }

    /// Whether this is caller input the end user can fix.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result alias defaulting to [`IdentityError`].
pub type Result<T, E = IdentityError> = std::result::Result<T, E>;
