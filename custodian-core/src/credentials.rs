//! Password hashing and verification.

use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, ParamsBuilder, Version,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
};
use password_hash::Error as PasswordHashError;
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use tracing::warn;

use crate::config::HashingConfig;
use crate::error::ValidationError;
use crate::identity::Password;

/// Failures of the hashing machinery itself, never of a password check.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The configured work factor is rejected by Argon2.
    #[error("invalid Argon2 parameters: {0}")]
    InvalidArgon2Params(String),
    /// Salt generation or hashing failed.
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    /// The blocking task panicked or was cancelled.
    #[error("hashing worker failed: {0}")]
    Worker(String),
}

impl From<PasswordHashError> for CredentialError {
    fn from(err: PasswordHashError) -> Self {
        CredentialError::PasswordHash(err.to_string())
    }
}

/// Hashes and verifies password credentials.
///
/// Uses Argon2id with a random per-hash salt. Every hash produced by one
/// store has the same PHC-string length because the parameters and output
/// length are fixed at construction. Plaintext passed in is never logged or
/// retained.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    argon2: Argon2<'static>,
}

impl CredentialStore {
    const OUTPUT_LENGTH: usize = 32;
    const SALT_LENGTH: usize = password_hash::Salt::RECOMMENDED_LENGTH;

    /// Build a store from the configured work factor.
    pub fn new(config: &HashingConfig) -> Result<Self, CredentialError> {
        let params = ParamsBuilder::new()
            .m_cost(config.memory_kib)
            .t_cost(config.iterations)
            .p_cost(config.parallelism)
            .output_len(Self::OUTPUT_LENGTH)
            .build()
            .map_err(|err| CredentialError::InvalidArgon2Params(err.to_string()))?;

        Ok(Self::with_params(params))
    }

    /// Build a store with caller-specified Argon2 parameters.
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Check the password shape rules without hashing.
    pub fn validate_shape(plaintext: &str) -> Result<(), ValidationError> {
        Password::parse(plaintext).map(|_| ())
    }

    /// Hash a validated password into a PHC string suitable for storage.
    pub fn hash(&self, password: &Password) -> Result<String, CredentialError> {
        let mut salt_bytes = [0u8; Self::SALT_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| CredentialError::PasswordHash(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)?;

        let hash = self
            .argon2
            .hash_password(password.expose().as_bytes(), &salt)?
            .to_string();
        Ok(hash)
    }

    /// Verify `plaintext` against a stored hash.
    ///
    /// Mismatches and unparseable hashes both yield `false`.
    pub fn verify(&self, plaintext: &str, password_hash: &str) -> bool {
        let parsed = match PasswordHash::new(password_hash) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "stored password hash could not be parsed");
                return false;
            }
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// [`hash`](Self::hash) on the blocking pool so the async caller is not
    /// stalled by the work factor.
    pub async fn hash_blocking(
        self: Arc<Self>,
        password: Password,
    ) -> Result<String, CredentialError> {
        tokio::task::spawn_blocking(move || self.hash(&password))
            .await
            .map_err(|err| CredentialError::Worker(err.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(
        self: Arc<Self>,
        plaintext: zeroize::Zeroizing<String>,
        password_hash: String,
    ) -> Result<bool, CredentialError> {
        tokio::task::spawn_blocking(move || {
            self.verify(plaintext.as_str(), &password_hash)
        })
        .await
        .map_err(|err| CredentialError::Worker(err.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn test_store() -> CredentialStore {
    let params = ParamsBuilder::new()
        .m_cost(8)
        .t_cost(1)
        .p_cost(1)
        .output_len(32)
        .build()
        .unwrap();
    CredentialStore::with_params(params)
}
