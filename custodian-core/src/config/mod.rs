//! Runtime configuration for the identity core.
//!
//! Signing material is injected here at startup and handed to the token
//! ledger; nothing secret is compiled into the crate.

mod loader;

pub use loader::{ConfigLoadError, ConfigLoader, ConfigLoaderOptions, EnvConfig};

use std::fmt;
use std::time::Duration;

use zeroize::Zeroizing;

/// Default number of attempts for a read-modify-write on one identity.
pub const DEFAULT_MUTATION_RETRY_LIMIT: u32 = 5;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct CustodianConfig {
    /// Session token signing.
    pub tokens: TokenConfig,
    /// Password hashing work factor.
    pub hashing: HashingConfig,
    /// Attempts made for a single identity mutation before a revision
    /// conflict is surfaced to the caller.
    pub mutation_retry_limit: u32,
}

impl CustodianConfig {
    /// Configuration with default work factor and no token expiry.
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            tokens: TokenConfig::new(signing_secret),
            hashing: HashingConfig::default(),
            mutation_retry_limit: DEFAULT_MUTATION_RETRY_LIMIT,
        }
    }

    /// Replace the hashing work factor.
    pub fn with_hashing(mut self, hashing: HashingConfig) -> Self {
        self.hashing = hashing;
        self
    }

    /// `None` issues tokens that never expire.
    pub fn with_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.tokens.ttl = ttl;
        self
    }

    /// Reject configurations the core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.tokens.signing_secret.trim().is_empty() {
            return Err(ConfigLoadError::MissingSigningSecret);
        }
        if self
            .tokens
            .previous_secrets
            .iter()
            .any(|secret| secret.trim().is_empty())
        {
            return Err(ConfigLoadError::Invalid(
                "previous token secrets must not be empty".into(),
            ));
        }
        if matches!(self.tokens.ttl, Some(ttl) if ttl.is_zero()) {
            return Err(ConfigLoadError::Invalid(
                "token ttl must be greater than zero".into(),
            ));
        }
        self.hashing.validate()?;
        if self.mutation_retry_limit == 0 {
            return Err(ConfigLoadError::Invalid(
                "mutation retry limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Session-token signing settings.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC secret used to sign new tokens.
    pub signing_secret: Zeroizing<String>,
    /// Retired secrets still accepted when verifying existing tokens.
    pub previous_secrets: Vec<Zeroizing<String>>,
    /// Lifetime embedded in issued tokens. `None` issues tokens that stay
    /// valid until revoked.
    pub ttl: Option<Duration>,
}

impl TokenConfig {
    /// Token configuration with no retired secrets and no expiry.
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: Zeroizing::new(signing_secret.into()),
            previous_secrets: Vec::new(),
            ttl: None,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("signing_secret", &"<redacted>")
            .field("previous_secrets", &self.previous_secrets.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Argon2id work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Time cost.
    pub iterations: u32,
    /// Lanes.
    pub parallelism: u32,
}

impl HashingConfig {
    const DEFAULT_MEMORY_KIB: u32 = 19 * 1024; // 19 MiB
    const DEFAULT_ITERATIONS: u32 = 2;
    const DEFAULT_PARALLELISM: u32 = 1;

    /// Check the Argon2 bounds before any hashing happens.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.iterations == 0 || self.parallelism == 0 {
            return Err(ConfigLoadError::Invalid(
                "hash iterations and parallelism must be at least 1".into(),
            ));
        }
        if u64::from(self.memory_kib) < u64::from(self.parallelism) * 8 {
            return Err(ConfigLoadError::Invalid(
                "hash memory must be at least 8 KiB per lane".into(),
            ));
        }
        Ok(())
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: Self::DEFAULT_MEMORY_KIB,
            iterations: Self::DEFAULT_ITERATIONS,
            parallelism: Self::DEFAULT_PARALLELISM,
        }
    }
}
