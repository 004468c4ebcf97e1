use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use custodian_model::IdentityId;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::TokenConfig;

/// Claims embedded in a session token. Only the identity id is meaningful;
/// `jti` makes every issuance distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Owner of the session.
    pub sub: IdentityId,
    /// Issued at, seconds since the epoch.
    pub iat: i64,
    /// Unique per issuance.
    pub jti: Uuid,
    /// Expiry, only when a lifetime is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Why a token could not be signed or verified.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Encoding the claims failed.
    #[error("failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    /// The `exp` claim is in the past.
    #[error("session token has expired")]
    Expired,
    /// Bad signature under every accepted key, bad encoding or missing
    /// required claims.
    #[error("session token is malformed or its signature is invalid")]
    Invalid,
    /// TTL too large to express as an `exp` claim.
    #[error("token lifetime is out of range")]
    LifetimeOutOfRange,
}

/// HS256 signer for session tokens.
///
/// New tokens are signed with the current secret. Verification also accepts
/// the retired secrets listed in the configuration so that a key rotation
/// does not log everybody out.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_keys: Vec<DecodingKey>,
    ttl: Option<Duration>,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("decoding_keys", &self.decoding_keys.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Signer for the current secret, also accepting retired ones.
    pub fn from_config(config: &TokenConfig) -> Self {
        let current = config.signing_secret.as_bytes();
        let decoding_keys = std::iter::once(current)
            .chain(config.previous_secrets.iter().map(|secret| secret.as_bytes()))
            .map(DecodingKey::from_secret)
            .collect();

        Self {
            encoding_key: EncodingKey::from_secret(current),
            decoding_keys,
            ttl: config.ttl,
        }
    }

    /// Configured token lifetime.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Sign a fresh token for `identity_id` issued at `issued_at`.
    pub fn sign(
        &self,
        identity_id: IdentityId,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let exp = match self.ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|_| TokenError::LifetimeOutOfRange)?;
                let expires_at = issued_at
                    .checked_add_signed(ttl)
                    .ok_or(TokenError::LifetimeOutOfRange)?;
                Some(expires_at.timestamp())
            }
            None => None,
        };

        let claims = SessionClaims {
            sub: identity_id,
            iat: issued_at.timestamp(),
            jti: Uuid::new_v4(),
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Check the signature (against every accepted key) and expiry, and
    /// return the embedded claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let validation = self.validation();

        for key in &self.decoding_keys {
            match decode::<SessionClaims>(token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(err) => match err.kind() {
                    ErrorKind::InvalidSignature => continue,
                    ErrorKind::ExpiredSignature => {
                        return Err(TokenError::Expired);
                    }
                    _ => return Err(TokenError::Invalid),
                },
            }
        }

        Err(TokenError::Invalid)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.required_spec_claims.clear();
        if self.ttl.is_some() {
            validation.required_spec_claims.insert("exp".to_string());
        }
        validation
    }
}
