use custodian_model::IdentityId;
use tracing::{debug, info};

use super::{TokenError, TokenSigner};
use crate::error::{IdentityError, Result};
use crate::identity::{IdentityRecord, IdentityWriter};

/// Issues, revokes and checks the session tokens recorded on identities.
///
/// A token is only honoured while it is both correctly signed and still
/// present in its owner's token list.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    signer: TokenSigner,
    writer: IdentityWriter,
}

impl TokenLedger {
    /// Ledger signing with `signer` and committing through `writer`.
    pub fn new(signer: TokenSigner, writer: IdentityWriter) -> Self {
        Self { signer, writer }
    }

    /// Signer used for issuance and verification.
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Mint a new token for `identity_id` and append it to the identity's
    /// token list.
    pub async fn issue(&self, identity_id: IdentityId) -> Result<String> {
        let token = self
            .signer
            .sign(identity_id, self.writer.now())
            .map_err(IdentityError::TokenSigning)?;

        let (record, ()) = self
            .writer
            .mutate(identity_id, |record| {
                record.push_token(token.clone());
                Ok(())
            })
            .await?;

        info!(
            identity_id = %identity_id,
            active_tokens = record.tokens().len(),
            "session token issued"
        );
        Ok(token)
    }

    /// Remove exactly `token` from the identity's token list.
    pub async fn revoke(&self, identity_id: IdentityId, token: &str) -> Result<()> {
        self.writer
            .mutate(identity_id, |record| {
                if record.remove_token(token) {
                    Ok(())
                } else {
                    Err(IdentityError::TokenNotFound)
                }
            })
            .await?;

        info!(identity_id = %identity_id, "session token revoked");
        Ok(())
    }

    /// Drop every token of the identity, returning how many were removed.
    pub async fn revoke_all(&self, identity_id: IdentityId) -> Result<usize> {
        let (_, removed) = self
            .writer
            .mutate(identity_id, |record| Ok(record.clear_tokens()))
            .await?;

        info!(identity_id = %identity_id, removed, "all session tokens revoked");
        Ok(removed)
    }

    /// Resolve `token` to the identity it authenticates.
    pub async fn validate(&self, token: &str) -> Result<IdentityRecord> {
        let claims = self.signer.verify(token).map_err(|err| {
            match err {
                TokenError::Expired => debug!("rejected expired session token"),
                _ => debug!(error = %err, "rejected session token"),
            }
            IdentityError::InvalidToken
        })?;

        let record = self
            .writer
            .store()
            .find_by_id(claims.sub)
            .await?
            .ok_or(IdentityError::InvalidToken)?;

        if !record.has_token(token) {
            debug!(identity_id = %claims.sub, "session token no longer active");
            return Err(IdentityError::InvalidToken);
        }

        Ok(record)
    }
}
