//! Session token issuance, storage and validation.

mod ledger;
mod signer;

pub use ledger::TokenLedger;
pub use signer::{SessionClaims, TokenError, TokenSigner};
