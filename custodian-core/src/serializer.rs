//! Redacted external views of identities.

use custodian_model::PublicIdentity;

use crate::identity::IdentityRecord;

/// Anything that can be rendered as a [`PublicIdentity`].
///
/// Implemented for the internal record and for the view itself, so
/// rendering an already-public value is a no-op.
pub trait PublicView {
    /// The redacted view.
    fn to_public_view(&self) -> PublicIdentity;
}

impl PublicView for IdentityRecord {
    fn to_public_view(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.id(),
            name: self.name().as_str().to_owned(),
            email: self.email().as_str().to_owned(),
            age: self.age().value(),
            created_at: self.created_at(),
            updated_at: self.updated_at(),
        }
    }
}

impl PublicView for PublicIdentity {
    fn to_public_view(&self) -> PublicIdentity {
        self.clone()
    }
}

impl From<&IdentityRecord> for PublicIdentity {
    fn from(record: &IdentityRecord) -> Self {
        record.to_public_view()
    }
}

/// Render `value` for use outside the trust boundary.
pub fn to_public_view(value: &impl PublicView) -> PublicIdentity {
    value.to_public_view()
}
