//! Redacted identity view.

use chrono::{DateTime, Utc};

use crate::ids::IdentityId;

/// Redacted external view of an identity.
///
/// Carries only the fields that may leave the trust boundary. Session
/// tokens, the password hash and the avatar blob have no counterpart here,
/// so a value of this type cannot leak them no matter how it is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PublicIdentity {
    /// Identity id.
    pub id: IdentityId,
    /// Display name.
    pub name: String,
    /// Normalized (lower-case) address.
    pub email: String,
    /// Age in years.
    pub age: u32,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn serializes_only_public_fields() {
        let now = Utc::now();
        let view = PublicIdentity {
            id: IdentityId::new(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            age: 36,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&view).unwrap();
        let object = json.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["age", "createdAt", "email", "id", "name", "updatedAt"]
        );
    }
}
