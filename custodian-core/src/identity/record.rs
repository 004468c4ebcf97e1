use std::fmt;

use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use custodian_model::IdentityId;
use zeroize::Zeroizing;

use super::value_objects::{Age, Email, Name, Password};
use crate::error::ValidationError;

/// Registration input exactly as the caller supplied it.
#[derive(Clone)]
pub struct NewIdentityRequest {
    /// Display name as typed.
    pub name: String,
    /// Email address as typed.
    pub email: String,
    /// Plaintext; zeroized on drop.
    pub password: Zeroizing<String>,
    /// Defaults to zero when absent.
    pub age: Option<i64>,
}

impl NewIdentityRequest {
    /// Raw registration input without an age.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: Zeroizing::new(password.into()),
            age: None,
        }
    }

    /// Supply an age; validated later.
    pub fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }
}

impl fmt::Debug for NewIdentityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewIdentityRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("age", &self.age)
            .finish()
    }
}

/// A provisional identity: input validated, password not yet hashed and
/// nothing persisted.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    /// Trimmed display name.
    pub name: Name,
    /// Normalized email.
    pub email: Email,
    /// Plaintext, hashed during registration.
    pub password: Password,
    /// Validated age.
    pub age: Age,
}

impl NewIdentity {
    /// Validate every field of a registration request.
    pub fn validate(
        request: &NewIdentityRequest,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            name: Name::parse(&request.name)?,
            email: Email::parse(&request.email)?,
            password: Password::parse(request.password.as_str())?,
            age: request.age.map(Age::new).transpose()?.unwrap_or_default(),
        })
    }

    /// Turn the provisional identity into an active record. The plaintext
    /// password is dropped (and zeroized) here; only `password_hash`
    /// survives.
    pub fn activate(
        self,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> IdentityRecord {
        IdentityRecord {
            id: IdentityId::new(),
            name: self.name,
            email: self.email,
            password_hash,
            age: self.age,
            tokens: Vec::new(),
            avatar: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }
}

/// One registered identity.
///
/// Fields are private: names, emails and ages can only be replaced with
/// validated values, the password hash only by the credential store and
/// tokens only by the token ledger.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    id: IdentityId,
    name: Name,
    email: Email,
    password_hash: String,
    age: Age,
    tokens: Vec<String>,
    avatar: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    revision: u64,
}

impl IdentityRecord {
    /// Rehydrate a record from persisted storage.
    #[allow(clippy::too_many_arguments)]
    pub fn hydrate(
        id: IdentityId,
        name: Name,
        email: Email,
        password_hash: String,
        age: Age,
        tokens: Vec<String>,
        avatar: Option<Vec<u8>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        revision: u64,
    ) -> Self {
        Self {
            id,
            name,
            email,
            password_hash,
            age,
            tokens,
            avatar,
            created_at,
            updated_at,
            revision,
        }
    }

    /// Immutable identifier assigned at activation.
    pub fn id(&self) -> IdentityId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Normalized, unique email address.
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// PHC string produced by the credential store.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Age in years.
    pub fn age(&self) -> Age {
        self.age
    }

    /// Active session tokens, oldest first.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Avatar bytes, if any.
    pub fn avatar(&self) -> Option<&[u8]> {
        self.avatar.as_deref()
    }

    /// When the identity was registered.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the identity last changed.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Store revision this copy was read at.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Copy of this record at a new store revision.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Whether `token` is one of the active session tokens.
    pub fn has_token(&self, token: &str) -> bool {
        self.tokens
            .iter()
            .any(|held| constant_time_eq(held.as_bytes(), token.as_bytes()))
    }

    /// Replace the display name.
    pub fn rename(&mut self, name: Name) {
        self.name = name;
    }

    /// Uniqueness is checked by the store on save.
    pub fn change_email(&mut self, email: Email) {
        self.email = email;
    }

    /// Replace the age.
    pub fn set_age(&mut self, age: Age) {
        self.age = age;
    }

    /// Replace or clear the avatar.
    pub fn set_avatar(&mut self, avatar: Option<Vec<u8>>) {
        self.avatar = avatar;
    }

    pub(crate) fn set_password_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
    }

    pub(crate) fn push_token(&mut self, token: String) {
        self.tokens.push(token);
    }

    /// Remove one occurrence of `token`. Returns whether it was present.
    pub(crate) fn remove_token(&mut self, token: &str) -> bool {
        match self
            .tokens
            .iter()
            .position(|held| constant_time_eq(held.as_bytes(), token.as_bytes()))
        {
            Some(index) => {
                self.tokens.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop every session token, returning how many were active.
    pub(crate) fn clear_tokens(&mut self) -> usize {
        let count = self.tokens.len();
        self.tokens.clear();
        count
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("age", &self.age)
            .field("tokens", &self.tokens.len())
            .field("avatar_bytes", &self.avatar.as_ref().map(Vec::len))
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("revision", &self.revision)
            .finish()
    }
}

/// Proof that an identity and everything it owned were removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionReceipt {
    /// The removed identity.
    pub identity_id: IdentityId,
    /// Owned tasks deleted by the cascade.
    pub tasks_removed: u64,
}
