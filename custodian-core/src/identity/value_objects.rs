//! Validated building blocks of an identity record.
//!
//! Each type normalizes its input the same way on creation and on every
//! later mutation, so a stored record can only ever hold accepted values.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Field, ValidationError};

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_LOCAL_PART_LENGTH: usize = 64;
const MIN_PASSWORD_LENGTH: usize = 7;
const FORBIDDEN_PASSWORD_FRAGMENT: &str = "password";

/// Local part: dot-atoms of letters, digits (any script) and the RFC 5322
/// specials. Domain: ASCII hostname labels with an alphabetic TLD.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[\p{L}\p{N}!#$%&'*+/=?^_`{|}~-]+(\.[\p{L}\p{N}!#$%&'*+/=?^_`{|}~-]+)*@([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$",
    )
    .expect("email pattern is a valid regex")
});

/// Display name of an identity: trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    /// Trim and require a non-empty value.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new(Field::Name, "name is required"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The normalized value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Name {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized email address (trimmed, lower-cased, well-formed).
///
/// Because every stored address goes through this type, comparing two
/// `Email` values is a case-insensitive comparison of what the user typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Trim, lowercase and check the address shape.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalized = raw.as_ref().trim().to_lowercase();

        if normalized.is_empty() {
            return Err(ValidationError::new(Field::Email, "email is required"));
        }

        if normalized.len() > MAX_EMAIL_LENGTH {
            return Err(ValidationError::new(Field::Email, "email is invalid"));
        }

        let local_part_ok = normalized
            .split_once('@')
            .is_some_and(|(local, _)| local.len() <= MAX_LOCAL_PART_LENGTH);

        if !local_part_ok || !EMAIL_PATTERN.is_match(&normalized) {
            return Err(ValidationError::new(Field::Email, "email is invalid"));
        }

        Ok(Self(normalized))
    }

    /// The normalized value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Non-negative age in years. Defaults to zero.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct Age(u32);

impl Age {
    /// Rejects negative values.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value < 0 {
            return Err(ValidationError::new(
                Field::Age,
                "age must be a positive number",
            ));
        }

        u32::try_from(value).map(Self).map_err(|_| {
            ValidationError::new(Field::Age, "age is out of range")
        })
    }

    /// Age in years.
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Plaintext password that passed the shape rules.
///
/// The value is trimmed, zeroized on drop and never printed. It only exists
/// between input validation and hashing.
#[derive(Clone)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Apply the password shape rules: at least seven characters after
    /// trimming, and no case-insensitive occurrence of "password".
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = Zeroizing::new(raw.as_ref().trim().to_string());

        if trimmed.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::new(
                Field::Password,
                format!(
                    "password must be at least {MIN_PASSWORD_LENGTH} characters"
                ),
            ));
        }

        let lowered = Zeroizing::new(trimmed.to_lowercase());
        if lowered.contains(FORBIDDEN_PASSWORD_FRAGMENT) {
            return Err(ValidationError::new(
                Field::Password,
                "password cannot contain \"password\"",
            ));
        }

        Ok(Self(trimmed))
    }

    /// The plaintext, for hashing only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}
