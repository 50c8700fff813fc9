//! Credential records stored inside a vault workspace.
//!
//! A record is keyed by `(fullname, name)`. Only `password` is secret,
//! and it is always held as age ciphertext; the `password` field
//! serializes as a base64 string so `credentials.json` stays readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::keys::{base64_decode, base64_encode};

/// A single stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Account identifier shown to the user (e.g. "email").
    pub fullname: String,

    /// Sub-scope of the account (e.g. "personal").
    pub name: String,

    /// Login name, kept in plaintext so it can be searched.
    pub login: String,

    /// Encrypted password bytes.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub password: Vec<u8>,

    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Last time any field changed.
    pub modified_at: DateTime<Utc>,
}

impl Credential {
    /// Returns `true` if this record has the given key.
    pub fn matches(&self, fullname: &str, name: &str) -> bool {
        self.fullname == fullname && self.name == name
    }
}

/// Fields of a credential about to be added. The password is passed
/// separately so it never sits in a long-lived struct.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub fullname: String,
    pub name: String,
    pub login: String,
    pub comment: Option<String>,
}

impl NewCredential {
    pub fn new(fullname: impl Into<String>, name: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            fullname: fullname.into(),
            name: name.into(),
            login: login.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Partial update of a credential. `None` leaves a field untouched.
#[derive(Default)]
pub struct CredentialChanges {
    pub fullname: Option<String>,
    pub name: Option<String>,
    pub login: Option<String>,
    /// `Some(None)` clears the comment.
    pub comment: Option<Option<String>>,
    /// New plaintext password, re-encrypted on update.
    pub password: Option<Zeroizing<String>>,
}

impl CredentialChanges {
    /// Returns `true` if applying these changes would modify nothing.
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none()
            && self.name.is_none()
            && self.login.is_none()
            && self.comment.is_none()
            && self.password.is_none()
    }
}
