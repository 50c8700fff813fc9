//! Credential operations over an open workspace.
//!
//! `CredentialStore` keeps the records of `credentials.json` in memory
//! in insertion order and writes the file back inside the workspace on
//! every mutation. Nothing here is durable on its own: the workspace is
//! only sealed into the archive when the session commits.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use zeroize::Zeroizing;

use super::credential::{Credential, CredentialChanges, NewCredential};
use crate::crypto::Cipher;
use crate::errors::StoreError;

/// Longest accepted fullname or name, in bytes.
const MAX_KEY_LEN: usize = 256;

/// Credential records of one workspace, bound to a cipher.
pub struct CredentialStore<'c, C: Cipher + ?Sized> {
    /// Path to `credentials.json` inside the workspace.
    path: PathBuf,

    /// Records in insertion order.
    records: Vec<Credential>,

    /// Encrypts new passwords and decrypts on reveal.
    cipher: &'c C,
}

impl<'c, C: Cipher + ?Sized> CredentialStore<'c, C> {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Load records from `path`. A missing file is an empty vault.
    pub fn load(path: &Path, cipher: &'c C) -> Result<Self, StoreError> {
        let records = if path.exists() {
            let bytes = fs::read(path)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(format!("credentials: {e}")))?
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            records,
            cipher,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Records accepted by `filter`, in insertion order.
    ///
    /// The iterator is lazy; call `list` again to restart.
    pub fn list<'s, F>(&'s self, filter: F) -> impl Iterator<Item = &'s Credential> + 's
    where
        F: Fn(&Credential) -> bool + 's,
    {
        self.records.iter().filter(move |c| filter(c))
    }

    /// All records sorted by `(fullname, name)`.
    pub fn list_sorted(&self) -> Vec<&Credential> {
        let mut sorted: Vec<&Credential> = self.records.iter().collect();
        sorted.sort_by(|a, b| (&a.fullname, &a.name).cmp(&(&b.fullname, &b.name)));
        sorted
    }

    /// Records whose fullname, name, login or comment match `pattern`.
    pub fn search<'s>(&'s self, pattern: &'s Regex) -> impl Iterator<Item = &'s Credential> + 's {
        self.list(move |c| {
            pattern.is_match(&c.fullname)
                || pattern.is_match(&c.name)
                || pattern.is_match(&c.login)
                || c.comment.as_deref().is_some_and(|text| pattern.is_match(text))
        })
    }

    /// Look up a record. Without `name`, several records under the same
    /// fullname are an `AmbiguousMatch` rather than a silent pick.
    pub fn find(&self, fullname: &str, name: Option<&str>) -> Result<Option<&Credential>, StoreError> {
        match name {
            Some(name) => Ok(self.records.iter().find(|c| c.matches(fullname, name))),
            None => {
                let mut matches = self.records.iter().filter(|c| c.fullname == fullname);
                let first = matches.next();
                let rest = matches.count();
                if rest > 0 {
                    return Err(StoreError::AmbiguousMatch {
                        fullname: fullname.to_string(),
                        count: rest + 1,
                    });
                }
                Ok(first)
            }
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the vault holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Encrypt `password` and append a new record.
    pub fn add(&mut self, new: NewCredential, password: &str) -> Result<(), StoreError> {
        validate_key("fullname", &new.fullname)?;
        validate_key("name", &new.name)?;
        if self.position(&new.fullname, &new.name).is_some() {
            return Err(StoreError::DuplicateCredential {
                fullname: new.fullname,
                name: new.name,
            });
        }

        let ciphertext = self.cipher.encrypt(password.as_bytes())?;

        let mut records = self.records.clone();
        records.push(Credential {
            fullname: new.fullname,
            name: new.name,
            login: new.login,
            password: ciphertext,
            comment: new.comment,
            modified_at: Utc::now(),
        });
        self.replace(records)
    }

    /// Apply `changes` to an existing record.
    ///
    /// Renaming onto a key that already exists fails with
    /// `DuplicateCredential` and leaves both records unchanged.
    pub fn update(&mut self, fullname: &str, name: &str, changes: CredentialChanges) -> Result<(), StoreError> {
        let index = self.position(fullname, name).ok_or_else(|| not_found(fullname, name))?;
        let mut updated = self.records[index].clone();

        if let Some(new_fullname) = changes.fullname {
            validate_key("fullname", &new_fullname)?;
            updated.fullname = new_fullname;
        }
        if let Some(new_name) = changes.name {
            validate_key("name", &new_name)?;
            updated.name = new_name;
        }
        if !updated.matches(fullname, name) && self.position(&updated.fullname, &updated.name).is_some() {
            return Err(StoreError::DuplicateCredential {
                fullname: updated.fullname,
                name: updated.name,
            });
        }

        if let Some(login) = changes.login {
            updated.login = login;
        }
        if let Some(comment) = changes.comment {
            updated.comment = comment;
        }
        if let Some(password) = changes.password {
            updated.password = self.cipher.encrypt(password.as_bytes())?;
        }
        updated.modified_at = Utc::now();

        let mut records = self.records.clone();
        records[index] = updated;
        self.replace(records)
    }

    /// Delete a record and return it.
    pub fn remove(&mut self, fullname: &str, name: &str) -> Result<Credential, StoreError> {
        let index = self.position(fullname, name).ok_or_else(|| not_found(fullname, name))?;

        let mut records = self.records.clone();
        let removed = records.remove(index);
        self.replace(records)?;
        Ok(removed)
    }

    /// Decrypt a record's password.
    ///
    /// The plaintext is wiped from memory when the returned value drops;
    /// the store keeps no copy of it.
    pub fn reveal(&self, fullname: &str, name: &str) -> Result<Zeroizing<String>, StoreError> {
        let record = self
            .records
            .iter()
            .find(|c| c.matches(fullname, name))
            .ok_or_else(|| not_found(fullname, name))?;

        let plaintext = Zeroizing::new(self.cipher.decrypt(&record.password)?);
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| StoreError::Serialization("password is not valid UTF-8".into()))?;
        Ok(Zeroizing::new(text.to_string()))
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn position(&self, fullname: &str, name: &str) -> Option<usize> {
        self.records.iter().position(|c| c.matches(fullname, name))
    }

    /// Write `records` to the workspace, then adopt them in memory.
    fn replace(&mut self, records: Vec<Credential>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| StoreError::Serialization(format!("credentials: {e}")))?;

        let parent = self.path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;

        self.records = records;
        Ok(())
    }
}

fn not_found(fullname: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        fullname: fullname.to_string(),
        name: name.to_string(),
    }
}

/// Keys must be non-empty, bounded, and free of control characters.
fn validate_key(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidField {
            field,
            reason: "cannot be empty".into(),
        });
    }
    if value.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidField {
            field,
            reason: format!("cannot exceed {MAX_KEY_LEN} bytes"),
        });
    }
    if value.chars().any(char::is_control) {
        return Err(StoreError::InvalidField {
            field,
            reason: "cannot contain control characters".into(),
        });
    }
    Ok(())
}
