//! Key bundle stored in the archive as `keys.json`.
//!
//! Each keypair holds an X25519 age recipient (public, `age1…`) and the
//! matching identity wrapped in an age scrypt envelope under the user's
//! passphrase. The core never unwraps identities itself; that only
//! happens inside the crypto broker.

use std::io::{Read, Write};
use std::iter;
use std::path::Path;

use age::secrecy::{ExposeSecret, SecretString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::CryptoError;

/// One recipient/identity pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
    /// Public recipient string (`age1…`).
    pub recipient: String,

    /// Identity wrapped under the vault passphrase (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub identity: Vec<u8>,

    /// When this keypair was generated.
    pub created_at: DateTime<Utc>,
}

/// Ordered list of keypairs. The first entry is the default recipient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyBundle {
    pub keys: Vec<KeyPair>,
}

impl KeyBundle {
    /// Read and parse a bundle file.
    pub fn load(path: &Path) -> Result<Self, CryptoError> {
        let bytes = std::fs::read(path).map_err(|e| {
            CryptoError::EngineUnavailable(format!("cannot read key bundle: {e}"))
        })?;
        let bundle: KeyBundle = serde_json::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidKeyBundle(e.to_string()))?;

        if bundle.keys.is_empty() {
            return Err(CryptoError::InvalidKeyBundle(
                "bundle holds no keys".into(),
            ));
        }
        Ok(bundle)
    }

    /// Write the bundle as pretty JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Recipient used when the config does not name one.
    pub fn default_recipient(&self) -> Option<&str> {
        self.keys.first().map(|k| k.recipient.as_str())
    }

    /// Returns `true` if `recipient` belongs to a keypair in this bundle.
    pub fn contains(&self, recipient: &str) -> bool {
        self.keys.iter().any(|k| k.recipient == recipient)
    }
}

/// Copy a passphrase into a fresh `SecretString`.
pub(crate) fn duplicate_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// Generate a new X25519 keypair and wrap its identity under `passphrase`.
///
/// `work_factor` is the scrypt log2 cost of the wrapping envelope.
pub fn generate_keypair(passphrase: &SecretString, work_factor: u8) -> Result<KeyPair, CryptoError> {
    let identity = age::x25519::Identity::generate();
    let recipient = identity.to_public().to_string();

    let mut wrapper = age::scrypt::Recipient::new(duplicate_secret(passphrase));
    wrapper.set_work_factor(work_factor);

    let encryptor = age::Encryptor::with_recipients(iter::once(&wrapper as &dyn age::Recipient))
        .map_err(|e| CryptoError::EngineUnavailable(format!("key wrapping: {e}")))?;

    let mut wrapped = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut wrapped)
        .map_err(|e| CryptoError::EngineUnavailable(format!("key wrapping: {e}")))?;
    writer
        .write_all(identity.to_string().expose_secret().as_bytes())
        .map_err(|e| CryptoError::EngineUnavailable(format!("key wrapping: {e}")))?;
    writer
        .finish()
        .map_err(|e| CryptoError::EngineUnavailable(format!("key wrapping: {e}")))?;

    Ok(KeyPair {
        recipient,
        identity: wrapped,
        created_at: Utc::now(),
    })
}

/// Unwrap an identity envelope with `passphrase`.
///
/// A wrong passphrase is reported as `BadPassphrase`; anything else that
/// prevents unwrapping is `DecryptionFailed`.
pub fn unlock_identity(
    wrapped: &[u8],
    passphrase: &SecretString,
) -> Result<age::x25519::Identity, CryptoError> {
    let decryptor = age::Decryptor::new(wrapped)
        .map_err(|e| CryptoError::DecryptionFailed(format!("key envelope: {e}")))?;

    let unwrapper = age::scrypt::Identity::new(duplicate_secret(passphrase));
    let mut reader = decryptor
        .decrypt(iter::once(&unwrapper as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => CryptoError::BadPassphrase,
            other => CryptoError::DecryptionFailed(format!("key envelope: {other}")),
        })?;

    let mut encoded = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut encoded)
        .map_err(|e| CryptoError::DecryptionFailed(format!("key envelope: {e}")))?;

    let text = std::str::from_utf8(&encoded)
        .map_err(|_| CryptoError::InvalidKeyBundle("identity is not UTF-8".into()))?;
    text.trim()
        .parse::<age::x25519::Identity>()
        .map_err(|e| CryptoError::InvalidKeyBundle(format!("identity: {e}")))
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WORK_FACTOR: u8 = 10;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn generated_keypair_unlocks_with_its_passphrase() {
        let pair = generate_keypair(&secret("correct horse"), WORK_FACTOR).unwrap();
        assert!(pair.recipient.starts_with("age1"));

        let identity = unlock_identity(&pair.identity, &secret("correct horse")).unwrap();
        assert_eq!(identity.to_public().to_string(), pair.recipient);
    }

    #[test]
    fn wrong_passphrase_is_bad_passphrase() {
        let pair = generate_keypair(&secret("correct horse"), WORK_FACTOR).unwrap();
        let result = unlock_identity(&pair.identity, &secret("battery staple"));
        assert!(matches!(result, Err(CryptoError::BadPassphrase)));
    }

    #[test]
    fn bundle_round_trips_through_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.json");
        let bundle = KeyBundle {
            keys: vec![generate_keypair(&secret("pw-123456"), WORK_FACTOR).unwrap()],
        };
        bundle.save(&path).unwrap();

        let loaded = KeyBundle::load(&path).unwrap();
        assert_eq!(loaded.keys.len(), 1);
        assert_eq!(loaded.default_recipient(), bundle.default_recipient());
        assert!(loaded.contains(&bundle.keys[0].recipient));
        assert!(!loaded.contains("age1unknown"));
    }

    #[test]
    fn empty_bundle_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(&path, "[]").unwrap();

        assert!(matches!(
            KeyBundle::load(&path),
            Err(CryptoError::InvalidKeyBundle(_))
        ));
    }

    #[test]
    fn missing_bundle_is_engine_unavailable() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            KeyBundle::load(&dir.path().join("keys.json")),
            Err(CryptoError::EngineUnavailable(_))
        ));
    }
}
