//! Crypto broker: public-key encryption against an isolated keyring.
//!
//! A broker is built from the workspace key bundle, the passphrase, a
//! keyring root directory and an optional recipient. On first use it
//! imports the bundle into a fresh keyring directory of its own under
//! the root; every later call reads key material from that directory.
//! The directory is removed when the broker is dropped, so no two
//! sessions ever share keyring state and the host's own keys are never
//! consulted.

use std::fs;
use std::io::{Read, Write};
use std::iter;
use std::path::{Path, PathBuf};

use age::secrecy::SecretString;
use once_cell::sync::OnceCell;
use tempfile::TempDir;

use super::keys::{unlock_identity, KeyBundle};
use super::Cipher;
use crate::errors::CryptoError;

/// File in the keyring holding public recipients, one per line.
const PUBRING_FILE: &str = "pubring.txt";

/// Imported key material for one broker.
struct Keyring {
    dir: TempDir,
    recipients: Vec<String>,
    secrings: Vec<PathBuf>,
}

impl Keyring {
    fn import(bundle_path: &Path, root: &Path) -> Result<Self, CryptoError> {
        let bundle = KeyBundle::load(bundle_path)?;

        let unavailable = |e: std::io::Error| CryptoError::EngineUnavailable(format!("keyring: {e}"));
        fs::create_dir_all(root).map_err(unavailable)?;
        let dir = tempfile::Builder::new()
            .prefix("passvault-keyring-")
            .tempdir_in(root)
            .map_err(unavailable)?;

        let mut pubring = String::new();
        let mut secrings = Vec::with_capacity(bundle.keys.len());
        for (index, pair) in bundle.keys.iter().enumerate() {
            pubring.push_str(&pair.recipient);
            pubring.push('\n');

            let secring = dir.path().join(format!("secring-{index}.age"));
            fs::write(&secring, &pair.identity).map_err(unavailable)?;
            secrings.push(secring);
        }
        fs::write(dir.path().join(PUBRING_FILE), pubring).map_err(unavailable)?;

        tracing::debug!(
            keyring = %dir.path().display(),
            keys = bundle.keys.len(),
            "imported key bundle"
        );

        let recipients = bundle.keys.into_iter().map(|k| k.recipient).collect();
        Ok(Self {
            dir,
            recipients,
            secrings,
        })
    }

    /// Public recipients as currently present in the keyring directory.
    fn read_pubring(&self) -> Result<Vec<String>, CryptoError> {
        let text = fs::read_to_string(self.dir.path().join(PUBRING_FILE))
            .map_err(|e| CryptoError::EngineUnavailable(format!("keyring: {e}")))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Unwrap every identity in the keyring. Dropped by the caller after use.
    fn unlock(&self, passphrase: &SecretString) -> Result<Vec<age::x25519::Identity>, CryptoError> {
        let mut identities = Vec::with_capacity(self.secrings.len());
        for secring in &self.secrings {
            let wrapped = fs::read(secring)
                .map_err(|e| CryptoError::EngineUnavailable(format!("keyring: {e}")))?;
            identities.push(unlock_identity(&wrapped, passphrase)?);
        }
        Ok(identities)
    }
}

/// Encrypts and decrypts payloads for one session.
pub struct CryptoBroker {
    bundle_path: PathBuf,
    passphrase: SecretString,
    keyring_root: PathBuf,
    recipient: Option<String>,
    keyring: OnceCell<Keyring>,
}

impl CryptoBroker {
    /// Create a broker. Nothing touches the filesystem until the first
    /// `encrypt` or `decrypt`.
    pub fn new(
        bundle_path: impl Into<PathBuf>,
        passphrase: SecretString,
        keyring_root: impl Into<PathBuf>,
        recipient: Option<String>,
    ) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            passphrase,
            keyring_root: keyring_root.into(),
            recipient,
            keyring: OnceCell::new(),
        }
    }

    /// Import the bundle on first use; later calls reuse the keyring.
    fn keyring(&self) -> Result<&Keyring, CryptoError> {
        self.keyring
            .get_or_try_init(|| Keyring::import(&self.bundle_path, &self.keyring_root))
    }

    /// Keyring directory, once the bundle has been imported.
    pub fn keyring_dir(&self) -> Option<&Path> {
        self.keyring.get().map(|k| k.dir.path())
    }

    /// The recipient passwords are encrypted to.
    pub fn recipient(&self) -> Result<String, CryptoError> {
        let keyring = self.keyring()?;
        match &self.recipient {
            Some(wanted) if keyring.recipients.iter().any(|r| r == wanted) => Ok(wanted.clone()),
            Some(wanted) => Err(CryptoError::RecipientNotFound(wanted.clone())),
            None => keyring
                .recipients
                .first()
                .cloned()
                .ok_or_else(|| CryptoError::InvalidKeyBundle("bundle holds no keys".into())),
        }
    }

    /// Encrypt `plaintext` to the configured recipient.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let keyring = self.keyring()?;
        let wanted = self.recipient()?;
        if !keyring.read_pubring()?.contains(&wanted) {
            return Err(CryptoError::RecipientNotFound(wanted));
        }

        let recipient = wanted
            .parse::<age::x25519::Recipient>()
            .map_err(|e| CryptoError::InvalidKeyBundle(format!("recipient '{wanted}': {e}")))?;

        let encryptor =
            age::Encryptor::with_recipients(iter::once(&recipient as &dyn age::Recipient))
                .map_err(|e| CryptoError::EngineUnavailable(format!("encryptor: {e}")))?;

        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| CryptoError::EngineUnavailable(format!("encryptor: {e}")))?;
        writer
            .write_all(plaintext)
            .map_err(|e| CryptoError::EngineUnavailable(format!("encryption write: {e}")))?;
        writer
            .finish()
            .map_err(|e| CryptoError::EngineUnavailable(format!("encryption finish: {e}")))?;

        Ok(encrypted)
    }

    /// Decrypt `ciphertext` with the keyring identities.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let keyring = self.keyring()?;
        let identities = keyring.unlock(&self.passphrase)?;

        let decryptor = age::Decryptor::new(ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        let mut reader = decryptor
            .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        Ok(plaintext)
    }
}

impl Cipher for CryptoBroker {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        CryptoBroker::encrypt(self, plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        CryptoBroker::decrypt(self, ciphertext)
    }
}
