use std::path::PathBuf;
use thiserror::Error;

/// Failures of the archive codec and of the commit swap.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive is corrupt: {0}")]
    CorruptArchive(String),

    #[error("Archive is incomplete: missing {}", .missing.join(", "))]
    IncompleteArchive { missing: Vec<String> },

    #[error("Repacking the workspace failed: {0}")]
    RepackFailed(String),

    #[error("Swapping the new archive into place failed: {0}")]
    SwapFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures to take the per-archive session lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Vault {0} is already open in another session")]
    AlreadyLocked(PathBuf),

    #[error("Lock file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the crypto broker.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Recipient '{0}' is not in the vault key bundle")]
    RecipientNotFound(String),

    #[error("Crypto engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Bad passphrase: the private key could not be unlocked")]
    BadPassphrase,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key bundle: {0}")]
    InvalidKeyBundle(String),
}

/// Failures of credential record operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential '{fullname}' ({name}) already exists")]
    DuplicateCredential { fullname: String, name: String },

    #[error("Credential '{fullname}' ({name}) not found")]
    NotFound { fullname: String, name: String },

    #[error("'{fullname}' matches {count} credentials: specify a name")]
    AmbiguousMatch { fullname: String, count: usize },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// All errors that can occur in passvault.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Vault already exists at {0}")]
    VaultAlreadyExists(PathBuf),

    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Passphrase must be at least {0} characters")]
    WeakPassphrase(u32),

    #[error("Config file error: {0}")]
    ConfigError(String),

    #[error("History error: {0}")]
    History(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl VaultError {
    /// True when the root cause is a wrong passphrase, wherever it surfaced.
    pub fn is_bad_passphrase(&self) -> bool {
        matches!(
            self,
            VaultError::Crypto(CryptoError::BadPassphrase)
                | VaultError::Store(StoreError::Crypto(CryptoError::BadPassphrase))
        )
    }
}

/// Convenience type alias for passvault results.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_passphrase_is_detected_through_store_errors() {
        let err = VaultError::from(StoreError::from(CryptoError::BadPassphrase));
        assert!(err.is_bad_passphrase());

        let other = VaultError::from(CryptoError::DecryptionFailed("truncated".into()));
        assert!(!other.is_bad_passphrase());
    }

    #[test]
    fn incomplete_archive_lists_missing_members() {
        let err = ArchiveError::IncompleteArchive {
            missing: vec!["keys.json".into(), ".passvault".into()],
        };
        assert_eq!(
            err.to_string(),
            "Archive is incomplete: missing keys.json, .passvault"
        );
    }
}
