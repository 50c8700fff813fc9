//! Bootstrap a brand-new vault archive.

use std::fs;
use std::path::Path;

use age::secrecy::{ExposeSecret, SecretString};

use super::lock::ArchiveLock;
use super::session::{resolve_archive_path, stage, swap};
use crate::archive::{CONFIG_FILE, CREDENTIALS_FILE, KEYS_FILE, MARKER_FILE};
use crate::config::Settings;
use crate::crypto::{generate_keypair, KeyBundle};
use crate::errors::{Result, VaultError};

/// Accepted range for the scrypt work factor (log2 of the cost).
const WORK_FACTOR_RANGE: std::ops::RangeInclusive<u8> = 1..=30;

/// Options for [`init`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Settings written to the new vault's `config.toml`.
    pub settings: Settings,

    /// Replace an existing archive at the target path.
    pub force: bool,
}

impl InitOptions {
    /// Use `work_factor` for the identity envelope instead of the default.
    pub fn with_work_factor(mut self, work_factor: u8) -> Self {
        self.settings.kdf_work_factor = work_factor;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Create a new, empty vault at `archive_path`.
///
/// Steps:
/// 1. Refuse if the archive exists (unless `force`), resolve symlinks
///    and take the lock, then check again under the lock
/// 2. Check the passphrase against `PASSPHRASE_MIN_LENGTH`
/// 3. Generate a keypair wrapped under the passphrase
/// 4. Write every member into a scratch directory and seal it in place
pub fn init(archive_path: &Path, passphrase: &SecretString, options: &InitOptions) -> Result<()> {
    if archive_path.exists() && !options.force {
        return Err(VaultError::VaultAlreadyExists(archive_path.to_path_buf()));
    }
    options.settings.check_passphrase(passphrase.expose_secret())?;
    if !WORK_FACTOR_RANGE.contains(&options.settings.kdf_work_factor) {
        return Err(VaultError::ConfigError(format!(
            "KDF_WORK_FACTOR must be between {} and {}",
            WORK_FACTOR_RANGE.start(),
            WORK_FACTOR_RANGE.end()
        )));
    }

    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let archive_path = &resolve_archive_path(archive_path)?;
    let _lock = ArchiveLock::acquire(archive_path)?;
    // Another init may have finished between the first check and the lock.
    if archive_path.exists() && !options.force {
        return Err(VaultError::VaultAlreadyExists(archive_path.to_path_buf()));
    }

    let keypair = generate_keypair(passphrase, options.settings.kdf_work_factor)?;
    let recipient = keypair.recipient.clone();

    let scratch = tempfile::Builder::new().prefix(".passvault-init-").tempdir()?;
    KeyBundle { keys: vec![keypair] }.save(&scratch.path().join(KEYS_FILE))?;
    options.settings.save(&scratch.path().join(CONFIG_FILE))?;
    fs::write(scratch.path().join(MARKER_FILE), b"")?;
    fs::write(scratch.path().join(CREDENTIALS_FILE), b"[]")?;

    let staged = stage(scratch.path(), archive_path)?;
    swap(staged, archive_path)?;

    tracing::info!(archive = %archive_path.display(), %recipient, "vault created");
    Ok(())
}
