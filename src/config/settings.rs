use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultError};

/// Vault settings, stored as `config.toml` inside the archive.
///
/// Every field has a sensible default so a vault with an empty config
/// file still opens. The core only reads these values during a session;
/// they are written once, by `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory under which per-session keyrings are created.
    /// `None` means the system temp directory.
    #[serde(rename = "GPG_HOMEDIR", default, skip_serializing_if = "Option::is_none")]
    pub homedir: Option<PathBuf>,

    /// Recipient (age public key) that passwords are encrypted to.
    /// `None` means the first key in the bundle.
    #[serde(rename = "GPG_RECIPIENT", default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// Minimum passphrase length accepted by `init`.
    #[serde(rename = "PASSPHRASE_MIN_LENGTH", default = "default_passphrase_min_length")]
    pub passphrase_min_length: u32,

    /// scrypt work factor (log2) used to wrap private keys at `init`.
    #[serde(rename = "KDF_WORK_FACTOR", default = "default_kdf_work_factor")]
    pub kdf_work_factor: u8,

    /// Seconds before a copied password is cleared from the clipboard.
    /// Zero leaves the clipboard alone.
    #[serde(rename = "COPY_TIMEOUT", default)]
    pub copy_timeout: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_passphrase_min_length() -> u32 {
    8
}

fn default_kdf_work_factor() -> u8 {
    18
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            homedir: None,
            recipient: None,
            passphrase_min_length: default_passphrase_min_length(),
            kdf_work_factor: default_kdf_work_factor(),
            copy_timeout: 0,
        }
    }
}

impl Settings {
    /// Load settings from a `config.toml` file.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;

        toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Write settings as TOML. Only used when bootstrapping a vault.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| VaultError::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Directory under which a session's keyring directory is created.
    pub fn keyring_root(&self) -> PathBuf {
        self.homedir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Check a new passphrase against the configured policy.
    pub fn check_passphrase(&self, passphrase: &str) -> Result<()> {
        if passphrase.chars().count() < self.passphrase_min_length as usize {
            return Err(VaultError::WeakPassphrase(self.passphrase_min_length));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
