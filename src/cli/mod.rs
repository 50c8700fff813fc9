//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use age::secrecy::SecretString;
use clap::Parser;
use zeroize::Zeroizing;

use crate::errors::{Result, VaultError};
use crate::vault::Session;

/// Environment variable consulted before prompting for the passphrase.
pub const PASSPHRASE_ENV: &str = "PASSVAULT_PASSPHRASE";

/// passvault CLI: offline credential vault.
#[derive(Parser)]
#[command(name = "passvault", about = "Offline credential vault", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the vault archive
    #[arg(long, env = "PASSVAULT_DB", default_value = "passvault.db", global = true)]
    pub db: PathBuf,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new, empty vault
    Init {
        /// scrypt work factor (log2) for the private key envelope
        #[arg(long)]
        work_factor: Option<u8>,

        /// Overwrite an existing vault
        #[arg(long)]
        force: bool,
    },

    /// Add a credential
    Add {
        /// Account (e.g. email)
        fullname: String,
        /// Sub-scope (e.g. personal)
        name: String,
        /// Login name
        #[arg(short, long)]
        login: String,
        /// Free-form note
        #[arg(short, long)]
        comment: Option<String>,
        /// Password (omit for interactive prompt)
        #[arg(long)]
        password: Option<String>,
    },

    /// Change fields of an existing credential
    Update {
        fullname: String,
        name: String,
        #[arg(short, long)]
        login: Option<String>,
        #[arg(short, long, conflicts_with = "clear_comment")]
        comment: Option<String>,
        /// Remove the comment
        #[arg(long)]
        clear_comment: bool,
        /// New password
        #[arg(long)]
        password: Option<String>,
        /// Prompt for a new password
        #[arg(long, conflicts_with = "password")]
        prompt_password: bool,
        /// Move the credential to another account
        #[arg(long)]
        rename_fullname: Option<String>,
        /// Move the credential to another sub-scope
        #[arg(long)]
        rename_name: Option<String>,
    },

    /// Remove a credential
    Remove {
        fullname: String,
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List all credentials
    List,

    /// List credentials matching a regular expression
    Search {
        /// Pattern matched against fullname, name, login and comment
        pattern: String,
    },

    /// Print a credential's password
    Reveal {
        fullname: String,
        /// Required when the account has several credentials
        name: Option<String>,
        /// Copy to the clipboard instead of printing
        #[arg(long)]
        copy: bool,
    },

    /// Show the commit history of the vault
    Log {
        /// Number of entries to show
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Get the vault passphrase, trying in order:
/// 1. `PASSVAULT_PASSPHRASE` env var (scripts/CI)
/// 2. Interactive prompt
pub fn prompt_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = passphrase_from_env() {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault passphrase")
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("passphrase prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new passphrase with confirmation (used during `init`).
///
/// Also respects `PASSVAULT_PASSPHRASE`. Length policy is enforced by
/// the library, not here.
pub fn prompt_new_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = passphrase_from_env() {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Choose vault passphrase")
        .with_confirmation("Confirm vault passphrase", "Passphrases do not match, try again")
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("passphrase prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a credential password with confirmation.
pub fn prompt_credential_password() -> Result<Zeroizing<String>> {
    let pw = dialoguer::Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match, try again")
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

fn passphrase_from_env() -> Option<Zeroizing<String>> {
    std::env::var(PASSPHRASE_ENV)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Copy a passphrase into a `SecretString` for the crypto layer.
pub fn to_secret(passphrase: &Zeroizing<String>) -> SecretString {
    SecretString::from(passphrase.as_str().to_owned())
}

/// Ask a yes/no question, defaulting to no.
pub fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))
}

/// Open a session on the CLI's archive for a read-only command.
pub fn open_session(cli: &Cli) -> Result<Session> {
    Session::open(&archive_path(cli)?)
}

/// Open a session for a mutating command, with history attached when
/// the history log is compiled in.
pub fn open_recording_session(cli: &Cli) -> Result<Session> {
    #[allow(unused_mut)]
    let mut session = open_session(cli)?;

    #[cfg(feature = "history-log")]
    if let Some(log) = crate::history::AuditLog::open(session.archive_path()) {
        session.set_history(Box::new(log));
    }

    Ok(session)
}

/// Resolve `--db` against the current directory.
pub fn archive_path(cli: &Cli) -> Result<PathBuf> {
    if cli.db.is_absolute() {
        return Ok(cli.db.clone());
    }
    Ok(std::env::current_dir()?.join(&cli.db))
}

/// Display form of a credential key.
pub fn display_key(fullname: &str, name: &str) -> String {
    format!("{fullname}/{name}")
}

/// Returns `true` if `path` looks like an existing vault.
pub fn vault_exists(path: &Path) -> bool {
    path.is_file()
}
