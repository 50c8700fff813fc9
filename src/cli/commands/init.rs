//! `passvault init`: create a new, empty vault.

use crate::cli::output;
use crate::cli::{archive_path, prompt_new_passphrase, to_secret, vault_exists, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::{self, InitOptions};

/// Execute the `init` command.
pub fn execute(cli: &Cli, work_factor: Option<u8>, force: bool) -> Result<()> {
    let path = archive_path(cli)?;

    // 1. Refuse early so the user isn't asked for a passphrase for nothing.
    if vault_exists(&path) && !force {
        output::tip("Use `passvault add` to store credentials in the existing vault.");
        return Err(VaultError::VaultAlreadyExists(path));
    }

    // 2. Passphrase (with confirmation when interactive).
    let passphrase = prompt_new_passphrase()?;

    // 3. Build and seal the archive.
    let mut options = InitOptions::default().with_force(force);
    if let Some(work_factor) = work_factor {
        options = options.with_work_factor(work_factor);
    }
    vault::init(&path, &to_secret(&passphrase), &options)?;

    output::success(&format!("Vault created at {}", path.display()));
    output::tip("Run `passvault add <FULLNAME> <NAME> --login <LOGIN>` to store a credential.");

    Ok(())
}
