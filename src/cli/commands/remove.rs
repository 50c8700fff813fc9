//! `passvault remove`: delete a credential.

use age::secrecy::SecretString;

use crate::cli::commands::commit;
use crate::cli::output;
use crate::cli::{confirm, display_key, open_recording_session, Cli};
use crate::errors::Result;

/// Execute the `remove` command.
pub fn execute(cli: &Cli, fullname: &str, name: &str, force: bool) -> Result<()> {
    let key = display_key(fullname, name);

    // Unless --force is set, ask for confirmation before deleting.
    if !force && !confirm(&format!("Remove credential '{key}'?"))? {
        output::info("Cancelled.");
        return Ok(());
    }

    let session = open_recording_session(cli)?;
    // Removal never decrypts, so no passphrase is needed.
    let broker = session.broker(SecretString::from(String::new()))?;
    {
        let mut store = session.store(&broker)?;
        store.remove(fullname, name)?;
    }

    commit(session, &format!("remove {key}"))?;
    output::success(&format!("Removed credential '{key}'"));

    Ok(())
}
