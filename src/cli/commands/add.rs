//! `passvault add`: store a new credential.

use zeroize::Zeroizing;

use crate::cli::commands::commit;
use crate::cli::output;
use crate::cli::{display_key, open_recording_session, prompt_credential_password, prompt_passphrase, to_secret, Cli};
use crate::errors::Result;
use crate::vault::NewCredential;

/// Execute the `add` command.
pub fn execute(
    cli: &Cli,
    fullname: &str,
    name: &str,
    login: &str,
    comment: Option<&str>,
    password: Option<&str>,
) -> Result<()> {
    let passphrase = prompt_passphrase()?;
    let password = match password {
        Some(p) => Zeroizing::new(p.to_string()),
        None => prompt_credential_password()?,
    };

    let session = open_recording_session(cli)?;
    let broker = session.broker(to_secret(&passphrase))?;
    {
        let mut store = session.store(&broker)?;
        let mut new = NewCredential::new(fullname, name, login);
        if let Some(comment) = comment {
            new = new.with_comment(comment);
        }
        store.add(new, &password)?;
    }

    let key = display_key(fullname, name);
    commit(session, &format!("add {key}"))?;
    output::success(&format!("Added credential '{key}'"));

    Ok(())
}
