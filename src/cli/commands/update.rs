//! `passvault update`: change fields of an existing credential.

use zeroize::Zeroizing;

use crate::cli::commands::commit;
use crate::cli::output;
use crate::cli::{display_key, open_recording_session, prompt_credential_password, prompt_passphrase, to_secret, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::CredentialChanges;

/// Field edits requested on the command line.
pub struct UpdateArgs<'a> {
    pub login: Option<&'a str>,
    pub comment: Option<&'a str>,
    pub clear_comment: bool,
    pub password: Option<&'a str>,
    pub prompt_password: bool,
    pub rename_fullname: Option<&'a str>,
    pub rename_name: Option<&'a str>,
}

/// Execute the `update` command.
pub fn execute(cli: &Cli, fullname: &str, name: &str, args: UpdateArgs<'_>) -> Result<()> {
    let changes = build_changes(args)?;
    if changes.is_empty() {
        return Err(VaultError::CommandFailed(
            "nothing to update, pass at least one field to change".into(),
        ));
    }

    let new_key = display_key(
        changes.fullname.as_deref().unwrap_or(fullname),
        changes.name.as_deref().unwrap_or(name),
    );

    let passphrase = prompt_passphrase()?;
    let session = open_recording_session(cli)?;
    let broker = session.broker(to_secret(&passphrase))?;
    {
        let mut store = session.store(&broker)?;
        store.update(fullname, name, changes)?;
    }

    let old_key = display_key(fullname, name);
    let summary = if old_key == new_key {
        format!("update {old_key}")
    } else {
        format!("update {old_key} -> {new_key}")
    };
    commit(session, &summary)?;
    output::success(&format!("Updated credential '{new_key}'"));

    Ok(())
}

fn build_changes(args: UpdateArgs<'_>) -> Result<CredentialChanges> {
    let password = match (args.password, args.prompt_password) {
        (Some(p), _) => Some(Zeroizing::new(p.to_string())),
        (None, true) => Some(prompt_credential_password()?),
        (None, false) => None,
    };

    let comment = if args.clear_comment {
        Some(None)
    } else {
        args.comment.map(|c| Some(c.to_string()))
    };

    Ok(CredentialChanges {
        fullname: args.rename_fullname.map(str::to_string),
        name: args.rename_name.map(str::to_string),
        login: args.login.map(str::to_string),
        comment,
        password,
    })
}
