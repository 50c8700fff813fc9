//! `passvault reveal`: decrypt and print (or copy) a password.

use std::thread;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{display_key, open_session, prompt_passphrase, to_secret, Cli};
use crate::errors::{Result, StoreError, VaultError};

/// Execute the `reveal` command.
pub fn execute(cli: &Cli, fullname: &str, name: Option<&str>, copy: bool) -> Result<()> {
    let passphrase = prompt_passphrase()?;

    let session = open_session(cli)?;
    let settings = session.settings()?;
    let broker = session.broker(to_secret(&passphrase))?;
    let (key, password) = {
        let store = session.store(&broker)?;
        let record = store.find(fullname, name)?.ok_or_else(|| StoreError::NotFound {
            fullname: fullname.to_string(),
            name: name.unwrap_or("*").to_string(),
        })?;
        let key = display_key(&record.fullname, &record.name);
        (key, store.reveal(&record.fullname, &record.name)?)
    };

    // Nothing changed; release the vault before touching the clipboard.
    drop(broker);
    session.abort();

    if copy {
        copy_to_clipboard(&password, settings.copy_timeout)?;
        output::success(&format!("Copied password for '{key}' to the clipboard"));
    } else {
        println!("{}", password.as_str());
    }

    Ok(())
}

/// Put `password` on the clipboard. With a non-zero `timeout` (seconds),
/// wait and then clear it if it still holds the password.
fn copy_to_clipboard(password: &Zeroizing<String>, timeout: u64) -> Result<()> {
    let clipboard_err = |e: arboard::Error| VaultError::CommandFailed(format!("clipboard: {e}"));

    let mut clipboard = arboard::Clipboard::new().map_err(clipboard_err)?;
    clipboard.set_text(password.as_str()).map_err(clipboard_err)?;

    if timeout == 0 {
        return Ok(());
    }

    output::info(&format!("Clipboard will be cleared in {timeout}s"));
    thread::sleep(Duration::from_secs(timeout));

    let current = Zeroizing::new(clipboard.get_text().unwrap_or_default());
    if current.as_str() == password.as_str() {
        clipboard.clear().map_err(clipboard_err)?;
    }
    Ok(())
}
