//! `passvault search`: list credentials matching a regular expression.

use age::secrecy::SecretString;
use regex::Regex;

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `search` command.
pub fn execute(cli: &Cli, pattern: &str) -> Result<()> {
    let pattern = Regex::new(pattern)
        .map_err(|e| VaultError::CommandFailed(format!("invalid pattern: {e}")))?;

    let session = open_session(cli)?;
    let broker = session.broker(SecretString::from(String::new()))?;
    let store = session.store(&broker)?;

    let mut hits: Vec<_> = store.search(&pattern).collect();
    hits.sort_by(|a, b| (&a.fullname, &a.name).cmp(&(&b.fullname, &b.name)));
    output::print_credentials_table(&hits);

    drop(store);
    session.abort();
    Ok(())
}
