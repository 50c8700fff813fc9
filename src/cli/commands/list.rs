//! `passvault list`: show every credential (without passwords).

use age::secrecy::SecretString;

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    let broker = session.broker(SecretString::from(String::new()))?;
    let store = session.store(&broker)?;

    output::print_credentials_table(&store.list_sorted());

    drop(store);
    session.abort();
    Ok(())
}
