//! One module per subcommand. Each exposes `execute`.

pub mod add;
pub mod completions;
pub mod init;
pub mod list;
pub mod log_cmd;
pub mod remove;
pub mod reveal;
pub mod search;
pub mod update;

use crate::cli::output;
use crate::errors::Result;
use crate::vault::Session;

/// Commit `session`, warning (not failing) if history could not be recorded.
pub(crate) fn commit(session: Session, summary: &str) -> Result<()> {
    let outcome = session.commit(summary)?;
    if let Some(e) = outcome.history_error {
        output::warning(&format!("Change saved, but history was not recorded: {e}"));
    }
    Ok(())
}
