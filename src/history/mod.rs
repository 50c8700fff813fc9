//! Post-commit revision history.
//!
//! A [`HistoryRecorder`] is told about every successful commit. It is
//! strictly advisory: a failing recorder is reported back to the caller
//! but never undoes a commit.

use std::path::Path;

use crate::errors::Result;

#[cfg(feature = "history-log")]
mod audit;

#[cfg(feature = "history-log")]
pub use audit::{AuditLog, HistoryEntry};

/// Receives a notification after each committed session.
pub trait HistoryRecorder {
    /// Record that `archive` was replaced by a commit described by `summary`.
    fn record(&self, archive: &Path, summary: &str) -> Result<()>;
}
