//! Workspace session: the transaction around one archive.
//!
//! Opening a session takes the archive lock and unpacks the archive into
//! a private workspace. Callers then read settings, build a broker and
//! mutate credentials through the store. Closing either seals the
//! workspace back into the archive (commit) or discards it (abort).
//!
//! Sealing never writes to the archive path directly: the workspace is
//! packed into a temporary sibling file, flushed, and renamed over the
//! archive in one step. Until that rename the old archive is intact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use age::secrecy::SecretString;
use tempfile::NamedTempFile;

use super::lock::ArchiveLock;
use super::store::CredentialStore;
use super::workspace::Workspace;
use crate::archive;
use crate::config::Settings;
use crate::crypto::{Cipher, CryptoBroker};
use crate::errors::{ArchiveError, Result, VaultError};
use crate::history::HistoryRecorder;

/// Summary recorded when a session is committed through `close(true)`.
const DEFAULT_SUMMARY: &str = "update vault";

/// Result of closing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    /// Whether the archive was replaced.
    pub committed: bool,

    /// Error reported by the history recorder, if it failed. The commit
    /// itself has succeeded when this is set.
    pub history_error: Option<String>,
}

/// An open vault.
///
/// Dropping an open session aborts it.
pub struct Session {
    archive_path: PathBuf,
    // Field order matters: the workspace is scrubbed before the lock
    // is released.
    workspace: Workspace,
    _lock: ArchiveLock,
    history: Option<Box<dyn HistoryRecorder>>,
    summary: Option<String>,
    closed: bool,
}

impl Session {
    /// Lock and unpack the archive at `archive_path`.
    ///
    /// Fails with `VaultNotFound` if there is no archive and with
    /// `AlreadyLocked` if another session holds it. Symlinks are resolved
    /// first, so every path to the same archive shares one lock.
    pub fn open(archive_path: &Path) -> Result<Self> {
        let archive_path = resolve_existing(archive_path)?;
        let lock = ArchiveLock::acquire(&archive_path)?;
        Self::unpack_locked(&archive_path, lock, &std::env::temp_dir())
    }

    /// Like [`Session::open`], but wait up to `timeout` for the lock.
    pub fn open_with_timeout(archive_path: &Path, timeout: Duration) -> Result<Self> {
        let archive_path = resolve_existing(archive_path)?;
        let lock = ArchiveLock::acquire_with_timeout(&archive_path, timeout)?;
        Self::unpack_locked(&archive_path, lock, &std::env::temp_dir())
    }

    /// Unpack a resolved, locked archive into a workspace under `workspace_root`.
    pub(crate) fn unpack_locked(archive_path: &Path, lock: ArchiveLock, workspace_root: &Path) -> Result<Self> {
        // The archive may have been removed while we waited for the lock.
        if !archive_path.is_file() {
            return Err(VaultError::VaultNotFound(archive_path.to_path_buf()));
        }

        let workspace = Workspace::create_in(workspace_root)?;
        archive::unpack(archive_path, workspace.path())?;

        tracing::debug!(
            archive = %archive_path.display(),
            workspace = %workspace.path().display(),
            "session opened"
        );

        Ok(Self {
            archive_path: archive_path.to_path_buf(),
            workspace,
            _lock: lock,
            history: None,
            summary: None,
            closed: false,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Parse the workspace `config.toml`.
    pub fn settings(&self) -> Result<Settings> {
        Settings::load(&self.workspace.config_path())
    }

    /// Build a crypto broker over the workspace key bundle.
    pub fn broker(&self, passphrase: SecretString) -> Result<CryptoBroker> {
        let settings = self.settings()?;
        Ok(CryptoBroker::new(
            self.workspace.keys_path(),
            passphrase,
            settings.keyring_root(),
            settings.recipient,
        ))
    }

    /// Load the credential store, encrypting through `cipher`.
    pub fn store<'c, C: Cipher + ?Sized>(&self, cipher: &'c C) -> Result<CredentialStore<'c, C>> {
        Ok(CredentialStore::load(&self.workspace.credentials_path(), cipher)?)
    }

    /// Attach a recorder notified after a successful commit.
    pub fn set_history(&mut self, recorder: Box<dyn HistoryRecorder>) {
        self.history = Some(recorder);
    }

    /// Set the summary used when the session is committed by
    /// [`Session::close`] or [`with_session`].
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }

    // ------------------------------------------------------------------
    // Closing
    // ------------------------------------------------------------------

    /// Commit or abort.
    pub fn close(self, commit: bool) -> Result<CloseOutcome> {
        if commit {
            let summary = self.summary.clone().unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
            self.commit(&summary)
        } else {
            Ok(self.abort())
        }
    }

    /// Seal the workspace into the archive, then notify history.
    ///
    /// On error the archive is unchanged and the session is aborted.
    pub fn commit(mut self, summary: &str) -> Result<CloseOutcome> {
        // From here on drop only cleans up.
        self.closed = true;

        let staged = stage(self.workspace.path(), &self.archive_path)?;
        swap(staged, &self.archive_path)?;

        tracing::info!(archive = %self.archive_path.display(), "vault committed");

        let history_error = self.history.as_ref().and_then(|recorder| {
            recorder
                .record(&self.archive_path, summary)
                .err()
                .map(|e| {
                    tracing::warn!(archive = %self.archive_path.display(), "history not recorded: {e}");
                    e.to_string()
                })
        });

        Ok(CloseOutcome {
            committed: true,
            history_error,
        })
    }

    /// Discard every change made in this session.
    pub fn abort(mut self) -> CloseOutcome {
        self.closed = true;
        tracing::debug!(archive = %self.archive_path.display(), "session aborted");
        CloseOutcome {
            committed: false,
            history_error: None,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!(archive = %self.archive_path.display(), "aborting unclosed session");
        }
    }
}

/// Run `f` inside a session on `archive_path`.
///
/// The session commits if `f` returns `Ok` and aborts otherwise.
pub fn with_session<T, F>(archive_path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&mut Session) -> Result<T>,
{
    let mut session = Session::open(archive_path)?;
    match f(&mut session) {
        Ok(value) => {
            session.close(true)?;
            Ok(value)
        }
        Err(e) => {
            session.abort();
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Canonical path of an existing archive, or `VaultNotFound`.
fn resolve_existing(archive_path: &Path) -> Result<PathBuf> {
    if !archive_path.is_file() {
        return Err(VaultError::VaultNotFound(archive_path.to_path_buf()));
    }
    Ok(std::fs::canonicalize(archive_path)?)
}

/// Canonical form of `archive_path`, which need not exist yet.
///
/// An existing archive (or a symlink to one) is canonicalized directly.
/// Otherwise the parent directory is canonicalized and the file name
/// joined back on. The lock, the staged file and the rename target are
/// all derived from this path.
pub(crate) fn resolve_archive_path(archive_path: &Path) -> std::io::Result<PathBuf> {
    if archive_path.exists() {
        return std::fs::canonicalize(archive_path);
    }

    let file_name = archive_path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} does not name a file", archive_path.display()),
        )
    })?;
    let parent = match archive_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok(std::fs::canonicalize(parent)?.join(file_name))
}

// ---------------------------------------------------------------------------
// Sealing
// ---------------------------------------------------------------------------

/// Pack `source_dir` into a temporary file beside `archive_path`.
///
/// The temporary file is deleted if it is dropped without being swapped.
pub(crate) fn stage(source_dir: &Path, archive_path: &Path) -> std::result::Result<NamedTempFile, ArchiveError> {
    let parent = match archive_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut prefix = archive_path.file_name().unwrap_or_default().to_os_string();
    prefix.push(".");

    let staged = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| ArchiveError::RepackFailed(format!("cannot create temp archive: {e}")))?;

    archive::pack(source_dir, staged.path()).map_err(|e| match e {
        ArchiveError::RepackFailed(reason) => ArchiveError::RepackFailed(reason),
        other => ArchiveError::RepackFailed(other.to_string()),
    })?;

    tracing::debug!(staged = %staged.path().display(), "workspace packed");
    Ok(staged)
}

/// Atomically replace `archive_path` with the staged file.
pub(crate) fn swap(staged: NamedTempFile, archive_path: &Path) -> std::result::Result<(), ArchiveError> {
    staged
        .persist(archive_path)
        .map_err(|e| ArchiveError::SwapFailed(e.error.to_string()))?;

    // Make the rename itself durable.
    #[cfg(unix)]
    {
        let parent = archive_path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            if let Err(e) = std::fs::File::open(parent).and_then(|dir| dir.sync_all()) {
                tracing::warn!(dir = %parent.display(), "failed to sync directory: {e}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::init::{init, InitOptions};
    use crate::vault::NewCredential;
    use std::fs;
    use tempfile::TempDir;

    fn new_vault(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("passvault.db");
        init(&path, &SecretString::from("passphrase-1".to_string()), &InitOptions::default().with_work_factor(10)).unwrap();
        path
    }

    #[test]
    fn crash_before_swap_leaves_archive_untouched() {
        let dir = TempDir::new().unwrap();
        let archive = new_vault(&dir);
        let before = fs::read(&archive).unwrap();

        let session = Session::open(&archive).unwrap();
        let broker = session.broker(SecretString::from("passphrase-1".to_string())).unwrap();
        let mut store = session.store(&broker).unwrap();
        store.add(NewCredential::new("email", "personal", "me"), "s3cr3t").unwrap();

        // Pack as a commit would, then stop short of the rename.
        let staged = stage(session.workspace().path(), &archive).unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged_path.exists());
        assert_eq!(staged_path.parent(), archive.parent());
        drop(staged);
        drop(store);
        drop(session);

        assert!(!staged_path.exists());
        assert_eq!(fs::read(&archive).unwrap(), before);
    }

    fn strip_member(archive: &Path, member: &str) {
        let scratch = TempDir::new().unwrap();
        archive::unpack(archive, scratch.path()).unwrap();
        fs::remove_file(scratch.path().join(member)).unwrap();
        archive::pack(scratch.path(), archive).unwrap();
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn failed_unpack_removes_workspace_and_releases_lock() {
        let dir = TempDir::new().unwrap();
        let archive = new_vault(&dir);
        strip_member(&archive, archive::MARKER_FILE);
        let root = TempDir::new().unwrap();

        let lock = ArchiveLock::acquire(&archive).unwrap();
        match Session::unpack_locked(&archive, lock, root.path()) {
            Err(VaultError::Archive(ArchiveError::IncompleteArchive { missing })) => {
                assert_eq!(missing, vec![archive::MARKER_FILE.to_string()]);
            }
            Err(other) => panic!("expected IncompleteArchive, got {other:?}"),
            Ok(_) => panic!("expected IncompleteArchive, got an open session"),
        }

        assert_eq!(entries(root.path()), 0);
        ArchiveLock::acquire(&archive).unwrap();
    }

    #[test]
    fn corrupt_archive_leaves_no_workspace() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("garbage.db");
        fs::write(&archive, b"definitely not a zip").unwrap();
        let root = TempDir::new().unwrap();

        let lock = ArchiveLock::acquire(&archive).unwrap();
        assert!(matches!(
            Session::unpack_locked(&archive, lock, root.path()),
            Err(VaultError::Archive(ArchiveError::CorruptArchive(_)))
        ));
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn open_missing_archive_leaves_no_lock_file() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("absent.db");

        assert!(matches!(Session::open(&archive), Err(VaultError::VaultNotFound(_))));
        assert!(!ArchiveLock::lock_path(&archive).exists());

        let nested = dir.path().join("no-such-dir").join("absent.db");
        assert!(matches!(Session::open(&nested), Err(VaultError::VaultNotFound(_))));
    }

    #[test]
    fn staged_file_is_named_after_the_archive() {
        let dir = TempDir::new().unwrap();
        let archive = new_vault(&dir);
        let session = Session::open(&archive).unwrap();

        let staged = stage(session.workspace().path(), &archive).unwrap();
        let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("passvault.db."));
        assert!(name.ends_with(".tmp"));
        session.abort();
    }
}
