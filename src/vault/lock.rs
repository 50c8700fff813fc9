//! Advisory lock serialising access to one archive.
//!
//! The lock lives in a sibling file `<archive>.lock` and is held with an
//! exclusive `flock` for the lifetime of an [`ArchiveLock`]. The lock
//! file itself is never removed; only the lock on it is released.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::errors::LockError;

/// How often a waiting opener retries.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive hold on an archive. Released on drop.
#[derive(Debug)]
pub struct ArchiveLock {
    file: File,
    path: PathBuf,
}

impl ArchiveLock {
    /// Path of the lock file guarding `archive`.
    pub fn lock_path(archive: &Path) -> PathBuf {
        let mut name = archive.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        archive.with_file_name(name)
    }

    /// Take the lock or fail immediately with `AlreadyLocked`.
    pub fn acquire(archive: &Path) -> Result<Self, LockError> {
        let path = Self::lock_path(archive);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                tracing::debug!(lock = %path.display(), "acquired archive lock");
                Ok(Self { file, path })
            }
            Err(e) if is_contended(&e) => Err(LockError::AlreadyLocked(archive.to_path_buf())),
            Err(e) => Err(LockError::Io(e)),
        }
    }

    /// Retry `acquire` until it succeeds or `timeout` elapses.
    pub fn acquire_with_timeout(archive: &Path, timeout: Duration) -> Result<Self, LockError> {
        let deadline = Instant::now() + timeout;
        loop {
            match Self::acquire(archive) {
                Err(LockError::AlreadyLocked(_)) if Instant::now() < deadline => {
                    thread::sleep(POLL_INTERVAL);
                }
                other => return other,
            }
        }
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.path.display(), "failed to release archive lock: {e}");
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_path_is_a_sibling() {
        let path = ArchiveLock::lock_path(Path::new("/tmp/vaults/passvault.db"));
        assert_eq!(path, Path::new("/tmp/vaults/passvault.db.lock"));
    }

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("passvault.db");

        let held = ArchiveLock::acquire(&archive).unwrap();
        assert!(matches!(
            ArchiveLock::acquire(&archive),
            Err(LockError::AlreadyLocked(_))
        ));

        drop(held);
        let again = ArchiveLock::acquire(&archive).unwrap();
        assert!(again.path().exists());
    }

    #[test]
    fn timeout_gives_up() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("passvault.db");
        let _held = ArchiveLock::acquire(&archive).unwrap();

        let started = Instant::now();
        let result = ArchiveLock::acquire_with_timeout(&archive, Duration::from_millis(120));
        assert!(matches!(result, Err(LockError::AlreadyLocked(_))));
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn waiter_gets_lock_after_holder_releases() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("passvault.db");
        let held = ArchiveLock::acquire(&archive).unwrap();

        let waiter = {
            let archive = archive.clone();
            thread::spawn(move || ArchiveLock::acquire_with_timeout(&archive, Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(100));
        drop(held);

        assert!(waiter.join().unwrap().is_ok());
    }
}
