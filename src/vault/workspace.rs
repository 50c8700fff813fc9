//! The unpacked, writable copy of an archive.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::archive::{CONFIG_FILE, CREDENTIALS_FILE, KEYS_FILE, MARKER_FILE};

/// Private temporary directory holding the archive members of one
/// session. Every regular file is overwritten with zeros before the
/// directory is removed on drop.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create an empty workspace under `root`.
    pub(crate) fn create_in(root: &Path) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(".passvault-").tempdir_in(root)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o700))?;
        }

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn keys_path(&self) -> PathBuf {
        self.path().join(KEYS_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join(CONFIG_FILE)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.path().join(MARKER_FILE)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.path().join(CREDENTIALS_FILE)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let mut shredded = 0usize;
        for entry in WalkDir::new(self.dir.path()).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            match shred(entry.path()) {
                Ok(()) => shredded += 1,
                Err(e) => tracing::warn!(file = %entry.path().display(), "failed to scrub: {e}"),
            }
        }
        tracing::debug!(workspace = %self.dir.path().display(), files = shredded, "removing workspace");
        // TempDir's own drop removes the tree.
    }
}

/// Overwrite a file's contents with zeros and flush them to disk.
fn shred(path: &Path) -> io::Result<()> {
    let len = fs::metadata(path)?.len();
    let mut file = OpenOptions::new().write(true).open(path)?;

    let zeros = [0u8; 4096];
    let mut remaining = len;
    while remaining > 0 {
        let chunk = remaining.min(zeros.len() as u64) as usize;
        file.write_all(&zeros[..chunk])?;
        remaining -= chunk as u64;
    }
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_is_removed_on_drop() {
        let workspace = Workspace::create_in(&std::env::temp_dir()).unwrap();
        let root = workspace.path().to_path_buf();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("secret"), b"plaintext").unwrap();
        fs::write(workspace.credentials_path(), b"[]").unwrap();

        drop(workspace);
        assert!(!root.exists());
    }

    #[test]
    fn shred_zeroes_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"hunter2-hunter2").unwrap();

        shred(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 15);
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[cfg(unix)]
    #[test]
    fn workspace_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let workspace = Workspace::create_in(&std::env::temp_dir()).unwrap();
        let mode = fs::metadata(workspace.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
