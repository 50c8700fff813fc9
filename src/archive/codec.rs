//! Zip codec for vault archives.
//!
//! Packing is deterministic: members are written in sorted path order
//! with a fixed timestamp and fixed permissions, so packing the same
//! directory twice yields identical bytes. That keeps revision digests
//! meaningful across sessions that change nothing.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::missing_members;
use crate::errors::ArchiveError;

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o600)
}

fn dir_options() -> SimpleFileOptions {
    file_options().unix_permissions(0o700)
}

fn repack_failed(err: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::RepackFailed(err.to_string())
}

fn corrupt(err: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::CorruptArchive(err.to_string())
}

/// Member name for `path` relative to `root`, always `/`-separated.
fn member_name(root: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| repack_failed(format!("{} is outside {}", path.display(), root.display())))?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Compress `source_dir` into a single archive file at `dest_path`.
///
/// The file is flushed and synced before returning so a subsequent
/// rename publishes complete bytes.
pub fn pack(source_dir: &Path, dest_path: &Path) -> Result<(), ArchiveError> {
    let file = File::create(dest_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(repack_failed)?;
        let name = member_name(source_dir, entry.path())?;

        if entry.file_type().is_dir() {
            zip.add_directory(name, dir_options())
                .map_err(repack_failed)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, file_options()).map_err(repack_failed)?;
            let mut member = File::open(entry.path())?;
            io::copy(&mut member, &mut zip)?;
        }
        // Symlinks and other special files are never part of a workspace.
    }

    let mut writer = zip.finish().map_err(repack_failed)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| repack_failed(e.error()))?;
    file.sync_all()?;

    tracing::debug!(archive = %dest_path.display(), "packed workspace");
    Ok(())
}

/// Extract the archive at `archive_path` into `dest_dir`.
///
/// Fails with `CorruptArchive` if the container cannot be parsed or a
/// member would land outside `dest_dir`, and with `IncompleteArchive`
/// if a required top-level member is missing afterwards.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(corrupt)?;

    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(corrupt)?;
        let relative = member.enclosed_name().ok_or_else(|| {
            ArchiveError::CorruptArchive(format!("unsafe member path '{}'", member.name()))
        })?;
        let target = dest_dir.join(relative);

        if member.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        // CRC mismatches surface as read errors from the member stream.
        io::copy(&mut member, &mut out).map_err(corrupt)?;
    }

    let missing = missing_members(dest_dir);
    if !missing.is_empty() {
        return Err(ArchiveError::IncompleteArchive { missing });
    }

    tracing::debug!(archive = %archive_path.display(), "unpacked archive");
    Ok(())
}

/// Member names of an archive, in archive order.
pub fn list_members(archive_path: &Path) -> Result<Vec<String>, ArchiveError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(corrupt)?;

    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let member = archive.by_index(index).map_err(corrupt)?;
        names.push(member.name().to_string());
    }
    Ok(names)
}

/// Hex SHA-256 of a file.
pub fn digest(path: &Path) -> Result<String, ArchiveError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{CONFIG_FILE, CREDENTIALS_FILE, KEYS_FILE, MARKER_FILE};
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(KEYS_FILE), "[]").unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        fs::write(dir.path().join(MARKER_FILE), "").unwrap();
        fs::write(dir.path().join(CREDENTIALS_FILE), "[]").unwrap();
        dir
    }

    #[test]
    fn pack_and_unpack_preserves_tree() {
        let src = workspace();
        fs::create_dir(src.path().join("notes")).unwrap();
        fs::write(src.path().join("notes/readme.txt"), "hello").unwrap();

        let out = TempDir::new().unwrap();
        let archive = out.path().join("vault.db");
        pack(src.path(), &archive).unwrap();

        let dest = TempDir::new().unwrap();
        unpack(&archive, dest.path()).unwrap();

        assert_eq!(fs::read_to_string(dest.path().join(KEYS_FILE)).unwrap(), "[]");
        assert_eq!(fs::read(dest.path().join(MARKER_FILE)).unwrap().len(), 0);
        assert_eq!(
            fs::read_to_string(dest.path().join("notes/readme.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn pack_is_deterministic() {
        let src = workspace();
        let out = TempDir::new().unwrap();
        let first = out.path().join("a.db");
        let second = out.path().join("b.db");

        pack(src.path(), &first).unwrap();
        // Touch a file so its mtime changes but its content does not.
        fs::write(src.path().join(CONFIG_FILE), "").unwrap();
        pack(src.path(), &second).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
        assert_eq!(digest(&first).unwrap(), digest(&second).unwrap());
    }

    #[test]
    fn members_are_sorted() {
        let src = workspace();
        let out = TempDir::new().unwrap();
        let archive = out.path().join("vault.db");
        pack(src.path(), &archive).unwrap();

        let names = list_members(&archive).unwrap();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&MARKER_FILE.to_string()));
    }

    #[test]
    fn unpack_rejects_garbage() {
        let out = TempDir::new().unwrap();
        let archive = out.path().join("vault.db");
        fs::write(&archive, b"definitely not a zip file").unwrap();

        let dest = TempDir::new().unwrap();
        assert!(matches!(
            unpack(&archive, dest.path()),
            Err(ArchiveError::CorruptArchive(_))
        ));
    }

    #[test]
    fn unpack_reports_missing_members() {
        let src = workspace();
        fs::remove_file(src.path().join(MARKER_FILE)).unwrap();

        let out = TempDir::new().unwrap();
        let archive = out.path().join("vault.db");
        pack(src.path(), &archive).unwrap();

        let dest = TempDir::new().unwrap();
        match unpack(&archive, dest.path()) {
            Err(ArchiveError::IncompleteArchive { missing }) => {
                assert_eq!(missing, vec![MARKER_FILE.to_string()]);
            }
            other => panic!("expected IncompleteArchive, got {other:?}"),
        }
    }

    #[test]
    fn unpack_rejects_members_escaping_dest() {
        let out = TempDir::new().unwrap();
        let archive = out.path().join("vault.db");
        let mut zip = ZipWriter::new(File::create(&archive).unwrap());
        zip.start_file(KEYS_FILE, file_options()).unwrap();
        zip.write_all(b"[]").unwrap();
        zip.start_file("../evil", file_options()).unwrap();
        zip.write_all(b"payload").unwrap();
        zip.finish().unwrap();

        let dest = out.path().join("dest");
        fs::create_dir(&dest).unwrap();
        assert!(matches!(
            unpack(&archive, &dest),
            Err(ArchiveError::CorruptArchive(_))
        ));
        assert!(!out.path().join("evil").exists());
        assert!(!dest.join("evil").exists());
    }

    #[test]
    fn unpack_leaves_archive_untouched() {
        let src = workspace();
        let out = TempDir::new().unwrap();
        let archive = out.path().join("vault.db");
        pack(src.path(), &archive).unwrap();
        let before = fs::read(&archive).unwrap();

        let dest = TempDir::new().unwrap();
        unpack(&archive, dest.path()).unwrap();
        fs::write(dest.path().join(CREDENTIALS_FILE), "changed").unwrap();

        assert_eq!(fs::read(&archive).unwrap(), before);
    }
}
