// src/local/listing.rs
// =============================================================================
// Reading and pruning one local directory.
//
// read_local() produces the LocalEntry list the reconciler compares against
// the remote listing. Paths are relative to the storage root, exactly like
// the paths derived from remote URLs, so both sides share one key space.
//
// A symlink counts as a directory when its target is one, and is flagged
// as a link: redirect links are matched by name during reconciliation, or
// every re-run would delete and recreate them. Temp files of downloads in
// flight are not listed at all.
// =============================================================================

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{MirrorError, Result};
use crate::local::atomic::TEMP_SUFFIX;

/// One child of a local directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalEntry {
    /// Path relative to the storage root.
    pub rel_path: PathBuf,
    /// Follows symlinks: a link to a directory is a directory.
    pub is_dir: bool,
    /// The entry itself is a symlink (dangling or not).
    pub is_link: bool,
}

/// Lists the children of `root/rel_dir`.
pub async fn read_local(root: &Path, rel_dir: &Path) -> Result<Vec<LocalEntry>> {
    let dir = root.join(rel_dir);
    let mut reader = tokio::fs::read_dir(&dir)
        .await
        .map_err(|e| MirrorError::fs("read directory", &dir, e))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| MirrorError::fs("read directory", &dir, e))?
    {
        let name = entry.file_name();
        if is_temp_file(&name.to_string_lossy()) {
            continue;
        }

        // file_type() does not follow symlinks, metadata() does; a dangling
        // link counts as a file
        let is_link = entry
            .file_type()
            .await
            .map(|t| t.is_symlink())
            .map_err(|e| MirrorError::fs("inspect", entry.path(), e))?;
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        entries.push(LocalEntry {
            rel_path: rel_dir.join(&name),
            is_dir,
            is_link,
        });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

/// Deletes `root/entry` (recursively for real directories).
///
/// Symlinks are unlinked, never followed.
pub async fn remove_local(root: &Path, entry: &LocalEntry) -> Result<()> {
    let path = root.join(&entry.rel_path);
    let meta = match tokio::fs::symlink_metadata(&path).await {
        Ok(meta) => meta,
        // already gone is as good as removed
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(MirrorError::fs("inspect", &path, e)),
    };

    let result = if meta.is_dir() {
        tokio::fs::remove_dir_all(&path).await
    } else {
        tokio::fs::remove_file(&path).await
    };
    result.map_err(|e| MirrorError::fs("remove", &path, e))
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lists_files_and_directories_relative_to_root() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("pub");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("a.txt"), b"a").unwrap();

        let entries = read_local(tmp.path(), Path::new("pub")).await.unwrap();
        assert_eq!(
            entries,
            vec![
                LocalEntry {
                    rel_path: PathBuf::from("pub/a.txt"),
                    is_dir: false,
                    is_link: false,
                },
                LocalEntry {
                    rel_path: PathBuf::from("pub/sub"),
                    is_dir: true,
                    is_link: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_in_flight_temp_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(format!(".a.iso.x1y2z3{}", TEMP_SUFFIX)), b"").unwrap();
        std::fs::write(tmp.path().join("a.iso"), b"").unwrap();

        let entries = read_local(tmp.path(), Path::new("")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rel_path, PathBuf::from("a.iso"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_to_directory_counts_as_directory() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("v2")).unwrap();
        std::os::unix::fs::symlink("v2", tmp.path().join("latest")).unwrap();
        std::os::unix::fs::symlink("missing", tmp.path().join("dangling")).unwrap();

        let entries = read_local(tmp.path(), Path::new("")).await.unwrap();
        let latest = entries
            .iter()
            .find(|e| e.rel_path == Path::new("latest"))
            .unwrap();
        let dangling = entries
            .iter()
            .find(|e| e.rel_path == Path::new("dangling"))
            .unwrap();
        assert!(latest.is_dir && latest.is_link);
        assert!(!dangling.is_dir && dangling.is_link);
        let real = entries.iter().find(|e| e.rel_path == Path::new("v2")).unwrap();
        assert!(real.is_dir && !real.is_link);
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = read_local(tmp.path(), Path::new("nope")).await.unwrap_err();
        assert!(matches!(err, MirrorError::Filesystem { .. }));
    }

    #[tokio::test]
    async fn test_remove_directory_recursively() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("old/deeper")).unwrap();
        std::fs::write(tmp.path().join("old/deeper/f"), b"x").unwrap();

        let entry = LocalEntry {
            rel_path: PathBuf::from("old"),
            is_dir: true,
            is_link: false,
        };
        remove_local(tmp.path(), &entry).await.unwrap();
        assert!(!tmp.path().join("old").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remove_symlink_keeps_its_target() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("v2")).unwrap();
        std::fs::write(tmp.path().join("v2/keep"), b"x").unwrap();
        std::os::unix::fs::symlink("v2", tmp.path().join("latest")).unwrap();

        let entry = LocalEntry {
            rel_path: PathBuf::from("latest"),
            is_dir: true,
            is_link: true,
        };
        remove_local(tmp.path(), &entry).await.unwrap();
        assert!(tmp.path().join("v2/keep").exists());
        assert!(std::fs::symlink_metadata(tmp.path().join("latest")).is_err());
    }

    #[tokio::test]
    async fn test_removing_absent_entry_is_ok() {
        let tmp = TempDir::new().unwrap();
        let entry = LocalEntry {
            rel_path: PathBuf::from("ghost"),
            is_dir: false,
            is_link: false,
        };
        assert!(remove_local(tmp.path(), &entry).await.is_ok());
    }
}
