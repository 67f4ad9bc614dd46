//! Thin wrappers around `tokio::fs`, each returning a classified
//! [`FsError`] instead of a raw [`std::io::Error`]. These are the leaf
//! calls the event loop's workers invoke; nothing above this layer ever
//! touches `std::io::Error` directly.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;

use crate::error::{self, FsError, OpKind};
use crate::options::{MkdirOptions, WriteOptions};
use crate::stream::chunk_reader;

/// Stat information returned by `stat`/`exists`, mirroring the subset of
/// `std::fs::Metadata` callers actually need.
#[derive(Debug, Clone, Copy)]
pub struct FileStats {
    pub size: u64,
    pub is_file: bool,
    pub is_directory: bool,
    pub modified: Option<SystemTime>,
}

pub async fn read(path: impl Into<PathBuf>, opts: crate::options::ReadOptions) -> Result<Bytes, FsError> {
    chunk_reader::read_all(path, opts).await
}

pub async fn write(path: impl Into<PathBuf>, data: Bytes, opts: WriteOptions) -> Result<(), FsError> {
    use tokio::io::AsyncWriteExt;

    let path = path.into();
    if opts.create_directories {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| error::classify("write", path.clone(), OpKind::Write, e))?;
            }
        }
    }

    let mut file = if opts.append {
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| error::classify("write", path.clone(), OpKind::Write, e))?
    } else {
        tokio::fs::File::create(&path)
            .await
            .map_err(|e| error::classify("write", path.clone(), OpKind::Write, e))?
    };

    file.write_all(&data)
        .await
        .map_err(|e| error::classify("write", path.clone(), OpKind::Write, e))?;
    file.flush()
        .await
        .map_err(|e| error::classify("write", path.clone(), OpKind::Write, e))?;
    Ok(())
}

pub async fn delete(path: impl Into<PathBuf>) -> Result<(), FsError> {
    let path = path.into();
    tokio::fs::remove_file(&path)
        .await
        .map_err(|e| error::classify("delete", path, OpKind::Other, e))
}

pub async fn exists(path: impl AsRef<Path>) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

pub async fn stat(path: impl Into<PathBuf>) -> Result<FileStats, FsError> {
    let path = path.into();
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|e| error::classify("stat", path, OpKind::Other, e))?;
    Ok(FileStats {
        size: meta.len(),
        is_file: meta.is_file(),
        is_directory: meta.is_dir(),
        modified: meta.modified().ok(),
    })
}

pub async fn copy(src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Result<u64, FsError> {
    let src = src.into();
    let dst = dst.into();
    tokio::fs::copy(&src, &dst).await.map_err(|e| error::classify_copy(src, dst, e))
}

pub async fn rename(src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Result<(), FsError> {
    let src = src.into();
    let dst = dst.into();
    tokio::fs::rename(&src, &dst)
        .await
        .map_err(|e| error::classify("rename", dst, OpKind::Other, e))
}

pub async fn mkdir(path: impl Into<PathBuf>, opts: MkdirOptions) -> Result<(), FsError> {
    let path = path.into();
    let result = if opts.recursive {
        tokio::fs::create_dir_all(&path).await
    } else {
        tokio::fs::create_dir(&path).await
    };
    result.map_err(|e| error::classify("create_directory", path, OpKind::Other, e))?;
    set_unix_mode(&path, opts.mode);
    Ok(())
}

pub async fn rmdir(path: impl Into<PathBuf>) -> Result<(), FsError> {
    let path = path.into();
    tokio::fs::remove_dir(&path)
        .await
        .map_err(|e| error::classify_rmdir(path, e))
}

#[cfg(unix)]
fn set_unix_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path) {
        let mut perms = metadata.permissions();
        perms.set_mode(mode);
        let _ = std::fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn set_unix_mode(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ReadOptions;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write(&path, Bytes::from_static(b"hi"), WriteOptions::default()).await.unwrap();
        let data = read(&path, ReadOptions::default()).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"hi"));
    }

    #[tokio::test]
    async fn append_mode_appends_rather_than_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write(&path, Bytes::from_static(b"one"), WriteOptions::default()).await.unwrap();
        write(&path, Bytes::from_static(b"two"), WriteOptions { append: true, ..Default::default() }).await.unwrap();
        let data = read(&path, ReadOptions::default()).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"onetwo"));
    }

    #[tokio::test]
    async fn stat_reports_file_kind_and_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write(&path, Bytes::from_static(b"hello"), WriteOptions::default()).await.unwrap();
        let stats = stat(&path).await.unwrap();
        assert!(stats.is_file);
        assert_eq!(stats.size, 5);
    }

    #[tokio::test]
    async fn exists_is_false_for_missing_path() {
        let dir = tempdir().unwrap();
        assert!(!exists(dir.path().join("nope")).await);
    }

    #[tokio::test]
    async fn rmdir_rejects_non_empty_directory() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        mkdir(&sub, MkdirOptions::default()).await.unwrap();
        write(sub.join("f.txt"), Bytes::from_static(b"x"), WriteOptions::default()).await.unwrap();
        let err = rmdir(&sub).await.unwrap_err();
        assert!(matches!(err, FsError::DirectoryNotEmpty { .. }));
    }

    #[tokio::test]
    async fn mkdir_recursive_creates_nested_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        mkdir(&nested, MkdirOptions { recursive: true, ..Default::default() }).await.unwrap();
        assert!(nested.is_dir());
    }
}
