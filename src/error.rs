//! The closed error taxonomy and the classifier that maps OS-level
//! [`std::io::Error`]s onto it.
//!
//! Every fallible path in this crate ends up going through [`classify`] (or
//! [`classify_copy`] for `copy`/`copy_stream`) exactly once, at the boundary
//! where a raw OS error is first observed. Nothing downstream of that point
//! ever inspects an [`io::Error`] again.

use std::io;
use std::path::{Path, PathBuf};

/// Closed set of failure kinds a filesystem operation can reject with.
///
/// This is deliberately not `#[non_exhaustive]`: the taxonomy is fixed by
/// design, and callers are expected to match on all eleven kinds.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("{op}: not found: {path}")]
    NotFound { op: &'static str, path: PathBuf },

    #[error("{op}: already exists: {path}")]
    AlreadyExists { op: &'static str, path: PathBuf },

    #[error("{op}: permission denied: {path}")]
    PermissionDenied { op: &'static str, path: PathBuf },

    #[error("{op}: read failed: {path}: {source}")]
    ReadFailed {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{op}: write failed: {path}: {source}")]
    WriteFailed {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("copy failed: {src} -> {dst}: {source}")]
    CopyFailed {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("directory not empty: {path}")]
    DirectoryNotEmpty { path: PathBuf },

    #[error("{op}: disk full: {path}")]
    DiskFull { op: &'static str, path: PathBuf },

    #[error("{op}: invalid path: {path}")]
    InvalidPath { op: &'static str, path: PathBuf },

    #[error("{op}: stream failed: {path}: {source} (bytes_processed={bytes_processed:?})")]
    StreamFailed {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
        bytes_processed: Option<u64>,
    },

    #[error("{op}: {path}: {source}")]
    Other {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Not one of the taxonomy kinds above — an internal sentinel a
    /// [`crate::lazy_sequence::ChunkStream`] yields once its originating
    /// operation is cancelled. Never delivered through a future's
    /// rejection path: cancellation is not an error.
    #[error("operation cancelled")]
    Cancelled,
}

impl FsError {
    /// The offending path, if this variant carries a single one.
    ///
    /// `CopyFailed` carries two paths and returns the destination, since
    /// that's the context a copy error should surface. `Cancelled` carries
    /// none.
    pub fn path(&self) -> Option<&Path> {
        match self {
            FsError::NotFound { path, .. }
            | FsError::AlreadyExists { path, .. }
            | FsError::PermissionDenied { path, .. }
            | FsError::ReadFailed { path, .. }
            | FsError::WriteFailed { path, .. }
            | FsError::DirectoryNotEmpty { path }
            | FsError::DiskFull { path, .. }
            | FsError::InvalidPath { path, .. }
            | FsError::StreamFailed { path, .. }
            | FsError::Other { path, .. } => Some(path),
            FsError::CopyFailed { dst, .. } => Some(dst),
            FsError::Cancelled => None,
        }
    }
}

/// Manual `Clone`: `io::Error` itself isn't `Clone`, but its kind and
/// message are enough to reconstruct an equivalent one. This is what lets
/// a single settled [`crate::future::AtomicFuture`] hand the same
/// rejection to any number of independently-registered continuations.
impl Clone for FsError {
    fn clone(&self) -> Self {
        fn clone_io(e: &io::Error) -> io::Error {
            io::Error::new(e.kind(), e.to_string())
        }
        match self {
            FsError::NotFound { op, path } => FsError::NotFound { op, path: path.clone() },
            FsError::AlreadyExists { op, path } => FsError::AlreadyExists { op, path: path.clone() },
            FsError::PermissionDenied { op, path } => FsError::PermissionDenied { op, path: path.clone() },
            FsError::ReadFailed { op, path, source } => {
                FsError::ReadFailed { op, path: path.clone(), source: clone_io(source) }
            }
            FsError::WriteFailed { op, path, source } => {
                FsError::WriteFailed { op, path: path.clone(), source: clone_io(source) }
            }
            FsError::CopyFailed { src, dst, source } => {
                FsError::CopyFailed { src: src.clone(), dst: dst.clone(), source: clone_io(source) }
            }
            FsError::DirectoryNotEmpty { path } => FsError::DirectoryNotEmpty { path: path.clone() },
            FsError::DiskFull { op, path } => FsError::DiskFull { op, path: path.clone() },
            FsError::InvalidPath { op, path } => FsError::InvalidPath { op, path: path.clone() },
            FsError::StreamFailed { op, path, source, bytes_processed } => FsError::StreamFailed {
                op,
                path: path.clone(),
                source: clone_io(source),
                bytes_processed: *bytes_processed,
            },
            FsError::Other { op, path, source } => FsError::Other { op, path: path.clone(), source: clone_io(source) },
            FsError::Cancelled => FsError::Cancelled,
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_ascii_lowercase();
    needles.iter().any(|n| haystack.contains(n))
}

/// Operation category used to pick the right fallback branch of the
/// classifier: write/append/write_generator, read/read_generator, and
/// any other op each classify differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
    Other,
}

/// Classify a raw OS error for `op` against `path`. Structured
/// [`io::ErrorKind`] is checked first; the substring table is the fallback
/// for errors the standard library doesn't carry a structured kind for yet.
pub fn classify(op: &'static str, path: impl Into<PathBuf>, kind: OpKind, source: io::Error) -> FsError {
    let path = path.into();
    let msg = source.to_string();

    if source.kind() == io::ErrorKind::AlreadyExists || contains_any(&msg, &["already exists", "file exists"]) {
        return FsError::AlreadyExists { op, path };
    }

    if source.kind() == io::ErrorKind::PermissionDenied || contains_any(&msg, &["permission", "denied", "forbidden"]) {
        return FsError::PermissionDenied { op, path };
    }

    if contains_any(&msg, &["no space left", "disk full", "enospc"]) {
        return FsError::DiskFull { op, path };
    }

    // A write-time "invalid argument" (the usual EINVAL message for a path
    // with an embedded NUL byte) stays a WriteFailed — the taxonomy treats
    // invalid-path-bytes during write/append as a write failure, not as
    // InvalidPath. Only non-write callers take the InvalidPath branch.
    if kind != OpKind::Write && contains_any(&msg, &["invalid path", "invalid argument", "nul byte"]) {
        return FsError::InvalidPath { op, path };
    }

    match kind {
        OpKind::Write => FsError::WriteFailed { op, path, source },
        OpKind::Read => {
            if source.kind() == io::ErrorKind::NotFound
                || contains_any(&msg, &["not found", "no such file", "does not exist"])
            {
                FsError::NotFound { op, path }
            } else {
                FsError::ReadFailed { op, path, source }
            }
        }
        OpKind::Other => {
            if source.kind() == io::ErrorKind::NotFound
                || contains_any(&msg, &["not found", "no such file", "does not exist"])
            {
                FsError::NotFound { op, path }
            } else {
                FsError::Other { op, path, source }
            }
        }
    }
}

/// Classify a failed copy, which carries both endpoints and has its own
/// precedence order: `NotFound` (source) → `PermissionDenied` → else
/// `CopyFailed(dest, raw)`.
pub fn classify_copy(src: impl Into<PathBuf>, dst: impl Into<PathBuf>, source: io::Error) -> FsError {
    let src = src.into();
    let dst = dst.into();
    let msg = source.to_string();

    if source.kind() == io::ErrorKind::NotFound || contains_any(&msg, &["not found", "no such file", "does not exist"]) {
        return FsError::NotFound { op: "copy", path: src };
    }

    if source.kind() == io::ErrorKind::PermissionDenied || contains_any(&msg, &["permission", "denied", "forbidden"]) {
        return FsError::PermissionDenied { op: "copy", path: dst };
    }

    FsError::CopyFailed { src, dst, source }
}

/// Classify removal of a non-empty directory specially, since
/// `std::fs::remove_dir` surfaces it as a generic OS error with no
/// dedicated [`io::ErrorKind`] variant on stable Rust.
pub fn classify_rmdir(path: impl Into<PathBuf>, source: io::Error) -> FsError {
    let path = path.into();
    let msg = source.to_string();
    if contains_any(&msg, &["directory not empty", "not empty"]) {
        return FsError::DirectoryNotEmpty { path };
    }
    classify("remove_directory", path, OpKind::Other, source)
}
