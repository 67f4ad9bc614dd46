//! The chunked writer: drains a producer stream into a file, creating
//! parent directories on request, and on cancellation closes the handle
//! and unlinks whatever partial output it had written.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncWriteExt;

use crate::error::{self, FsError, OpKind};
use crate::options::GeneratorWriteOptions;

/// Drains `producer` into `path`, optionally auto-buffered to
/// `opts.buffer_size` first. Returns the total byte count written.
///
/// On any producer or I/O error the partial file is removed before the
/// error is returned, matching the cancellation cleanup contract for
/// output-producing operations.
pub async fn write_from_stream<S>(path: impl Into<PathBuf>, mut producer: S, opts: GeneratorWriteOptions) -> Result<u64, FsError>
where
    S: Stream<Item = Result<Bytes, FsError>> + Unpin,
{
    let path = path.into();

    if opts.create_directories {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| error::classify("write_generator", path.clone(), OpKind::Write, e))?;
            }
        }
    }

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| error::classify("write_generator", path.clone(), OpKind::Write, e))?;

    let mut buffered = super::auto_buffer::AutoBuffer::new(&mut producer, opts.buffer_size);
    let mut written: u64 = 0;

    loop {
        match futures::StreamExt::next(&mut buffered).await {
            Some(Ok(chunk)) => {
                if let Err(e) = file.write_all(&chunk).await {
                    return fail_and_cleanup(&path, file, "write_generator", e).await;
                }
                written += chunk.len() as u64;
            }
            Some(Err(producer_err)) => {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(producer_err);
            }
            None => break,
        }
    }

    if let Err(e) = file.flush().await {
        return fail_and_cleanup(&path, file, "write_generator", e).await;
    }
    Ok(written)
}

async fn fail_and_cleanup(path: &Path, file: tokio::fs::File, op: &'static str, e: std::io::Error) -> Result<u64, FsError> {
    drop(file);
    let _ = tokio::fs::remove_file(path).await;
    Err(error::classify(op, path.to_path_buf(), OpKind::Write, e))
}

/// Removes whatever the writer had produced so far; called from a
/// cancel handler wired up by the handler layer.
pub async fn cleanup_partial(path: impl AsRef<Path>) {
    let _ = tokio::fs::remove_file(path).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_all_chunks_and_reports_total_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let chunks = vec![Ok(Bytes::from_static(b"hello, ")), Ok(Bytes::from_static(b"world"))];

        let written = write_from_stream(&path, futures::stream::iter(chunks), GeneratorWriteOptions::default())
            .await
            .unwrap();

        assert_eq!(written, 12);
        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"hello, world");
    }

    #[tokio::test]
    async fn creates_parent_directories_when_requested() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/out.txt");
        let chunks = vec![Ok(Bytes::from_static(b"x"))];

        write_from_stream(&path, futures::stream::iter(chunks), GeneratorWriteOptions { create_directories: true, ..Default::default() })
            .await
            .unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn producer_error_removes_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.txt");
        let chunks: Vec<Result<Bytes, FsError>> = vec![Ok(Bytes::from_static(b"partial")), Err(FsError::Cancelled)];

        let result = write_from_stream(&path, futures::stream::iter(chunks), GeneratorWriteOptions::default()).await;

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
