//! The chunked reader: opens the file, honours `offset`/`length`, yields
//! chunks of `chunk_size` until EOF or the length budget runs out.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::error::{self, FsError, OpKind};
use crate::lazy_sequence::ChunkStream;
use crate::options::GeneratorReadOptions;

struct ReadState {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    chunk_size: usize,
    offset: u64,
    remaining: Option<u64>,
    done: bool,
}

/// Builds the lazy chunk sequence for `readFromGenerator`. `cancelled` is
/// shared with the event loop's operation record so cancelling the
/// originating future tears down the reader at the next chunk boundary.
pub fn open(path: impl Into<PathBuf>, opts: GeneratorReadOptions, cancelled: Arc<AtomicBool>) -> ChunkStream {
    let state = ReadState {
        path: path.into(),
        file: None,
        chunk_size: opts.chunk_size.max(1),
        offset: opts.offset,
        remaining: opts.length,
        done: false,
    };

    let stream = futures::stream::unfold(state, step);
    ChunkStream::new(stream, cancelled)
}

async fn step(mut state: ReadState) -> Option<(Result<Bytes, FsError>, ReadState)> {
    if state.done {
        return None;
    }
    if let Some(0) = state.remaining {
        state.done = true;
        return None;
    }

    if state.file.is_none() {
        match tokio::fs::File::open(&state.path).await {
            Ok(mut file) => {
                if state.offset > 0 {
                    if let Err(e) = file.seek(SeekFrom::Start(state.offset)).await {
                        state.done = true;
                        let err = error::classify("read_generator", state.path.clone(), OpKind::Read, e);
                        return Some((Err(err), state));
                    }
                }
                state.file = Some(file);
            }
            Err(e) => {
                state.done = true;
                let err = error::classify("read_generator", state.path.clone(), OpKind::Read, e);
                return Some((Err(err), state));
            }
        }
    }

    let want = match state.remaining {
        Some(remaining) => remaining.min(state.chunk_size as u64) as usize,
        None => state.chunk_size,
    };

    let mut buf = vec![0u8; want];
    let file = state.file.as_mut().expect("opened above");
    match file.read(&mut buf).await {
        Ok(0) => {
            state.done = true;
            None
        }
        Ok(n) => {
            buf.truncate(n);
            if let Some(remaining) = state.remaining.as_mut() {
                *remaining -= n as u64;
            }
            Some((Ok(Bytes::from(buf)), state))
        }
        Err(e) => {
            state.done = true;
            let path = state.path.clone();
            let err = FsError::StreamFailed { op: "read_generator", path, source: e, bytes_processed: None };
            Some((Err(err), state))
        }
    }
}

/// The non-streaming, atomic `read`: consumes the file in one shot.
/// Shares the classification path with the generator reader but has no
/// cancellation checkpoint — this is an atomic operation and can't be
/// cancelled mid-flight.
pub async fn read_all(path: impl Into<PathBuf>, opts: crate::options::ReadOptions) -> Result<Bytes, FsError> {
    let path = path.into();
    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| error::classify("read", path.clone(), OpKind::Read, e))?;

    if opts.offset > 0 {
        file.seek(SeekFrom::Start(opts.offset))
            .await
            .map_err(|e| error::classify("read", path.clone(), OpKind::Read, e))?;
    }

    let mut buf = Vec::new();
    match opts.length {
        Some(len) => {
            let mut limited = file.take(len);
            limited
                .read_to_end(&mut buf)
                .await
                .map_err(|e| error::classify("read", path.clone(), OpKind::Read, e))?;
        }
        None => {
            file.read_to_end(&mut buf)
                .await
                .map_err(|e| error::classify("read", path.clone(), OpKind::Read, e))?;
        }
    }
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ReadOptions;
    use futures::StreamExt;
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    async fn write_file(path: &std::path::Path, content: &[u8]) {
        let mut f = tokio::fs::File::create(path).await.unwrap();
        f.write_all(content).await.unwrap();
        f.flush().await.unwrap();
    }

    #[tokio::test]
    async fn generator_on_small_file_yields_one_chunk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.txt");
        write_file(&path, b"hello").await;

        let mut stream = open(&path, GeneratorReadOptions { chunk_size: 8192, ..Default::default() }, Arc::new(AtomicBool::new(false)));
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, Bytes::from_static(b"hello"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn read_with_offset_and_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.txt");
        write_file(&path, b"Hello, World!").await;

        let bytes = read_all(&path, ReadOptions { offset: 7, length: Some(5) }).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"World"));
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.txt");
        let err = read_all(&path, ReadOptions::default()).await.unwrap_err();
        assert!(matches!(err, FsError::NotFound { .. }));
    }

    #[tokio::test]
    async fn zero_byte_file_yields_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        write_file(&path, b"").await;
        let bytes = read_all(&path, ReadOptions::default()).await.unwrap();
        assert!(bytes.is_empty());
    }
}
