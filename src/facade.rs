//! A thin static facade: free functions forwarding to a single
//! process-wide [`FsHandler`], matching its operations name-for-name.
//! This is the layer application code actually calls; `FsHandler` itself
//! stays test-friendly and instantiable on its own.

use std::path::Path;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::FsError;
use crate::event_loop::EventLoop;
use crate::fs_primitives::FileStats;
use crate::future::CancellableFuture;
use crate::handler::{BoxProducer, FsHandler, WatcherId, WriteSource};
use crate::lazy_sequence::ChunkStream;
use crate::options::{GeneratorReadOptions, GeneratorWriteOptions, LineReadOptions, MkdirOptions, ReadOptions, WatchOptions, WriteOptions};
use crate::stream::LineStream;
use crate::watcher::WatchCallback;

static HANDLER: OnceCell<Mutex<Arc<FsHandler>>> = OnceCell::new();

fn handler() -> Arc<FsHandler> {
    let cell = HANDLER.get_or_init(|| Mutex::new(Arc::new(FsHandler::with_global_loop())));
    Arc::clone(&cell.lock())
}

/// Replaces the process-wide handler (and the event loop behind it) with
/// a fresh one. Intended for test isolation between cases that exercise
/// the facade rather than a handler built by hand.
pub fn reset() {
    EventLoop::reset();
    let fresh = Arc::new(FsHandler::with_global_loop());
    match HANDLER.get() {
        Some(cell) => *cell.lock() = fresh,
        None => {
            let _ = HANDLER.set(Mutex::new(fresh));
        }
    }
}

pub async fn read(path: impl AsRef<Path>, opts: ReadOptions) -> Result<Bytes, FsError> {
    handler().read(path, opts).await
}

pub fn read_stream(path: impl AsRef<Path>, opts: ReadOptions) -> CancellableFuture<Bytes> {
    handler().read_stream(path, opts)
}

pub fn read_from_generator(path: impl AsRef<Path>, opts: GeneratorReadOptions) -> CancellableFuture<Arc<Mutex<ChunkStream>>> {
    handler().read_from_generator(path, opts)
}

pub fn read_lines(path: impl AsRef<Path>, opts: LineReadOptions) -> CancellableFuture<Arc<Mutex<LineStream>>> {
    handler().read_lines(path, opts)
}

pub async fn write(path: impl AsRef<Path>, data: Bytes, opts: WriteOptions) -> Result<u64, FsError> {
    handler().write(path, data, opts).await
}

pub fn write_stream(path: impl AsRef<Path>, source: WriteSource, opts: WriteOptions) -> CancellableFuture<u64> {
    handler().write_stream(path, source, opts)
}

pub fn write_from_generator(path: impl AsRef<Path>, producer: BoxProducer, opts: GeneratorWriteOptions) -> CancellableFuture<u64> {
    handler().write_from_generator(path, producer, opts)
}

pub async fn append(path: impl AsRef<Path>, data: Bytes) -> Result<u64, FsError> {
    handler().append(path, data).await
}

pub async fn exists(path: impl AsRef<Path>) -> bool {
    handler().exists(path).await
}

pub async fn get_stats(path: impl AsRef<Path>) -> Result<FileStats, FsError> {
    handler().get_stats(path).await
}

pub async fn delete(path: impl AsRef<Path>) -> Result<bool, FsError> {
    handler().delete(path).await
}

pub async fn copy(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<bool, FsError> {
    handler().copy(src, dst).await
}

pub fn copy_stream(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> CancellableFuture<bool> {
    handler().copy_stream(src, dst)
}

pub async fn rename(old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<bool, FsError> {
    handler().rename(old, new).await
}

pub async fn create_directory(path: impl AsRef<Path>, opts: MkdirOptions) -> Result<bool, FsError> {
    handler().create_directory(path, opts).await
}

pub async fn remove_directory(path: impl AsRef<Path>) -> Result<bool, FsError> {
    handler().remove_directory(path).await
}

pub fn watch(path: impl AsRef<Path>, callback: WatchCallback, opts: WatchOptions) -> WatcherId {
    handler().watch(path, callback, opts)
}

pub fn unwatch(id: WatcherId) -> bool {
    handler().unwatch(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn facade_roundtrips_through_the_global_handler() {
        reset();
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.txt");

        write(&path, Bytes::from_static(b"via facade"), WriteOptions::default()).await.unwrap();
        let data = read(&path, ReadOptions::default()).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"via facade"));
    }
}
