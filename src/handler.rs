//! `FsHandler`: binds each filesystem operation to a future, picking the
//! atomic or cancellable flavor depending on whether the operation can be
//! abandoned mid-flight, wiring cancel handlers (including partial-output
//! cleanup for output-producing streaming operations) through the event
//! loop's operation registry.
//!
//! Unlike `facade`, this is an explicit, constructible type with no
//! process-wide state of its own beyond the [`EventLoop`] it's handed —
//! tests build one directly instead of going through the singleton.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::trace;

use crate::error::FsError;
use crate::event_loop::EventLoop;
use crate::fs_primitives::{self, FileStats};
use crate::future::CancellableFuture;
use crate::lazy_sequence::ChunkStream;
use crate::options::{GeneratorReadOptions, GeneratorWriteOptions, LineReadOptions, MkdirOptions, ReadOptions, WatchOptions, WriteOptions};
use crate::stream::{chunk_reader, chunk_writer, line_reader, LineStream};
use crate::watcher::{self, WatchCallback};

/// A boxed pull-producer of byte chunks, consumed by `writeFromGenerator`
/// and the `source` of `writeStream`.
pub type BoxProducer = Pin<Box<dyn Stream<Item = Result<Bytes, FsError>> + Send>>;
pub type WriteSource = BoxProducer;
pub type WatcherId = u64;

/// Serializes write/append/delete/rename on the same path; read/exists/stat
/// never acquire it.
#[derive(Default)]
struct PathLocks {
    locks: SyncMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl PathLocks {
    fn lock_for(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.locks.lock().entry(path.to_path_buf()).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
    }
}

pub struct FsHandler {
    event_loop: Arc<EventLoop>,
    path_locks: PathLocks,
}

impl FsHandler {
    pub fn new(event_loop: Arc<EventLoop>) -> Self {
        FsHandler { event_loop, path_locks: PathLocks::default() }
    }

    pub fn with_global_loop() -> Self {
        FsHandler::new(EventLoop::instance())
    }

    // ---- atomic operations -------------------------------------------------

    pub async fn read(&self, path: impl AsRef<Path>, opts: ReadOptions) -> Result<Bytes, FsError> {
        fs_primitives::read(path.as_ref().to_path_buf(), opts).await
    }

    pub async fn write(&self, path: impl AsRef<Path>, data: Bytes, opts: WriteOptions) -> Result<u64, FsError> {
        let path = path.as_ref().to_path_buf();
        let guard = self.path_locks.lock_for(&path);
        let _held = guard.lock().await;
        let len = data.len() as u64;
        fs_primitives::write(path, data, opts).await?;
        Ok(len)
    }

    pub async fn append(&self, path: impl AsRef<Path>, data: Bytes) -> Result<u64, FsError> {
        let path = path.as_ref().to_path_buf();
        let guard = self.path_locks.lock_for(&path);
        let _held = guard.lock().await;
        let len = data.len() as u64;
        fs_primitives::write(path, data, WriteOptions { append: true, ..Default::default() }).await?;
        Ok(len)
    }

    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        if path.as_ref().as_os_str().is_empty() {
            return false;
        }
        fs_primitives::exists(path).await
    }

    pub async fn get_stats(&self, path: impl AsRef<Path>) -> Result<FileStats, FsError> {
        fs_primitives::stat(path.as_ref().to_path_buf()).await
    }

    pub async fn delete(&self, path: impl AsRef<Path>) -> Result<bool, FsError> {
        let path = path.as_ref().to_path_buf();
        let guard = self.path_locks.lock_for(&path);
        let _held = guard.lock().await;
        fs_primitives::delete(path).await?;
        Ok(true)
    }

    pub async fn copy(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<bool, FsError> {
        fs_primitives::copy(src.as_ref().to_path_buf(), dst.as_ref().to_path_buf()).await?;
        Ok(true)
    }

    pub async fn rename(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<bool, FsError> {
        let old = old.as_ref().to_path_buf();
        let new = new.as_ref().to_path_buf();
        let guard_old = self.path_locks.lock_for(&old);
        let guard_new = self.path_locks.lock_for(&new);
        let _held_old = guard_old.lock().await;
        let _held_new = guard_new.lock().await;
        fs_primitives::rename(old, new).await?;
        Ok(true)
    }

    pub async fn create_directory(&self, path: impl AsRef<Path>, opts: MkdirOptions) -> Result<bool, FsError> {
        fs_primitives::mkdir(path.as_ref().to_path_buf(), opts).await?;
        Ok(true)
    }

    pub async fn remove_directory(&self, path: impl AsRef<Path>) -> Result<bool, FsError> {
        fs_primitives::rmdir(path.as_ref().to_path_buf()).await?;
        Ok(true)
    }

    // ---- cancellable / streaming operations --------------------------------

    /// `readStream`: reads the whole file, but as a cancellable future so
    /// a caller can abandon a large read before it finishes.
    pub fn read_stream(&self, path: impl AsRef<Path>, opts: ReadOptions) -> CancellableFuture<Bytes> {
        let future = CancellableFuture::pending();
        let path = path.as_ref().to_path_buf();
        self.spawn_cancellable(future.clone(), None, move || chunk_reader::read_all(path, opts));
        future
    }

    /// `readFromGenerator`: yields a lazy `ChunkStream` once opened;
    /// opening itself cannot fail synchronously since the file is only
    /// touched on the first pull.
    pub fn read_from_generator(&self, path: impl AsRef<Path>, opts: GeneratorReadOptions) -> CancellableFuture<Arc<SyncMutex<ChunkStream>>> {
        let future = CancellableFuture::pending();
        let cancelled = Arc::new(AtomicBool::new(false));
        let stream = chunk_reader::open(path.as_ref().to_path_buf(), opts, Arc::clone(&cancelled));
        future.set_cancel_handler(move || cancelled.store(true, Ordering::Relaxed));
        future.resolve(Arc::new(SyncMutex::new(stream)));
        future
    }

    /// `readLines`.
    pub fn read_lines(&self, path: impl AsRef<Path>, opts: LineReadOptions) -> CancellableFuture<Arc<SyncMutex<LineStream>>> {
        let future = CancellableFuture::pending();
        let cancelled = Arc::new(AtomicBool::new(false));
        let stream = line_reader::open(path.as_ref().to_path_buf(), opts, Arc::clone(&cancelled));
        future.set_cancel_handler(move || cancelled.store(true, Ordering::Relaxed));
        future.resolve(Arc::new(SyncMutex::new(stream)));
        future
    }

    /// `writeStream`: drains `source` into `path`. Cancelling before
    /// completion aborts the writer task and deletes any partial output.
    pub fn write_stream(&self, path: impl AsRef<Path>, source: WriteSource, opts: WriteOptions) -> CancellableFuture<u64> {
        let generator_opts = GeneratorWriteOptions { buffer_size: 64 * 1024, create_directories: opts.create_directories };
        self.spawn_write(path, source, generator_opts)
    }

    /// `writeFromGenerator`.
    pub fn write_from_generator(&self, path: impl AsRef<Path>, producer: BoxProducer, opts: GeneratorWriteOptions) -> CancellableFuture<u64> {
        self.spawn_write(path, producer, opts)
    }

    fn spawn_write(&self, path: impl AsRef<Path>, producer: BoxProducer, opts: GeneratorWriteOptions) -> CancellableFuture<u64> {
        let future = CancellableFuture::pending();
        let path = path.as_ref().to_path_buf();
        let cleanup_path = path.clone();
        self.spawn_cancellable(future.clone(), Some(cleanup_path), move || chunk_writer::write_from_stream(path, producer, opts));
        future
    }

    /// `copyStream`: like `copy`, but cancellable.
    pub fn copy_stream(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> CancellableFuture<bool> {
        let future = CancellableFuture::pending();
        let src = src.as_ref().to_path_buf();
        let dst = dst.as_ref().to_path_buf();
        let cleanup_path = dst.clone();
        self.spawn_cancellable(future.clone(), Some(cleanup_path), move || async move { fs_primitives::copy(src, dst).await.map(|_| true) });
        future
    }

    /// Spawns `work` as a cancellable, registry-tracked task: reserves an
    /// operation id, wires cancellation to `task.abort()` (plus deleting
    /// `cleanup_path` if the operation produces output), and settles
    /// `future` with `work`'s result. Unlike a bare `tokio::spawn`, the
    /// operation is always removed from the event loop's registry once it
    /// settles, whether that happens through normal completion or through
    /// cancellation — nothing is left behind in the registry.
    ///
    /// `work` doesn't exist yet when the operation id is reserved (it needs
    /// an `AbortHandle` from the task it's about to become the cancel
    /// handler for), so the id is threaded into the spawned task after the
    /// fact over a one-shot channel.
    fn spawn_cancellable<T, Fut>(&self, future: CancellableFuture<T>, cleanup_path: Option<PathBuf>, work: impl FnOnce() -> Fut + Send + 'static)
    where
        T: Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FsError>> + Send + 'static,
    {
        let (op_id_tx, op_id_rx) = tokio::sync::oneshot::channel::<u64>();
        let settle = future.clone();
        let loop_for_complete = Arc::clone(&self.event_loop);

        let task = tokio::spawn(async move {
            let result = work().await;
            if let Ok(op_id) = op_id_rx.await {
                loop_for_complete.complete_file_operation(op_id);
            }
            match result {
                Ok(v) => settle.resolve(v),
                Err(e) => settle.reject(e),
            }
        });

        let abort_handle = task.abort_handle();
        let op_id = self.event_loop.add_file_operation(Box::new(move || {
            abort_handle.abort();
            if let Some(path) = cleanup_path {
                tokio::spawn(async move { chunk_writer::cleanup_partial(path).await });
            }
        }));
        trace!(op_id, "streaming operation dispatched");
        let _ = op_id_tx.send(op_id);

        let loop_for_cancel = Arc::clone(&self.event_loop);
        future.set_cancel_handler(move || {
            loop_for_cancel.cancel_file_operation(op_id);
        });
    }

    // ---- watcher ------------------------------------------------------------

    pub fn watch(&self, path: impl AsRef<Path>, callback: WatchCallback, opts: WatchOptions) -> WatcherId {
        watcher::watch(path.as_ref().to_path_buf(), opts, callback)
    }

    pub fn unwatch(&self, id: WatcherId) -> bool {
        watcher::unwatch(id)
    }
}
