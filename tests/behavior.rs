//! End-to-end scenarios exercised through `FsHandler` directly (not the
//! process-wide facade, so tests don't share state with each other's
//! event loop).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tempfile::tempdir;

use portal_fs::event_loop::EventLoop;
use portal_fs::options::{GeneratorReadOptions, GeneratorWriteOptions, LineReadOptions, ReadOptions, WatchOptions, WriteOptions};
use portal_fs::watcher::WatchEvent;
use portal_fs::FsHandler;

fn fresh_handler() -> FsHandler {
    FsHandler::new(Arc::new(EventLoop::instance()))
}

#[tokio::test]
async fn read_with_offset_and_length_returns_the_requested_slice() {
    let handler = fresh_handler();
    let dir = tempdir().unwrap();
    let path = dir.path().join("offsets.txt");
    handler.write(&path, Bytes::from_static(b"Hello, World!"), WriteOptions::default()).await.unwrap();

    let slice = handler.read(&path, ReadOptions { offset: 7, length: Some(5) }).await.unwrap();
    assert_eq!(slice, Bytes::from_static(b"World"));
}

#[tokio::test]
async fn auto_buffered_generator_write_coalesces_small_chunks() {
    let handler = fresh_handler();
    let dir = tempdir().unwrap();
    let path = dir.path().join("buffered.txt");

    let small_chunks: Vec<Result<Bytes, portal_fs::FsError>> =
        (0..100).map(|_| Ok(Bytes::from_static(b"x"))).collect();
    let producer: portal_fs::handler::BoxProducer = Box::pin(futures::stream::iter(small_chunks));

    let written = handler
        .write_from_generator(&path, producer, GeneratorWriteOptions { buffer_size: 16, create_directories: false })
        .await
        .into_result()
        .unwrap();

    assert_eq!(written, 100);
    let contents = tokio::fs::read(&path).await.unwrap();
    assert_eq!(contents.len(), 100);
}

#[tokio::test]
async fn cancelling_a_streaming_write_removes_the_partial_file() {
    let handler = fresh_handler();
    let dir = tempdir().unwrap();
    let path = dir.path().join("cancelled.txt");

    let never_ending = futures::stream::repeat(Bytes::from_static(b"chunk"))
        .map(Ok::<_, portal_fs::FsError>);
    let producer: portal_fs::handler::BoxProducer = Box::pin(never_ending);

    let write = handler.write_from_generator(&path, producer, GeneratorWriteOptions::default());
    let canceller = write.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let result = write.await;
    assert!(result.is_cancelled());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!path.exists());
}

#[tokio::test]
async fn line_reader_splits_mixed_endings_and_honours_trim() {
    let handler = fresh_handler();
    let dir = tempdir().unwrap();
    let path = dir.path().join("lines.txt");
    handler.write(&path, Bytes::from_static(b"  one  \r\ntwo\nthree\r"), WriteOptions::default()).await.unwrap();

    let lines_future = handler.read_lines(&path, LineReadOptions { chunk_size: 8192, trim: true, skip_empty: true });
    let lines_arc = lines_future.await.into_result().unwrap();

    let mut collected = Vec::new();
    loop {
        let mut guard = lines_arc.lock();
        match guard.next_line().await {
            Some(line) => collected.push(String::from_utf8(line.unwrap().to_vec()).unwrap()),
            None => break,
        }
    }
    assert_eq!(collected, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn all_settled_reports_mixed_outcomes_without_short_circuiting() {
    use portal_fs::future::{all_settled, AnyFuture};
    use portal_fs::AtomicFuture;

    let ok_one: AnyFuture<u32> = AtomicFuture::resolved(1).into();
    let failing: AnyFuture<u32> = AtomicFuture::rejected(portal_fs::FsError::NotFound { op: "read", path: "/missing".into() }).into();
    let ok_two: AnyFuture<u32> = AtomicFuture::resolved(2).into();

    let outcomes = all_settled(vec![ok_one, failing, ok_two]).await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_fulfilled());
    assert!(!outcomes[1].is_fulfilled());
    assert!(outcomes[2].is_fulfilled());
}

#[tokio::test]
async fn watcher_detects_a_modification() {
    EventLoop::reset();
    let handler = fresh_handler();
    let dir = tempdir().unwrap();
    let path = dir.path().join("watched.txt");
    handler.write(&path, Bytes::from_static(b"v0"), WriteOptions::default()).await.unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let count = Arc::new(AtomicUsize::new(0));
    let events_cb = Arc::clone(&events);
    let count_cb = Arc::clone(&count);
    let callback: portal_fs::watcher::WatchCallback = Arc::new(move |event: WatchEvent| {
        events_cb.lock().push(event.kind);
        count_cb.fetch_add(1, Ordering::SeqCst);
    });

    let opts = WatchOptions { polling_interval: Duration::from_millis(30), ..WatchOptions::default() };
    let id = handler.watch(&path, callback, opts);

    tokio::time::sleep(Duration::from_millis(80)).await;
    handler.write(&path, Bytes::from_static(b"v1, longer now"), WriteOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    handler.unwatch(id);
    assert!(count.load(Ordering::SeqCst) >= 1);
    assert!(events.lock().iter().any(|k| matches!(k, portal_fs::watcher::WatchEventKind::Modified)));
}

#[tokio::test]
async fn generator_read_honours_chunk_size_and_exhausts_cleanly() {
    let handler = fresh_handler();
    let dir = tempdir().unwrap();
    let path = dir.path().join("gen.txt");
    handler.write(&path, Bytes::from_static(b"0123456789"), WriteOptions::default()).await.unwrap();

    let stream_future = handler.read_from_generator(&path, GeneratorReadOptions { chunk_size: 4, offset: 0, length: None });
    let stream_arc = stream_future.await.into_result().unwrap();

    let mut total = Vec::new();
    loop {
        let mut guard = stream_arc.lock();
        match guard.next().await {
            Some(chunk) => total.extend_from_slice(&chunk.unwrap()),
            None => break,
        }
    }
    assert_eq!(total, b"0123456789");
}
