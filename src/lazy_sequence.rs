//! A lazy chunk sequence: an object iterable at least once, yielding byte
//! strings until exhausted, whose cancellation invalidates further pulls.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use crate::error::FsError;

/// A restartable-once-not-required sequence of byte chunks, produced by
/// `readFromGenerator` (and, filtered through a line splitter, by
/// `readLines`). Holds a shared cancellation flag tied to the originating
/// operation: once set, every subsequent pull yields
/// `Some(Err(FsError::Cancelled))` instead of advancing the reader:
/// cancelling the originating future invalidates the sequence, and every
/// further pull produces a cancellation error rather than silently
/// resuming.
pub struct ChunkStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, FsError>> + Send>>,
    cancelled: Arc<AtomicBool>,
}

impl ChunkStream {
    pub(crate) fn new(
        inner: impl Stream<Item = Result<Bytes, FsError>> + Send + 'static,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        ChunkStream { inner: Box::pin(inner), cancelled }
    }

    /// Pulls the next chunk, or `None` once the sequence is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, FsError>> {
        futures::StreamExt::next(self).await
    }

    /// True once the originating operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Stream for ChunkStream {
    type Item = Result<Bytes, FsError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancelled.load(Ordering::Relaxed) {
            return Poll::Ready(Some(Err(FsError::Cancelled)));
        }
        this.inner.as_mut().poll_next(cx)
    }
}
