//! Auto-buffering: a pure glue adapter that coalesces a producer's chunks
//! up to a target buffer size before handing them downstream to the
//! writer, so a producer that yields many small chunks doesn't turn into
//! many small `write(2)` calls.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;

use crate::error::FsError;

pin_project_lite::pin_project! {
    /// Wraps any `Stream<Item = Result<Bytes, FsError>>` and re-chunks it so
    /// every yielded item (other than possibly the last) is at least
    /// `target` bytes.
    pub struct AutoBuffer<S> {
        #[pin]
        inner: S,
        target: usize,
        buffer: BytesMut,
        inner_done: bool,
    }
}

impl<S> AutoBuffer<S> {
    pub fn new(inner: S, target: usize) -> Self {
        AutoBuffer { inner, target: target.max(1), buffer: BytesMut::new(), inner_done: false }
    }
}

impl<S> Stream for AutoBuffer<S>
where
    S: Stream<Item = Result<Bytes, FsError>>,
{
    type Item = Result<Bytes, FsError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if *this.inner_done {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
            }

            if this.buffer.len() >= *this.target {
                return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => {
                    this.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    *this.inner_done = true;
                }
            }
        }
    }
}
