//! The cancellable future: an [`AtomicFuture`] plus a `Cancelled` terminal
//! state and a cancel handler slot. Cancellation is driven by an explicit
//! `cancel()` call rather than racing a second future, because it also
//! needs to tear down event-loop state and delete partial output.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use super::atomic::{AtomicFuture, ThenOutcome};
use crate::error::FsError;

struct Shared<T> {
    // The inner atomic future carries the Pending/Fulfilled/Rejected half
    // of the state machine; `cancelled` adds the orthogonal terminal bit
    // on top of it. Cancelled is terminal and suppresses any subsequent
    // resolve/reject.
    atomic: AtomicFuture<T>,
    cancelled: Mutex<bool>,
    cancel_handler: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    wakers: Mutex<Vec<Waker>>,
    /// Chained children registered via `then` before this future was
    /// cancelled. On cancellation they are cancelled too: continuations
    /// attached before cancellation inherit the cancelled state.
    downstream: Mutex<Vec<Box<dyn Fn() + Send>>>,
}

/// A future that may additionally be cancelled before it settles.
///
/// Invariant: `Cancelled` is terminal. Cancellation never flows through
/// the fulfill/reject continuation path — it surfaces only through
/// [`CancellableResult::Cancelled`] and [`is_cancelled`](Self::is_cancelled).
pub struct CancellableFuture<T: Clone + Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for CancellableFuture<T> {
    fn clone(&self) -> Self {
        CancellableFuture { shared: Arc::clone(&self.shared) }
    }
}

impl<T: Clone + Send + Sync + 'static> CancellableFuture<T> {
    /// Creates a new pending cancellable future.
    pub fn pending() -> Self {
        CancellableFuture {
            shared: Arc::new(Shared {
                atomic: AtomicFuture::pending(),
                cancelled: Mutex::new(false),
                cancel_handler: Mutex::new(None),
                wakers: Mutex::new(Vec::new()),
                downstream: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The underlying [`AtomicFuture`] handle, for code that needs to
    /// `resolve`/`reject` it directly (event-loop completion callbacks).
    pub fn atomic(&self) -> &AtomicFuture<T> {
        &self.shared.atomic
    }

    pub fn resolve(&self, value: T) {
        if !*self.shared.cancelled.lock() {
            self.shared.atomic.resolve(value);
        }
    }

    pub fn reject(&self, error: FsError) {
        if !*self.shared.cancelled.lock() {
            self.shared.atomic.reject(error);
        }
    }

    /// Installs the cancel handler. If the future has already been
    /// cancelled, the handler runs immediately. At most one handler may be
    /// set; a second call replaces a still-unfired one.
    pub fn set_cancel_handler<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let already_cancelled = *self.shared.cancelled.lock();
        if already_cancelled {
            handler();
        } else {
            *self.shared.cancel_handler.lock() = Some(Box::new(handler));
        }
    }

    /// Cancels the future. Safe to call multiple times; only the first
    /// call has an effect. A no-op if the future already settled.
    pub fn cancel(&self) {
        let (handler, downstream, wakers) = {
            let mut cancelled = self.shared.cancelled.lock();
            if *cancelled || self.shared.atomic.is_settled() {
                return;
            }
            *cancelled = true;
            let handler = self.shared.cancel_handler.lock().take();
            let downstream = std::mem::take(&mut *self.shared.downstream.lock());
            let wakers = std::mem::take(&mut *self.shared.wakers.lock());
            (handler, downstream, wakers)
        };
        if let Some(handler) = handler {
            handler();
        }
        for child_cancel in downstream {
            child_cancel();
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// Observes the `Cancelled` state.
    pub fn is_cancelled(&self) -> bool {
        *self.shared.cancelled.lock()
    }

    /// `then` on a cancellable future returns a cancellable future whose
    /// `cancel()` propagates to this one: chaining preserves
    /// cancellability, forwarding the cancel handler onto the child.
    /// Cancelling this (parent) future before the child settles cancels
    /// the child too.
    pub fn then<U, Fo, Fr>(&self, on_fulfilled: Fo, on_rejected: Fr) -> CancellableFuture<U>
    where
        U: Clone + Send + Sync + 'static,
        Fo: FnOnce(T) -> ThenOutcome<U> + Send + 'static,
        Fr: FnOnce(FsError) -> ThenOutcome<U> + Send + 'static,
    {
        let child = CancellableFuture::<U>::pending();

        let parent_for_cancel = self.clone();
        child.set_cancel_handler(move || parent_for_cancel.cancel());

        let child_for_downstream = child.clone();
        self.shared
            .downstream
            .lock()
            .push(Box::new(move || child_for_downstream.cancel()));

        let child_shared = Arc::clone(&child.shared);
        let chained = self.shared.atomic.then(on_fulfilled, on_rejected);
        chained.on_settle(Box::new(move |outcome| {
            if *child_shared.cancelled.lock() {
                return;
            }
            match outcome {
                Ok(v) => child_shared.atomic.resolve(v),
                Err(e) => child_shared.atomic.reject(e),
            }
        }));
        child
    }

    /// `catch`, expressed in terms of `then`.
    pub fn catch<Fr>(&self, on_rejected: Fr) -> CancellableFuture<T>
    where
        Fr: FnOnce(FsError) -> ThenOutcome<T> + Send + 'static,
    {
        self.then(ThenOutcome::Value, on_rejected)
    }
}

impl<T: Clone + Send + Sync + 'static> Future for CancellableFuture<T> {
    type Output = CancellableResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if *self.shared.cancelled.lock() {
            return Poll::Ready(CancellableResult::Cancelled);
        }
        self.shared.wakers.lock().push(cx.waker().clone());

        let atomic = self.shared.atomic.clone();
        futures::pin_mut!(atomic);
        let polled = atomic.poll(cx);

        if *self.shared.cancelled.lock() {
            return Poll::Ready(CancellableResult::Cancelled);
        }
        match polled {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(v)) => Poll::Ready(CancellableResult::Fulfilled(v)),
            Poll::Ready(Err(e)) => Poll::Ready(CancellableResult::Rejected(e)),
        }
    }
}

/// The outcome of `.await`ing a [`CancellableFuture`].
#[derive(Debug, Clone)]
pub enum CancellableResult<T> {
    Fulfilled(T),
    Rejected(FsError),
    Cancelled,
}

impl<T> CancellableResult<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CancellableResult::Cancelled)
    }

    /// Converts to a plain `Result`, treating cancellation as
    /// [`FsError::Cancelled`] for callers that just want `?`-propagation
    /// and don't need to distinguish cancellation from rejection.
    pub fn into_result(self) -> Result<T, FsError> {
        match self {
            CancellableResult::Fulfilled(v) => Ok(v),
            CancellableResult::Rejected(e) => Err(e),
            CancellableResult::Cancelled => Err(FsError::Cancelled),
        }
    }
}
